use crate::MemberKey;
use redwire_core::BridgeError;
use thiserror::Error;

/// Error raised by a host member: the thrown type and its message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{class}: {message}")]
pub struct HostError {
    pub class: String,
    pub message: String,
}

impl HostError {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the signature codec and the call bridge.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("malformed signature '{signature}': {reason}")]
    MalformedSignature { signature: String, reason: String },

    #[error("argument {index}: expected {expected}, found {found}")]
    TypeMismatch {
        index: usize,
        expected: String,
        found: &'static str,
    },

    #[error("host returned {found} where {expected} was declared")]
    ResultMismatch {
        expected: String,
        found: &'static str,
    },

    #[error("expected {expected} arguments, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("no host member matches {key}")]
    MemberNotFound { key: MemberKey },

    #[error("{key} threw {source}")]
    InvocationFailed {
        key: MemberKey,
        #[source]
        source: HostError,
    },

    #[error("call bridge used before initialization")]
    BridgeNotInitialized,

    #[error("call bridge is already initialized")]
    AlreadyInitialized,

    #[error("instance member {key} invoked on a null reference")]
    NullTarget { key: MemberKey },
}

impl CallError {
    pub(crate) fn malformed(signature: &str, reason: impl Into<String>) -> Self {
        Self::MalformedSignature {
            signature: signature.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the scripting runtime.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("javascript error: {0}")]
    Js(#[from] rquickjs::Error),

    #[error("uncaught exception: {0}")]
    Exception(String),

    #[error("invalid {kind} definition: {source}")]
    InvalidDefinition {
        kind: redwire_core::Kind,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Registration(#[from] BridgeError),
}
