use crate::{Handle, Kind};
use thiserror::Error;

/// Errors raised by registries, the drain step and host-binding lookups.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("{kind} registry is frozen; '{id}' can no longer be registered")]
    AlreadyFrozen { kind: Kind, id: String },

    #[error("'{id}' is already registered with handle {handle}")]
    AlreadyRegistered { id: String, handle: Handle },

    #[error("invalid identifier '{id}': {reason}")]
    InvalidIdentifier { id: String, reason: String },

    #[error("host rejected {kind} {handle}: {reason}")]
    HostRegistrationFailed {
        kind: Kind,
        handle: Handle,
        reason: String,
    },

    #[error("{kind} {handle} has not been applied on the host yet")]
    HostBindingPending { kind: Kind, handle: Handle },

    #[error("no {kind} is registered with handle {handle}")]
    UnknownHandle { kind: Kind, handle: Handle },

    #[error("registration queues may only be drained from the host registration thread")]
    NotHostThread,
}

impl BridgeError {
    pub(crate) fn invalid_identifier(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while merging entries into the manifest file.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest at {path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest at {path} must be a JSON object")]
    NotAnObject { path: String },
}
