//! Redwire Scripting Bridge
//!
//! The script-facing half of the bridge:
//! - **Signature codec:** compact member signatures and value marshaling
//! - **Call bridge:** invoke host members by name through a pluggable resolver
//! - **Object table:** opaque refs to pinned host objects
//! - **Runtime:** JavaScript mods on QuickJS with the registration API,
//!   script event handlers and call-bridge bindings

pub mod binding;
pub mod bridge;
pub mod cache;
pub mod callback;
pub mod definition;
pub mod error;
pub mod object;
pub mod resolver;
pub mod runtime;
pub mod signature;
pub mod value;

pub use bridge::CallBridge;
pub use callback::{handler_names, HandlerChannel, HandlerReply, ScriptBehavior};
pub use definition::register_definition;
pub use error::{CallError, HostError, ScriptError};
pub use object::ObjectTable;
pub use resolver::{MemberId, MemberKey, MemberKind, MemberResolver};
pub use runtime::{ScriptRuntime, DEFAULT_HANDLER_TIMEOUT};
pub use signature::{ReturnDesc, Signature, TypeDesc, STRING_CLASS};
pub use value::{decode_result, encode_argument, HostValue, ObjectRef, ScriptValue};

pub use rquickjs;
