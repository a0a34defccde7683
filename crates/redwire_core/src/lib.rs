//! Redwire Core
//!
//! The registration side of the bridge between a scripting runtime and a
//! host simulation:
//! - Handles and the handle allocator
//! - The registration queue and per-kind registries with a freeze lifecycle
//! - Behavior traits and event dispatch for blocks, items and entities
//! - The host drain/apply contract and startup handshake
//! - The registration manifest

pub mod block;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod event;
pub mod handle;
pub mod host;
pub mod ident;
pub mod item;
pub mod manifest;
pub mod queue;
pub mod registries;
pub mod registry;
pub mod settings;

pub use block::{BlockBehavior, BlockEvent, BlockType, BlockTypeBuilder};
pub use dispatch::EventDispatcher;
pub use entity::{EntityBehavior, EntityEvent, EntityType, EntityTypeBuilder};
pub use error::{BridgeError, ManifestError};
pub use event::{ActionResult, BlockPos, Direction, EntityId, EventOutcome, Hand, KindEvent, WorldId};
pub use handle::{Handle, HandleAllocator, HandleSlot};
pub use host::{
    apply_batch, drain_and_apply, registration_point, ApplyOutcome, DrainReport, HostId,
    HostRegistrar, HostRejection, KindReport, StartupGate,
};
pub use ident::Identifier;
pub use item::{ItemBehavior, ItemEvent, ItemType, ItemTypeBuilder};
pub use manifest::ManifestWriter;
pub use queue::{RegistrationQueue, RegistrationRequest};
pub use registries::Registries;
pub use registry::{HostBinding, Registrable, Registry};
pub use settings::{
    BlockModel, BlockSettings, EntityBase, EntityModel, EntitySettings, GoalConfig, ItemSettings,
    Kind, KindSettings, SpawnGroup,
};

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Handlers for kinds declared without any: every event keeps its default.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultBehavior;

impl BlockBehavior for DefaultBehavior {}
impl ItemBehavior for DefaultBehavior {}
impl EntityBehavior for DefaultBehavior {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
