//! The process-wide registry bundle
//!
//! One [`Registry`] per kind plus the startup handshake. Tests build fresh
//! bundles with [`Registries::new`]; the running bridge uses [`global`].

use crate::{
    BlockType, BridgeError, EntityType, ItemType, ManifestWriter, RegistrationQueue, Registry,
    StartupGate,
};
use once_cell::sync::Lazy;
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

static GLOBAL: Lazy<Registries> = Lazy::new(Registries::new);

/// Process-wide registries, created on first use and never dropped.
pub fn global() -> &'static Registries {
    &GLOBAL
}

pub struct Registries {
    blocks: Registry<BlockType>,
    items: Registry<ItemType>,
    entities: Registry<EntityType>,
    gate: StartupGate,
    host_thread: OnceLock<ThreadId>,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            blocks: Registry::new(),
            items: Registry::new(),
            entities: Registry::new(),
            gate: StartupGate::new(),
            host_thread: OnceLock::new(),
        }
    }

    pub fn blocks(&self) -> &Registry<BlockType> {
        &self.blocks
    }

    pub fn items(&self) -> &Registry<ItemType> {
        &self.items
    }

    pub fn entities(&self) -> &Registry<EntityType> {
        &self.entities
    }

    pub fn gate(&self) -> &StartupGate {
        &self.gate
    }

    /// Send every future registration of every kind to `writer`.
    pub fn attach_manifest(&self, writer: Arc<ManifestWriter>) {
        let attached = [
            self.blocks.attach_manifest(Arc::clone(&writer)),
            self.items.attach_manifest(Arc::clone(&writer)),
            self.entities.attach_manifest(writer),
        ];
        if attached.contains(&false) {
            tracing::warn!("manifest writer was already attached; keeping the first one");
        }
    }

    pub fn freeze_all(&self) {
        self.blocks.freeze();
        self.items.freeze();
        self.entities.freeze();
    }

    pub fn is_frozen(&self) -> bool {
        self.blocks.is_frozen() && self.items.is_frozen() && self.entities.is_frozen()
    }

    /// Every distinct queue feeding the drain step.
    pub(crate) fn queues(&self) -> Vec<&Arc<RegistrationQueue>> {
        let mut queues: Vec<&Arc<RegistrationQueue>> = Vec::with_capacity(3);
        for queue in [self.blocks.queue(), self.items.queue(), self.entities.queue()] {
            if !queues.iter().any(|q| Arc::ptr_eq(q, queue)) {
                queues.push(queue);
            }
        }
        queues
    }

    /// Bind the calling thread as the host registration thread, or check
    /// that it is the one already bound.
    pub fn claim_host_thread(&self) -> Result<(), BridgeError> {
        let current = thread::current().id();
        if *self.host_thread.get_or_init(|| current) == current {
            Ok(())
        } else {
            Err(BridgeError::NotHostThread)
        }
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_independent_handle_spaces_and_queues() {
        let registries = Registries::new();
        let block = registries
            .blocks()
            .register(BlockType::builder("mymod:ruby_block").build())
            .unwrap();
        let item = registries
            .items()
            .register(ItemType::builder("mymod:ruby").build())
            .unwrap();

        assert_eq!(block.raw(), 1);
        assert_eq!(item.raw(), 1);
        assert_eq!(registries.queues().len(), 3);
    }

    #[test]
    fn freeze_all_closes_every_kind() {
        let registries = Registries::new();
        registries.freeze_all();
        assert!(registries.is_frozen());
        assert!(registries
            .entities()
            .register(EntityType::builder("mymod:golem").build())
            .is_err());
    }

    #[test]
    fn registration_writes_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let writer = Arc::new(ManifestWriter::new(dir.path().join("out/manifest.json")));
        let registries = Registries::new();
        registries.attach_manifest(Arc::clone(&writer));

        registries
            .blocks()
            .register(BlockType::builder("mymod:ruby_ore").hardness(3.0).build())
            .unwrap();
        registries
            .items()
            .register(ItemType::builder("mymod:ruby").build())
            .unwrap();
        registries
            .entities()
            .register(EntityType::builder("mymod:ruby_golem").build())
            .unwrap();

        let root = writer.read().unwrap();
        let blocks = root["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["id"], "mymod:ruby_ore");
        assert_eq!(blocks[0]["hardness"], 3.0);
        assert_eq!(root["items"][0]["id"], "mymod:ruby");
        assert_eq!(root["entities"][0]["id"], "mymod:ruby_golem");
    }

    #[test]
    fn manifest_failure_does_not_fail_registration() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read or written as the manifest file.
        let registries = Registries::new();
        registries.attach_manifest(Arc::new(ManifestWriter::new(dir.path())));

        let handle = registries
            .blocks()
            .register(BlockType::builder("mymod:ruby_ore").build())
            .unwrap();
        assert!(registries.blocks().contains(handle));
        assert_eq!(
            registries.blocks().handle_of(&"mymod:ruby_ore".parse().unwrap()),
            Some(handle)
        );
        assert!(dir.path().is_dir());
    }

    #[test]
    fn global_is_a_singleton() {
        assert!(std::ptr::eq(global(), global()));
    }
}
