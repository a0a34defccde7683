//! Script-defined item kinds

use crate::{
    ActionResult, BlockPos, EntityId, EventOutcome, Hand, Handle, HandleSlot, ItemSettings, Kind,
    KindEvent, KindSettings, Registrable, WorldId,
};
use std::fmt;
use std::sync::Arc;

pub trait ItemBehavior: Send + Sync {
    fn on_use(&self, _world: WorldId, _player: EntityId, _hand: Hand) -> ActionResult {
        ActionResult::Pass
    }

    fn on_use_on_block(
        &self,
        _world: WorldId,
        _pos: BlockPos,
        _player: EntityId,
        _hand: Hand,
    ) -> ActionResult {
        ActionResult::Pass
    }

    fn on_use_on_entity(
        &self,
        _world: WorldId,
        _entity: EntityId,
        _player: EntityId,
        _hand: Hand,
    ) -> ActionResult {
        ActionResult::Pass
    }

    /// Return `false` to cancel the attack.
    fn on_attack_entity(&self, _world: WorldId, _attacker: EntityId, _target: EntityId) -> bool {
        true
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ItemEvent {
    Use {
        world: WorldId,
        player: EntityId,
        hand: Hand,
    },
    UseOnBlock {
        world: WorldId,
        pos: BlockPos,
        player: EntityId,
        hand: Hand,
    },
    UseOnEntity {
        world: WorldId,
        entity: EntityId,
        player: EntityId,
        hand: Hand,
    },
    AttackEntity {
        world: WorldId,
        attacker: EntityId,
        target: EntityId,
    },
}

impl KindEvent for ItemEvent {
    fn name(&self) -> &'static str {
        match self {
            ItemEvent::Use { .. } => "use",
            ItemEvent::UseOnBlock { .. } => "use_on_block",
            ItemEvent::UseOnEntity { .. } => "use_on_entity",
            ItemEvent::AttackEntity { .. } => "attack_entity",
        }
    }

    fn default_outcome(&self) -> EventOutcome {
        match self {
            ItemEvent::AttackEntity { .. } => EventOutcome::Allow(true),
            _ => EventOutcome::Action(ActionResult::Pass),
        }
    }
}

/// An item kind declared from script code.
pub struct ItemType {
    id: String,
    settings: ItemSettings,
    behavior: Box<dyn ItemBehavior>,
    slot: HandleSlot,
}

impl ItemType {
    pub fn builder(id: impl Into<String>) -> ItemTypeBuilder {
        ItemTypeBuilder {
            id: id.into(),
            settings: ItemSettings::default(),
            behavior: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn settings(&self) -> &ItemSettings {
        &self.settings
    }

    pub fn handle(&self) -> Option<Handle> {
        self.slot.get()
    }
}

impl fmt::Debug for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemType")
            .field("id", &self.id)
            .field("handle", &self.slot.get())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Registrable for ItemType {
    const KIND: Kind = Kind::Item;
    type Event = ItemEvent;

    fn identifier(&self) -> &str {
        &self.id
    }

    fn handle_slot(&self) -> &HandleSlot {
        &self.slot
    }

    fn kind_settings(&self) -> KindSettings {
        KindSettings::Item(self.settings.clone())
    }

    fn deliver(&self, event: &ItemEvent) -> EventOutcome {
        let b = self.behavior.as_ref();
        match *event {
            ItemEvent::Use {
                world,
                player,
                hand,
            } => EventOutcome::Action(b.on_use(world, player, hand)),
            ItemEvent::UseOnBlock {
                world,
                pos,
                player,
                hand,
            } => EventOutcome::Action(b.on_use_on_block(world, pos, player, hand)),
            ItemEvent::UseOnEntity {
                world,
                entity,
                player,
                hand,
            } => EventOutcome::Action(b.on_use_on_entity(world, entity, player, hand)),
            ItemEvent::AttackEntity {
                world,
                attacker,
                target,
            } => EventOutcome::Allow(b.on_attack_entity(world, attacker, target)),
        }
    }
}

pub struct ItemTypeBuilder {
    id: String,
    settings: ItemSettings,
    behavior: Option<Box<dyn ItemBehavior>>,
}

impl ItemTypeBuilder {
    pub fn max_stack_size(mut self, size: u32) -> Self {
        self.settings.max_stack_size = size;
        self
    }

    /// Give the item durability. Damageable items never stack.
    pub fn max_damage(mut self, damage: u32) -> Self {
        self.settings.max_damage = damage;
        if damage > 0 {
            self.settings.max_stack_size = 1;
        }
        self
    }

    pub fn fire_resistant(mut self, fire_resistant: bool) -> Self {
        self.settings.fire_resistant = fire_resistant;
        self
    }

    pub fn attack(mut self, damage: f64, speed: f64) -> Self {
        self.settings.attack_damage = damage;
        self.settings.attack_speed = speed;
        self
    }

    pub fn attack_knockback(mut self, knockback: f64) -> Self {
        self.settings.attack_knockback = knockback;
        self
    }

    pub fn texture(mut self, texture: impl Into<String>) -> Self {
        self.settings.texture = Some(texture.into());
        self
    }

    pub fn settings(mut self, settings: ItemSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn behavior(mut self, behavior: impl ItemBehavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    pub fn build(self) -> Arc<ItemType> {
        Arc::new(ItemType {
            id: self.id,
            settings: self.settings,
            behavior: self
                .behavior
                .unwrap_or_else(|| Box::new(crate::DefaultBehavior)),
            slot: HandleSlot::new(),
        })
    }
}
