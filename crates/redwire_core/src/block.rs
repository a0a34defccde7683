//! Script-defined block kinds

use crate::{
    ActionResult, BlockModel, BlockPos, BlockSettings, EntityId, EventOutcome, Hand, Handle,
    HandleSlot, Kind, KindEvent, KindSettings, Registrable, WorldId,
};
use std::fmt;
use std::sync::Arc;

/// Event handlers of a block kind. Every handler defaults to the host's
/// vanilla behavior, so implementors override only what they need.
pub trait BlockBehavior: Send + Sync {
    /// Return `false` to cancel the break.
    fn on_break(&self, _world: WorldId, _pos: BlockPos, _player: EntityId) -> bool {
        true
    }

    fn on_use(&self, _world: WorldId, _pos: BlockPos, _player: EntityId, _hand: Hand) -> ActionResult {
        ActionResult::Pass
    }

    fn on_stepped_on(&self, _world: WorldId, _pos: BlockPos, _entity: EntityId) {}

    fn on_fallen_upon(&self, _world: WorldId, _pos: BlockPos, _entity: EntityId, _distance: f32) {}

    fn on_random_tick(&self, _world: WorldId, _pos: BlockPos) {}

    fn on_placed(&self, _world: WorldId, _pos: BlockPos, _player: EntityId) {}

    fn on_removed(&self, _world: WorldId, _pos: BlockPos) {}

    fn on_neighbor_changed(&self, _world: WorldId, _pos: BlockPos, _neighbor: BlockPos) {}

    fn on_entity_inside(&self, _world: WorldId, _pos: BlockPos, _entity: EntityId) {}
}

/// Events the host reports for a block kind.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockEvent {
    Break { world: WorldId, pos: BlockPos, player: EntityId },
    Use { world: WorldId, pos: BlockPos, player: EntityId, hand: Hand },
    SteppedOn { world: WorldId, pos: BlockPos, entity: EntityId },
    FallenUpon { world: WorldId, pos: BlockPos, entity: EntityId, distance: f32 },
    RandomTick { world: WorldId, pos: BlockPos },
    Placed { world: WorldId, pos: BlockPos, player: EntityId },
    Removed { world: WorldId, pos: BlockPos },
    NeighborChanged { world: WorldId, pos: BlockPos, neighbor: BlockPos },
    EntityInside { world: WorldId, pos: BlockPos, entity: EntityId },
}

impl KindEvent for BlockEvent {
    fn name(&self) -> &'static str {
        match self {
            BlockEvent::Break { .. } => "break",
            BlockEvent::Use { .. } => "use",
            BlockEvent::SteppedOn { .. } => "stepped_on",
            BlockEvent::FallenUpon { .. } => "fallen_upon",
            BlockEvent::RandomTick { .. } => "random_tick",
            BlockEvent::Placed { .. } => "placed",
            BlockEvent::Removed { .. } => "removed",
            BlockEvent::NeighborChanged { .. } => "neighbor_changed",
            BlockEvent::EntityInside { .. } => "entity_inside",
        }
    }

    fn default_outcome(&self) -> EventOutcome {
        match self {
            BlockEvent::Break { .. } => EventOutcome::Allow(true),
            BlockEvent::Use { .. } => EventOutcome::Action(ActionResult::Pass),
            _ => EventOutcome::Done,
        }
    }
}

/// A block kind declared from script code.
pub struct BlockType {
    id: String,
    settings: BlockSettings,
    behavior: Box<dyn BlockBehavior>,
    slot: HandleSlot,
}

impl BlockType {
    pub fn builder(id: impl Into<String>) -> BlockTypeBuilder {
        BlockTypeBuilder {
            id: id.into(),
            settings: BlockSettings::default(),
            behavior: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn settings(&self) -> &BlockSettings {
        &self.settings
    }

    pub fn behavior(&self) -> &dyn BlockBehavior {
        self.behavior.as_ref()
    }

    /// Handle assigned at registration, if registered.
    pub fn handle(&self) -> Option<Handle> {
        self.slot.get()
    }
}

impl fmt::Debug for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockType")
            .field("id", &self.id)
            .field("handle", &self.slot.get())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Registrable for BlockType {
    const KIND: Kind = Kind::Block;
    type Event = BlockEvent;

    fn identifier(&self) -> &str {
        &self.id
    }

    fn handle_slot(&self) -> &HandleSlot {
        &self.slot
    }

    fn kind_settings(&self) -> KindSettings {
        KindSettings::Block(self.settings.clone())
    }

    fn deliver(&self, event: &BlockEvent) -> EventOutcome {
        let b = self.behavior.as_ref();
        match *event {
            BlockEvent::Break { world, pos, player } => {
                EventOutcome::Allow(b.on_break(world, pos, player))
            }
            BlockEvent::Use {
                world,
                pos,
                player,
                hand,
            } => EventOutcome::Action(b.on_use(world, pos, player, hand)),
            BlockEvent::SteppedOn { world, pos, entity } => {
                b.on_stepped_on(world, pos, entity);
                EventOutcome::Done
            }
            BlockEvent::FallenUpon {
                world,
                pos,
                entity,
                distance,
            } => {
                b.on_fallen_upon(world, pos, entity, distance);
                EventOutcome::Done
            }
            BlockEvent::RandomTick { world, pos } => {
                b.on_random_tick(world, pos);
                EventOutcome::Done
            }
            BlockEvent::Placed { world, pos, player } => {
                b.on_placed(world, pos, player);
                EventOutcome::Done
            }
            BlockEvent::Removed { world, pos } => {
                b.on_removed(world, pos);
                EventOutcome::Done
            }
            BlockEvent::NeighborChanged {
                world,
                pos,
                neighbor,
            } => {
                b.on_neighbor_changed(world, pos, neighbor);
                EventOutcome::Done
            }
            BlockEvent::EntityInside { world, pos, entity } => {
                b.on_entity_inside(world, pos, entity);
                EventOutcome::Done
            }
        }
    }
}

/// Setters available before a block is registered.
pub struct BlockTypeBuilder {
    id: String,
    settings: BlockSettings,
    behavior: Option<Box<dyn BlockBehavior>>,
}

impl BlockTypeBuilder {
    pub fn hardness(mut self, hardness: f32) -> Self {
        self.settings.hardness = hardness;
        self
    }

    pub fn resistance(mut self, resistance: f32) -> Self {
        self.settings.resistance = resistance;
        self
    }

    pub fn unbreakable(self) -> Self {
        self.hardness(-1.0)
    }

    pub fn requires_tool(mut self, requires_tool: bool) -> Self {
        self.settings.requires_tool = requires_tool;
        self
    }

    pub fn luminance(mut self, luminance: u8) -> Self {
        self.settings.luminance = luminance.min(BlockSettings::MAX_LUMINANCE);
        self
    }

    pub fn slipperiness(mut self, slipperiness: f64) -> Self {
        self.settings.slipperiness = slipperiness;
        self
    }

    pub fn velocity_multiplier(mut self, multiplier: f64) -> Self {
        self.settings.velocity_multiplier = multiplier;
        self
    }

    pub fn jump_velocity_multiplier(mut self, multiplier: f64) -> Self {
        self.settings.jump_velocity_multiplier = multiplier;
        self
    }

    pub fn ticks_randomly(mut self, ticks_randomly: bool) -> Self {
        self.settings.ticks_randomly = ticks_randomly;
        self
    }

    pub fn collidable(mut self, collidable: bool) -> Self {
        self.settings.collidable = collidable;
        self
    }

    pub fn replaceable(mut self, replaceable: bool) -> Self {
        self.settings.replaceable = replaceable;
        self
    }

    pub fn burnable(mut self, burnable: bool) -> Self {
        self.settings.burnable = burnable;
        self
    }

    pub fn model(mut self, model: BlockModel) -> Self {
        self.settings.model = Some(model);
        self
    }

    /// Replace all settings at once, e.g. from a script definition.
    pub fn settings(mut self, settings: BlockSettings) -> Self {
        self.settings = settings.clamped();
        self
    }

    pub fn behavior(mut self, behavior: impl BlockBehavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    pub fn build(self) -> Arc<BlockType> {
        Arc::new(BlockType {
            id: self.id,
            settings: self.settings,
            behavior: self
                .behavior
                .unwrap_or_else(|| Box::new(crate::DefaultBehavior)),
            slot: HandleSlot::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Tracker {
        ticks: Arc<AtomicU32>,
    }

    impl BlockBehavior for Tracker {
        fn on_break(&self, _world: WorldId, pos: BlockPos, _player: EntityId) -> bool {
            pos.y > 0
        }

        fn on_random_tick(&self, _world: WorldId, _pos: BlockPos) {
            self.ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn delivers_to_overridden_handlers() {
        let ticks = Arc::new(AtomicU32::new(0));
        let block = BlockType::builder("mymod:tracker")
            .behavior(Tracker {
                ticks: Arc::clone(&ticks),
            })
            .build();

        let below = BlockEvent::Break {
            world: 1,
            pos: BlockPos::new(0, -5, 0),
            player: 7,
        };
        assert_eq!(block.deliver(&below), EventOutcome::Allow(false));

        let tick = BlockEvent::RandomTick {
            world: 1,
            pos: BlockPos::default(),
        };
        assert_eq!(block.deliver(&tick), EventOutcome::Done);
        assert_eq!(block.deliver(&tick), EventOutcome::Done);
        assert_eq!(ticks.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn default_behavior_passes_use() {
        let block = BlockType::builder("mymod:plain").build();
        let event = BlockEvent::Use {
            world: 1,
            pos: BlockPos::default(),
            player: 7,
            hand: Hand::Main,
        };
        assert_eq!(block.deliver(&event), EventOutcome::Action(ActionResult::Pass));
        assert_eq!(event.default_outcome(), EventOutcome::Action(ActionResult::Pass));
    }

    #[test]
    fn builder_clamps_luminance() {
        let block = BlockType::builder("mymod:glow").luminance(99).build();
        assert_eq!(block.settings().luminance, 15);
    }
}
