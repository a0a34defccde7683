//! Script-defined entity kinds
//!
//! Besides the common lifecycle events, an entity receives events specific
//! to its [`EntityBase`]: animals breed, projectiles hit things. Those events
//! delivered to an entity of another base resolve to their default.

use crate::{
    BlockPos, Direction, EntityBase, EntityId, EntityModel, EntitySettings, EventOutcome,
    GoalConfig, Handle, HandleSlot, Kind, KindEvent, KindSettings, Registrable, SpawnGroup,
    WorldId,
};
use std::fmt;
use std::sync::Arc;

pub trait EntityBehavior: Send + Sync {
    fn on_spawn(&self, _world: WorldId, _entity: EntityId) {}

    fn on_tick(&self, _world: WorldId, _entity: EntityId) {}

    fn on_death(&self, _world: WorldId, _entity: EntityId, _source: &str) {}

    /// Return `false` to cancel the damage.
    fn on_damage(&self, _world: WorldId, _entity: EntityId, _source: &str, _amount: f32) -> bool {
        true
    }

    fn on_attack(&self, _world: WorldId, _entity: EntityId, _target: EntityId) {}

    fn on_target_acquired(&self, _world: WorldId, _entity: EntityId, _target: EntityId) {}

    fn on_breed(&self, _world: WorldId, _entity: EntityId, _partner: EntityId, _baby: EntityId) {}

    fn on_hit_entity(&self, _world: WorldId, _entity: EntityId, _target: EntityId) {}

    fn on_hit_block(&self, _world: WorldId, _entity: EntityId, _pos: BlockPos, _side: Direction) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum EntityEvent {
    Spawn {
        world: WorldId,
        entity: EntityId,
    },
    Tick {
        world: WorldId,
        entity: EntityId,
    },
    Death {
        world: WorldId,
        entity: EntityId,
        source: String,
    },
    Damage {
        world: WorldId,
        entity: EntityId,
        source: String,
        amount: f32,
    },
    Attack {
        world: WorldId,
        entity: EntityId,
        target: EntityId,
    },
    TargetAcquired {
        world: WorldId,
        entity: EntityId,
        target: EntityId,
    },
    Breed {
        world: WorldId,
        entity: EntityId,
        partner: EntityId,
        baby: EntityId,
    },
    HitEntity {
        world: WorldId,
        entity: EntityId,
        target: EntityId,
    },
    HitBlock {
        world: WorldId,
        entity: EntityId,
        pos: BlockPos,
        side: Direction,
    },
}

impl EntityEvent {
    /// Whether an entity built on `base` can receive this event at all.
    pub fn applies_to(&self, base: &EntityBase) -> bool {
        match self {
            EntityEvent::Breed { .. } => base.is_animal(),
            EntityEvent::HitEntity { .. } | EntityEvent::HitBlock { .. } => base.is_projectile(),
            _ => true,
        }
    }
}

impl KindEvent for EntityEvent {
    fn name(&self) -> &'static str {
        match self {
            EntityEvent::Spawn { .. } => "spawn",
            EntityEvent::Tick { .. } => "tick",
            EntityEvent::Death { .. } => "death",
            EntityEvent::Damage { .. } => "damage",
            EntityEvent::Attack { .. } => "attack",
            EntityEvent::TargetAcquired { .. } => "target_acquired",
            EntityEvent::Breed { .. } => "breed",
            EntityEvent::HitEntity { .. } => "hit_entity",
            EntityEvent::HitBlock { .. } => "hit_block",
        }
    }

    fn default_outcome(&self) -> EventOutcome {
        match self {
            EntityEvent::Damage { .. } => EventOutcome::Allow(true),
            _ => EventOutcome::Done,
        }
    }
}

/// An entity kind declared from script code.
pub struct EntityType {
    id: String,
    settings: EntitySettings,
    behavior: Box<dyn EntityBehavior>,
    slot: HandleSlot,
}

impl EntityType {
    pub fn builder(id: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder {
            id: id.into(),
            settings: EntitySettings::default(),
            behavior: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn settings(&self) -> &EntitySettings {
        &self.settings
    }

    pub fn handle(&self) -> Option<Handle> {
        self.slot.get()
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("id", &self.id)
            .field("handle", &self.slot.get())
            .field("base", &self.settings.base)
            .finish_non_exhaustive()
    }
}

impl Registrable for EntityType {
    const KIND: Kind = Kind::Entity;
    type Event = EntityEvent;

    fn identifier(&self) -> &str {
        &self.id
    }

    fn handle_slot(&self) -> &HandleSlot {
        &self.slot
    }

    fn kind_settings(&self) -> KindSettings {
        KindSettings::Entity(self.settings.clone())
    }

    fn deliver(&self, event: &EntityEvent) -> EventOutcome {
        if !event.applies_to(&self.settings.base) {
            return event.default_outcome();
        }

        let b = self.behavior.as_ref();
        match *event {
            EntityEvent::Spawn { world, entity } => b.on_spawn(world, entity),
            EntityEvent::Tick { world, entity } => b.on_tick(world, entity),
            EntityEvent::Death {
                world,
                entity,
                ref source,
            } => b.on_death(world, entity, source),
            EntityEvent::Damage {
                world,
                entity,
                ref source,
                amount,
            } => return EventOutcome::Allow(b.on_damage(world, entity, source, amount)),
            EntityEvent::Attack {
                world,
                entity,
                target,
            } => b.on_attack(world, entity, target),
            EntityEvent::TargetAcquired {
                world,
                entity,
                target,
            } => b.on_target_acquired(world, entity, target),
            EntityEvent::Breed {
                world,
                entity,
                partner,
                baby,
            } => b.on_breed(world, entity, partner, baby),
            EntityEvent::HitEntity {
                world,
                entity,
                target,
            } => b.on_hit_entity(world, entity, target),
            EntityEvent::HitBlock {
                world,
                entity,
                pos,
                side,
            } => b.on_hit_block(world, entity, pos, side),
        }
        EventOutcome::Done
    }
}

pub struct EntityTypeBuilder {
    id: String,
    settings: EntitySettings,
    behavior: Option<Box<dyn EntityBehavior>>,
}

impl EntityTypeBuilder {
    pub fn dimensions(mut self, width: f32, height: f32) -> Self {
        self.settings.width = width;
        self.settings.height = height;
        self
    }

    pub fn max_health(mut self, health: f64) -> Self {
        self.settings.max_health = health;
        self
    }

    pub fn movement_speed(mut self, speed: f64) -> Self {
        self.settings.movement_speed = speed;
        self
    }

    pub fn attack_damage(mut self, damage: f64) -> Self {
        self.settings.attack_damage = damage;
        self
    }

    pub fn spawn_group(mut self, group: SpawnGroup) -> Self {
        self.settings.spawn_group = group;
        self
    }

    pub fn base(mut self, base: EntityBase) -> Self {
        self.settings.base = base;
        self
    }

    pub fn model(mut self, model: EntityModel) -> Self {
        self.settings.model = Some(model);
        self
    }

    pub fn goal(mut self, goal: GoalConfig) -> Self {
        self.settings.goals.push(goal);
        self
    }

    pub fn target_goal(mut self, goal: GoalConfig) -> Self {
        self.settings.target_goals.push(goal);
        self
    }

    pub fn settings(mut self, settings: EntitySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn behavior(mut self, behavior: impl EntityBehavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    pub fn build(self) -> Arc<EntityType> {
        Arc::new(EntityType {
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
    use std::sync::atomic::{AtomicI32, Ordering};

    #[derive(Default)]
    struct Recorder {
        last_baby: Arc<AtomicI32>,
    }

    impl EntityBehavior for Recorder {
        fn on_damage(&self, _world: WorldId, _entity: EntityId, source: &str, _amount: f32) -> bool {
            source != "fall"
        }

        fn on_breed(&self, _world: WorldId, _entity: EntityId, _partner: EntityId, baby: EntityId) {
            self.last_baby.store(baby, Ordering::Relaxed);
        }
    }

    fn breed() -> EntityEvent {
        EntityEvent::Breed {
            world: 0,
            entity: 1,
            partner: 2,
            baby: 3,
        }
    }

    #[test]
    fn breed_reaches_animals_only() {
        let last_baby = Arc::new(AtomicI32::new(0));
        let cow = EntityType::builder("mymod:ruby_cow")
            .base(EntityBase::Animal {
                breeding_item: Some("mymod:ruby".into()),
            })
            .behavior(Recorder {
                last_baby: Arc::clone(&last_baby),
            })
            .build();
        assert_eq!(cow.deliver(&breed()), EventOutcome::Done);
        assert_eq!(last_baby.load(Ordering::Relaxed), 3);

        let other = Arc::new(AtomicI32::new(0));
        let golem = EntityType::builder("mymod:golem")
            .base(EntityBase::Monster)
            .behavior(Recorder {
                last_baby: Arc::clone(&other),
            })
            .build();
        assert_eq!(golem.deliver(&breed()), EventOutcome::Done);
        assert_eq!(other.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn damage_handler_can_cancel() {
        let mob = EntityType::builder("mymod:sprite")
            .behavior(Recorder::default())
            .build();
        let fall = EntityEvent::Damage {
            world: 0,
            entity: 1,
            source: "fall".into(),
            amount: 4.0,
        };
        assert_eq!(mob.deliver(&fall), EventOutcome::Allow(false));
        assert_eq!(fall.default_outcome(), EventOutcome::Allow(true));
    }

    #[test]
    fn projectile_events_gate_on_base() {
        let hit = EntityEvent::HitEntity {
            world: 0,
            entity: 1,
            target: 2,
        };
        assert!(!hit.applies_to(&EntityBase::PathfinderMob));
        assert!(hit.applies_to(&EntityBase::Projectile));
        assert!(EntityEvent::Tick { world: 0, entity: 1 }.applies_to(&EntityBase::Projectile));
    }

    #[test]
    fn builder_collects_goals() {
        let zombie = EntityType::builder("mymod:ruby_zombie")
            .base(EntityBase::Monster)
            .spawn_group(SpawnGroup::Monster)
            .goal(GoalConfig::new("melee_attack", 2).with_param("speed", 1.0))
            .target_goal(GoalConfig::new("nearest_attackable_target", 1).with_param("target", "player"))
            .build();
        assert_eq!(zombie.settings().goals.len(), 1);
        assert_eq!(zombie.settings().target_goals[0].priority, 1);
        assert_eq!(zombie.settings().spawn_group.ordinal(), 0);
    }
}
