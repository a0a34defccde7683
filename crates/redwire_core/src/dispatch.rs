//! Event dispatch: host -> script callbacks keyed by raw handle
//!
//! Dispatch reads the registry's handle table directly. It never waits on
//! registration or the drain step, so a handle resolves as soon as
//! `register` returns, whether or not the host has created its type yet.
//! Handles the script side does not know resolve to the event's default.

use crate::host::panic_message;
use crate::{
    BlockEvent, EntityEvent, EventOutcome, ItemEvent, KindEvent, Registrable, Registries, Registry,
};
use std::panic::{self, AssertUnwindSafe};

impl<T: Registrable> Registry<T> {
    /// Deliver `event` to the object behind `raw`.
    ///
    /// Never fails and never unwinds: unknown handles and panicking
    /// handlers both produce `event.default_outcome()`.
    pub fn dispatch(&self, raw: u64, event: &T::Event) -> EventOutcome {
        // The Arc is cloned out so no map shard stays locked during the callback.
        let Some(object) = self.lookup_raw(raw) else {
            tracing::trace!(kind = %T::KIND, raw, event = event.name(), "dispatch to unknown handle");
            return event.default_outcome();
        };

        match panic::catch_unwind(AssertUnwindSafe(|| object.deliver(event))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                tracing::error!(
                    kind = %T::KIND,
                    id = object.identifier(),
                    event = event.name(),
                    panic = panic_message(&*payload),
                    "event handler panicked; returning default"
                );
                event.default_outcome()
            }
        }
    }
}

/// Entry points the host's callback glue calls with raw handles.
#[derive(Clone, Copy)]
pub struct EventDispatcher<'r> {
    registries: &'r Registries,
}

impl<'r> EventDispatcher<'r> {
    pub fn new(registries: &'r Registries) -> Self {
        Self { registries }
    }

    pub fn dispatch_block(&self, raw: u64, event: &BlockEvent) -> EventOutcome {
        self.registries.blocks().dispatch(raw, event)
    }

    pub fn dispatch_item(&self, raw: u64, event: &ItemEvent) -> EventOutcome {
        self.registries.items().dispatch(raw, event)
    }

    pub fn dispatch_entity(&self, raw: u64, event: &EntityEvent) -> EventOutcome {
        self.registries.entities().dispatch(raw, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::tests::TestRegistrar;
    use crate::{
        drain_and_apply, ActionResult, BlockBehavior, BlockPos, BlockType, EntityId, EntityType,
        Hand, ItemBehavior, ItemType, Kind, WorldId,
    };
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;

    struct Bedrockish;

    impl BlockBehavior for Bedrockish {
        fn on_break(&self, _world: WorldId, _pos: BlockPos, _player: EntityId) -> bool {
            false
        }

        fn on_use(&self, _: WorldId, _: BlockPos, _: EntityId, _: Hand) -> ActionResult {
            ActionResult::Consume
        }
    }

    struct Faulty;

    impl ItemBehavior for Faulty {
        fn on_use(&self, _world: WorldId, _player: EntityId, _hand: Hand) -> ActionResult {
            panic!("script error in onUse");
        }
    }

    fn break_at(y: i32) -> BlockEvent {
        BlockEvent::Break {
            world: 1,
            pos: BlockPos::new(0, y, 0),
            player: 9,
        }
    }

    #[test]
    fn dispatch_between_register_and_drain_reaches_the_object() {
        let registries = Registries::new();
        let dispatcher = EventDispatcher::new(&registries);
        let handle = registries
            .blocks()
            .register(BlockType::builder("mymod:bedrockish").behavior(Bedrockish).build())
            .unwrap();

        // Phase one only: the host has not created anything yet.
        assert!(registries.blocks().binding(handle).is_none());
        assert_eq!(
            dispatcher.dispatch_block(handle.raw(), &break_at(5)),
            EventOutcome::Allow(false)
        );

        drain_and_apply(&registries, &mut TestRegistrar::default()).unwrap();
        assert!(registries.blocks().host_id(handle).is_ok());
        assert_eq!(
            dispatcher.dispatch_block(handle.raw(), &break_at(5)),
            EventOutcome::Allow(false)
        );
    }

    #[test]
    fn unknown_handles_get_documented_defaults() {
        let registries = Registries::new();
        let dispatcher = EventDispatcher::new(&registries);

        assert_eq!(
            dispatcher.dispatch_block(77, &break_at(0)),
            EventOutcome::Allow(true)
        );
        assert_eq!(
            dispatcher
                .dispatch_item(
                    0,
                    &ItemEvent::Use {
                        world: 1,
                        player: 9,
                        hand: Hand::Main
                    }
                )
                .to_wire(Kind::Item),
            4
        );
        assert_eq!(
            dispatcher.dispatch_entity(
                3,
                &EntityEvent::Damage {
                    world: 1,
                    entity: 2,
                    source: "arrow".into(),
                    amount: 3.0
                }
            ),
            EventOutcome::Allow(true)
        );
        assert_eq!(
            dispatcher.dispatch_entity(3, &EntityEvent::Tick { world: 1, entity: 2 }),
            EventOutcome::Done
        );
    }

    #[test]
    fn panicking_handler_returns_default() {
        let registries = Registries::new();
        let handle = registries
            .items()
            .register(ItemType::builder("mymod:faulty").behavior(Faulty).build())
            .unwrap();
        let event = ItemEvent::Use {
            world: 1,
            player: 9,
            hand: Hand::Off,
        };
        assert_eq!(
            registries.items().dispatch(handle.raw(), &event),
            EventOutcome::Action(ActionResult::Pass)
        );
        // Still resolvable afterwards.
        assert!(registries.items().lookup(handle).is_some());
    }

    struct Ticker(Arc<AtomicU64>);

    impl crate::EntityBehavior for Ticker {
        fn on_tick(&self, _world: WorldId, _entity: EntityId) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn concurrent_ticks_and_registrations() {
        let registries = Registries::new();
        let ticks = Arc::new(AtomicU64::new(0));
        let handle = registries
            .entities()
            .register(
                EntityType::builder("mymod:ticker")
                    .behavior(Ticker(Arc::clone(&ticks)))
                    .build(),
            )
            .unwrap();

        thread::scope(|s| {
            for _ in 0..4 {
                let registries = &registries;
                s.spawn(move || {
                    let dispatcher = EventDispatcher::new(registries);
                    for _ in 0..1_000 {
                        dispatcher.dispatch_entity(handle.raw(), &EntityEvent::Tick { world: 1, entity: 5 });
                    }
                });
            }
            s.spawn(|| {
                for i in 0..100 {
                    registries
                        .entities()
                        .register(EntityType::builder(format!("mymod:mob_{i}")).build())
                        .unwrap();
                }
            });
        });

        assert_eq!(ticks.load(Ordering::Relaxed), 4_000);
        assert_eq!(registries.entities().len(), 101);
    }
}
