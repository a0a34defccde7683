//! Script event handlers
//!
//! A definition may carry handler functions (`onBreak`, `onUse`, ...). The
//! functions never leave the script thread: the kind's behavior is a
//! [`ScriptBehavior`] that posts each event over a [`HandlerChannel`] and
//! waits for the answer. A missing handler, a handler that throws and a
//! call that times out all produce the event's default outcome.
//!
//! Handlers receive one event object and may return:
//! - a boolean for permission checks (`onBreak`, `onDamage`, `onAttackEntity`)
//! - an action name (`"success"`, `"consume"`, `"pass"`, ...) for interactions

use redwire_core::{
    ActionResult, BlockBehavior, BlockPos, Direction, EntityBehavior, EntityId, Hand,
    ItemBehavior, Kind, WorldId,
};
use serde_json::{json, Value};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

pub const BLOCK_HANDLERS: &[&str] = &[
    "onBreak",
    "onUse",
    "onSteppedOn",
    "onFallenUpon",
    "onRandomTick",
    "onPlaced",
    "onRemoved",
    "onNeighborChanged",
    "onEntityInside",
];

pub const ITEM_HANDLERS: &[&str] = &["onUse", "onUseOnBlock", "onUseOnEntity", "onAttackEntity"];

pub const ENTITY_HANDLERS: &[&str] = &[
    "onSpawn",
    "onTick",
    "onDeath",
    "onDamage",
    "onAttack",
    "onTargetAcquired",
    "onBreed",
    "onHitEntity",
    "onHitBlock",
];

/// Handler names a definition of `kind` may carry.
pub fn handler_names(kind: Kind) -> &'static [&'static str] {
    match kind {
        Kind::Block => BLOCK_HANDLERS,
        Kind::Item => ITEM_HANDLERS,
        Kind::Entity => ENTITY_HANDLERS,
    }
}

/// What a handler returned, reduced to what the bridge can use.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandlerReply {
    Bool(bool),
    Action(ActionResult),
    Nothing,
}

/// One event waiting to be run on the script thread.
pub(crate) struct HandlerCall {
    pub(crate) kind: Kind,
    pub(crate) id: Arc<str>,
    pub(crate) handler: &'static str,
    pub(crate) event: Value,
    pub(crate) reply: mpsc::SyncSender<HandlerReply>,
}

/// Sending half of the script thread's handler queue.
#[derive(Clone, Debug)]
pub struct HandlerChannel {
    calls: mpsc::Sender<HandlerCall>,
    script_thread: ThreadId,
    timeout: Duration,
}

impl HandlerChannel {
    /// Must be created on the script thread.
    pub(crate) fn new(calls: mpsc::Sender<HandlerCall>, timeout: Duration) -> Self {
        Self {
            calls,
            script_thread: thread::current().id(),
            timeout,
        }
    }

    fn call(&self, kind: Kind, id: &Arc<str>, handler: &'static str, event: Value) -> HandlerReply {
        // The script thread would wait on itself.
        if thread::current().id() == self.script_thread {
            tracing::warn!(%kind, %id, handler, "handler dispatched from the script thread");
            return HandlerReply::Nothing;
        }

        let (reply, answer) = mpsc::sync_channel(1);
        let call = HandlerCall {
            kind,
            id: Arc::clone(id),
            handler,
            event,
            reply,
        };
        if self.calls.send(call).is_err() {
            tracing::debug!(%kind, %id, handler, "script runtime is gone");
            return HandlerReply::Nothing;
        }

        match answer.recv_timeout(self.timeout) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    %kind,
                    %id,
                    handler,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "script handler timed out"
                );
                HandlerReply::Nothing
            }
            Err(RecvTimeoutError::Disconnected) => HandlerReply::Nothing,
        }
    }
}

/// Behavior of a script-declared kind.
#[derive(Clone, Debug)]
pub struct ScriptBehavior {
    kind: Kind,
    id: Arc<str>,
    handlers: Arc<[&'static str]>,
    channel: HandlerChannel,
}

impl ScriptBehavior {
    pub(crate) fn new(
        kind: Kind,
        id: &str,
        handlers: Vec<&'static str>,
        channel: HandlerChannel,
    ) -> Self {
        Self {
            kind,
            id: Arc::from(id),
            handlers: handlers.into(),
            channel,
        }
    }

    fn call(&self, handler: &'static str, event: Value) -> HandlerReply {
        if !self.handlers.contains(&handler) {
            return HandlerReply::Nothing;
        }
        self.channel.call(self.kind, &self.id, handler, event)
    }

    fn allow(&self, handler: &'static str, event: Value) -> bool {
        match self.call(handler, event) {
            HandlerReply::Bool(allow) => allow,
            _ => true,
        }
    }

    fn action(&self, handler: &'static str, event: Value) -> ActionResult {
        match self.call(handler, event) {
            HandlerReply::Action(result) => result,
            _ => ActionResult::Pass,
        }
    }

    fn notify(&self, handler: &'static str, event: Value) {
        self.call(handler, event);
    }
}

fn pos(pos: BlockPos) -> Value {
    json!({ "x": pos.x, "y": pos.y, "z": pos.z })
}

impl BlockBehavior for ScriptBehavior {
    fn on_break(&self, world: WorldId, at: BlockPos, player: EntityId) -> bool {
        self.allow("onBreak", json!({ "world": world, "pos": pos(at), "player": player }))
    }

    fn on_use(&self, world: WorldId, at: BlockPos, player: EntityId, used: Hand) -> ActionResult {
        self.action(
            "onUse",
            json!({ "world": world, "pos": pos(at), "player": player, "hand": used.as_str() }),
        )
    }

    fn on_stepped_on(&self, world: WorldId, at: BlockPos, entity: EntityId) {
        self.notify("onSteppedOn", json!({ "world": world, "pos": pos(at), "entity": entity }));
    }

    fn on_fallen_upon(&self, world: WorldId, at: BlockPos, entity: EntityId, distance: f32) {
        self.notify(
            "onFallenUpon",
            json!({ "world": world, "pos": pos(at), "entity": entity, "distance": distance }),
        );
    }

    fn on_random_tick(&self, world: WorldId, at: BlockPos) {
        self.notify("onRandomTick", json!({ "world": world, "pos": pos(at) }));
    }

    fn on_placed(&self, world: WorldId, at: BlockPos, player: EntityId) {
        self.notify("onPlaced", json!({ "world": world, "pos": pos(at), "player": player }));
    }

    fn on_removed(&self, world: WorldId, at: BlockPos) {
        self.notify("onRemoved", json!({ "world": world, "pos": pos(at) }));
    }

    fn on_neighbor_changed(&self, world: WorldId, at: BlockPos, neighbor: BlockPos) {
        self.notify(
            "onNeighborChanged",
            json!({ "world": world, "pos": pos(at), "neighbor": pos(neighbor) }),
        );
    }

    fn on_entity_inside(&self, world: WorldId, at: BlockPos, entity: EntityId) {
        self.notify("onEntityInside", json!({ "world": world, "pos": pos(at), "entity": entity }));
    }
}

impl ItemBehavior for ScriptBehavior {
    fn on_use(&self, world: WorldId, player: EntityId, used: Hand) -> ActionResult {
        self.action("onUse", json!({ "world": world, "player": player, "hand": used.as_str() }))
    }

    fn on_use_on_block(&self, world: WorldId, at: BlockPos, player: EntityId, used: Hand) -> ActionResult {
        self.action(
            "onUseOnBlock",
            json!({ "world": world, "pos": pos(at), "player": player, "hand": used.as_str() }),
        )
    }

    fn on_use_on_entity(
        &self,
        world: WorldId,
        entity: EntityId,
        player: EntityId,
        used: Hand,
    ) -> ActionResult {
        self.action(
            "onUseOnEntity",
            json!({ "world": world, "entity": entity, "player": player, "hand": used.as_str() }),
        )
    }

    fn on_attack_entity(&self, world: WorldId, attacker: EntityId, target: EntityId) -> bool {
        self.allow(
            "onAttackEntity",
            json!({ "world": world, "attacker": attacker, "target": target }),
        )
    }
}

impl EntityBehavior for ScriptBehavior {
    fn on_spawn(&self, world: WorldId, entity: EntityId) {
        self.notify("onSpawn", json!({ "world": world, "entity": entity }));
    }

    fn on_tick(&self, world: WorldId, entity: EntityId) {
        self.notify("onTick", json!({ "world": world, "entity": entity }));
    }

    fn on_death(&self, world: WorldId, entity: EntityId, source: &str) {
        self.notify("onDeath", json!({ "world": world, "entity": entity, "source": source }));
    }

    fn on_damage(&self, world: WorldId, entity: EntityId, source: &str, amount: f32) -> bool {
        self.allow(
            "onDamage",
            json!({ "world": world, "entity": entity, "source": source, "amount": amount }),
        )
    }

    fn on_attack(&self, world: WorldId, entity: EntityId, target: EntityId) {
        self.notify("onAttack", json!({ "world": world, "entity": entity, "target": target }));
    }

    fn on_target_acquired(&self, world: WorldId, entity: EntityId, target: EntityId) {
        self.notify(
            "onTargetAcquired",
            json!({ "world": world, "entity": entity, "target": target }),
        );
    }

    fn on_breed(&self, world: WorldId, entity: EntityId, partner: EntityId, baby: EntityId) {
        self.notify(
            "onBreed",
            json!({ "world": world, "entity": entity, "partner": partner, "baby": baby }),
        );
    }

    fn on_hit_entity(&self, world: WorldId, entity: EntityId, target: EntityId) {
        self.notify("onHitEntity", json!({ "world": world, "entity": entity, "target": target }));
    }

    fn on_hit_block(&self, world: WorldId, entity: EntityId, at: BlockPos, side: Direction) {
        self.notify(
            "onHitBlock",
            json!({ "world": world, "entity": entity, "pos": pos(at), "side": side.as_str() }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn behavior(handlers: Vec<&'static str>) -> (ScriptBehavior, mpsc::Receiver<HandlerCall>) {
        let (calls, pending) = mpsc::channel();
        let channel = HandlerChannel::new(calls, Duration::from_millis(50));
        (ScriptBehavior::new(Kind::Block, "mymod:bedrock", handlers, channel), pending)
    }

    #[test]
    fn events_without_handlers_never_leave_the_thread() {
        let (behavior, pending) = behavior(vec![]);
        assert!(behavior.on_break(0, BlockPos::new(1, 2, 3), 1));
        assert_eq!(
            BlockBehavior::on_use(&behavior, 0, BlockPos::default(), 1, Hand::Main),
            ActionResult::Pass
        );
        assert!(pending.try_recv().is_err());
    }

    #[test]
    fn replies_come_back_to_the_dispatching_thread() {
        let (behavior, pending) = behavior(vec!["onBreak"]);
        let host = thread::spawn(move || behavior.on_break(0, BlockPos::new(1, 2, 3), 7));

        let call = pending.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(call.handler, "onBreak");
        assert_eq!(&*call.id, "mymod:bedrock");
        assert_eq!(call.event["pos"]["y"], 2);
        assert_eq!(call.event["player"], 7);
        call.reply.send(HandlerReply::Bool(false)).unwrap();

        assert!(!host.join().unwrap());
    }

    #[test]
    fn unanswered_calls_fall_back_to_the_default() {
        let (behavior, pending) = behavior(vec!["onBreak"]);
        let host = thread::spawn(move || behavior.on_break(0, BlockPos::default(), 1));
        assert!(host.join().unwrap());
        drop(pending);
    }

    #[test]
    fn script_thread_dispatch_is_refused() {
        let (behavior, pending) = behavior(vec!["onBreak"]);
        assert!(behavior.on_break(0, BlockPos::default(), 1));
        assert!(pending.try_recv().is_err());
    }

    #[test]
    fn handler_names_per_kind() {
        assert!(handler_names(Kind::Block).contains(&"onBreak"));
        assert!(handler_names(Kind::Item).contains(&"onUseOnEntity"));
        assert!(!handler_names(Kind::Entity).contains(&"onBreak"));
    }
}
