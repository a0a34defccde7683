//! In-process stand-in for the host simulation
//!
//! [`SimulatedRegistrar`] plays the host's type registries at the
//! registration point. [`SimulatedWorld`] answers call-bridge lookups for a
//! tiny `redwire/sim/World` class.

use redwire_core::{
    BlockSettings, EntitySettings, Handle, HostId, HostRegistrar, HostRejection, Identifier,
    ItemSettings,
};
use redwire_script::{HostError, HostValue, MemberId, MemberKey, MemberKind, MemberResolver, ObjectRef, ObjectTable};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

pub const WORLD_CLASS: &str = "redwire/sim/World";

/// Host registries. Rejects ids in the `minecraft` namespace and anything
/// created twice, as a real host would.
#[derive(Debug, Default)]
pub struct SimulatedRegistrar {
    next_raw_id: i64,
    created: HashSet<String>,
}

impl SimulatedRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    fn create(&mut self, id: &Identifier) -> Result<HostId, HostRejection> {
        if id.namespace() == "minecraft" {
            return Err(format!("namespace '{}' is reserved by the host", id.namespace()).into());
        }
        if !self.created.insert(id.to_string()) {
            return Err(format!("'{id}' already exists in the host registry").into());
        }
        self.next_raw_id += 1;
        Ok(HostId(self.next_raw_id))
    }
}

impl HostRegistrar for SimulatedRegistrar {
    fn register_block(
        &mut self,
        handle: Handle,
        id: &Identifier,
        settings: &BlockSettings,
    ) -> Result<HostId, HostRejection> {
        if settings.hardness < 0.0 && settings.hardness != -1.0 {
            return Err(format!("hardness {} is neither positive nor -1", settings.hardness).into());
        }
        tracing::debug!(%handle, %id, hardness = settings.hardness, "host: creating block");
        self.create(id)
    }

    fn register_item(
        &mut self,
        handle: Handle,
        id: &Identifier,
        settings: &ItemSettings,
    ) -> Result<HostId, HostRejection> {
        if settings.max_stack_size == 0 || settings.max_stack_size > 99 {
            return Err(format!("max stack size {} out of range", settings.max_stack_size).into());
        }
        tracing::debug!(%handle, %id, "host: creating item");
        self.create(id)
    }

    fn register_entity(
        &mut self,
        handle: Handle,
        id: &Identifier,
        settings: &EntitySettings,
    ) -> Result<HostId, HostRejection> {
        tracing::debug!(
            %handle,
            %id,
            base = settings.base.ordinal(),
            goals = %settings.goals_json(),
            "host: creating entity type"
        );
        self.create(id)
    }
}

#[derive(Debug)]
struct World {
    name: String,
    difficulty: i32,
}

const GET_TIME: MemberId = MemberId(1);
const NEW_WORLD: MemberId = MemberId(2);
const GET_NAME: MemberId = MemberId(3);
const DIFFICULTY: MemberId = MemberId(4);
const SPAWN_ALLOWED: MemberId = MemberId(5);
const MAX_HEIGHT: MemberId = MemberId(6);

/// `redwire/sim/World`:
/// - `World::getTime()J` ticks elapsed since start
/// - `World(Ljava/lang/String;)V`
/// - `getName()Ljava/lang/String;`
/// - `isSpawnAllowed(III)Z`
/// - field `difficulty I`, static field `World::MAX_HEIGHT I`
pub struct SimulatedWorld {
    started: Instant,
    worlds: ObjectTable<World>,
    lookups: AtomicI64,
}

impl SimulatedWorld {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            worlds: ObjectTable::new(),
            lookups: AtomicI64::new(0),
        }
    }

    pub fn lookups(&self) -> i64 {
        self.lookups.load(Ordering::Relaxed)
    }

    fn world<R>(&self, target: Option<ObjectRef>, f: impl FnOnce(&mut World) -> R) -> Result<R, HostError> {
        target
            .and_then(|object| self.worlds.with_mut(object, f))
            .ok_or_else(|| HostError::new("java/lang/NullPointerException", "no such world"))
    }
}

impl Default for SimulatedWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberResolver for SimulatedWorld {
    fn resolve(&self, key: &MemberKey) -> Option<MemberId> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if key.type_name != WORLD_CLASS {
            return None;
        }
        let id = match (key.kind, key.member.as_str(), key.descriptor.as_str()) {
            (MemberKind::StaticMethod, "getTime", "()J") => GET_TIME,
            (MemberKind::Constructor, "<init>", "(Ljava/lang/String;)V") => NEW_WORLD,
            (MemberKind::Method, "getName", "()Ljava/lang/String;") => GET_NAME,
            (MemberKind::Method, "isSpawnAllowed", "(III)Z") => SPAWN_ALLOWED,
            (MemberKind::Field, "difficulty", "I") => DIFFICULTY,
            (MemberKind::StaticField, "MAX_HEIGHT", "I") => MAX_HEIGHT,
            _ => return None,
        };
        Some(id)
    }

    fn invoke(
        &self,
        member: MemberId,
        target: Option<ObjectRef>,
        args: &[HostValue],
    ) -> Result<HostValue, HostError> {
        match (member, args) {
            (GET_TIME, []) => {
                // 20 ticks per second.
                let ticks = self.started.elapsed().as_millis() / 50;
                Ok(HostValue::Long(i64::try_from(ticks).unwrap_or(i64::MAX)))
            }
            (NEW_WORLD, [HostValue::Str(name)]) => {
                let world = World {
                    name: name.clone(),
                    difficulty: 2,
                };
                Ok(HostValue::Object(Some(self.worlds.store(world))))
            }
            (GET_NAME, []) => self.world(target, |w| HostValue::Str(w.name.clone())),
            (SPAWN_ALLOWED, [HostValue::Int(_), HostValue::Int(y), HostValue::Int(_)]) => {
                let y = *y;
                self.world(target, |w| HostValue::Boolean(w.difficulty > 0 && (0..320).contains(&y)))
            }
            _ => Err(HostError::new(
                "java/lang/IllegalArgumentException",
                "unexpected arguments",
            )),
        }
    }

    fn get_field(&self, member: MemberId, target: Option<ObjectRef>) -> Result<HostValue, HostError> {
        match member {
            DIFFICULTY => self.world(target, |w| HostValue::Int(w.difficulty)),
            MAX_HEIGHT => Ok(HostValue::Int(320)),
            _ => Err(HostError::new("java/lang/NoSuchFieldError", "unknown field")),
        }
    }

    fn set_field(
        &self,
        member: MemberId,
        target: Option<ObjectRef>,
        value: HostValue,
    ) -> Result<(), HostError> {
        match (member, value) {
            (DIFFICULTY, HostValue::Int(difficulty)) => self.world(target, |w| w.difficulty = difficulty),
            _ => Err(HostError::new("java/lang/IllegalAccessError", "field is read-only")),
        }
    }

    fn release(&self, object: ObjectRef) -> bool {
        self.worlds.release(object).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redwire_script::{CallBridge, ScriptValue};
    use std::sync::Arc;

    #[test]
    fn registrar_rejects_reserved_and_duplicate_ids() {
        let mut host = SimulatedRegistrar::new();
        let handle = Handle::from_raw(1).unwrap();
        let ruby = Identifier::parse("mymod:ruby").unwrap();

        assert_eq!(host.register_item(handle, &ruby, &ItemSettings::default()).unwrap(), HostId(1));
        assert!(host.register_item(handle, &ruby, &ItemSettings::default()).is_err());
        assert!(host
            .register_block(handle, &Identifier::parse("minecraft:stone").unwrap(), &BlockSettings::default())
            .is_err());
    }

    #[test]
    fn world_through_the_bridge() {
        let world = Arc::new(SimulatedWorld::new());
        let bridge = CallBridge::with_resolver(world.clone());

        let overworld = bridge
            .construct(WORLD_CLASS, "(Ljava/lang/String;)V", &["overworld".into()])
            .unwrap();
        assert_eq!(
            bridge.invoke_instance(Some(overworld), WORLD_CLASS, "getName", "()Ljava/lang/String;", &[]),
            Ok(ScriptValue::from("overworld"))
        );

        bridge
            .set_field(Some(overworld), WORLD_CLASS, "difficulty", "I", &ScriptValue::Int(0))
            .unwrap();
        let spawn = bridge.invoke_instance(
            Some(overworld),
            WORLD_CLASS,
            "isSpawnAllowed",
            "(III)Z",
            &[ScriptValue::Int(0), ScriptValue::Int(64), ScriptValue::Int(0)],
        );
        assert_eq!(spawn, Ok(ScriptValue::Bool(false)));
        assert_eq!(
            bridge.get_static_field(WORLD_CLASS, "MAX_HEIGHT", "I"),
            Ok(ScriptValue::Int(320))
        );
        assert!(matches!(
            bridge.invoke_static(WORLD_CLASS, "getTime", "()J", &[]),
            Ok(ScriptValue::Long(_))
        ));
        assert_eq!(bridge.release(overworld), Ok(true));
    }
}
