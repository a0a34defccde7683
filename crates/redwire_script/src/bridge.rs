//! Generic call bridge
//!
//! Calls any host member by type name, member name and signature, without
//! per-member glue. A call runs in a fixed order:
//! 1. check the bridge is initialized
//! 2. parse the signature (cached)
//! 3. check arity and encode every argument
//! 4. resolve the member (cached; only a miss touches the write lock)
//! 5. invoke with no lock held
//! 6. decode the result against the declared return type

use crate::cache::ReadMostlyCache;
use crate::value::{decode_field, decode_result, encode_argument};
use crate::{
    CallError, HostValue, MemberId, MemberKey, MemberKind, MemberResolver, ObjectRef, ReturnDesc,
    ScriptValue, Signature, TypeDesc,
};
use once_cell::sync::Lazy;
use std::sync::{Arc, OnceLock};

static GLOBAL: Lazy<CallBridge> = Lazy::new(CallBridge::new);

/// Process-wide bridge. Initialize it once with the host's resolver.
pub fn global() -> &'static CallBridge {
    &GLOBAL
}

pub struct CallBridge {
    resolver: OnceLock<Arc<dyn MemberResolver>>,
    members: ReadMostlyCache<MemberKey, MemberId>,
    signatures: ReadMostlyCache<String, Arc<Signature>>,
    fields: ReadMostlyCache<String, Arc<TypeDesc>>,
}

impl CallBridge {
    /// An uninitialized bridge. Every call fails until [`initialize`](Self::initialize).
    pub fn new() -> Self {
        Self {
            resolver: OnceLock::new(),
            members: ReadMostlyCache::new(),
            signatures: ReadMostlyCache::new(),
            fields: ReadMostlyCache::new(),
        }
    }

    pub fn with_resolver(resolver: Arc<dyn MemberResolver>) -> Self {
        let bridge = Self::new();
        let _ = bridge.resolver.set(resolver);
        bridge
    }

    /// One-time setup. Fails with `AlreadyInitialized` on a second call.
    pub fn initialize(&self, resolver: Arc<dyn MemberResolver>) -> Result<(), CallError> {
        self.resolver
            .set(resolver)
            .map_err(|_| CallError::AlreadyInitialized)?;
        tracing::info!("call bridge initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.resolver.get().is_some()
    }

    pub fn invoke_static(
        &self,
        type_name: &str,
        member: &str,
        signature: &str,
        args: &[ScriptValue],
    ) -> Result<ScriptValue, CallError> {
        let key = MemberKey::new(MemberKind::StaticMethod, type_name, member, signature);
        self.call(key, None, args)
    }

    pub fn invoke_instance(
        &self,
        target: Option<ObjectRef>,
        type_name: &str,
        member: &str,
        signature: &str,
        args: &[ScriptValue],
    ) -> Result<ScriptValue, CallError> {
        let key = MemberKey::new(MemberKind::Method, type_name, member, signature);
        let Some(target) = target else {
            self.resolver()?;
            return Err(CallError::NullTarget { key });
        };
        self.call(key, Some(target), args)
    }

    /// Construct a host object. The signature must return `V`.
    pub fn construct(
        &self,
        type_name: &str,
        signature: &str,
        args: &[ScriptValue],
    ) -> Result<ObjectRef, CallError> {
        let key = MemberKey::new(MemberKind::Constructor, type_name, "<init>", signature);
        let resolver = self.resolver()?;
        let sig = self.parse_signature(signature)?;
        if sig.return_type() != &ReturnDesc::Void {
            return Err(CallError::malformed(signature, "constructors must return V"));
        }
        let host_args = encode_all(&sig, args)?;
        let id = self.resolve(resolver, &key)?;

        match resolver.invoke(id, None, &host_args) {
            Ok(HostValue::Object(Some(object))) => Ok(object),
            Ok(other) => Err(CallError::ResultMismatch {
                expected: format!("L{type_name};"),
                found: other.type_name(),
            }),
            Err(source) => Err(CallError::InvocationFailed { key, source }),
        }
    }

    pub fn get_field(
        &self,
        target: Option<ObjectRef>,
        type_name: &str,
        field: &str,
        descriptor: &str,
    ) -> Result<ScriptValue, CallError> {
        let key = MemberKey::new(MemberKind::Field, type_name, field, descriptor);
        let Some(target) = target else {
            self.resolver()?;
            return Err(CallError::NullTarget { key });
        };
        self.read_field(key, Some(target))
    }

    pub fn get_static_field(
        &self,
        type_name: &str,
        field: &str,
        descriptor: &str,
    ) -> Result<ScriptValue, CallError> {
        let key = MemberKey::new(MemberKind::StaticField, type_name, field, descriptor);
        self.read_field(key, None)
    }

    pub fn set_field(
        &self,
        target: Option<ObjectRef>,
        type_name: &str,
        field: &str,
        descriptor: &str,
        value: &ScriptValue,
    ) -> Result<(), CallError> {
        let key = MemberKey::new(MemberKind::Field, type_name, field, descriptor);
        let resolver = self.resolver()?;
        let Some(target) = target else {
            return Err(CallError::NullTarget { key });
        };
        let ty = self.parse_field_type(descriptor)?;
        let host_value = encode_argument(0, value, &ty)?;
        let id = self.resolve(resolver, &key)?;
        resolver
            .set_field(id, Some(target), host_value)
            .map_err(|source| CallError::InvocationFailed { key, source })
    }

    /// Drop the host's pin on `object`.
    pub fn release(&self, object: ObjectRef) -> Result<bool, CallError> {
        Ok(self.resolver()?.release(object))
    }

    /// Forget every resolved member and parsed signature.
    pub fn clear_cache(&self) {
        self.members.clear();
        self.signatures.clear();
        self.fields.clear();
        tracing::debug!("call bridge caches cleared");
    }

    pub fn cached_members(&self) -> usize {
        self.members.len()
    }

    fn call(
        &self,
        key: MemberKey,
        target: Option<ObjectRef>,
        args: &[ScriptValue],
    ) -> Result<ScriptValue, CallError> {
        let resolver = self.resolver()?;
        let sig = self.parse_signature(&key.descriptor)?;
        let host_args = encode_all(&sig, args)?;
        let id = self.resolve(resolver, &key)?;

        let returned = resolver
            .invoke(id, target, &host_args)
            .map_err(|source| CallError::InvocationFailed {
                key: key.clone(),
                source,
            })?;
        decode_result(returned, sig.return_type())
    }

    fn read_field(&self, key: MemberKey, target: Option<ObjectRef>) -> Result<ScriptValue, CallError> {
        let resolver = self.resolver()?;
        let ty = self.parse_field_type(&key.descriptor)?;
        let id = self.resolve(resolver, &key)?;
        let value = resolver
            .get_field(id, target)
            .map_err(|source| CallError::InvocationFailed {
                key: key.clone(),
                source,
            })?;
        decode_field(value, &ty)
    }

    fn resolver(&self) -> Result<&dyn MemberResolver, CallError> {
        self.resolver
            .get()
            .map(|resolver| resolver.as_ref())
            .ok_or(CallError::BridgeNotInitialized)
    }

    /// Parse `signature` through the bridge's cache.
    pub fn parse_signature(&self, signature: &str) -> Result<Arc<Signature>, CallError> {
        self.signatures
            .get_or_try_insert(signature, || Signature::parse(signature).map(Arc::new))
    }

    pub fn parse_field_type(&self, descriptor: &str) -> Result<Arc<TypeDesc>, CallError> {
        self.fields
            .get_or_try_insert(descriptor, || TypeDesc::parse(descriptor).map(Arc::new))
    }

    fn resolve(&self, resolver: &dyn MemberResolver, key: &MemberKey) -> Result<MemberId, CallError> {
        self.members.get_or_try_insert(key, || {
            tracing::debug!(member = %key, "resolving host member");
            resolver
                .resolve(key)
                .ok_or_else(|| CallError::MemberNotFound { key: key.clone() })
        })
    }
}

impl Default for CallBridge {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_all(sig: &Signature, args: &[ScriptValue]) -> Result<Vec<HostValue>, CallError> {
    if sig.arity() != args.len() {
        return Err(CallError::ArityMismatch {
            expected: sig.arity(),
            found: args.len(),
        });
    }
    sig.params()
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (ty, value))| encode_argument(index, value, ty))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{HostError, ObjectTable};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;

    /// A tiny host: `Math::isEven(I)Z`, `Text::concat(Ljava/lang/String;J)Ljava/lang/String;`,
    /// a `Counter` class with a constructor, `bump()V`, `value()I`, field `step I`
    /// and static field `Counter::LIMIT J`, plus `Boom::go()V` which always throws.
    #[derive(Default)]
    pub(crate) struct TinyHost {
        pub(crate) lookups: AtomicUsize,
        counters: ObjectTable<Mutex<(i32, i32)>>,
    }

    const IS_EVEN: MemberId = MemberId(1);
    const CONCAT: MemberId = MemberId(2);
    const NEW_COUNTER: MemberId = MemberId(3);
    const BUMP: MemberId = MemberId(4);
    const VALUE: MemberId = MemberId(5);
    const STEP: MemberId = MemberId(6);
    const LIMIT: MemberId = MemberId(7);
    const BOOM: MemberId = MemberId(8);

    impl MemberResolver for TinyHost {
        fn resolve(&self, key: &MemberKey) -> Option<MemberId> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            let id = match (key.kind, key.type_name.as_str(), key.member.as_str(), key.descriptor.as_str()) {
                (MemberKind::StaticMethod, "Math", "isEven", "(I)Z") => IS_EVEN,
                (MemberKind::StaticMethod, "Text", "concat", "(Ljava/lang/String;J)Ljava/lang/String;") => CONCAT,
                (MemberKind::Constructor, "Counter", "<init>", "(I)V") => NEW_COUNTER,
                (MemberKind::Method, "Counter", "bump", "()V") => BUMP,
                (MemberKind::Method, "Counter", "value", "()I") => VALUE,
                (MemberKind::Field, "Counter", "step", "I") => STEP,
                (MemberKind::StaticField, "Counter", "LIMIT", "J") => LIMIT,
                (MemberKind::StaticMethod, "Boom", "go", "()V") => BOOM,
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
            let counter = |f: &dyn Fn(&mut (i32, i32)) -> HostValue| {
                target
                    .and_then(|t| self.counters.with(t, |c| f(&mut c.lock().unwrap())))
                    .ok_or_else(|| HostError::new("NullPointerException", "no counter"))
            };
            match (member, args) {
                (IS_EVEN, [HostValue::Int(n)]) => Ok(HostValue::Boolean(n % 2 == 0)),
                (CONCAT, [HostValue::Str(s), HostValue::Long(n)]) => Ok(HostValue::Str(format!("{s}{n}"))),
                (NEW_COUNTER, [HostValue::Int(step)]) => Ok(HostValue::Object(Some(
                    self.counters.store(Mutex::new((0, *step))),
                ))),
                (BUMP, []) => counter(&|c| {
                    c.0 += c.1;
                    HostValue::Void
                }),
                (VALUE, []) => counter(&|c| HostValue::Int(c.0)),
                (BOOM, []) => Err(HostError::new("IllegalStateException", "boom")),
                _ => Err(HostError::new("IllegalArgumentException", "bad call")),
            }
        }

        fn get_field(&self, member: MemberId, target: Option<ObjectRef>) -> Result<HostValue, HostError> {
            match member {
                LIMIT => Ok(HostValue::Long(1 << 40)),
                STEP => target
                    .and_then(|t| self.counters.with(t, |c| HostValue::Int(c.lock().unwrap().1)))
                    .ok_or_else(|| HostError::new("NullPointerException", "no counter")),
                _ => Err(HostError::new("NoSuchFieldError", "unknown")),
            }
        }

        fn set_field(
            &self,
            member: MemberId,
            target: Option<ObjectRef>,
            value: HostValue,
        ) -> Result<(), HostError> {
            match (member, value) {
                (STEP, HostValue::Int(step)) => target
                    .and_then(|t| self.counters.with(t, |c| c.lock().unwrap().1 = step))
                    .ok_or_else(|| HostError::new("NullPointerException", "no counter")),
                _ => Err(HostError::new("IllegalAccessError", "read-only")),
            }
        }

        fn release(&self, object: ObjectRef) -> bool {
            self.counters.release(object).is_some()
        }
    }

    pub(crate) fn bridge() -> (CallBridge, Arc<TinyHost>) {
        let host = Arc::new(TinyHost::default());
        (CallBridge::with_resolver(host.clone()), host)
    }

    #[test]
    fn static_call_round_trip() {
        let (bridge, _) = bridge();
        assert_eq!(
            bridge.invoke_static("Math", "isEven", "(I)Z", &[ScriptValue::Int(4)]),
            Ok(ScriptValue::Bool(true))
        );
        assert_eq!(
            bridge.invoke_static(
                "Text",
                "concat",
                "(Ljava/lang/String;J)Ljava/lang/String;",
                &["ore-".into(), ScriptValue::Long(12)]
            ),
            Ok(ScriptValue::from("ore-12"))
        );
    }

    #[test]
    fn string_argument_to_int_parameter_is_type_mismatch() {
        let (bridge, host) = bridge();
        let err = bridge
            .invoke_static("Math", "isEven", "(I)Z", &["four".into()])
            .unwrap_err();
        assert!(matches!(err, CallError::TypeMismatch { index: 0, found: "string", .. }));
        // Rejected before the host was consulted.
        assert_eq!(host.lookups.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn uninitialized_bridge_refuses_calls() {
        let bridge = CallBridge::new();
        assert_eq!(
            bridge.invoke_static("Math", "isEven", "(I)Z", &[ScriptValue::Int(1)]),
            Err(CallError::BridgeNotInitialized)
        );
        bridge.initialize(Arc::new(TinyHost::default())).unwrap();
        assert!(bridge.is_initialized());
        assert_eq!(
            bridge.initialize(Arc::new(TinyHost::default())),
            Err(CallError::AlreadyInitialized)
        );
    }

    #[test]
    fn resolution_is_cached_until_cleared() {
        let (bridge, host) = bridge();
        for n in 0..10 {
            bridge
                .invoke_static("Math", "isEven", "(I)Z", &[ScriptValue::Int(n)])
                .unwrap();
        }
        assert_eq!(host.lookups.load(Ordering::Relaxed), 1);
        assert_eq!(bridge.cached_members(), 1);

        bridge.clear_cache();
        assert_eq!(bridge.cached_members(), 0);
        bridge
            .invoke_static("Math", "isEven", "(I)Z", &[ScriptValue::Int(1)])
            .unwrap();
        assert_eq!(host.lookups.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn missing_members_and_host_errors() {
        let (bridge, _) = bridge();
        assert!(matches!(
            bridge.invoke_static("Math", "isOdd", "(I)Z", &[ScriptValue::Int(1)]),
            Err(CallError::MemberNotFound { .. })
        ));
        let err = bridge.invoke_static("Boom", "go", "()V", &[]).unwrap_err();
        match err {
            CallError::InvocationFailed { key, source } => {
                assert_eq!(key.to_string(), "Boom::go()V");
                assert_eq!(source.class, "IllegalStateException");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            bridge.invoke_static("Math", "isEven", "(I)Z", &[]),
            Err(CallError::ArityMismatch { expected: 1, found: 0 })
        ));
        assert!(matches!(
            bridge.invoke_static("Math", "isEven", "(I", &[ScriptValue::Int(1)]),
            Err(CallError::MalformedSignature { .. })
        ));
    }

    #[test]
    fn construct_invoke_fields_and_release() {
        let (bridge, host) = bridge();
        let counter = bridge.construct("Counter", "(I)V", &[ScriptValue::Int(3)]).unwrap();

        bridge
            .invoke_instance(Some(counter), "Counter", "bump", "()V", &[])
            .unwrap();
        bridge
            .set_field(Some(counter), "Counter", "step", "I", &ScriptValue::Int(10))
            .unwrap();
        bridge
            .invoke_instance(Some(counter), "Counter", "bump", "()V", &[])
            .unwrap();
        assert_eq!(
            bridge.invoke_instance(Some(counter), "Counter", "value", "()I", &[]),
            Ok(ScriptValue::Int(13))
        );
        assert_eq!(
            bridge.get_field(Some(counter), "Counter", "step", "I"),
            Ok(ScriptValue::Int(10))
        );
        assert_eq!(
            bridge.get_static_field("Counter", "LIMIT", "J"),
            Ok(ScriptValue::Long(1 << 40))
        );

        assert_eq!(bridge.release(counter), Ok(true));
        assert!(host.counters.is_empty());
        assert!(matches!(
            bridge.invoke_instance(None, "Counter", "value", "()I", &[]),
            Err(CallError::NullTarget { .. })
        ));
    }

    #[test]
    fn constructors_must_return_void() {
        let (bridge, _) = bridge();
        assert!(matches!(
            bridge.construct("Counter", "(I)I", &[ScriptValue::Int(1)]),
            Err(CallError::MalformedSignature { .. })
        ));
    }

    #[test]
    fn concurrent_calls_share_the_cache() {
        let (bridge, host) = bridge();
        thread::scope(|s| {
            for t in 0..8 {
                let bridge = &bridge;
                s.spawn(move || {
                    for n in 0..200 {
                        let even = bridge
                            .invoke_static("Math", "isEven", "(I)Z", &[ScriptValue::Int(t + n)])
                            .unwrap();
                        assert_eq!(even, ScriptValue::Bool((t + n) % 2 == 0));
                    }
                });
            }
        });
        // Racing misses may each resolve, but never more than once per thread.
        assert!(host.lookups.load(Ordering::Relaxed) <= 8);
        assert_eq!(bridge.cached_members(), 1);
    }
}
