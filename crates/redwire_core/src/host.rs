//! Host-side drain/apply contract
//!
//! At its registration point the host freezes every registry, drains the
//! queued requests and creates the real host-side types through a
//! [`HostRegistrar`]. Each request is applied independently: a rejected or
//! panicking request is recorded as a failure and the batch continues.

use crate::{
    BlockSettings, BridgeError, EntitySettings, Handle, HostBinding, Identifier, ItemSettings,
    Kind, KindSettings, Registrable, Registries, Registry, RegistrationRequest,
};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Host-native identifier of a created type (e.g. its raw registry id).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HostId(pub i64);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error a host returns when it refuses to create a type.
pub type HostRejection = Box<dyn std::error::Error + Send + Sync>;

/// Real host-side type creation. Only ever called on the host thread.
pub trait HostRegistrar {
    fn register_block(
        &mut self,
        handle: Handle,
        id: &Identifier,
        settings: &BlockSettings,
    ) -> Result<HostId, HostRejection>;

    fn register_item(
        &mut self,
        handle: Handle,
        id: &Identifier,
        settings: &ItemSettings,
    ) -> Result<HostId, HostRejection>;

    fn register_entity(
        &mut self,
        handle: Handle,
        id: &Identifier,
        settings: &EntitySettings,
    ) -> Result<HostId, HostRejection>;
}

/// Result of applying one request.
#[derive(Clone, Debug, PartialEq)]
pub struct ApplyOutcome {
    pub handle: Handle,
    pub id: Identifier,
    pub result: Result<HostId, BridgeError>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct KindReport {
    pub applied: usize,
    pub failures: Vec<ApplyOutcome>,
}

impl KindReport {
    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome.result {
            Ok(_) => self.applied += 1,
            Err(_) => self.failures.push(outcome),
        }
    }
}

/// Summary of one drain across all kinds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrainReport {
    pub blocks: KindReport,
    pub items: KindReport,
    pub entities: KindReport,
}

impl DrainReport {
    pub fn kind(&self, kind: Kind) -> &KindReport {
        match kind {
            Kind::Block => &self.blocks,
            Kind::Item => &self.items,
            Kind::Entity => &self.entities,
        }
    }

    fn kind_mut(&mut self, kind: Kind) -> &mut KindReport {
        match kind {
            Kind::Block => &mut self.blocks,
            Kind::Item => &mut self.items,
            Kind::Entity => &mut self.entities,
        }
    }

    pub fn applied(&self) -> usize {
        Kind::ALL.iter().map(|&k| self.kind(k).applied).sum()
    }

    pub fn failed(&self) -> usize {
        Kind::ALL.iter().map(|&k| self.kind(k).failures.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

/// Apply an ordered batch of requests of kind `T`, publishing each host
/// binding onto `registry`. Returns one outcome per request, in order.
pub fn apply_batch<T: Registrable>(
    registry: &Registry<T>,
    registrar: &mut dyn HostRegistrar,
    batch: Vec<RegistrationRequest>,
) -> Vec<ApplyOutcome> {
    batch
        .into_iter()
        .map(|request| apply_one(registry, registrar, request))
        .collect()
}

fn apply_one<T: Registrable>(
    registry: &Registry<T>,
    registrar: &mut dyn HostRegistrar,
    request: RegistrationRequest,
) -> ApplyOutcome {
    let handle = request.handle();
    let kind = T::KIND;

    let created = if request.kind() != kind {
        Err(format!("{} request routed to the {kind} registry", request.kind()))
    } else {
        create(registrar, &request)
    };

    let binding = match &created {
        Ok(host_id) => HostBinding::Bound(*host_id),
        Err(reason) => HostBinding::Failed(reason.clone()),
    };
    if !registry.publish_binding(handle, binding) {
        tracing::warn!(%kind, %handle, id = %request.id(), "no unbound registry entry for drained request");
    }

    let result = match created {
        Ok(host_id) => {
            tracing::debug!(%kind, %handle, id = %request.id(), %host_id, "applied registration");
            Ok(host_id)
        }
        Err(reason) => {
            tracing::error!(%kind, %handle, id = %request.id(), %reason, "host registration failed");
            Err(BridgeError::HostRegistrationFailed {
                kind,
                handle,
                reason,
            })
        }
    };

    ApplyOutcome {
        handle,
        id: request.id().clone(),
        result,
    }
}

fn create(registrar: &mut dyn HostRegistrar, request: &RegistrationRequest) -> Result<HostId, String> {
    let handle = request.handle();
    let id = request.id();
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| match request.settings() {
        KindSettings::Block(settings) => registrar.register_block(handle, id, settings),
        KindSettings::Item(settings) => registrar.register_item(handle, id, settings),
        KindSettings::Entity(settings) => registrar.register_entity(handle, id, settings),
    }));
    match attempt {
        Ok(Ok(host_id)) => Ok(host_id),
        Ok(Err(rejection)) => Err(rejection.to_string()),
        Err(payload) => Err(format!("host panicked: {}", panic_message(&*payload))),
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Freeze every registry, drain every queue and apply the requests.
///
/// The first call binds the calling thread as the host registration thread;
/// calls from any other thread fail with [`BridgeError::NotHostThread`].
/// Freezing happens before draining so no request can be queued after the
/// last drain.
pub fn drain_and_apply(
    registries: &Registries,
    registrar: &mut dyn HostRegistrar,
) -> Result<DrainReport, BridgeError> {
    registries.claim_host_thread()?;
    registries.freeze_all();

    let mut pending: Vec<RegistrationRequest> = Vec::new();
    for queue in registries.queues() {
        pending.extend(queue.drain_all());
    }

    let mut blocks = Vec::new();
    let mut items = Vec::new();
    let mut entities = Vec::new();
    for request in pending {
        match request.kind() {
            Kind::Block => blocks.push(request),
            Kind::Item => items.push(request),
            Kind::Entity => entities.push(request),
        }
    }

    let mut report = DrainReport::default();
    let outcomes = [
        (Kind::Block, apply_batch(registries.blocks(), registrar, blocks)),
        (Kind::Item, apply_batch(registries.items(), registrar, items)),
        (Kind::Entity, apply_batch(registries.entities(), registrar, entities)),
    ];
    for (kind, batch) in outcomes {
        for outcome in batch {
            report.kind_mut(kind).record(outcome);
        }
    }

    tracing::info!(
        blocks = report.blocks.applied,
        items = report.items.applied,
        entities = report.entities.applied,
        failed = report.failed(),
        "registration drain complete"
    );
    Ok(report)
}

/// Full host registration point: announce readiness, give the script side
/// up to `timeout` to queue its content, then drain regardless.
pub fn registration_point(
    registries: &Registries,
    registrar: &mut dyn HostRegistrar,
    timeout: Duration,
) -> Result<DrainReport, BridgeError> {
    let gate = registries.gate();
    gate.signal_registry_ready();
    if !gate.wait_registrations_queued(timeout) {
        tracing::warn!(
            timeout_ms = timeout.as_millis() as u64,
            "script side did not signal registrations queued; draining anyway"
        );
    }
    drain_and_apply(registries, registrar)
}

#[derive(Debug, Default)]
struct GateState {
    registry_ready: bool,
    registrations_queued: bool,
}

/// Handshake between the host's registration point and the script side.
#[derive(Debug, Default)]
pub struct StartupGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl StartupGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host: registries accept declarations.
    pub fn signal_registry_ready(&self) {
        self.update(|state| state.registry_ready = true);
    }

    /// Script: everything it wants to declare is queued.
    pub fn signal_registrations_queued(&self) {
        self.update(|state| state.registrations_queued = true);
    }

    pub fn is_registry_ready(&self) -> bool {
        self.lock().registry_ready
    }

    pub fn registrations_queued(&self) -> bool {
        self.lock().registrations_queued
    }

    /// Returns `false` on timeout.
    pub fn wait_registry_ready(&self, timeout: Duration) -> bool {
        self.wait_for(timeout, |state| state.registry_ready)
    }

    /// Returns `false` on timeout.
    pub fn wait_registrations_queued(&self, timeout: Duration) -> bool {
        self.wait_for(timeout, |state| state.registrations_queued)
    }

    fn update(&self, f: impl FnOnce(&mut GateState)) {
        f(&mut self.lock());
        self.changed.notify_all();
    }

    fn wait_for(&self, timeout: Duration, done: impl Fn(&GateState) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while !done(&state) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
