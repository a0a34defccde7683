//! Redwire Runtime
//!
//! Boots the bridge against a simulated host: scripts queue their kinds on
//! a worker thread, the host thread drains them at its registration point,
//! then a few ticks of events and bridge calls exercise the result. The
//! script thread keeps serving event handlers until the ticks are done.

mod sim;

use anyhow::Result;
use clap::Parser;
use redwire_core::{
    registration_point, ActionResult, BlockBehavior, BlockEvent, BlockPos, BlockType, DrainReport,
    EntityEvent, EntityId, EventDispatcher, Hand, Handle, Identifier, ItemBehavior, ItemEvent,
    ItemType, Kind, ManifestWriter, Registries, WorldId,
};
use redwire_script::{ScriptRuntime, ScriptValue};
use redwire_services::settings::{
    ENV_HANDLER_TIMEOUT_MS, ENV_LOG, ENV_MANIFEST, ENV_REGISTRATION_TIMEOUT_MS, ENV_SCRIPT,
};
use redwire_services::{init_logging, BridgeSettings, SettingsOverrides};
use sim::{SimulatedRegistrar, SimulatedWorld, WORLD_CLASS};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const DEMO_MOD: &str = include_str!("../mods/ruby.js");

const OVERWORLD: WorldId = 0;
const PLAYER: EntityId = 1;

const RUBY_ORE: &str = "rubymod:ruby_ore";

#[derive(Parser, Debug)]
#[command(name = "redwire", version, about = "Redwire bridge runtime")]
struct Cli {
    /// Settings file (JSON)
    #[arg(short, long, env = "REDWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Mod to run instead of the bundled demo
    #[arg(env = ENV_SCRIPT)]
    script: Option<PathBuf>,

    /// Where to write the registration manifest
    #[arg(long, env = ENV_MANIFEST)]
    manifest: Option<PathBuf>,

    /// Skip the registration manifest
    #[arg(long)]
    no_manifest: bool,

    /// How long the host waits for the script to queue its kinds
    #[arg(long, env = ENV_REGISTRATION_TIMEOUT_MS)]
    registration_timeout_ms: Option<u64>,

    /// How long a host thread waits on one script event handler
    #[arg(long, env = ENV_HANDLER_TIMEOUT_MS)]
    handler_timeout_ms: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = ENV_LOG)]
    log: Option<String>,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            script: self.script.clone(),
            manifest: self.manifest.clone(),
            no_manifest: self.no_manifest,
            registration_timeout_ms: self.registration_timeout_ms,
            handler_timeout_ms: self.handler_timeout_ms,
            log_filter: self.log.clone(),
        }
    }
}

/// Lights up when stepped on.
#[derive(Default)]
struct PressurePlate {
    presses: AtomicU32,
}

impl BlockBehavior for PressurePlate {
    fn on_stepped_on(&self, _world: WorldId, pos: BlockPos, entity: EntityId) {
        let presses = self.presses.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(%pos, entity, presses, "pressure plate pressed");
    }

    fn on_use(&self, _world: WorldId, _pos: BlockPos, _player: EntityId, _hand: Hand) -> ActionResult {
        ActionResult::Success
    }
}

struct Wand;

impl ItemBehavior for Wand {
    fn on_use(&self, world: WorldId, player: EntityId, hand: Hand) -> ActionResult {
        if hand == Hand::Off {
            return ActionResult::Pass;
        }
        tracing::info!(world, player, "wand used");
        ActionResult::Consume
    }

    fn on_attack_entity(&self, _world: WorldId, _attacker: EntityId, target: EntityId) -> bool {
        // Players cannot be hit with the wand.
        target != PLAYER
    }
}

struct Builtins {
    plate: Handle,
    wand: Handle,
}

/// Kinds declared from Rust, with behaviors, alongside the script's.
fn register_builtin_kinds(registries: &Registries) -> Result<Builtins> {
    let plate = registries.blocks().register(
        BlockType::builder("redwire:pressure_plate")
            .hardness(0.5)
            .collidable(false)
            .behavior(PressurePlate::default())
            .build(),
    )?;
    let wand = registries.items().register(
        ItemType::builder("redwire:wand")
            .max_stack_size(1)
            .texture("redwire:item/wand")
            .behavior(Wand)
            .build(),
    )?;
    Ok(Builtins { plate, wand })
}

/// Script thread body. The QuickJS runtime is created and dropped here.
fn run_scripts(
    registries: &'static Registries,
    entry: Option<PathBuf>,
    timeout: Duration,
    handler_timeout: Duration,
    stop: &AtomicBool,
) -> Result<(), String> {
    if !registries.gate().wait_registry_ready(timeout) {
        // Never leave the host waiting on a failed script.
        registries.gate().signal_registrations_queued();
        return Err("host never signalled registry ready".into());
    }

    let runtime = ScriptRuntime::with_handler_timeout(handler_timeout).and_then(|runtime| {
        runtime.install_registration_api(registries)?;
        runtime.install_call_bridge(redwire_script::bridge::global())?;
        match &entry {
            Some(path) => runtime.execute_file(path)?,
            None => runtime.execute(DEMO_MOD)?,
        }
        Ok(runtime)
    });

    registries.gate().signal_registrations_queued();
    let runtime = runtime.map_err(|err| err.to_string())?;

    let served = runtime.serve_handlers(stop);
    tracing::debug!(served, "script thread done");
    Ok(())
}

fn log_report(report: &DrainReport) {
    for kind in Kind::ALL {
        let kind_report = report.kind(kind);
        tracing::info!(
            %kind,
            applied = kind_report.applied,
            failed = kind_report.failures.len(),
            "registration report"
        );
        for failure in &kind_report.failures {
            if let Err(err) = &failure.result {
                tracing::warn!(id = %failure.id, handle = %failure.handle, "{err}");
            }
        }
    }
}

fn simulate_ticks(registries: &Registries, builtins: &Builtins) {
    let events = EventDispatcher::new(registries);
    let pos = BlockPos::new(8, 64, -3);

    events.dispatch_block(
        builtins.plate.raw(),
        &BlockEvent::SteppedOn { world: OVERWORLD, pos, entity: PLAYER },
    );
    let used = events.dispatch_block(
        builtins.plate.raw(),
        &BlockEvent::Use { world: OVERWORLD, pos, player: PLAYER, hand: Hand::Main },
    );
    tracing::info!(result = used.to_wire(Kind::Block), "plate use");

    let used = events.dispatch_item(
        builtins.wand.raw(),
        &ItemEvent::Use { world: OVERWORLD, player: PLAYER, hand: Hand::Main },
    );
    let attack = events.dispatch_item(
        builtins.wand.raw(),
        &ItemEvent::AttackEntity { world: OVERWORLD, attacker: 7, target: PLAYER },
    );
    tracing::info!(use_result = used.to_wire(Kind::Item), attack_allowed = attack.allowed(), "wand");

    for handle in registries.entities().handles() {
        events.dispatch_entity(handle.raw(), &EntityEvent::Spawn { world: OVERWORLD, entity: 42 });
        events.dispatch_entity(handle.raw(), &EntityEvent::Tick { world: OVERWORLD, entity: 42 });
        let fall = events.dispatch_entity(
            handle.raw(),
            &EntityEvent::Damage { world: OVERWORLD, entity: 42, source: "fall".into(), amount: 4.0 },
        );
        tracing::info!(%handle, fall_damage = fall.allowed(), "entity damage");
    }

    // Script-declared ore answers through its JS handlers.
    if let Some(ore) = Identifier::parse(RUBY_ORE)
        .ok()
        .and_then(|id| registries.blocks().handle_of(&id))
    {
        let deep = events.dispatch_block(
            ore.raw(),
            &BlockEvent::Break { world: OVERWORLD, pos: BlockPos::new(3, 5, 3), player: PLAYER },
        );
        let shallow = events.dispatch_block(
            ore.raw(),
            &BlockEvent::Break { world: OVERWORLD, pos: BlockPos::new(3, 40, 3), player: PLAYER },
        );
        tracing::info!(deep = deep.allowed(), shallow = shallow.allowed(), "ruby ore breakable");
    }

    // Handles the host never issued resolve to the default.
    let stale = events.dispatch_block(
        u64::MAX,
        &BlockEvent::RandomTick { world: OVERWORLD, pos: BlockPos::default() },
    );
    tracing::debug!(?stale, "stale handle");
}

fn exercise_bridge(world: &SimulatedWorld) -> Result<()> {
    let bridge = redwire_script::bridge::global();
    let time = bridge.invoke_static(WORLD_CLASS, "getTime", "()J", &[])?;
    let nether = bridge.construct(WORLD_CLASS, "(Ljava/lang/String;)V", &["the_nether".into()])?;
    let name = bridge.invoke_instance(Some(nether), WORLD_CLASS, "getName", "()Ljava/lang/String;", &[])?;
    let spawn = bridge.invoke_instance(
        Some(nether),
        WORLD_CLASS,
        "isSpawnAllowed",
        "(III)Z",
        &[ScriptValue::Int(0), ScriptValue::Int(70), ScriptValue::Int(0)],
    )?;
    // Second call hits the member cache.
    bridge.invoke_instance(Some(nether), WORLD_CLASS, "getName", "()Ljava/lang/String;", &[])?;
    bridge.release(nether)?;

    tracing::info!(
        ?time,
        ?name,
        ?spawn,
        cached = bridge.cached_members(),
        lookups = world.lookups(),
        "call bridge"
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => BridgeSettings::load(path)?,
        None => BridgeSettings::default(),
    };
    settings.apply_overrides(cli.overrides());

    init_logging(&settings.logging);
    tracing::info!("Redwire v{}", redwire_core::VERSION);

    let registries = redwire_core::registries::global();
    if settings.manifest.enabled {
        let writer = ManifestWriter::new(&settings.manifest.path);
        tracing::info!(path = %writer.path().display(), "writing registration manifest");
        registries.attach_manifest(Arc::new(writer));
    }

    let world = Arc::new(SimulatedWorld::new());
    redwire_script::bridge::global().initialize(world.clone())?;

    let builtins = register_builtin_kinds(registries)?;

    let timeout = settings.startup.registration_timeout();
    let handler_timeout = settings.script.handler_timeout();
    let entry = settings.script.entry.clone();
    let stop = Arc::new(AtomicBool::new(false));
    let scripts = {
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("script".into())
            .spawn(move || run_scripts(registries, entry, timeout, handler_timeout, &stop))?
    };

    let mut host = SimulatedRegistrar::new();
    let report = registration_point(registries, &mut host, timeout)?;
    log_report(&report);

    simulate_ticks(registries, &builtins);
    exercise_bridge(&world)?;

    stop.store(true, Ordering::Release);
    match scripts.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!("script failed: {err}"),
        Err(_) => tracing::error!("script thread panicked"),
    }

    tracing::info!(clean = report.is_clean(), "runtime finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "redwire",
            "--config",
            "redwire.json",
            "--no-manifest",
            "--handler-timeout-ms",
            "250",
            "mods/ruby.js",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("redwire.json")));
        let overrides = cli.overrides();
        assert_eq!(overrides.script, Some(PathBuf::from("mods/ruby.js")));
        assert!(overrides.no_manifest);
        assert_eq!(overrides.handler_timeout_ms, Some(250));
    }

    #[test]
    fn cli_rejects_bad_numbers_and_unknown_flags() {
        assert!(Cli::try_parse_from(["redwire", "--registration-timeout-ms", "soon"]).is_err());
        assert!(Cli::try_parse_from(["redwire", "--frobnicate"]).is_err());
    }
}
