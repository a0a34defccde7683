//! Script runtime management
//!
//! Runs JavaScript mods on QuickJS and exposes the registration API:
//!
//! ```js
//! const ore = registerBlock({
//!     id: "mymod:ruby_ore",
//!     hardness: 3,
//!     requiresTool: true,
//!     onBreak: (e) => e.pos.y > 10,
//! });
//! registerItem({ id: "mymod:ruby" });
//! registrationsComplete();
//! ```
//!
//! Each `register*` call returns the new handle and throws on failure.
//! Function-valued keys are event handlers; they run on this runtime's
//! thread whenever it pumps ([`ScriptRuntime::pump_handlers`]).

use crate::binding;
use crate::callback::{handler_names, HandlerCall, HandlerChannel, HandlerReply};
use crate::definition::register_definition;
use crate::{CallBridge, ScriptBehavior, ScriptError};
use redwire_core::{ActionResult, Kind, Registries};
use rquickjs::{CatchResultExt, Context, Ctx, Exception, Function, Object, Persistent, Runtime, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Deref;
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

/// Native entry point behind the JS wrappers below.
const REGISTER_NATIVE: &str = "__redwireRegister";

const PRELUDE: &str = r#"
function __redwireDeclare(kind, def) {
    const data = {};
    const handlers = {};
    for (const key of Object.keys(def)) {
        if (typeof def[key] === "function") handlers[key] = def[key];
        else data[key] = def[key];
    }
    return __redwireRegister(kind, JSON.stringify(data), handlers);
}
function registerBlock(def) { return __redwireDeclare("block", def); }
function registerItem(def) { return __redwireDeclare("item", def); }
function registerEntity(def) { return __redwireDeclare("entity", def); }
"#;

pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(1);

const SERVE_POLL: Duration = Duration::from_millis(20);

type Handlers = HashMap<&'static str, Persistent<Function<'static>>>;
type HandlerTable = Rc<RefCell<HashMap<(Kind, String), Handlers>>>;

/// Script execution context. Lives and dies on one thread.
pub struct ScriptRuntime {
    #[allow(dead_code)] // Kept alive for context lifetime
    runtime: Runtime,
    context: Context,
    handlers: HandlerTable,
    pending: mpsc::Receiver<HandlerCall>,
    channel: HandlerChannel,
}

impl ScriptRuntime {
    pub fn new() -> Result<Self, ScriptError> {
        Self::with_handler_timeout(DEFAULT_HANDLER_TIMEOUT)
    }

    /// `timeout` bounds how long a host thread waits on one handler.
    pub fn with_handler_timeout(timeout: Duration) -> Result<Self, ScriptError> {
        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;
        let (calls, pending) = mpsc::channel();
        let script = Self {
            runtime,
            context,
            handlers: Rc::default(),
            pending,
            channel: HandlerChannel::new(calls, timeout),
        };
        script.install_log()?;
        Ok(script)
    }

    pub fn execute_file(&self, path: &Path) -> Result<(), ScriptError> {
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "running script");
        self.execute(&source)
    }

    pub fn execute(&self, source: &str) -> Result<(), ScriptError> {
        self.context.with(|ctx| {
            ctx.eval::<(), _>(source)
                .catch(&ctx)
                .map_err(|err| ScriptError::Exception(err.to_string()))
        })
    }

    /// Evaluate an expression and return its value as a number.
    pub fn eval_number(&self, source: &str) -> Result<f64, ScriptError> {
        self.context.with(|ctx| {
            ctx.eval::<f64, _>(source)
                .catch(&ctx)
                .map_err(|err| ScriptError::Exception(err.to_string()))
        })
    }

    /// Expose `registerBlock`, `registerItem`, `registerEntity` and
    /// `registrationsComplete` to scripts, backed by `registries`.
    pub fn install_registration_api<R>(&self, registries: R) -> Result<(), ScriptError>
    where
        R: Deref<Target = Registries> + Clone + 'static,
    {
        self.context.with(|ctx| -> Result<(), ScriptError> {
            install_registration(&ctx, registries, Rc::clone(&self.handlers), self.channel.clone())?;
            ctx.eval::<(), _>(PRELUDE)?;
            Ok(())
        })
    }

    /// Expose the call bridge (`callStatic`, `callMethod`, `newObject`,
    /// field accessors and `releaseObject`) to scripts.
    pub fn install_call_bridge<B>(&self, bridge: B) -> Result<(), ScriptError>
    where
        B: Deref<Target = CallBridge> + Clone + 'static,
    {
        self.context.with(|ctx| binding::install(&ctx, bridge))?;
        Ok(())
    }

    /// Run queued handler calls. Waits up to `wait` for the first one, then
    /// takes whatever else is already queued. Returns how many ran.
    pub fn pump_handlers(&self, wait: Duration) -> usize {
        let mut served = 0;
        let mut next = self.pending.recv_timeout(wait).ok();
        while let Some(call) = next {
            let reply = self.run_handler(&call);
            // The dispatching thread may have timed out already.
            let _ = call.reply.send(reply);
            served += 1;
            next = self.pending.try_recv().ok();
        }
        served
    }

    /// Pump handler calls until `stop` is set.
    pub fn serve_handlers(&self, stop: &AtomicBool) -> usize {
        let mut served = 0;
        while !stop.load(Ordering::Acquire) {
            served += self.pump_handlers(SERVE_POLL);
        }
        tracing::debug!(served, "stopped serving script handlers");
        served
    }

    fn run_handler(&self, call: &HandlerCall) -> HandlerReply {
        let handler = self
            .handlers
            .borrow()
            .get(&(call.kind, call.id.to_string()))
            .and_then(|handlers| handlers.get(call.handler))
            .cloned();
        let Some(handler) = handler else {
            return HandlerReply::Nothing;
        };

        self.context.with(|ctx| {
            let returned = handler
                .restore(&ctx)
                .and_then(|function| {
                    let event = ctx.json_parse(call.event.to_string())?;
                    function.call::<_, Value>((event,))
                })
                .map(|value| reply_of(&value));
            match returned.catch(&ctx) {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::warn!(
                        kind = %call.kind,
                        id = %call.id,
                        handler = call.handler,
                        "script handler failed: {err}"
                    );
                    HandlerReply::Nothing
                }
            }
        })
    }

    fn install_log(&self) -> Result<(), ScriptError> {
        self.context.with(|ctx| {
            let log = Function::new(ctx.clone(), |msg: String| {
                tracing::info!(target: "script", "{msg}");
            })?;
            ctx.globals().set("log", log)?;
            Ok(())
        })
    }
}

impl Drop for ScriptRuntime {
    fn drop(&mut self) {
        // Saved functions must be released before the runtime is freed.
        self.handlers.borrow_mut().clear();
    }
}

fn reply_of(value: &Value<'_>) -> HandlerReply {
    if let Some(allow) = value.as_bool() {
        return HandlerReply::Bool(allow);
    }
    let Some(name) = value.as_string().and_then(|s| s.to_string().ok()) else {
        return HandlerReply::Nothing;
    };
    match ActionResult::from_name(&name) {
        Some(result) => HandlerReply::Action(result),
        None => {
            tracing::warn!(returned = %name, "handler returned an unknown action");
            HandlerReply::Nothing
        }
    }
}

fn parse_kind(ctx: &Ctx<'_>, kind: &str) -> rquickjs::Result<Kind> {
    match kind {
        "block" => Ok(Kind::Block),
        "item" => Ok(Kind::Item),
        "entity" => Ok(Kind::Entity),
        other => Err(Exception::throw_type(ctx, &format!("unknown kind '{other}'"))),
    }
}

fn install_registration<'js, R>(
    ctx: &Ctx<'js>,
    registries: R,
    table: HandlerTable,
    channel: HandlerChannel,
) -> rquickjs::Result<()>
where
    R: Deref<Target = Registries> + Clone + 'static,
{
    let globals = ctx.globals();

    let target = registries.clone();
    let register = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, kind: String, json: String, functions: Object<'js>| -> rquickjs::Result<f64> {
            let kind = parse_kind(&ctx, &kind)?;

            let mut declared: Vec<(&'static str, Function<'js>)> = Vec::new();
            for name in functions.keys::<String>() {
                let name = name?;
                let Some(known) = handler_names(kind).iter().copied().find(|known| *known == name)
                else {
                    return Err(Exception::throw_type(
                        &ctx,
                        &format!("unknown {kind} handler '{name}'"),
                    ));
                };
                declared.push((known, functions.get(known)?));
            }

            let mut id = String::new();
            let registered = register_definition(&target, kind, &json, |declared_id| {
                id = declared_id.to_string();
                if declared.is_empty() {
                    return None;
                }
                let names = declared.iter().map(|(name, _)| *name).collect();
                Some(ScriptBehavior::new(kind, declared_id, names, channel.clone()))
            });

            match registered {
                Ok(handle) => {
                    tracing::debug!(%kind, %handle, %id, handlers = declared.len(), "script registered kind");
                    if !declared.is_empty() {
                        let saved = declared
                            .into_iter()
                            .map(|(name, function)| (name, Persistent::save(&ctx, function)))
                            .collect();
                        table.borrow_mut().insert((kind, id), saved);
                    }
                    Ok(handle.raw() as f64)
                }
                Err(err) => Err(Exception::throw_message(&ctx, &err.to_string())),
            }
        },
    )?;
    globals.set(REGISTER_NATIVE, register)?;

    let complete = Function::new(ctx.clone(), move || {
        tracing::info!("script signalled registrations complete");
        registries.gate().signal_registrations_queued();
    })?;
    globals.set("registrationsComplete", complete)?;

    Ok(())
}
