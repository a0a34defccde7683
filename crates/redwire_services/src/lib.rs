//! Redwire Services Layer
//!
//! Settings and logging for the bridge runtime.

pub mod logging;
pub mod settings;

pub use logging::init_logging;
pub use settings::{
    BridgeSettings, LoggingSettings, ManifestSettings, ScriptSettings, SettingsError,
    SettingsOverrides, StartupSettings,
};
