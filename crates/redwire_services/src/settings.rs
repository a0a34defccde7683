//! Bridge settings
//!
//! Loaded from a JSON file (every field optional), then overridden by
//! [`SettingsOverrides`] collected from the command line or the `REDWIRE_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_SCRIPT: &str = "REDWIRE_SCRIPT";
pub const ENV_MANIFEST: &str = "REDWIRE_MANIFEST";
pub const ENV_REGISTRATION_TIMEOUT_MS: &str = "REDWIRE_REGISTRATION_TIMEOUT_MS";
pub const ENV_LOG: &str = "REDWIRE_LOG";
pub const ENV_HANDLER_TIMEOUT_MS: &str = "REDWIRE_HANDLER_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Bridge settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub startup: StartupSettings,
    pub manifest: ManifestSettings,
    pub script: ScriptSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupSettings {
    /// How long the host waits for "registrations queued" before draining anyway.
    pub registration_timeout_ms: u64,
}

impl StartupSettings {
    pub fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            registration_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestSettings {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(".redwire/manifest.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// JavaScript mod to run at startup.
    pub entry: Option<PathBuf>,
    /// How long a host thread waits on a script event handler before
    /// falling back to the default outcome.
    pub handler_timeout_ms: u64,
}

impl ScriptSettings {
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            entry: None,
            handler_timeout_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl BridgeSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Layer `overrides` on top of the loaded values.
    pub fn apply_overrides(&mut self, overrides: SettingsOverrides) {
        if let Some(script) = overrides.script {
            self.script.entry = Some(script);
        }
        if let Some(path) = overrides.manifest {
            self.manifest.enabled = true;
            self.manifest.path = path;
        }
        if overrides.no_manifest {
            self.manifest.enabled = false;
        }
        if let Some(timeout) = overrides.registration_timeout_ms {
            self.startup.registration_timeout_ms = timeout;
        }
        if let Some(timeout) = overrides.handler_timeout_ms {
            self.script.handler_timeout_ms = timeout;
        }
        if let Some(filter) = overrides.log_filter {
            self.logging.filter = filter;
        }
    }
}

/// Values that take precedence over the settings file. Unset fields keep
/// whatever the file (or the defaults) said.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsOverrides {
    pub script: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub no_manifest: bool,
    pub registration_timeout_ms: Option<u64>,
    pub handler_timeout_ms: Option<u64>,
    pub log_filter: Option<String>,
}
