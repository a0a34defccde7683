//! Registration manifest
//!
//! One JSON document per process with `blocks`, `items` and `entities`
//! arrays, consumed by the asset/codegen tooling. Every write reads the
//! current file, merges a single entry keyed by `id` and rewrites the file.

use crate::{Identifier, KindSettings, ManifestError};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub struct ManifestWriter {
    path: PathBuf,
    // Registries of different kinds share one writer; merges must not interleave.
    write: Mutex<()>,
}

impl ManifestWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge the entry for `id` into its kind's section.
    pub fn record(&self, id: &Identifier, settings: &KindSettings) -> Result<(), ManifestError> {
        let _guard = self.write.lock().unwrap_or_else(PoisonError::into_inner);

        let mut root = self.read()?;
        let entry = entry_for(id, settings).map_err(|source| self.json_error(source))?;
        let section = settings.kind().manifest_section();

        let entries = root
            .entry(section)
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entries.is_array() {
            *entries = Value::Array(Vec::new());
        }
        if let Value::Array(entries) = entries {
            let id = id.to_string();
            match entries
                .iter_mut()
                .find(|existing| existing.get("id").and_then(Value::as_str) == Some(id.as_str()))
            {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }

        self.write(root)
    }

    /// Current manifest contents. A missing file reads as an empty manifest.
    pub fn read(&self) -> Result<Map<String, Value>, ManifestError> {
        let mut root = match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(ManifestError::NotAnObject {
                        path: self.path.display().to_string(),
                    })
                }
                Err(source) => return Err(self.json_error(source)),
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(self.io_error(source)),
        };

        for kind in crate::Kind::ALL {
            root.entry(kind.manifest_section())
                .or_insert_with(|| Value::Array(Vec::new()));
        }
        Ok(root)
    }

    fn write(&self, root: Map<String, Value>) -> Result<(), ManifestError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let bytes =
            serde_json::to_vec_pretty(&Value::Object(root)).map_err(|source| self.json_error(source))?;
        fs::write(&self.path, bytes).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: io::Error) -> ManifestError {
        ManifestError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn json_error(&self, source: serde_json::Error) -> ManifestError {
        ManifestError::Json {
            path: self.path.display().to_string(),
            source,
        }
    }
}

fn entry_for(id: &Identifier, settings: &KindSettings) -> Result<Value, serde_json::Error> {
    let body = match settings {
        KindSettings::Block(block) => serde_json::to_value(block)?,
        KindSettings::Item(item) => serde_json::to_value(item)?,
        KindSettings::Entity(entity) => serde_json::to_value(entity)?,
    };

    let mut entry = Map::new();
    entry.insert("id".to_string(), Value::String(id.to_string()));
    if let Value::Object(fields) = body {
        entry.extend(fields);
    }
    Ok(Value::Object(entry))
}
