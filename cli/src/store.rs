//! Key-value storage backed by a single JSON object file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crux_kv::error::KeyValueError;
use crux_kv::value::Value;
use crux_kv::{KeyValueOperation, KeyValueResponse, KeyValueResult};
use shared::capabilities::KvError;
use tracing::{debug, warn};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens `settings.json` in `dir`. A missing file is an empty store.
    pub fn open(dir: &Path) -> Result<Self, KvError> {
        let path = dir.join(SETTINGS_FILE);
        let entries = match fs::read(&path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| KvError::Serialization {
                    message: format!("{}: {e}", path.display()),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(KvError::Storage {
                    message: format!("{}: {e}", path.display()),
                })
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "settings loaded");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn execute(&mut self, operation: &KeyValueOperation) -> KeyValueResult {
        let outcome = match operation {
            KeyValueOperation::Get { key } => Ok(KeyValueResponse::Get {
                value: to_value(self.entries.get(key).cloned()),
            }),
            KeyValueOperation::Set { key, value } => self.set(key, value),
            KeyValueOperation::Delete { key } => self.delete(key),
            #[allow(unreachable_patterns)]
            other => Err(KeyValueError::Io {
                message: format!("unsupported storage operation {other:?}"),
            }),
        };
        match outcome {
            Ok(response) => KeyValueResult::Ok { response },
            Err(error) => {
                warn!(path = %self.path.display(), error = ?error, "storage operation failed");
                KeyValueResult::Err { error }
            }
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<KeyValueResponse, KeyValueError> {
        let value = String::from_utf8(value.to_vec()).map_err(|e| KeyValueError::Io {
            message: format!("value for {key} is not text: {e}"),
        })?;
        let previous = self.entries.insert(key.to_string(), value);
        if let Err(e) = self.persist() {
            match previous {
                Some(previous) => self.entries.insert(key.to_string(), previous),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        Ok(KeyValueResponse::Set {
            previous: to_value(previous),
        })
    }

    fn delete(&mut self, key: &str) -> Result<KeyValueResponse, KeyValueError> {
        let Some(previous) = self.entries.remove(key) else {
            return Ok(KeyValueResponse::Delete {
                previous: Value::None,
            });
        };
        if let Err(e) = self.persist() {
            self.entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(KeyValueResponse::Delete {
            previous: to_value(Some(previous)),
        })
    }

    // Readers see either the old file or the new one, never a partial write.
    fn persist(&self) -> Result<(), KeyValueError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| io_error(dir, &e))?;

        let body = serde_json::to_vec_pretty(&self.entries).map_err(|e| KeyValueError::Io {
            message: e.to_string(),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| io_error(&tmp, &e))?;
        file.write_all(&body).map_err(|e| io_error(&tmp, &e))?;
        file.sync_all().map_err(|e| io_error(&tmp, &e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| io_error(&self.path, &e))?;
        debug!(path = %self.path.display(), "settings written");
        Ok(())
    }
}

fn to_value(text: Option<String>) -> Value {
    match text {
        Some(text) => Value::Bytes(text.into_bytes()),
        None => Value::None,
    }
}

fn io_error(path: &Path, error: &std::io::Error) -> KeyValueError {
    KeyValueError::Io {
        message: format!("{}: {error}", path.display()),
    }
}
