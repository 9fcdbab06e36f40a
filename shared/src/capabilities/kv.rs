use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use crux_kv::error::KeyValueError;

const MAX_KEY_NAME_LENGTH: usize = 128;

/// What a `crux_kv` get, set or delete callback receives. For writes the
/// value is the one that was replaced.
pub type KvResult = Result<Option<Vec<u8>>, KeyValueError>;

/// Storage areas the core writes to. Shells see keys as `area:name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyNamespace {
    Settings,
}

impl KeyNamespace {
    pub fn prefix(self) -> &'static str {
        match self {
            KeyNamespace::Settings => "settings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvKey {
    namespace: KeyNamespace,
    name: String,
}

impl KvKey {
    /// Names are short identifiers: ASCII letters, digits, `_`, `-` and `.`.
    pub fn new(namespace: KeyNamespace, name: impl Into<String>) -> Result<Self, KvError> {
        let name = name.into();
        let reject = |reason: &str| KvError::InvalidKey {
            key: name.chars().take(40).collect(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(reject("empty key"));
        }
        if name.len() > MAX_KEY_NAME_LENGTH {
            return Err(reject("key too long"));
        }
        if name.starts_with('.')
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(reject("unsupported characters in key"));
        }

        Ok(Self { namespace, name })
    }

    pub fn raw(&self) -> String {
        self.to_string()
    }

    pub fn namespace(&self) -> KeyNamespace {
        self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for KvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace.prefix(), self.name)
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum KvError {
    #[error("bad storage key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("stored value unreadable: {message}")]
    Serialization { message: String },
}

impl From<&KeyValueError> for KvError {
    fn from(error: &KeyValueError) -> Self {
        KvError::Storage {
            message: format!("{error:?}"),
        }
    }
}

/// Reads a stored value as UTF-8 text.
pub fn stored_text(result: KvResult) -> Result<Option<String>, KvError> {
    match result {
        Ok(None) => Ok(None),
        Ok(Some(bytes)) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| KvError::Serialization {
                message: e.to_string(),
            }),
        Err(e) => Err(KvError::from(&e)),
    }
}
