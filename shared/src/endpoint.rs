//! Resolution of the API base URL from the persisted override and the
//! environment default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capabilities::{HttpUrl, KeyNamespace, KvError, KvKey, UrlError};
use crate::{
    API_BASE_STORAGE_KEY, DEFAULT_API_BASE, FETCH_TIMEOUT, HEALTH_TIMEOUT, INJECT_TIMEOUT,
    WARM_UP_TIMEOUT,
};

pub const INCIDENTS_PATH: &str = "/api/v1/incidents";
pub const EVENTS_PATH: &str = "/api/v1/events";
pub const HEALTH_PATH: &str = "/health";
pub const DOCS_PATH: &str = "/docs";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    override_base: Option<String>,
    default_base: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

impl EndpointConfig {
    /// A blank default falls back to [`DEFAULT_API_BASE`].
    pub fn new(default_base: impl Into<String>) -> Self {
        let default_base = normalize(&default_base.into());
        Self {
            override_base: None,
            default_base: if default_base.is_empty() {
                DEFAULT_API_BASE.to_string()
            } else {
                default_base
            },
        }
    }

    pub fn with_override(mut self, base: impl Into<String>) -> Self {
        self.restore_override(Some(base.into()));
        self
    }

    /// Active base URL without trailing slashes.
    pub fn resolve(&self) -> String {
        self.override_base
            .as_deref()
            .map(normalize)
            .filter(|base| !base.is_empty())
            .unwrap_or_else(|| self.default_base.clone())
    }

    pub fn override_base(&self) -> Option<&str> {
        self.override_base.as_deref()
    }

    pub fn default_base(&self) -> &str {
        &self.default_base
    }

    pub fn is_overridden(&self) -> bool {
        self.override_base.as_deref().is_some_and(|b| !b.is_empty())
    }

    /// Validates and stores a user supplied base, returning the value to persist.
    pub fn set_override(&mut self, url: &str) -> Result<Option<String>, UrlError> {
        let normalized = normalize(url);
        if normalized.is_empty() {
            self.clear_override();
            return Ok(None);
        }
        HttpUrl::parse(&normalized)?;
        self.override_base = Some(normalized.clone());
        Ok(Some(normalized))
    }

    pub fn clear_override(&mut self) {
        self.override_base = None;
    }

    /// Adopts a value read back from storage. Blank values count as absent.
    pub fn restore_override(&mut self, stored: Option<String>) {
        self.override_base = stored
            .map(|value| normalize(&value))
            .filter(|value| !value.is_empty());
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.resolve())
    }

    pub fn incidents_url(&self) -> String {
        self.url(INCIDENTS_PATH)
    }

    pub fn events_url(&self) -> String {
        self.url(EVENTS_PATH)
    }

    pub fn health_url(&self) -> String {
        self.url(HEALTH_PATH)
    }

    pub fn root_url(&self) -> String {
        self.url("/")
    }

    pub fn docs_url(&self) -> String {
        self.url(DOCS_PATH)
    }

    pub fn points_at_localhost(&self) -> bool {
        HttpUrl::parse(&self.resolve()).is_ok_and(|url| url.is_loopback())
    }
}

pub fn storage_key() -> Result<KvKey, KvError> {
    KvKey::new(KeyNamespace::Settings, API_BASE_STORAGE_KEY)
}

/// How long the shell waits for an answer from `url`.
///
/// Health checks and incident loads get the long budget a cold backend
/// needs; the root warm-up and event posts get the short one.
pub fn request_timeout(url: &str) -> Duration {
    let path = HttpUrl::parse(url).map(|url| url.path().to_string());
    match path.as_deref().map(|p| p.trim_end_matches('/')) {
        Ok(p) if p.ends_with(INCIDENTS_PATH) => FETCH_TIMEOUT,
        Ok(p) if p.ends_with(HEALTH_PATH) => HEALTH_TIMEOUT,
        Ok(p) if p.ends_with(EVENTS_PATH) => INJECT_TIMEOUT,
        _ => WARM_UP_TIMEOUT,
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
