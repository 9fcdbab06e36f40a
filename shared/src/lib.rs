// lib.rs - incident dashboard core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod app;
pub mod capabilities;
pub mod endpoint;
pub mod event;
pub mod model;
pub mod stats;
pub mod view;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::capabilities::{HttpError, KeyValueError, KvError, UrlError};

pub use crate::app::App;
pub use crate::capabilities::{Capabilities, Effect};
pub use crux_core::{App as CruxApp, Request};
pub use crate::endpoint::EndpointConfig;
pub use crate::event::{Event, EventLevel, TestEvent};
pub use crate::model::{
    Attempt, FetchState, FetchTicket, Incident, IncidentId, IncidentStatus, Model, PollHandle,
    Severity,
};
pub use crate::stats::{aggregate, Stats};
pub use crate::view::{InjectionSummary, SettingsOutcome, StatusView, ViewModel};

/// The core a shell embeds.
pub type Core = crux_core::Core<Effect, App>;

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const API_BASE_STORAGE_KEY: &str = "opsai_api_base";

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60);
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(60);
pub const WARM_UP_TIMEOUT: Duration = Duration::from_secs(30);
pub const INJECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const RETRY_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub const SUMMARY_LIMIT: usize = 10;
pub const MAX_SIMULATED_EVENTS: u32 = 100;
pub const MAX_SERVICE_NAME_LENGTH: usize = 100;

pub const MSG_WAKING: &str = "backend waking up";
pub const MSG_FETCH_FAILED: &str = "failed to load incidents";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Protocol,
    Deserialization,
    WakeUp,
    InvalidUrl,
    Storage,
    Validation,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Protocol => "PROTOCOL_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::WakeUp => "WAKE_UP_FAILED",
            Self::InvalidUrl => "INVALID_URL",
            Self::Storage => "STORAGE_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Storage => ErrorSeverity::Transient,
            Self::Deserialization | Self::Internal => ErrorSeverity::Fatal,
            Self::Protocol | Self::WakeUp | Self::InvalidUrl | Self::Validation => {
                ErrorSeverity::Permanent
            }
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to reach the backend. It may be sleeping (free tier limitation).".into()
            }
            ErrorKind::Timeout => "The backend did not answer in time. It may be waking up.".into(),
            ErrorKind::Protocol | ErrorKind::Deserialization => {
                "The backend answered with something unexpected. Please try again.".into()
            }
            ErrorKind::WakeUp | ErrorKind::InvalidUrl | ErrorKind::Validation => {
                self.message.clone()
            }
            ErrorKind::Storage => "Unable to save settings locally.".into(),
            ErrorKind::Internal => "An unexpected error occurred. Please try again.".into(),
        }
    }

    #[must_use]
    pub fn from_http_status(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ApiErrorResponse>(body)
            .ok()
            .and_then(|e| e.detail.or(e.message))
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        Self::new(ErrorKind::Protocol, message).with_context("http_status", status.to_string())
    }
}

impl From<&HttpError> for AppError {
    fn from(error: &HttpError) -> Self {
        match error {
            HttpError::Timeout => Self::new(ErrorKind::Timeout, "request timed out"),
            HttpError::Io(message) => Self::new(ErrorKind::Network, message.clone()),
            HttpError::Http { code, body, .. } => {
                Self::from_http_status(u16::from(*code), body.as_deref().unwrap_or_default())
            }
            HttpError::Json(message) => Self::new(ErrorKind::Deserialization, message.clone()),
            HttpError::Url(message) => Self::new(ErrorKind::InvalidUrl, message.clone()),
            #[allow(unreachable_patterns)]
            other => Self::new(ErrorKind::Internal, other.to_string()),
        }
    }
}

impl From<&UrlError> for AppError {
    fn from(error: &UrlError) -> Self {
        Self::new(ErrorKind::InvalidUrl, error.to_string())
    }
}

impl From<&KvError> for AppError {
    fn from(error: &KvError) -> Self {
        Self::new(ErrorKind::Storage, error.to_string())
    }
}

impl From<&KeyValueError> for AppError {
    fn from(error: &KeyValueError) -> Self {
        Self::from(&KvError::from(error))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

// FastAPI reports errors as {"detail": ...}; other servers use "message".
#[derive(Debug, Clone, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}
