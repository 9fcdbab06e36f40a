use serde::{Deserialize, Serialize};

use crate::model::{Incident, PollHandle};
use crate::stats::Stats;
use crate::{AppError, ErrorSeverity};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusView {
    #[default]
    Loading,
    Ready,
    Error {
        message: String,
        recoverable: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionProgress {
    pub completed: u32,
    pub total: u32,
    pub failed: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionSummary {
    pub total: u32,
    pub failed: u32,
}

impl InjectionSummary {
    pub fn succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Result of the last API base change.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingsOutcome {
    Saved,
    Reset,
    Rejected,
    PersistFailed,
}

impl SettingsOutcome {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Rejected | Self::PersistFailed)
    }
}

/// Everything a shell needs to draw the dashboard.
///
/// `incidents` and `stats` come from the last successful load. When the
/// current status is an error they are still filled in and `stale` is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewModel {
    pub status: StatusView,
    pub incidents: Vec<Incident>,
    pub stats: Stats,
    pub stale: bool,
    pub error: Option<UserFacingError>,

    pub waking: bool,
    pub injecting: Option<InjectionProgress>,
    pub last_injection: Option<InjectionSummary>,
    pub polling: Option<PollHandle>,
    pub poll_interval_ms: Option<u64>,

    pub api_base: String,
    pub api_base_overridden: bool,
    pub default_api_base: String,
    pub docs_url: String,
    pub localhost_warning: bool,
    pub settings_outcome: Option<SettingsOutcome>,

    pub notice: Option<String>,
}

impl ViewModel {
    /// First `limit` incidents in server order.
    pub fn recent(&self, limit: usize) -> &[Incident] {
        &self.incidents[..self.incidents.len().min(limit)]
    }

    pub fn is_ready(&self) -> bool {
        self.status == StatusView::Ready
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, StatusView::Error { .. })
    }

    pub fn is_busy(&self) -> bool {
        self.waking || self.injecting.is_some()
    }
}
