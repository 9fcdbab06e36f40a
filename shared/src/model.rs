use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::endpoint::EndpointConfig;
use crate::stats::Stats;
use crate::view::{InjectionSummary, SettingsOutcome};
use crate::AppError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IncidentId(pub i64);

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    P1,
    P2,
    P3,
}

impl Severity {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            "P3" => Some(Self::P3),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
    #[serde(other)]
    Unknown,
}

impl IncidentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Investigating => "investigating",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One incident as listed by `GET /api/v1/incidents`. Read-only on the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub service: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_severity")]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub summary: Option<String>,
    pub status: IncidentStatus,
    pub created_at: String,
    #[serde(default)]
    pub event_count: u32,
}

// Severities outside P1..P3 show up as "unclassified" instead of failing the whole list.
fn lenient_severity<'de, D>(deserializer: D) -> Result<Option<Severity>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Severity::parse))
}

/// Identifies one fetch chain (the first attempt and its single retry).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FetchTicket(pub u64);

impl fmt::Display for FetchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch-{}", self.0)
    }
}

/// Cancellation handle of a polling session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PollHandle(pub u64);

impl fmt::Display for PollHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poll-{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attempt {
    First,
    Retry,
}

impl Attempt {
    pub fn index(self) -> u8 {
        match self {
            Attempt::First => 0,
            Attempt::Retry => 1,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchState {
    #[default]
    Loading,
    Ready {
        incidents: Vec<Incident>,
        stats: Stats,
    },
    Error {
        message: String,
        recoverable: bool,
    },
}

impl FetchState {
    pub fn ready(incidents: Vec<Incident>) -> Self {
        let stats = crate::stats::aggregate(&incidents);
        Self::Ready { incidents, stats }
    }

    pub fn error(message: impl Into<String>, recoverable: bool) -> Self {
        Self::Error {
            message: message.into(),
            recoverable,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Last list that loaded successfully, kept on screen while an error is shown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentSnapshot {
    pub incidents: Vec<Incident>,
    pub stats: Stats,
    pub ticket: FetchTicket,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSession {
    pub handle: PollHandle,
    pub interval_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionBatch {
    pub id: u64,
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub simulated: bool,
}

impl InjectionBatch {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub endpoint: EndpointConfig,
    pub config_loaded: bool,
    pub fetch_state: FetchState,
    pub last_good: Option<IncidentSnapshot>,
    pub last_error: Option<AppError>,

    pub next_ticket: u64,
    pub applied_ticket: Option<FetchTicket>,

    pub polling: Option<PollSession>,
    pub next_poll_handle: u64,
    pub fetch_deferred: bool,

    pub waking: bool,
    pub wake_deferred: bool,

    pub injection: Option<InjectionBatch>,
    pub next_batch_id: u64,
    pub last_injection: Option<InjectionSummary>,

    pub settings_outcome: Option<SettingsOutcome>,

    pub notice: Option<String>,
    pub detached: bool,
}

impl Model {
    pub fn new(default_api_base: impl Into<String>) -> Self {
        Self {
            endpoint: EndpointConfig::new(default_api_base),
            ..Self::default()
        }
    }

    pub fn issue_ticket(&mut self) -> FetchTicket {
        self.next_ticket += 1;
        FetchTicket(self.next_ticket)
    }

    /// A result is current unless a newer chain has already been shown.
    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        self.applied_ticket.map_or(true, |applied| ticket >= applied)
    }

    /// Replaces the fetch state as one step; views never see a half-applied result.
    pub fn apply(&mut self, ticket: FetchTicket, state: FetchState) {
        if let FetchState::Ready { incidents, stats } = &state {
            self.last_good = Some(IncidentSnapshot {
                incidents: incidents.clone(),
                stats: *stats,
                ticket,
            });
            self.last_error = None;
        }
        self.applied_ticket = Some(ticket);
        self.fetch_state = state;
    }

    /// Starts over after the API base changed: results of chains issued
    /// before this point are dropped when they arrive.
    pub fn reset_fetch(&mut self) {
        let barrier = self.issue_ticket();
        self.applied_ticket = Some(barrier);
        self.fetch_state = FetchState::Loading;
        self.last_good = None;
    }

    pub fn set_error(&mut self, error: AppError) {
        self.last_error = Some(error);
    }

    pub fn is_polling(&self, handle: PollHandle) -> bool {
        self.polling.is_some_and(|session| session.handle == handle)
    }

    pub fn injecting(&self) -> bool {
        self.injection.is_some()
    }
}
