use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::capabilities::{HttpResult, KvResult};
use crate::model::{Attempt, FetchTicket, PollHandle};
use crate::MAX_SERVICE_NAME_LENGTH;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventLevel {
    Error,
    Warn,
    Info,
}

impl EventLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Self::Error),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "INFO" => Ok(Self::Info),
            other => Err(format!("unknown level '{other}', expected ERROR, WARN or INFO")),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("service name is required")]
    EmptyService,

    #[error("service name exceeds {max} characters")]
    ServiceTooLong { max: usize },

    #[error("message is required")]
    EmptyMessage,
}

/// Body of `POST /api/v1/events`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEvent {
    pub service: String,
    pub level: EventLevel,
    pub message: String,
}

impl TestEvent {
    pub fn new(service: impl Into<String>, level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            level,
            message: message.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let service = self.service.trim();
        if service.is_empty() {
            return Err(ValidationError::EmptyService);
        }
        if service.chars().count() > MAX_SERVICE_NAME_LENGTH {
            return Err(ValidationError::ServiceTooLong {
                max: MAX_SERVICE_NAME_LENGTH,
            });
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(())
    }
}

/// Inputs to the core. Variants carrying capability results stay inside
/// the core and are never serialized.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Event {
    Noop,

    // lifecycle
    AppStarted {
        default_api_base: String,
    },
    #[serde(skip)]
    ApiOverrideLoaded(Box<KvResult>),
    ViewDetached,

    // polling
    StartPolling {
        interval_ms: u64,
    },
    StopPolling {
        handle: PollHandle,
    },
    PollTick {
        handle: PollHandle,
    },
    RefreshRequested,

    // fetch pipeline
    #[serde(skip)]
    IncidentsFetched {
        ticket: FetchTicket,
        attempt: Attempt,
        result: Box<HttpResult>,
    },
    RetryDue {
        ticket: FetchTicket,
    },

    // wake-up
    WakeUpRequested,
    #[serde(skip)]
    HealthChecked {
        base: String,
        result: Box<HttpResult>,
    },
    WarmUpFinished {
        base: String,
    },

    // configuration
    SetApiBase {
        url: String,
    },
    ClearApiBase,
    #[serde(skip)]
    ApiOverridePersisted(Box<KvResult>),

    // test injection
    SendTestEvent(TestEvent),
    SimulateIncident {
        service: String,
        message: String,
        count: u32,
    },
    #[serde(skip)]
    TestEventSent {
        batch: u64,
        result: Box<HttpResult>,
    },

    DismissNotice,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Noop => "noop",
            Event::AppStarted { .. } => "app_started",
            Event::ApiOverrideLoaded(_) => "api_override_loaded",
            Event::ViewDetached => "view_detached",
            Event::StartPolling { .. } => "start_polling",
            Event::StopPolling { .. } => "stop_polling",
            Event::PollTick { .. } => "poll_tick",
            Event::RefreshRequested => "refresh_requested",
            Event::IncidentsFetched { .. } => "incidents_fetched",
            Event::RetryDue { .. } => "retry_due",
            Event::WakeUpRequested => "wake_up_requested",
            Event::HealthChecked { .. } => "health_checked",
            Event::WarmUpFinished { .. } => "warm_up_finished",
            Event::SetApiBase { .. } => "set_api_base",
            Event::ClearApiBase => "clear_api_base",
            Event::ApiOverridePersisted(_) => "api_override_persisted",
            Event::SendTestEvent(_) => "send_test_event",
            Event::SimulateIncident { .. } => "simulate_incident",
            Event::TestEventSent { .. } => "test_event_sent",
            Event::DismissNotice => "dismiss_notice",
        }
    }

    /// Events a person triggers, as opposed to answers from the shell.
    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Event::RefreshRequested
                | Event::WakeUpRequested
                | Event::SetApiBase { .. }
                | Event::ClearApiBase
                | Event::SendTestEvent(_)
                | Event::SimulateIncident { .. }
                | Event::DismissNotice
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_wire_format() {
        let event = TestEvent::new("payment-service", EventLevel::Error, "Database connection timeout");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "service": "payment-service",
                "level": "ERROR",
                "message": "Database connection timeout"
            })
        );
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("warn".parse::<EventLevel>(), Ok(EventLevel::Warn));
        assert_eq!(" Info ".parse::<EventLevel>(), Ok(EventLevel::Info));
        assert!("debug".parse::<EventLevel>().is_err());
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            TestEvent::new("  ", EventLevel::Error, "boom").validate(),
            Err(ValidationError::EmptyService)
        );
        assert_eq!(
            TestEvent::new("x".repeat(101), EventLevel::Error, "boom").validate(),
            Err(ValidationError::ServiceTooLong { max: 100 })
        );
        assert_eq!(
            TestEvent::new("auth-api", EventLevel::Info, "").validate(),
            Err(ValidationError::EmptyMessage)
        );
        assert!(TestEvent::new("x".repeat(100), EventLevel::Warn, "ok")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_user_initiated() {
        assert!(Event::WakeUpRequested.is_user_initiated());
        assert!(!Event::PollTick {
            handle: PollHandle(1)
        }
        .is_user_initiated());
        assert_eq!(Event::ClearApiBase.name(), "clear_api_base");
    }
}
