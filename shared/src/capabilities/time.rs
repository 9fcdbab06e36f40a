use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why a timer was set. Shells use it to tell poll ticks from retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerPurpose {
    PollTick,
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeOperation {
    NotifyAfter {
        duration_ms: u64,
        purpose: TimerPurpose,
    },
}

impl TimeOperation {
    pub fn duration(self) -> Duration {
        let TimeOperation::NotifyAfter { duration_ms, .. } = self;
        Duration::from_millis(duration_ms)
    }

    pub fn purpose(self) -> TimerPurpose {
        let TimeOperation::NotifyAfter { purpose, .. } = self;
        purpose
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeResponse {
    Elapsed,
}

impl Operation for TimeOperation {
    type Output = TimeResponse;
}

/// Timers are owned by the shell so tests can step time by hand.
pub struct Time<Ev> {
    context: CapabilityContext<TimeOperation, Ev>,
}

impl<Ev> Capability<Ev> for Time<Ev> {
    type Operation = TimeOperation;
    type MappedSelf<MappedEv> = Time<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Time::new(self.context.map_event(f))
    }
}

impl<Ev> Time<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<TimeOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn notify_after<F>(&self, duration: Duration, purpose: TimerPurpose, make_event: F)
    where
        F: FnOnce(TimeResponse) -> Ev + Send + 'static,
    {
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let operation = TimeOperation::NotifyAfter {
            duration_ms,
            purpose,
        };

        let context = self.context.clone();
        self.context.spawn(async move {
            let response = context.request_from_shell(operation).await;
            context.update_app(make_event(response));
        });
    }
}
