use tracing::{debug, info, warn};

use crate::capabilities::{
    describe, is_transient, new_request_id, stored_text, Capabilities, HttpError, HttpResult,
    HttpUrl, KvResult, Reply, TimerPurpose, UrlError, REQUEST_ID_HEADER,
};
use crate::endpoint::{self, EndpointConfig};
use crate::event::{Event, EventLevel, TestEvent};
use crate::model::{
    Attempt, FetchState, FetchTicket, Incident, InjectionBatch, Model, PollHandle, PollSession,
};
use crate::view::{
    InjectionProgress, InjectionSummary, SettingsOutcome, StatusView, UserFacingError, ViewModel,
};
use crate::{
    AppError, ErrorKind, DEFAULT_POLL_INTERVAL, MAX_SIMULATED_EVENTS, MSG_FETCH_FAILED,
    MSG_WAKING, RETRY_DELAY,
};

#[derive(Default)]
pub struct App;

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let event_name = event.name();

        if model.detached {
            debug!(event = event_name, "view detached, event ignored");
            return;
        }

        if event.is_user_initiated() {
            info!(event = event_name, "user action");
        } else {
            debug!(event = event_name, "event");
        }

        match event {
            Event::Noop => {}

            Event::AppStarted { default_api_base } => {
                model.endpoint = EndpointConfig::new(default_api_base);
                model.config_loaded = false;

                match endpoint::storage_key() {
                    Ok(key) => {
                        caps.kv.get(key.raw(), |result| {
                            Event::ApiOverrideLoaded(Box::new(result))
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "api base key rejected, using default");
                        Self::finish_config_load(model, caps);
                    }
                }
                caps.render.render();
            }

            Event::ApiOverrideLoaded(result) => {
                match stored_text(*result) {
                    Ok(stored) => model.endpoint.restore_override(stored),
                    Err(e) => {
                        warn!(error = %e, "failed to read api base override");
                        model.set_error(AppError::from(&e));
                    }
                }
                Self::finish_config_load(model, caps);
                caps.render.render();
            }

            Event::ViewDetached => {
                if let Some(session) = model.polling.take() {
                    info!(handle = %session.handle, "polling stopped on detach");
                }
                model.fetch_deferred = false;
                model.wake_deferred = false;
                model.detached = true;
            }

            Event::StartPolling { interval_ms } => {
                let interval_ms = if interval_ms == 0 {
                    Self::default_interval_ms()
                } else {
                    interval_ms
                };

                model.next_poll_handle += 1;
                let handle = PollHandle(model.next_poll_handle);
                if let Some(previous) = model.polling.replace(PollSession {
                    handle,
                    interval_ms,
                }) {
                    debug!(previous = %previous.handle, %handle, "poll session replaced");
                }
                info!(%handle, interval_ms, "polling started");

                Self::request_fetch(model, caps);
                Self::schedule_tick(handle, interval_ms, caps);
                caps.render.render();
            }

            Event::StopPolling { handle } => {
                if model.is_polling(handle) {
                    model.polling = None;
                    info!(%handle, "polling stopped");
                    caps.render.render();
                } else {
                    debug!(%handle, "stop for inactive poll handle ignored");
                }
            }

            Event::PollTick { handle } => {
                let Some(session) = model.polling.filter(|s| s.handle == handle) else {
                    debug!(%handle, "tick for inactive poll handle dropped");
                    return;
                };
                Self::request_fetch(model, caps);
                Self::schedule_tick(handle, session.interval_ms, caps);
            }

            Event::RefreshRequested => {
                Self::request_fetch(model, caps);
                caps.render.render();
            }

            Event::IncidentsFetched {
                ticket,
                attempt,
                result,
            } => {
                Self::handle_fetch_response(ticket, attempt, &result, model, caps);
                caps.render.render();
            }

            Event::RetryDue { ticket } => {
                if model.is_current(ticket) {
                    info!(%ticket, "retrying incident fetch");
                    Self::send_fetch(ticket, Attempt::Retry, model, caps);
                } else {
                    debug!(%ticket, "retry for superseded fetch not issued");
                }
            }

            Event::WakeUpRequested => {
                if model.waking {
                    debug!("wake-up already in flight");
                    return;
                }
                model.waking = true;

                if model.config_loaded {
                    Self::check_health(model, caps);
                } else {
                    debug!("wake-up deferred until api base is loaded");
                    model.wake_deferred = true;
                }
                caps.render.render();
            }

            Event::HealthChecked { base, result } => {
                if !model.waking {
                    debug!(%base, "health check without wake-up in flight ignored");
                    return;
                }

                match Reply::of(&result) {
                    Reply::Success(_) => {
                        info!(%base, "backend alive, warming up");
                        let warmed = base.clone();
                        let sent = Self::http_get(&format!("{base}/"), caps, move |_| {
                            Event::WarmUpFinished { base: warmed }
                        });
                        if let Err(e) = sent {
                            debug!(%base, error = %e, "warm-up request skipped");
                            Self::finish_wake(&base, model, caps);
                        }
                    }
                    Reply::Status { status, .. } => {
                        Self::fail_wake(&base, &format!("health returned {status}"), model);
                    }
                    Reply::Failed(e) => Self::fail_wake(&base, &describe(e), model),
                }
                caps.render.render();
            }

            Event::WarmUpFinished { base } => {
                if model.waking {
                    Self::finish_wake(&base, model, caps);
                    caps.render.render();
                }
            }

            Event::SetApiBase { url } => {
                match model.endpoint.set_override(&url) {
                    Ok(Some(stored)) => {
                        info!(api_base = %stored, "api base override saved");
                        Self::persist_override(Some(stored), caps);
                        model.notice = Some("API base saved".into());
                        model.settings_outcome = Some(SettingsOutcome::Saved);
                        Self::restart_after_endpoint_change(model, caps);
                    }
                    Ok(None) => {
                        info!("api base override cleared");
                        Self::persist_override(None, caps);
                        model.notice = Some("API base reset".into());
                        model.settings_outcome = Some(SettingsOutcome::Reset);
                        Self::restart_after_endpoint_change(model, caps);
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "api base rejected");
                        model.notice = Some(format!("invalid API base: {e}"));
                        model.settings_outcome = Some(SettingsOutcome::Rejected);
                        model.set_error(AppError::from(&e));
                    }
                }
                caps.render.render();
            }

            Event::ClearApiBase => {
                model.endpoint.clear_override();
                info!(api_base = %model.endpoint.resolve(), "api base override cleared");
                Self::persist_override(None, caps);
                model.notice = Some("API base reset".into());
                model.settings_outcome = Some(SettingsOutcome::Reset);
                Self::restart_after_endpoint_change(model, caps);
                caps.render.render();
            }

            Event::ApiOverridePersisted(result) => match *result {
                Ok(_) => debug!("api base override persisted"),
                Err(e) => {
                    warn!(error = ?e, "failed to persist api base override");
                    let error = AppError::from(&e);
                    model.notice = Some(format!("failed to save API base: {}", error.message));
                    model.settings_outcome = Some(SettingsOutcome::PersistFailed);
                    model.set_error(error);
                    caps.render.render();
                }
            },

            Event::SendTestEvent(test_event) => {
                if model.injecting() {
                    debug!("injection already in flight");
                    return;
                }
                if let Err(e) = test_event.validate() {
                    debug!(error = %e, "test event rejected");
                    model.notice = Some(e.to_string());
                    model.set_error(AppError::new(ErrorKind::Validation, e.to_string()));
                    caps.render.render();
                    return;
                }

                let batch = Self::open_batch(model, 1, false);
                Self::post_event(batch, &test_event, model, caps);
                caps.render.render();
            }

            Event::SimulateIncident {
                service,
                message,
                count,
            } => {
                if model.injecting() {
                    debug!("injection already in flight");
                    return;
                }
                let template = TestEvent::new(service, EventLevel::Error, message);
                if let Err(e) = template.validate() {
                    debug!(error = %e, "simulation rejected");
                    model.notice = Some(e.to_string());
                    model.set_error(AppError::new(ErrorKind::Validation, e.to_string()));
                    caps.render.render();
                    return;
                }

                let count = count.clamp(1, MAX_SIMULATED_EVENTS);
                info!(service = %template.service, count, "simulating incident");
                let batch = Self::open_batch(model, count, true);
                for i in 1..=count {
                    let event = TestEvent::new(
                        template.service.clone(),
                        EventLevel::Error,
                        format!("{} (#{i})", template.message),
                    );
                    Self::post_event(batch, &event, model, caps);
                }
                caps.render.render();
            }

            Event::TestEventSent { batch, result } => {
                Self::handle_injection_result(batch, Reply::of(&result), model);
                caps.render.render();
            }

            Event::DismissNotice => {
                model.notice = None;
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        let status = match &model.fetch_state {
            FetchState::Loading => StatusView::Loading,
            FetchState::Ready { .. } => StatusView::Ready,
            FetchState::Error {
                message,
                recoverable,
            } => StatusView::Error {
                message: message.clone(),
                recoverable: *recoverable,
            },
        };

        let (incidents, stats, stale) = match (&model.fetch_state, &model.last_good) {
            (FetchState::Ready { incidents, stats }, _) => (incidents.clone(), *stats, false),
            (_, Some(snapshot)) => (snapshot.incidents.clone(), snapshot.stats, true),
            (_, None) => (Vec::new(), crate::Stats::default(), false),
        };

        ViewModel {
            status,
            incidents,
            stats,
            stale,
            error: model.last_error.as_ref().map(UserFacingError::from),
            waking: model.waking,
            injecting: model.injection.as_ref().map(|batch| InjectionProgress {
                completed: batch.completed,
                total: batch.total,
                failed: batch.failed,
            }),
            last_injection: model.last_injection.clone(),
            polling: model.polling.map(|session| session.handle),
            poll_interval_ms: model.polling.map(|session| session.interval_ms),
            api_base: model.endpoint.resolve(),
            api_base_overridden: model.endpoint.is_overridden(),
            default_api_base: model.endpoint.default_base().to_string(),
            docs_url: model.endpoint.docs_url(),
            localhost_warning: model.endpoint.points_at_localhost(),
            settings_outcome: model.settings_outcome,
            notice: model.notice.clone(),
        }
    }
}

impl App {
    fn default_interval_ms() -> u64 {
        u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(u64::MAX)
    }

    /// GET with a fresh request id. The URL is checked before it reaches `crux_http`.
    fn http_get<F>(url: &str, caps: &Capabilities, make_event: F) -> Result<(), UrlError>
    where
        F: FnOnce(HttpResult) -> Event + Send + 'static,
    {
        let url = HttpUrl::parse(url)?;
        caps.http
            .get(url.as_str())
            .header("Accept", "application/json")
            .header(REQUEST_ID_HEADER, new_request_id().as_str())
            .send(make_event);
        Ok(())
    }

    fn finish_config_load(model: &mut Model, caps: &Capabilities) {
        model.config_loaded = true;
        info!(
            api_base = %model.endpoint.resolve(),
            overridden = model.endpoint.is_overridden(),
            "endpoint resolved"
        );
        if std::mem::take(&mut model.wake_deferred) {
            Self::check_health(model, caps);
        }
        if std::mem::take(&mut model.fetch_deferred) {
            Self::start_fetch(model, caps);
        }
    }

    fn schedule_tick(handle: PollHandle, interval_ms: u64, caps: &Capabilities) {
        caps.time.notify_after(
            std::time::Duration::from_millis(interval_ms),
            TimerPurpose::PollTick,
            move |_| Event::PollTick { handle },
        );
    }

    /// Fetches now, or once the stored override has been read.
    fn request_fetch(model: &mut Model, caps: &Capabilities) {
        if model.config_loaded {
            Self::start_fetch(model, caps);
        } else {
            debug!("fetch deferred until api base is loaded");
            model.fetch_deferred = true;
        }
    }

    fn start_fetch(model: &mut Model, caps: &Capabilities) {
        let ticket = model.issue_ticket();
        Self::send_fetch(ticket, Attempt::First, model, caps);
    }

    fn send_fetch(ticket: FetchTicket, attempt: Attempt, model: &mut Model, caps: &Capabilities) {
        let url = model.endpoint.incidents_url();
        debug!(%ticket, attempt = attempt.index(), %url, "fetching incidents");

        let sent = Self::http_get(&url, caps, move |result| Event::IncidentsFetched {
            ticket,
            attempt,
            result: Box::new(result),
        });
        if let Err(e) = sent {
            warn!(%ticket, error = %e, "incident request rejected");
            model.set_error(AppError::from(&e));
            model.apply(ticket, FetchState::error(MSG_FETCH_FAILED, false));
        }
    }

    fn handle_fetch_response(
        ticket: FetchTicket,
        attempt: Attempt,
        result: &HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if !model.is_current(ticket) {
            debug!(%ticket, attempt = attempt.index(), "stale fetch result dropped");
            return;
        }

        match Reply::of(result) {
            Reply::Success(body) => match serde_json::from_slice::<Vec<Incident>>(body) {
                Ok(incidents) => {
                    let state = FetchState::ready(incidents);
                    if let FetchState::Ready { incidents, stats } = &state {
                        info!(
                            %ticket,
                            count = incidents.len(),
                            open = stats.open,
                            investigating = stats.investigating,
                            resolved = stats.resolved,
                            "incidents loaded"
                        );
                    }
                    model.apply(ticket, state);
                }
                Err(e) => {
                    warn!(%ticket, error = %e, "malformed incident list");
                    model.set_error(AppError::new(ErrorKind::Deserialization, e.to_string()));
                    model.apply(ticket, FetchState::error(MSG_FETCH_FAILED, false));
                }
            },
            Reply::Status { status, body } => {
                warn!(%ticket, status, "incident fetch rejected");
                model.set_error(AppError::from_http_status(status, body));
                model.apply(ticket, FetchState::error(MSG_FETCH_FAILED, false));
            }
            Reply::Failed(e) if is_transient(e) && attempt == Attempt::First => {
                warn!(%ticket, error = %describe(e), "backend unreachable, retrying shortly");
                model.set_error(AppError::from(e));
                model.apply(ticket, FetchState::error(MSG_WAKING, true));
                caps.time
                    .notify_after(RETRY_DELAY, TimerPurpose::Retry, move |_| {
                        Event::RetryDue { ticket }
                    });
            }
            Reply::Failed(e) => {
                warn!(%ticket, attempt = attempt.index(), error = %describe(e), "incident fetch failed");
                model.set_error(AppError::from(e));
                model.apply(ticket, FetchState::error(MSG_FETCH_FAILED, false));
            }
        }
    }

    fn check_health(model: &mut Model, caps: &Capabilities) {
        let base = model.endpoint.resolve();
        info!(%base, "waking backend");

        let checked = base.clone();
        let sent = Self::http_get(&model.endpoint.health_url(), caps, move |result| {
            Event::HealthChecked {
                base: checked,
                result: Box::new(result),
            }
        });
        if let Err(e) = sent {
            Self::fail_wake(&base, &e.to_string(), model);
        }
    }

    fn fail_wake(base: &str, reason: &str, model: &mut Model) {
        warn!(%base, reason, "wake-up failed");
        model.waking = false;
        model.set_error(
            AppError::new(ErrorKind::WakeUp, format!("failed to wake backend at {base}"))
                .with_internal(reason)
                .with_context("base", base),
        );
        let ticket = model.issue_ticket();
        model.apply(
            ticket,
            FetchState::error(format!("failed to wake backend at {base}"), false),
        );
    }

    fn finish_wake(base: &str, model: &mut Model, caps: &Capabilities) {
        info!(%base, "warm-up finished, fetching incidents");
        model.waking = false;
        Self::start_fetch(model, caps);
    }

    fn persist_override(value: Option<String>, caps: &Capabilities) {
        let key = match endpoint::storage_key() {
            Ok(key) => key.raw(),
            Err(e) => {
                warn!(error = %e, "api base key rejected, override not persisted");
                return;
            }
        };
        let make_event = |result: KvResult| Event::ApiOverridePersisted(Box::new(result));
        match value {
            Some(value) => caps.kv.set(key, value.into_bytes(), make_event),
            None => caps.kv.delete(key, make_event),
        }
    }

    fn restart_after_endpoint_change(model: &mut Model, caps: &Capabilities) {
        model.reset_fetch();
        model.last_error = None;
        Self::request_fetch(model, caps);
    }

    fn open_batch(model: &mut Model, total: u32, simulated: bool) -> u64 {
        model.next_batch_id += 1;
        let id = model.next_batch_id;
        model.last_injection = None;
        model.injection = Some(InjectionBatch {
            id,
            total,
            completed: 0,
            failed: 0,
            simulated,
        });
        id
    }

    fn post_event(batch: u64, event: &TestEvent, model: &mut Model, caps: &Capabilities) {
        let prepared = HttpUrl::parse(&model.endpoint.events_url())
            .map_err(|e| HttpError::Url(e.to_string()))
            .and_then(|url| {
                serde_json::to_vec(event)
                    .map(|body| (url, body))
                    .map_err(|e| HttpError::Json(e.to_string()))
            });

        match prepared {
            Ok((url, body)) => {
                caps.http
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .header(REQUEST_ID_HEADER, new_request_id().as_str())
                    .body(body)
                    .send(move |result| Event::TestEventSent {
                        batch,
                        result: Box::new(result),
                    });
            }
            Err(e) => Self::handle_injection_result(batch, Reply::Failed(&e), model),
        }
    }

    fn handle_injection_result(batch_id: u64, reply: Reply<'_>, model: &mut Model) {
        let Some(batch) = model.injection.as_mut().filter(|b| b.id == batch_id) else {
            debug!(batch = batch_id, "result for unknown injection batch ignored");
            return;
        };

        batch.completed += 1;
        if !reply.is_success() {
            batch.failed += 1;
        }

        if !batch.simulated {
            let notice = match reply {
                Reply::Success(_) => "event sent".to_string(),
                Reply::Status { status, body } => {
                    format!("failed: {status} {}", String::from_utf8_lossy(body))
                }
                Reply::Failed(e) => format!("error: {}", describe(e)),
            };
            if reply.is_success() {
                info!(batch = batch_id, "test event sent");
            } else {
                warn!(batch = batch_id, notice = %notice, "test event failed");
            }
            model.last_injection = Some(InjectionSummary {
                total: batch.total,
                failed: batch.failed,
            });
            model.notice = Some(notice);
            model.injection = None;
            return;
        }

        if batch.is_complete() {
            let (total, failed) = (batch.total, batch.failed);
            let notice = if failed == 0 {
                info!(batch = batch_id, total, "simulation complete");
                format!("simulated {total} ERROR events")
            } else {
                warn!(batch = batch_id, total, failed, "simulation partly failed");
                format!("some requests failed ({failed}/{total})")
            };
            model.last_injection = Some(InjectionSummary { total, failed });
            model.notice = Some(notice);
            model.injection = None;
        }
    }
}
