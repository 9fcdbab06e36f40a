mod common;

use assert_matches::assert_matches;
use common::*;
use shared::capabilities::TimeResponse;
use shared::endpoint::request_timeout;
use shared::{Event, StatusView, HEALTH_TIMEOUT, WARM_UP_TIMEOUT};

#[test]
fn test_health_failure_short_circuits() {
    let mut app = Harness::started(None);

    let mut health = app.send(Event::WakeUpRequested).only_http();
    assert_eq!(url_of(&health), "https://ops.example.com/health");
    assert_eq!(request_timeout(url_of(&health)), HEALTH_TIMEOUT);
    assert!(app.view().waking);

    let effects = app.resolve(&mut health, refused());
    assert!(effects.http.is_empty());

    let view = app.view();
    assert!(!view.waking);
    assert_eq!(
        view.status,
        StatusView::Error {
            message: "failed to wake backend at https://ops.example.com".into(),
            recoverable: false
        }
    );
    assert_eq!(
        view.error.map(|e| e.error_code),
        Some("WAKE_UP_FAILED".to_string())
    );
}

#[test]
fn test_unhealthy_status_short_circuits() {
    let mut app = Harness::started(None);

    let mut health = app.send(Event::WakeUpRequested).only_http();
    let effects = app.resolve(&mut health, respond(503, "starting"));

    assert!(effects.http.is_empty());
    assert_matches!(app.view().status, StatusView::Error { recoverable: false, .. });
    assert_eq!(
        app.model
            .last_error
            .as_ref()
            .and_then(|e| e.internal_message.as_deref()),
        Some("health returned 503")
    );
}

#[test]
fn test_healthy_backend_is_warmed_then_fetched() {
    let mut app = Harness::started(None);

    let mut health = app.send(Event::WakeUpRequested).only_http();

    let mut warm_up = app
        .resolve(&mut health, respond(200, r#"{"status":"ok"}"#))
        .only_http();
    assert_eq!(url_of(&warm_up), "https://ops.example.com/");
    assert_eq!(request_timeout(url_of(&warm_up)), WARM_UP_TIMEOUT);
    assert!(app.view().waking);

    // warm-up failures are swallowed
    let mut fetch = app.resolve(&mut warm_up, timeout()).only_http();
    assert_eq!(url_of(&fetch), "https://ops.example.com/api/v1/incidents");
    assert!(!app.view().waking);

    app.resolve(&mut fetch, incidents_ok());
    let view = app.view();
    assert_eq!(view.status, StatusView::Ready);
    assert_eq!(view.stats.total, 3);
}

#[test]
fn test_wake_up_fetch_gets_its_own_retry() {
    let mut app = Harness::started(None);

    let mut health = app.send(Event::WakeUpRequested).only_http();
    let mut warm_up = app.resolve(&mut health, respond(204, "")).only_http();
    let mut fetch = app.resolve(&mut warm_up, respond(404, "")).only_http();

    let mut timer = app.resolve(&mut fetch, refused()).only_time();
    let mut retry = app.resolve(&mut timer, TimeResponse::Elapsed).only_http();
    app.resolve(&mut retry, incidents_ok());
    assert!(app.view().is_ready());
}

#[test]
fn test_double_wake_sends_one_health_check() {
    let mut app = Harness::started(None);

    let mut health = app.send(Event::WakeUpRequested).only_http();

    let effects = app.send(Event::WakeUpRequested);
    assert!(effects.http.is_empty());

    app.resolve(&mut health, refused());

    let effects = app.send(Event::WakeUpRequested);
    assert_eq!(effects.http.len(), 1);
}

#[test]
fn test_poll_result_races_with_wake_up() {
    let mut app = Harness::started(None);

    let mut effects = app.send(Event::StartPolling { interval_ms: 10_000 });
    let mut poll_fetch = effects.http.remove(0);

    let mut health = app.send(Event::WakeUpRequested).only_http();
    let mut warm_up = app.resolve(&mut health, respond(200, "")).only_http();
    let mut wake_fetch = app.resolve(&mut warm_up, empty_ok()).only_http();

    app.resolve(&mut wake_fetch, incidents_ok());
    assert_eq!(app.view().incidents.len(), 3);

    // the poll fetch was issued first, so its late answer is stale
    app.resolve(&mut poll_fetch, empty_ok());
    assert_eq!(app.view().incidents.len(), 3);
}

#[test]
fn test_wake_before_override_load_uses_stored_base() {
    let mut app = Harness::new();
    let mut load = app.start().only_kv();

    let effects = app.send(Event::WakeUpRequested);
    assert!(effects.http.is_empty());
    assert!(app.view().waking);

    let mut health = app.resolve(&mut load, stored(Some("https://a.com"))).only_http();
    assert_eq!(url_of(&health), "https://a.com/health");

    let mut warm_up = app.resolve(&mut health, respond(200, "")).only_http();
    assert_eq!(url_of(&warm_up), "https://a.com/");

    let fetch = app.resolve(&mut warm_up, respond(200, "")).only_http();
    assert_eq!(url_of(&fetch), "https://a.com/api/v1/incidents");
}

#[test]
fn test_second_wake_while_deferred_is_ignored() {
    let mut app = Harness::new();
    let mut load = app.start().only_kv();

    app.send(Event::WakeUpRequested);
    let effects = app.send(Event::WakeUpRequested);
    assert!(effects.is_empty());

    let effects = app.resolve(&mut load, stored(None));
    assert_eq!(effects.http.len(), 1);
    assert_eq!(url_of(&effects.http[0]), "https://ops.example.com/health");
}

#[test]
fn test_detach_drops_deferred_wake() {
    let mut app = Harness::new();
    let mut load = app.start().only_kv();

    app.send(Event::WakeUpRequested);
    app.send(Event::ViewDetached);

    let effects = app.resolve(&mut load, stored(Some("https://a.com")));
    assert!(effects.http.is_empty());
}
