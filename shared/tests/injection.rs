mod common;

use common::*;
use shared::endpoint::request_timeout;
use shared::{Event, EventLevel, InjectionSummary, TestEvent, INJECT_TIMEOUT};

#[test]
fn test_send_event_posts_json() {
    let mut app = Harness::started(None);

    let mut post = app
        .send(Event::SendTestEvent(TestEvent::new(
            "payment-service",
            EventLevel::Warn,
            "Database connection timeout",
        )))
        .only_http();
    assert_eq!(post.operation.method, "POST");
    assert_eq!(url_of(&post), "https://ops.example.com/api/v1/events");
    assert_eq!(header_of(&post, "content-type"), Some("application/json"));
    assert_eq!(request_timeout(url_of(&post)), INJECT_TIMEOUT);
    assert_eq!(
        body_json(&post),
        serde_json::json!({
            "service": "payment-service",
            "level": "WARN",
            "message": "Database connection timeout"
        })
    );
    assert!(app.view().injecting.is_some());

    app.resolve(&mut post, respond(201, "{}"));
    let view = app.view();
    assert_eq!(view.notice.as_deref(), Some("event sent"));
    assert!(view.injecting.is_none());
    assert_eq!(
        view.last_injection,
        Some(InjectionSummary {
            total: 1,
            failed: 0
        })
    );
}

#[test]
fn test_send_event_reports_failure() {
    let mut app = Harness::started(None);
    let event = TestEvent::new("auth-api", EventLevel::Error, "boom");

    let mut post = app.send(Event::SendTestEvent(event.clone())).only_http();
    app.resolve(&mut post, respond(500, "Internal Server Error"));
    let view = app.view();
    assert_eq!(view.notice.as_deref(), Some("failed: 500 Internal Server Error"));
    assert!(view.last_injection.is_some_and(|summary| !summary.succeeded()));

    let mut post = app.send(Event::SendTestEvent(event)).only_http();
    app.resolve(&mut post, refused());
    assert_eq!(
        app.view().notice.as_deref(),
        Some("error: cannot connect to ops.example.com: connection refused")
    );
}

#[test]
fn test_invalid_event_is_not_sent() {
    let mut app = Harness::started(None);

    let effects = app.send(Event::SendTestEvent(TestEvent::new(
        "",
        EventLevel::Error,
        "boom",
    )));
    assert!(effects.http.is_empty());
    assert_eq!(app.view().notice.as_deref(), Some("service name is required"));
    assert_eq!(app.view().last_injection, None);

    app.send(Event::DismissNotice);
    assert_eq!(app.view().notice, None);
}

#[test]
fn test_simulate_sends_numbered_errors() {
    let mut app = Harness::started(None);

    let effects = app.send(Event::SimulateIncident {
        service: "payment-service".into(),
        message: "Database connection timeout".into(),
        count: 3,
    });
    let mut posts = effects.http;
    assert_eq!(posts.len(), 3);
    for (i, post) in posts.iter().enumerate() {
        let body = body_json(post);
        assert_eq!(body["level"], "ERROR");
        assert_eq!(
            body["message"],
            format!("Database connection timeout (#{})", i + 1)
        );
    }

    for post in &mut posts {
        assert!(app.view().notice.is_none());
        app.resolve(post, respond(201, "{}"));
    }
    let view = app.view();
    assert_eq!(view.notice.as_deref(), Some("simulated 3 ERROR events"));
    assert!(view.injecting.is_none());
    assert!(view.last_injection.is_some_and(|summary| summary.succeeded()));
}

#[test]
fn test_simulate_reports_partial_failure() {
    let mut app = Harness::started(None);

    let mut posts = app
        .send(Event::SimulateIncident {
            service: "payment-service".into(),
            message: "disk full".into(),
            count: 3,
        })
        .http;
    app.resolve(&mut posts[0], respond(201, "{}"));
    app.resolve(&mut posts[1], timeout());
    let progress = app.view().injecting.unwrap();
    assert_eq!((progress.completed, progress.failed, progress.total), (2, 1, 3));

    app.resolve(&mut posts[2], respond(201, "{}"));
    let view = app.view();
    assert_eq!(view.notice.as_deref(), Some("some requests failed (1/3)"));
    assert_eq!(
        view.last_injection,
        Some(InjectionSummary {
            total: 3,
            failed: 1
        })
    );
}

#[test]
fn test_simulate_count_is_clamped() {
    let mut app = Harness::started(None);

    let mut post = app
        .send(Event::SimulateIncident {
            service: "web".into(),
            message: "x".into(),
            count: 0,
        })
        .only_http();
    app.resolve(&mut post, respond(201, "{}"));

    let effects = app.send(Event::SimulateIncident {
        service: "web".into(),
        message: "x".into(),
        count: 500,
    });
    assert_eq!(effects.http.len(), 100);
}

#[test]
fn test_one_batch_at_a_time() {
    let mut app = Harness::started(None);

    let effects = app.send(Event::SimulateIncident {
        service: "web".into(),
        message: "x".into(),
        count: 2,
    });
    assert_eq!(effects.http.len(), 2);

    let effects = app.send(Event::SendTestEvent(TestEvent::new(
        "web",
        EventLevel::Info,
        "hello",
    )));
    assert!(effects.is_empty());
}
