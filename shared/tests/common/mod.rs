#![allow(dead_code)]

use crux_core::capability::Operation;
use crux_core::testing::{AppTester, Update};
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use crux_http::HttpError;
use crux_kv::error::KeyValueError;
use crux_kv::value::Value;
use crux_kv::{KeyValueOperation, KeyValueResponse, KeyValueResult};
use shared::capabilities::{TimeOperation, REQUEST_ID_HEADER};
use shared::{App, Effect, Event, Model, Request, ViewModel};

pub const BASE: &str = "https://ops.example.com";
pub const STORAGE_KEY: &str = "settings:opsai_api_base";

pub const INCIDENTS_JSON: &str = r#"[
    {"id":1,"service":"payment-service","category":"database","severity":"P1",
     "summary":"Connection pool exhausted","status":"open",
     "created_at":"2024-05-01T10:00:00","event_count":12},
    {"id":2,"service":"auth-api","category":"latency","severity":"P2",
     "summary":"Slow token issuance","status":"resolved",
     "created_at":"2024-05-01T09:00:00","event_count":3},
    {"id":2,"service":"auth-api","category":"latency","severity":"P3",
     "summary":"Slow token issuance","status":"investigating",
     "created_at":"2024-05-01T09:30:00","event_count":5}
]"#;

/// Effects of one step, sorted by capability.
#[derive(Default)]
pub struct Effects {
    pub http: Vec<Request<HttpRequest>>,
    pub kv: Vec<Request<KeyValueOperation>>,
    pub time: Vec<Request<TimeOperation>>,
    pub renders: usize,
}

impl Effects {
    fn from_effects(effects: Vec<Effect>) -> Self {
        let mut sorted = Self::default();
        for effect in effects {
            match effect {
                Effect::Http(request) => sorted.http.push(request),
                Effect::KeyValue(request) => sorted.kv.push(request),
                Effect::Time(request) => sorted.time.push(request),
                Effect::Render(_) => sorted.renders += 1,
            }
        }
        sorted
    }

    pub fn is_empty(&self) -> bool {
        self.http.is_empty() && self.kv.is_empty() && self.time.is_empty() && self.renders == 0
    }

    pub fn only_http(mut self) -> Request<HttpRequest> {
        assert_eq!(self.http.len(), 1, "expected one http request");
        self.http.remove(0)
    }

    pub fn only_kv(mut self) -> Request<KeyValueOperation> {
        assert_eq!(self.kv.len(), 1, "expected one storage request");
        self.kv.remove(0)
    }

    pub fn only_time(mut self) -> Request<TimeOperation> {
        assert_eq!(self.time.len(), 1, "expected one timer");
        self.time.remove(0)
    }
}

/// Drives the app through `AppTester`, feeding the events produced by
/// resolved requests back into `update` the way a shell's core would.
pub struct Harness {
    app: AppTester<App, Effect>,
    pub model: Model,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            app: AppTester::default(),
            model: Model::default(),
        }
    }

    /// App that has finished reading its stored override.
    pub fn started(stored_override: Option<&str>) -> Self {
        let mut harness = Self::new();
        let mut load = harness.start().only_kv();
        harness.resolve(&mut load, stored(stored_override));
        harness
    }

    pub fn start(&mut self) -> Effects {
        let effects = self.send(Event::AppStarted {
            default_api_base: BASE.into(),
        });
        if let Some(load) = effects.kv.first() {
            assert_eq!(load.operation, get_override());
        }
        effects
    }

    pub fn send(&mut self, event: Event) -> Effects {
        let update = self.app.update(event, &mut self.model);
        Effects::from_effects(self.settle(update))
    }

    pub fn resolve<Op: Operation>(&mut self, request: &mut Request<Op>, output: Op::Output) -> Effects {
        let update = self.app.resolve(request, output).expect("request resolves");
        Effects::from_effects(self.settle(update))
    }

    pub fn view(&self) -> ViewModel {
        self.app.view(&self.model)
    }

    fn settle(&mut self, update: Update<Effect, Event>) -> Vec<Effect> {
        let mut effects = update.effects;
        for event in update.events {
            let update = self.app.update(event, &mut self.model);
            effects.extend(self.settle(update));
        }
        effects
    }
}

pub fn url_of(request: &Request<HttpRequest>) -> &str {
    &request.operation.url
}

pub fn header_of<'a>(request: &'a Request<HttpRequest>, name: &str) -> Option<&'a str> {
    request
        .operation
        .headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str())
}

pub fn request_id_of(request: &Request<HttpRequest>) -> String {
    header_of(request, REQUEST_ID_HEADER)
        .expect("request id header")
        .to_string()
}

pub fn body_json(request: &Request<HttpRequest>) -> serde_json::Value {
    serde_json::from_slice(&request.operation.body).expect("json body")
}

pub fn respond(status: u16, body: &str) -> HttpResult {
    HttpResult::Ok(HttpResponse::status(status).body(body.as_bytes().to_vec()).build())
}

pub fn incidents_ok() -> HttpResult {
    respond(200, INCIDENTS_JSON)
}

pub fn empty_ok() -> HttpResult {
    respond(200, "[]")
}

pub fn timeout() -> HttpResult {
    HttpResult::Err(HttpError::Timeout)
}

pub fn refused() -> HttpResult {
    HttpResult::Err(HttpError::Io(
        "cannot connect to ops.example.com: connection refused".into(),
    ))
}

pub fn get_override() -> KeyValueOperation {
    KeyValueOperation::Get {
        key: STORAGE_KEY.into(),
    }
}

pub fn stored(value: Option<&str>) -> KeyValueResult {
    let value = match value {
        Some(value) => Value::Bytes(value.as_bytes().to_vec()),
        None => Value::None,
    };
    KeyValueResult::Ok {
        response: KeyValueResponse::Get { value },
    }
}

pub fn written() -> KeyValueResult {
    KeyValueResult::Ok {
        response: KeyValueResponse::Set {
            previous: Value::None,
        },
    }
}

pub fn deleted() -> KeyValueResult {
    KeyValueResult::Ok {
        response: KeyValueResponse::Delete {
            previous: Value::None,
        },
    }
}

pub fn storage_failure(message: &str) -> KeyValueResult {
    KeyValueResult::Err {
        error: KeyValueError::Io {
            message: message.into(),
        },
    }
}
