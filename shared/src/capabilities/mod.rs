//! Capabilities the core uses to ask the shell for side effects.
//!
//! HTTP, key-value storage and rendering come from Crux. Timers are a small
//! capability of our own so the shell decides how time passes.

mod http;
mod kv;
mod time;

pub use crux_core::render::{Render, RenderOperation};
pub use crux_http::Http;
pub use crux_kv::KeyValue;

pub use self::http::{
    describe, is_transient, new_request_id, HttpError, HttpResult, HttpUrl, Reply, UrlError,
    REQUEST_ID_HEADER,
};
pub use self::kv::{stored_text, KeyNamespace, KeyValueError, KvError, KvKey, KvResult};
pub use self::time::{Time, TimeOperation, TimeResponse, TimerPurpose};

use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub kv: KeyValue<Event>,
    pub time: Time<Event>,
    pub render: Render<Event>,
}
