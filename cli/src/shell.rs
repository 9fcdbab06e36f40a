//! Executes core effects against the network, the clock and the settings file.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use anyhow::Result;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use crux_http::HttpError;
use shared::capabilities::{TimeOperation, TimeResponse, TimerPurpose, REQUEST_ID_HEADER};
use shared::endpoint::request_timeout;
use shared::{Core, Effect, Event, Request, ViewModel};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::render::render;
use crate::store::FileStore;

/// Requests the core is waiting on, kept until their task reports back.
enum Pending {
    Http(Request<HttpRequest>),
    Time(Request<TimeOperation>),
}

enum Completion {
    Http { id: u64, result: HttpResult },
    Time { id: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stop {
    Idle,
    Interrupted,
    TickLimit,
}

pub struct Shell {
    core: Core,
    client: reqwest::Client,
    store: FileStore,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    pending: HashMap<u64, Pending>,
    next_id: u64,
    ticks: u32,
    live: bool,
    last_rendered: Option<ViewModel>,
}

impl Shell {
    /// `live` prints every distinct view as it changes.
    pub fn new(core: Core, store: FileStore, live: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("opsai/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            core,
            client,
            store,
            tx,
            rx,
            pending: HashMap::new(),
            next_id: 0,
            ticks: 0,
            live,
            last_rendered: None,
        })
    }

    pub fn view(&self) -> ViewModel {
        self.core.view()
    }

    pub fn dispatch(&mut self, event: Event) -> Result<()> {
        let effects = self.core.process_event(event);
        self.execute(effects)
    }

    /// Drives effects until nothing is in flight, Ctrl-C, or `max_ticks`
    /// poll ticks have fired.
    pub async fn run(&mut self, max_ticks: Option<u32>) -> Result<Stop> {
        loop {
            if self.pending.is_empty() {
                return Ok(Stop::Idle);
            }
            if max_ticks.is_some_and(|limit| self.ticks >= limit) {
                return Ok(Stop::TickLimit);
            }

            tokio::select! {
                completion = self.rx.recv() => {
                    let Some(completion) = completion else {
                        return Ok(Stop::Idle);
                    };
                    self.complete(completion)?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    return Ok(Stop::Interrupted);
                }
            }
        }
    }

    fn complete(&mut self, completion: Completion) -> Result<()> {
        let (id, result) = match completion {
            Completion::Http { id, result } => (id, Some(result)),
            Completion::Time { id } => (id, None),
        };
        let Some(pending) = self.pending.remove(&id) else {
            debug!(id, "completion for unknown request dropped");
            return Ok(());
        };

        let effects = match (pending, result) {
            (Pending::Http(mut request), Some(result)) => self.core.resolve(&mut request, result),
            (Pending::Time(mut request), None) => {
                if counts_as_tick(&request.operation) {
                    self.ticks += 1;
                }
                self.core.resolve(&mut request, TimeResponse::Elapsed)
            }
            (Pending::Http(_), None) | (Pending::Time(_), Some(_)) => {
                anyhow::bail!("completion {id} does not match its request")
            }
        };
        self.execute(effects)
    }

    fn execute(&mut self, effects: Vec<Effect>) -> Result<()> {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut needs_render = false;

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Http(request) => self.spawn_http(request),
                Effect::Time(request) => self.spawn_timer(request),
                Effect::KeyValue(mut request) => {
                    let output = self.store.execute(&request.operation);
                    queue.extend(self.core.resolve(&mut request, output));
                }
                Effect::Render(_) => needs_render = true,
            }
        }

        if needs_render && self.live {
            self.print_if_changed();
        }
        Ok(())
    }

    fn track(&mut self, pending: Pending) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, pending);
        id
    }

    fn spawn_http(&mut self, request: Request<HttpRequest>) {
        let operation = request.operation.clone();
        let id = self.track(Pending::Http(request));
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = send(&client, &operation).await;
            if tx.send(Completion::Http { id, result }).is_err() {
                debug!("shell gone, http result dropped");
            }
        });
    }

    fn spawn_timer(&mut self, request: Request<TimeOperation>) {
        let duration = request.operation.duration();
        let id = self.track(Pending::Time(request));
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if tx.send(Completion::Time { id }).is_err() {
                debug!("shell gone, timer dropped");
            }
        });
    }

    fn print_if_changed(&mut self) {
        let view = self.core.view();
        if self.last_rendered.as_ref() != Some(&view) {
            println!("{}", render(&view));
            self.last_rendered = Some(view);
        }
    }
}

/// Retry timers share the poll interval's duration but are not ticks.
fn counts_as_tick(operation: &TimeOperation) -> bool {
    operation.purpose() == TimerPurpose::PollTick
}

async fn send(client: &reqwest::Client, request: &HttpRequest) -> HttpResult {
    match exchange(client, request).await {
        Ok(response) => HttpResult::Ok(response),
        Err(error) => {
            warn!(
                url = %request.url,
                request_id = request_id(request).unwrap_or("-"),
                error = %error,
                "http request failed"
            );
            HttpResult::Err(error)
        }
    }
}

async fn exchange(client: &reqwest::Client, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
    let started = Instant::now();
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|e| HttpError::Url(format!("unsupported method {}: {e}", request.method)))?;

    let mut builder = client
        .request(method, request.url.as_str())
        .timeout(request_timeout(&request.url));
    for header in &request.headers {
        builder = builder.header(header.name.as_str(), header.value.as_str());
    }
    if !request.body.is_empty() {
        builder = builder.body(request.body.clone());
    }

    let response = builder.send().await.map_err(|e| classify(&e, request))?;
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(|e| classify(&e, request))?;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    debug!(
        method = %request.method,
        url = %request.url,
        request_id = request_id(request).unwrap_or("-"),
        status,
        elapsed_ms,
        "http exchange"
    );
    Ok(HttpResponse::status(status).body(body.to_vec()).build())
}

fn request_id(request: &HttpRequest) -> Option<&str> {
    request
        .headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(REQUEST_ID_HEADER))
        .map(|header| header.value.as_str())
}

fn classify(error: &reqwest::Error, request: &HttpRequest) -> HttpError {
    if error.is_timeout() {
        return HttpError::Timeout;
    }
    let message = error_chain(error);
    let host = reqwest::Url::parse(&request.url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| request.url.clone());

    if error.is_connect() {
        if message.contains("dns error") || message.contains("failed to lookup address") {
            HttpError::Io(format!("cannot resolve {host}: {message}"))
        } else {
            HttpError::Io(format!("cannot connect to {host}: {message}"))
        }
    } else {
        HttpError::Io(format!("bad response from {host}: {message}"))
    }
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
