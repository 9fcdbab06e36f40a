use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

pub use crux_http::HttpError;

const MAX_URL_LENGTH: usize = 2048;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// What an HTTP callback receives from `crux_http`.
pub type HttpResult = crux_http::Result<crux_http::Response<Vec<u8>>>;

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("invalid URL '{url}': {reason}")]
pub struct UrlError {
    pub url: String,
    pub reason: String,
}

/// An absolute `http`/`https` URL with a host and no embedded credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HttpUrl(Url);

impl HttpUrl {
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let bad = |reason: String| UrlError {
            url: input.chars().take(100).collect(),
            reason,
        };

        if input.trim().is_empty() {
            return Err(bad("empty".into()));
        }
        if input.len() > MAX_URL_LENGTH {
            return Err(bad(format!("longer than {MAX_URL_LENGTH} bytes")));
        }

        let url = Url::parse(input).map_err(|e| bad(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(bad(format!("unsupported scheme '{other}'"))),
        }
        if url.host_str().is_none() {
            return Err(bad("no host".into()));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(bad("credentials are not allowed".into()));
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Lowercased host; IPv6 hosts keep their brackets.
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    pub fn is_loopback(&self) -> bool {
        let host = self.host();
        host == "localhost"
            || host.ends_with(".localhost")
            || host == "0.0.0.0"
            || host == "[::1]"
            || host.starts_with("127.")
    }
}

impl TryFrom<String> for HttpUrl {
    type Error = UrlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HttpUrl> for String {
    fn from(url: HttpUrl) -> Self {
        url.0.into()
    }
}

impl fmt::Display for HttpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// How an exchange ended, whichever way the shell reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a> {
    Success(&'a [u8]),
    Status { status: u16, body: &'a [u8] },
    Failed(&'a HttpError),
}

impl<'a> Reply<'a> {
    pub fn of(result: &'a HttpResult) -> Self {
        match result {
            Ok(response) => {
                let status = u16::from(response.status());
                let body = response.body().map(Vec::as_slice).unwrap_or_default();
                if (200..300).contains(&status) {
                    Reply::Success(body)
                } else {
                    Reply::Status { status, body }
                }
            }
            Err(HttpError::Http { code, body, .. }) => Reply::Status {
                status: u16::from(*code),
                body: body.as_deref().unwrap_or_default(),
            },
            Err(e) => Reply::Failed(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }
}

/// Failures a sleeping backend produces while it spins up.
pub fn is_transient(error: &HttpError) -> bool {
    matches!(error, HttpError::Io(_) | HttpError::Timeout)
}

pub fn describe(error: &HttpError) -> String {
    match error {
        HttpError::Io(message) => message.clone(),
        HttpError::Timeout => "request timed out".into(),
        other => other.to_string(),
    }
}
