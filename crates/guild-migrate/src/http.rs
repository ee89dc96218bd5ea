//! Minimal JSON REST client shared by the reader and the adapters.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` so the async
//! runtime is never blocked. Every response is run through [`classify`],
//! which turns HTTP status codes into [`AdapterError`] kinds the retry policy
//! and the orchestrator understand.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::{AdapterError, AdapterResult};

const SNIPPET_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Put => "PUT",
        };
        f.write_str(label)
    }
}

/// Unit of the wait a platform puts in its 429 body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfterUnit {
    Seconds,
    Milliseconds,
}

/// Where a platform reports how long to wait after a 429.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHint {
    /// JSON body field, e.g. `retry_after`.
    pub field: &'static str,
    pub unit: RetryAfterUnit,
}

impl RateLimitHint {
    pub const fn new(field: &'static str, unit: RetryAfterUnit) -> Self {
        Self { field, unit }
    }

    fn wait_from_body(&self, body: &str) -> Option<Duration> {
        let value: Value = serde_json::from_str(body).ok()?;
        let amount = value.get(self.field)?.as_f64()?;
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        let secs = match self.unit {
            RetryAfterUnit::Seconds => amount,
            RetryAfterUnit::Milliseconds => amount / 1000.0,
        };
        Some(Duration::from_secs_f64(secs))
    }
}

/// Blocking HTTP agent plus the per-platform details every call shares.
#[derive(Clone)]
pub struct RestClient {
    platform: &'static str,
    base_url: String,
    agent: ureq::Agent,
    headers: Vec<(String, String)>,
    rate_limit: RateLimitHint,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // headers carry credentials
        f.debug_struct("RestClient")
            .field("platform", &self.platform)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl RestClient {
    pub fn new(
        platform: &'static str,
        base_url: &str,
        timeout: Duration,
        rate_limit: RateLimitHint,
    ) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            platform,
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
            headers: Vec::new(),
            rate_limit,
        }
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn platform(&self) -> &'static str {
        self.platform
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str) -> AdapterResult<Value> {
        self.request(Method::Get, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> AdapterResult<Value> {
        self.request(Method::Post, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> AdapterResult<Value> {
        self.request(Method::Patch, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> AdapterResult<Value> {
        self.request(Method::Put, path, Some(body)).await
    }

    /// Send one request and classify the outcome. `path` is appended to the
    /// base URL and must start with `/`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AdapterResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let agent = self.agent.clone();
        let headers = self.headers.clone();
        let rate_limit = self.rate_limit;
        let context = format!("{} {} {}", self.platform, method, path);

        debug!("{}", context);

        tokio::task::spawn_blocking(move || {
            let mut response = match send(&agent, method, &url, &headers, body) {
                Ok(response) => response,
                Err(e) => return Err(transport_error(&context, e)),
            };

            let status = response.status().as_u16();
            let retry_after_header = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = response
                .body_mut()
                .read_to_string()
                .map_err(|e| transport_error(&context, e))?;

            classify(
                &context,
                status,
                retry_after_header.as_deref(),
                &text,
                rate_limit,
            )
        })
        .await
        .map_err(|e| AdapterError::fatal(format!("request task failed: {}", e)))?
    }
}

fn with_headers<B>(
    mut request: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

fn send(
    agent: &ureq::Agent,
    method: Method,
    url: &str,
    headers: &[(String, String)],
    body: Option<Value>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match method {
        Method::Get => with_headers(agent.get(url), headers).call(),
        Method::Post => send_body(with_headers(agent.post(url), headers), body),
        Method::Patch => send_body(with_headers(agent.patch(url), headers), body),
        Method::Put => send_body(with_headers(agent.put(url), headers), body),
    }
}

fn send_body(
    request: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<Value>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => request.send_json(&body),
        None => request.send_empty(),
    }
}

fn transport_error(context: &str, err: ureq::Error) -> AdapterError {
    match err {
        ureq::Error::BadUri(uri) => AdapterError::fatal(format!("{}: bad URI '{}'", context, uri)),
        other => AdapterError::retryable(format!("{}: {}", context, other)),
    }
}

/// Turn a status and body into a value or a classified error.
///
/// - 2xx: parsed JSON body (`Null` when empty or not JSON)
/// - 429: retryable, with the platform's wait from the body or `Retry-After`
/// - 401, 403: fatal
/// - 5xx: retryable
/// - anything else: rejected
pub fn classify(
    context: &str,
    status: u16,
    retry_after_header: Option<&str>,
    body: &str,
    rate_limit: RateLimitHint,
) -> AdapterResult<Value> {
    match status {
        200..=299 => {
            if body.trim().is_empty() {
                Ok(Value::Null)
            } else {
                Ok(serde_json::from_str(body).unwrap_or(Value::Null))
            }
        }
        429 => {
            let wait = rate_limit.wait_from_body(body).or_else(|| {
                retry_after_header
                    .and_then(|h| h.trim().parse::<f64>().ok())
                    .filter(|s| s.is_finite() && *s >= 0.0)
                    .map(Duration::from_secs_f64)
            });
            Err(AdapterError::rate_limited(
                format!("{}: rate limited (HTTP 429)", context),
                wait,
            ))
        }
        401 | 403 => Err(AdapterError::fatal(format!(
            "{}: not authorized (HTTP {}): {}",
            context,
            status,
            snippet(body)
        ))),
        500..=599 => Err(AdapterError::retryable(format!(
            "{}: server error (HTTP {}): {}",
            context,
            status,
            snippet(body)
        ))),
        _ => Err(AdapterError::rejected(format!(
            "{}: HTTP {}: {}",
            context,
            status,
            snippet(body)
        ))),
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= SNIPPET_LEN {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(SNIPPET_LEN).collect();
        format!("{}...", cut)
    }
}

/// Pull a string id out of a response body, trying each field in turn.
pub fn id_field(value: &Value, fields: &[&str], context: &str) -> AdapterResult<String> {
    fields
        .iter()
        .find_map(|f| value.get(*f).and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| {
            AdapterError::rejected(format!(
                "{}: response has no {} field",
                context,
                fields.join("/")
            ))
        })
}
