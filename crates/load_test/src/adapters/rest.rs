// Rust guideline compliant 2026-10-18

//! `Operation` adapter for plain HTTP/REST targets.
//!
//! Latency runs until the response headers arrive; transfer time covers
//! reading the body. Outcomes that never produced a status use sentinels:
//! `-1` when the request could not be built, `444` when no response came
//! back, `411` for a PUT without a positive size.

use crate::http_codes::{is_bad_get, is_bad_put};
use crate::payload::Payload;
use bytes::Bytes;
use domain::{Measurement, Operation, OperationError, Operator};
use reqwest::{Client, Method, Request, RequestBuilder, Response};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

/// Idle connections kept per host; sized for several hundred requests/s.
const MAX_IDLE_PER_HOST: usize = 100;

/// CDN debugging directives sent as `Pragma` when requested.
const AKAMAI_PRAGMA: &str = "akamai-x-cache-on, akamai-x-cache-remote-on, \
akamai-x-check-cacheable, akamai-x-get-cache-key, akamai-x-get-ssl-client-session-id, \
akamai-x-get-true-cache-key, akamai-x-get-request-id";

// ---------------------------------------------------------------------------
// RestOptions
// ---------------------------------------------------------------------------

/// Header overrides and diagnostics for REST requests.
#[derive(Debug, Clone, Default)]
pub struct RestOptions {
    /// Value of the `Host` header, if overridden.
    pub host_header: Option<String>,
    /// Extra headers added to every request.
    pub headers: Vec<(String, String)>,
    /// Leave caching alone instead of sending `cache-control: no-cache`.
    pub allow_cache: bool,
    /// Ask a CDN for its debugging headers.
    pub akamai_debug: bool,
    /// Dump every exchange, not only the bad ones.
    pub verbose: bool,
}

impl RestOptions {
    /// Parse a space-separated list of `key:value` headers.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Setup`] for an item that is not exactly one
    /// non-empty key and one non-empty value.
    pub fn parse_headers(list: &str) -> Result<Vec<(String, String)>, OperationError> {
        list.split_whitespace()
            .map(|item| {
                let mut parts = item.split(':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(key), Some(value), None) if !key.is_empty() && !value.is_empty() => {
                        Ok((key.to_owned(), value.to_owned()))
                    }
                    _ => Err(OperationError::Setup {
                        reason: format!("headers must be key:value pairs, found {item:?}"),
                    }),
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// RestOperation
// ---------------------------------------------------------------------------

/// REST protocol over a pooled HTTP client.
#[derive(Debug)]
pub struct RestOperation {
    client: Client,
    base: String,
    options: RestOptions,
    payload: Option<Arc<Payload>>,
}

impl RestOperation {
    /// Target `base` (scheme optional, `http` assumed). PUT bodies are taken
    /// from `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::Setup`] if the HTTP client cannot be built.
    pub fn new(
        base: &str,
        options: RestOptions,
        payload: Option<Arc<Payload>>,
    ) -> Result<Self, OperationError> {
        let client = Client::builder()
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()
            .map_err(|e| OperationError::Setup {
                reason: format!("cannot build http client: {e}"),
            })?;
        let base = if base.contains("://") {
            base.trim_end_matches('/').to_owned()
        } else {
            format!("http://{}", base.trim_end_matches('/'))
        };
        Ok(Self {
            client,
            base,
            options,
            payload,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn decorate(&self, mut request: RequestBuilder) -> RequestBuilder {
        if !self.options.allow_cache {
            request = request.header(reqwest::header::CACHE_CONTROL, "no-cache");
        }
        if let Some(host) = &self.options.host_header {
            request = request.header(reqwest::header::HOST, host);
        }
        if self.options.akamai_debug {
            request = request.header(reqwest::header::PRAGMA, AKAMAI_PRAGMA);
        }
        for (key, value) in &self.options.headers {
            request = request.header(key, value);
        }
        request
    }

    /// Perform one timed exchange. `sent` is the byte count reported for
    /// uploads; downloads report the body length.
    async fn exchange(
        &self,
        method: Method,
        operator: Operator,
        path: &str,
        body: Option<Bytes>,
        sent: u64,
    ) -> Measurement {
        let mut builder = self.decorate(self.client.request(method, self.url(path)));
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let request = match builder.build() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("rest.request.invalid: {operator} {path}: {e}");
                return Measurement::rejected(path, operator, -1);
            }
        };
        let request_text = describe_request(&request);

        let started = SystemTime::now();
        let initial = Instant::now();
        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("rest.exchange.dump: no response, {e}\n{request_text}");
                return Measurement {
                    started,
                    latency: initial.elapsed(),
                    transfer_time: Duration::ZERO,
                    bytes: 0,
                    path: path.to_owned(),
                    status: 444,
                    operator,
                    failed: true,
                };
            }
        };
        let latency = initial.elapsed();
        let status = i32::from(response.status().as_u16());
        let response_text = describe_response(&response);

        let read = response.bytes().await;
        let transfer_time = initial.elapsed().saturating_sub(latency);
        let bad = match operator {
            Operator::Get => is_bad_get(status),
            _ => is_bad_put(status),
        };
        let (received, read_failed) = match &read {
            Ok(content) => (content.len() as u64, false),
            Err(e) => {
                tracing::warn!(
                    "rest.exchange.dump: error reading response, {e}\n{request_text}\n{response_text}"
                );
                (0, true)
            }
        };
        if !read_failed {
            if bad {
                tracing::warn!(
                    "rest.exchange.dump: returned an error\n{request_text}\n{response_text}body length: {received}"
                );
            } else if self.options.verbose {
                tracing::info!(
                    "rest.exchange.dump: verbose\n{request_text}\n{response_text}body length: {received}"
                );
            }
        }

        Measurement {
            started,
            latency,
            transfer_time,
            bytes: if operator == Operator::Get { received } else { sent },
            path: path.to_owned(),
            status,
            operator,
            failed: bad || read_failed,
        }
    }
}

fn describe_request(request: &Request) -> String {
    let mut text = format!("request: {} {}\n", request.method(), request.url());
    for (name, value) in request.headers() {
        text.push_str(&format!("    {name}: {}\n", value.to_str().unwrap_or("<binary>")));
    }
    text
}

fn describe_response(response: &Response) -> String {
    let mut text = format!(
        "response: {}\n    content-length: {:?}\n",
        response.status(),
        response.content_length()
    );
    for (name, value) in response.headers() {
        text.push_str(&format!("    {name}: {}\n", value.to_str().unwrap_or("<binary>")));
    }
    text
}

impl Operation for RestOperation {
    fn name(&self) -> &str {
        "rest"
    }

    async fn init(&self) -> Result<(), OperationError> {
        tracing::info!("rest.init: base={}", self.base);
        Ok(())
    }

    async fn get(&self, path: &str, _expected: Option<i32>) -> Measurement {
        self.exchange(Method::GET, Operator::Get, path, None, 0).await
    }

    async fn put(&self, path: &str, size: i64, _expected: Option<i32>) -> Measurement {
        let Some(size) = u64::try_from(size).ok().filter(|&size| size > 0) else {
            let mut m = Measurement::rejected(path, Operator::Put, 411);
            m.failed = false;
            return m;
        };
        let Some(payload) = &self.payload else {
            tracing::warn!("rest.put.rejected: no write payload prepared, path={path}");
            return Measurement::rejected(path, Operator::Put, -1);
        };
        let body = payload.read(size);
        let sent = body.len() as u64;
        self.exchange(Method::PUT, Operator::Put, path, Some(body), sent)
            .await
    }

    async fn post(&self, path: &str, _size: i64, _expected: Option<i32>, body: &str) -> Measurement {
        let sent = body.len() as u64;
        self.exchange(Method::POST, Operator::Post, path, Some(Bytes::copy_from_slice(body.as_bytes())), sent)
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
