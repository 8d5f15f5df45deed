//! Single-call HTTP pipeline shared by every operation.
//!
//! A call resolves its path against the base URL, sends JSON, unwraps the
//! backend envelope and turns every failure into one [`ApiError::Request`].
//! Loading and toast side effects are published on the [`EventBus`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::endpoints::{Endpoint, Method};
use crate::error::{ApiError, ConfigError, REQUEST_FAILED};
use crate::event::{Event, EventBus};

/// Uniform wrapper around every backend reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}

/// Whether a call drives the loading indicator and failure toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feedback {
    #[default]
    Visible,
    Silent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub endpoint: Option<Endpoint>,
    pub method: Method,
    pub path: String,
    pub payload: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub feedback: Feedback,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            method,
            path: path.into(),
            payload: None,
            headers: Vec::new(),
            feedback: Feedback::Visible,
        }
    }

    /// Request for a registry endpoint. `path` is the endpoint's own path or,
    /// for templated endpoints, the filled-in one.
    pub fn for_endpoint(endpoint: Endpoint, path: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint),
            ..Self::new(endpoint.method(), path)
        }
    }

    /// Whether the registry marks this request as carrying the session token.
    pub fn requires_auth(&self) -> bool {
        self.endpoint.is_some_and(|e| e.requires_auth())
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Query string for GET/DELETE, JSON body otherwise.
    pub fn payload<P: Serialize + ?Sized>(mut self, payload: &P) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(payload).map_err(|e| ApiError::InvalidInput(e.to_string()))?;
        self.payload = Some(value);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attaches the raw token; `None` sends no header at all.
    pub fn authorization(self, token: Option<String>) -> Self {
        match token {
            Some(token) => self.header(AUTHORIZATION.as_str(), token),
            None => self,
        }
    }

    pub fn silent(mut self) -> Self {
        self.feedback = Feedback::Silent;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    events: EventBus,
    next_id: AtomicU64,
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self::with_client(&config.base_url()?, http))
    }

    pub fn with_client(base_url: &str, http: Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.trim_end_matches('/').to_owned(),
                events: EventBus::new(),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// Issues one call and returns the envelope's `data` decoded as `T`.
    ///
    /// Visible calls publish `LoadingStarted`, then exactly one
    /// `LoadingFinished`, then a `Toast` when the call failed. A call dropped
    /// before completion still publishes its `LoadingFinished`.
    pub async fn send<T: DeserializeOwned>(&self, spec: RequestSpec) -> Result<T, ApiError> {
        let request_id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let events = &self.inner.events;

        let loading = (spec.feedback == Feedback::Visible)
            .then(|| LoadingGuard::start(events, request_id, &spec.path));

        let result = self.execute(request_id, &spec).await;

        if let Some(loading) = loading {
            drop(loading);
            if let Err(e) = &result {
                events.publish(Event::Toast {
                    request_id,
                    message: e.message().to_owned(),
                });
            }
        }
        result
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request_id: u64,
        spec: &RequestSpec,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.inner.base_url, spec.path);
        debug!(request_id, method = %spec.method, path = %spec.path, "sending request");

        let mut builder = self.inner.http.request(spec.method.into(), &url);
        let overrides_content_type = spec
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
        if !overrides_content_type {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        for (name, value) in &spec.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(payload) = &spec.payload {
            if spec.method.payload_in_query() {
                let pairs = query_pairs(payload);
                if !pairs.is_empty() {
                    builder = builder.query(&pairs);
                }
            } else {
                builder = builder.body(payload.to_string());
            }
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(request_id, path = %spec.path, error = %e, "request did not complete");
                return Err(ApiError::network());
            }
        };
        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(request_id, path = %spec.path, error = %e, "failed to read response body");
                return Err(ApiError::network());
            }
        };

        let result = parse_envelope(status, &body);
        match &result {
            Ok(_) => debug!(request_id, status, "request succeeded"),
            Err(e) => warn!(request_id, status, path = %spec.path, error = %e, "request failed"),
        }
        result
    }
}

/// Pairs `LoadingStarted` with exactly one `LoadingFinished`, including when
/// the request future is dropped mid-flight.
struct LoadingGuard<'a> {
    events: &'a EventBus,
    request_id: u64,
}

impl<'a> LoadingGuard<'a> {
    fn start(events: &'a EventBus, request_id: u64, path: &str) -> Self {
        events.publish(Event::LoadingStarted {
            request_id,
            path: path.to_owned(),
        });
        Self { events, request_id }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.events.publish(Event::LoadingFinished {
            request_id: self.request_id,
        });
    }
}

/// Unwraps a response body.
///
/// A `success: false` envelope keeps its message whatever the HTTP status.
/// A missing envelope, a success on a non-2xx status or `data` of the wrong
/// shape are reported as a network failure.
pub fn parse_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, ApiError> {
    let envelope: Envelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(status, error = %e, "response is not an envelope");
            return Err(ApiError::network());
        }
    };

    if !envelope.success {
        let message = envelope
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| REQUEST_FAILED.to_owned());
        debug!(status, code = ?envelope.code, reason = %message, "business error");
        return Err(ApiError::request(message));
    }
    if !(200..300).contains(&status) {
        debug!(status, "successful envelope on a non-2xx response");
        return Err(ApiError::network());
    }

    serde_json::from_value(envelope.data).map_err(|e| {
        debug!(status, error = %e, "envelope data has an unexpected shape");
        ApiError::network()
    })
}

/// Flattens a JSON object into query pairs. Nulls are skipped, strings are
/// sent raw and every other value is rendered as JSON.
fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = payload else {
        debug!("ignoring non-object query payload");
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key.clone(), s.clone())),
            other => Some((key.clone(), other.to_string())),
        })
        .collect()
}
