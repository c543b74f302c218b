//! Generic request execution.
//!
//! # Design
//! Every remote operation funnels through `RequestExecutor::execute`, which
//! runs three steps:
//!
//! 1. `build_request` turns an `Endpoint` plus `RequestParts` into an
//!    `HttpRequest` (pure, no I/O).
//! 2. The `Transport` performs the round-trip. This is the only await that
//!    races against session cancellation.
//! 3. `parse_response` classifies the `HttpResponse` and hands the payload to
//!    the caller-supplied decoder (pure, no I/O).
//!
//! Nothing in here panics or lets an error escape other than as the `Err`
//! half of the returned `Outcome`.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::endpoint::{placeholder_name, Endpoint, ResponseShape};
use crate::error::{ApiError, ConfigError, Outcome};
use crate::http::{HttpRequest, HttpResponse};
use crate::query::{self, QueryFilter};
use crate::token_store::TokenStore;
use crate::transport::Transport;
use crate::types::Envelope;

/// Turns the unwrapped payload into the operation's result type.
pub type Decode<T> = fn(Value) -> Result<T, serde_json::Error>;

/// Stock decoders.
pub mod decode {
    use serde::de::DeserializeOwned;
    use serde_json::Value;

    /// Deserialize the payload into `T`.
    pub fn json<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Discard the payload.
    pub fn ignore(_: Value) -> Result<(), serde_json::Error> {
        Ok(())
    }
}

/// Caller-supplied inputs for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParts {
    path: Vec<(&'static str, String)>,
    query: Vec<(String, String)>,
    body: Option<String>,
}

impl RequestParts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for the `{name}` placeholder.
    pub fn path(mut self, name: &'static str, value: &str) -> Self {
        self.path.push((name, value.to_string()));
        self
    }

    /// Query pairs from an optional filter; `None` adds nothing.
    pub fn query<F: QueryFilter>(mut self, filter: Option<&F>) -> Result<Self, ApiError> {
        self.query.extend(query::pairs(filter)?);
        Ok(self)
    }

    /// JSON-encoded request body.
    pub fn json_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let encoded = serde_json::to_string(body).map_err(|e| ApiError::Request(e.to_string()))?;
        self.body = Some(encoded);
        Ok(self)
    }

    fn path_value(&self, name: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Validate a configured base URL.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot carry a path".to_string()));
    }
    Ok(url)
}

pub struct RequestExecutor {
    base_url: Url,
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenStore>,
    cancel: CancellationToken,
    debug: bool,
}

impl RequestExecutor {
    pub fn new(
        base_url: Url,
        transport: Arc<dyn Transport>,
        tokens: Arc<TokenStore>,
        cancel: CancellationToken,
        debug: bool,
    ) -> Self {
        Self {
            base_url,
            transport,
            tokens,
            cancel,
            debug,
        }
    }

    /// Build the outgoing request for `endpoint`.
    ///
    /// Query pairs and body are attached only if the endpoint declares them.
    /// The stored token, if any, goes out as a bearer credential.
    pub fn build_request(&self, endpoint: &Endpoint, parts: RequestParts) -> Result<HttpRequest, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ApiError::Request("base URL cannot carry a path".to_string()))?;
            segments.pop_if_empty();
            for segment in endpoint.path.split('/') {
                match placeholder_name(segment) {
                    Some(name) => {
                        let value = parts.path_value(name).ok_or_else(|| {
                            ApiError::Request(format!("{}: missing path parameter {name:?}", endpoint.name))
                        })?;
                        // `push` drops dot segments, which would retarget the request.
                        if matches!(value, "" | "." | "..") {
                            return Err(ApiError::Request(format!(
                                "{}: path parameter {name:?} cannot be {value:?}",
                                endpoint.name
                            )));
                        }
                        segments.push(value);
                    }
                    None => {
                        segments.push(segment);
                    }
                }
            }
        }

        if endpoint.query {
            if !parts.query.is_empty() {
                url.query_pairs_mut().extend_pairs(&parts.query);
            }
        } else if !parts.query.is_empty() {
            debug!(endpoint = endpoint.name, "dropping query parameters the endpoint does not take");
        }

        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        let body = if endpoint.body { parts.body } else { None };
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        if let Some(token) = self.tokens.get() {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }

        Ok(HttpRequest {
            method: endpoint.method,
            url: url.into(),
            headers,
            body,
        })
    }

    /// Run one operation end to end.
    pub async fn execute<T>(&self, endpoint: &Endpoint, parts: RequestParts, decode: Decode<T>) -> Outcome<T> {
        if self.cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let request = self.build_request(endpoint, parts)?;
        debug!(
            endpoint = endpoint.name,
            method = %request.method,
            url = %request.url,
            authenticated = request.header("authorization").is_some(),
            "sending request"
        );
        if self.debug {
            if let Some(body) = &request.body {
                debug!(endpoint = endpoint.name, body = %body, "request body");
            }
        }

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!(endpoint = endpoint.name, "request abandoned by session shutdown");
                return Err(ApiError::Cancelled);
            }
            result = self.transport.send(request) => result,
        };
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                debug!(endpoint = endpoint.name, error = %e, "transport failure");
                return Err(e);
            }
        };

        debug!(endpoint = endpoint.name, status = response.status, "response received");
        if self.debug {
            debug!(endpoint = endpoint.name, body = %response.body, "response body");
        }
        parse_response(endpoint, &response, decode)
    }
}

/// Classify `response` and decode its payload.
pub fn parse_response<T>(endpoint: &Endpoint, response: &HttpResponse, decode: Decode<T>) -> Outcome<T> {
    if !response.is_success() {
        return Err(ApiError::Protocol {
            status: response.status,
            message: response.reason.clone(),
        });
    }

    let payload = match endpoint.response {
        ResponseShape::Unit => Value::Null,
        ResponseShape::Raw => {
            let body = require_body(endpoint, response)?;
            serde_json::from_str(body).map_err(|e| envelope_error(endpoint, e))?
        }
        ResponseShape::Enveloped => {
            let body = require_body(endpoint, response)?;
            let value: Value = serde_json::from_str(body).map_err(|e| envelope_error(endpoint, e))?;
            if !value.is_object() {
                return Err(ApiError::Envelope(format!("{}: envelope is not an object", endpoint.name)));
            }
            let envelope: Envelope<Value> = serde_json::from_value(value).map_err(|e| envelope_error(endpoint, e))?;
            envelope
                .data
                .ok_or_else(|| ApiError::Envelope(format!("{}: envelope has no data", endpoint.name)))?
        }
    };

    decode(payload).map_err(|e| envelope_error(endpoint, e))
}

fn require_body<'a>(endpoint: &Endpoint, response: &'a HttpResponse) -> Result<&'a str, ApiError> {
    response
        .body_text()
        .ok_or_else(|| ApiError::Envelope(format!("{}: empty response body", endpoint.name)))
}

fn envelope_error(endpoint: &Endpoint, error: serde_json::Error) -> ApiError {
    ApiError::Envelope(format!("{}: {error}", endpoint.name))
}
