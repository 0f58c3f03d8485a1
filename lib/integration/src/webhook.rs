//! Outbound webhook calls.
//!
//! A [`WebhookRequest`] is fully resolved before it reaches the client;
//! the client only performs the call and reports the status and body.
//! Whether a non-2xx status counts as a failure is decided by the caller.

use crate::error::ConnectorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, instrument};

/// Request body encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum WebhookBody {
    /// `application/json`.
    Json(JsonValue),
    /// `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
    /// No body.
    Empty,
}

/// A resolved outbound HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRequest {
    /// HTTP method, case-insensitive.
    pub method: String,
    /// Target URL.
    pub url: String,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: WebhookBody,
}

/// The remote side's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl WebhookResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for performing outbound webhook calls.
#[async_trait]
pub trait WebhookClient: Send + Sync {
    /// Performs the request.
    ///
    /// A response with any status is `Ok`; only transport-level problems
    /// are errors.
    async fn call(&self, request: &WebhookRequest) -> Result<WebhookResponse, ConnectorError>;
}

/// `WebhookClient` backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpWebhookClient {
    http: reqwest::Client,
}

impl HttpWebhookClient {
    /// Creates a client with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl WebhookClient for HttpWebhookClient {
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    async fn call(&self, request: &WebhookRequest) -> Result<WebhookResponse, ConnectorError> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| ConnectorError::InvalidRequest {
                reason: format!("unsupported HTTP method '{}'", request.method),
            })?;

        let mut builder = self.http.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match &request.body {
            WebhookBody::Json(value) => builder.json(value),
            WebhookBody::Form(pairs) => builder.form(pairs),
            WebhookBody::Empty => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, "webhook answered");

        Ok(WebhookResponse { status, body })
    }
}
