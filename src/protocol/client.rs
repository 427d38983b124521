//! Batched calls to the management proxy

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProxyConfig;
use crate::credentials::CredentialResolver;

use super::request::{Attribute, ReadRequest};
use super::response::{redact, ReadResponse};

/// Failure of a whole batch
///
/// Individual non-success results are not errors; they come back as
/// ordinary [`ReadResponse`] entries.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Proxy unreachable: {0}")]
    Transport(String),
    #[error("Proxy answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Undecodable proxy response: {0}")]
    Decode(String),
    #[error("Expected {expected} results, proxy returned {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Executes a group of reads as one call
#[async_trait]
pub trait BatchQuery: Send + Sync {
    /// One result per request, in request order
    async fn batch_query(&self, requests: &[ReadRequest]) -> Result<Vec<ReadResponse>, QueryError>;
}

/// HTTP client for the proxy's batch endpoint
pub struct ProxyClient {
    url: String,
    http: reqwest::Client,
}

impl ProxyClient {
    pub fn new(config: &ProxyConfig) -> Result<Self, QueryError> {
        let mut builder = reqwest::Client::builder();
        if config.request_timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.request_timeout_ms));
        }
        let http = builder
            .build()
            .map_err(|e| QueryError::Transport(e.to_string()))?;
        Ok(Self {
            url: config.url.clone(),
            http,
        })
    }
}

#[async_trait]
impl BatchQuery for ProxyClient {
    async fn batch_query(&self, requests: &[ReadRequest]) -> Result<Vec<ReadResponse>, QueryError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(&self.url)
            .json(requests)
            .send()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| QueryError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: redacted_body(&body),
            });
        }

        let responses: Vec<ReadResponse> = serde_json::from_slice(&body)
            .map_err(|e| QueryError::Decode(format!("{}: {}", e, redacted_body(&body))))?;

        if responses.len() != requests.len() {
            return Err(QueryError::CountMismatch {
                expected: requests.len(),
                actual: responses.len(),
            });
        }

        for failed in responses.iter().filter(|r| !r.is_success()) {
            debug!(status = failed.status, error = ?failed.error, "Proxy read failed");
        }
        Ok(responses)
    }
}

fn redacted_body(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(mut value) => {
            redact(&mut value);
            value.to_string()
        }
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Builds read descriptors with whichever credentials are active
#[derive(Clone)]
pub struct RequestFactory {
    jmx_port: u16,
    credentials: Arc<CredentialResolver>,
}

impl RequestFactory {
    pub fn new(jmx_port: u16, credentials: Arc<CredentialResolver>) -> Self {
        Self {
            jmx_port,
            credentials,
        }
    }

    /// One descriptor per address, sharing a single credentials snapshot
    pub fn reads<'a, I>(&self, attribute: Attribute, addresses: I) -> Vec<ReadRequest>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let credentials = self.credentials.current();
        if credentials.user.is_empty() {
            warn!(source = %self.credentials.source(), "No credentials loaded yet");
        }
        addresses
            .into_iter()
            .map(|address| ReadRequest::new(attribute, address, self.jmx_port, &credentials))
            .collect()
    }
}
