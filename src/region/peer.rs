//! HTTP calls to prober instances of other regions

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The peer answered, with a non-success status
    #[error("{url} answered {status}")]
    NotReady { url: String, status: u16, body: Value },
    #[error("{url}: {message}")]
    Unreachable { url: String, message: String },
    #[error("{url} returned an unexpected body: {message}")]
    Invalid { url: String, message: String },
}

impl ProbeError {
    /// Diagnostic value reported for a failed region: the peer's body when it
    /// answered with one, otherwise the url and the failure message
    pub fn detail(&self) -> Value {
        match self {
            Self::NotReady { body, .. } if body.is_object() => body.clone(),
            Self::NotReady { url, status, body } => json!({
                "url": url,
                "message": format!("Request failed with status code {}", status),
                "body": body,
            }),
            Self::Unreachable { url, message } | Self::Invalid { url, message } => {
                json!({ "url": url, "message": message })
            }
        }
    }
}

/// Client for the probe endpoints of peer prober instances
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// GET a readiness endpoint; `Ok` carries the body of a success response
    async fn readiness(&self, url: &str) -> Result<Value, ProbeError>;

    /// GET a `/seedslocal` endpoint
    async fn seeds(&self, url: &str) -> Result<Vec<String>, ProbeError>;
}

pub struct HttpPeerClient {
    http: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Unreachable {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { http })
    }

    async fn get(&self, url: &str) -> Result<Value, ProbeError> {
        let unreachable = |e: reqwest::Error| ProbeError::Unreachable {
            url: url.to_string(),
            message: e.to_string(),
        };
        let response = self.http.get(url).send().await.map_err(unreachable)?;
        let status = response.status();
        let text = response.text().await.map_err(unreachable)?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if status.is_success() {
            Ok(body)
        } else {
            Err(ProbeError::NotReady {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn readiness(&self, url: &str) -> Result<Value, ProbeError> {
        self.get(url).await
    }

    async fn seeds(&self, url: &str) -> Result<Vec<String>, ProbeError> {
        let body = self.get(url).await?;
        serde_json::from_value(body).map_err(|e| ProbeError::Invalid {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
