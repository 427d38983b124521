//! In-cluster API server client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::KubernetesConfig;

use super::model::{ObjectList, Pod, ReplicaStatus, StatefulSet};

const MERGE_PATCH: &str = "application/merge-patch+json";

#[derive(Debug, thiserror::Error)]
pub enum ClusterApiError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },
    #[error("API server unreachable: {0}")]
    Transport(String),
    #[error("API server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Undecodable API response: {0}")]
    Decode(String),
    #[error("Invalid client setup: {0}")]
    Setup(String),
}

/// Orchestrator operations the prober depends on
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Replica counts of every stateful set matching the selector
    async fn statefulset_status(&self, selector: &str) -> Result<Vec<ReplicaStatus>, ClusterApiError>;

    async fn pod(&self, name: &str) -> Result<Pod, ClusterApiError>;

    async fn pod_names(&self, selector: &str) -> Result<Vec<String>, ClusterApiError>;

    /// The whole config map object
    async fn config_map(&self, name: &str) -> Result<Value, ClusterApiError>;

    /// Merge-patch the config map's `data`; `null` values delete keys
    async fn patch_config_map_data(
        &self,
        name: &str,
        data: Map<String, Value>,
    ) -> Result<(), ClusterApiError>;

    async fn patch_pod_phase(&self, name: &str, phase: &str) -> Result<(), ClusterApiError>;
}

/// Talks to the API server with the service account's token and CA
pub struct KubeClient {
    base: String,
    namespace: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl KubeClient {
    pub fn from_config(config: &KubernetesConfig) -> Result<Self, ClusterApiError> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(10));

        match std::fs::read(&config.ca_path) {
            Ok(pem) => {
                let cert = reqwest::Certificate::from_pem(&pem)
                    .map_err(|e| ClusterApiError::Setup(format!("{}: {}", config.ca_path, e)))?;
                builder = builder.add_root_certificate(cert);
            }
            Err(e) => warn!(path = %config.ca_path, error = %e, "Cluster CA not loaded"),
        }

        let token = match std::fs::read_to_string(&config.token_path) {
            Ok(token) => Some(token.trim().to_string()),
            Err(e) => {
                warn!(path = %config.token_path, error = %e, "Service account token not loaded");
                None
            }
        };

        let http = builder
            .build()
            .map_err(|e| ClusterApiError::Setup(e.to_string()))?;

        Ok(Self {
            base: config.api_url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            token,
            http,
        })
    }

    fn core_url(&self, resource: &str) -> String {
        format!("{}/api/v1/namespaces/{}/{}", self.base, self.namespace, resource)
    }

    fn apps_url(&self, resource: &str) -> String {
        format!("{}/apis/apps/v1/namespaces/{}/{}", self.base, self.namespace, resource)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        selector: Option<&str>,
        patch: Option<Value>,
        kind: &'static str,
        name: &str,
    ) -> Result<Vec<u8>, ClusterApiError> {
        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(selector) = selector {
            request = request.query(&[("labelSelector", selector)]);
        }
        if let Some(patch) = patch {
            request = request
                .header(reqwest::header::CONTENT_TYPE, MERGE_PATCH)
                .body(patch.to_string());
        }

        debug!(method = %method, url = %url, "API server request");
        let response = request
            .send()
            .await
            .map_err(|e| ClusterApiError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClusterApiError::Transport(e.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Err(ClusterApiError::NotFound {
                kind,
                name: name.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ClusterApiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        selector: Option<&str>,
        kind: &'static str,
        name: &str,
    ) -> Result<T, ClusterApiError> {
        let body = self.send(Method::GET, url, selector, None, kind, name).await?;
        serde_json::from_slice(&body).map_err(|e| ClusterApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ClusterApi for KubeClient {
    async fn statefulset_status(&self, selector: &str) -> Result<Vec<ReplicaStatus>, ClusterApiError> {
        let list: ObjectList<StatefulSet> = self
            .get(&self.apps_url("statefulsets"), Some(selector), "statefulsets", selector)
            .await?;
        Ok(list.items.iter().map(ReplicaStatus::from).collect())
    }

    async fn pod(&self, name: &str) -> Result<Pod, ClusterApiError> {
        self.get(&self.core_url(&format!("pods/{}/status", name)), None, "pod", name)
            .await
    }

    async fn pod_names(&self, selector: &str) -> Result<Vec<String>, ClusterApiError> {
        let list: ObjectList<Pod> = self
            .get(&self.core_url("pods"), Some(selector), "pods", selector)
            .await?;
        Ok(list.items.into_iter().map(|pod| pod.metadata.name).collect())
    }

    async fn config_map(&self, name: &str) -> Result<Value, ClusterApiError> {
        self.get(&self.core_url(&format!("configmaps/{}", name)), None, "configmap", name)
            .await
    }

    async fn patch_config_map_data(
        &self,
        name: &str,
        data: Map<String, Value>,
    ) -> Result<(), ClusterApiError> {
        let url = self.core_url(&format!("configmaps/{}", name));
        self.send(Method::PATCH, &url, None, Some(json!({ "data": data })), "configmap", name)
            .await
            .map(|_| ())
    }

    async fn patch_pod_phase(&self, name: &str, phase: &str) -> Result<(), ClusterApiError> {
        let url = self.core_url(&format!("pods/{}/status", name));
        let patch = json!({ "status": { "phase": phase } });
        self.send(Method::PATCH, &url, None, Some(patch), "pod", name)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = KubeClient::from_config(&KubernetesConfig {
            namespace: "db".to_string(),
            api_url: "https://10.0.0.1:443/".to_string(),
            token_path: "/nonexistent/token".to_string(),
            ca_path: "/nonexistent/ca.crt".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert!(client.token.is_none());
        assert_eq!(
            client.core_url("pods/cass-0/status"),
            "https://10.0.0.1:443/api/v1/namespaces/db/pods/cass-0/status"
        );
        assert_eq!(
            client.apps_url("statefulsets"),
            "https://10.0.0.1:443/apis/apps/v1/namespaces/db/statefulsets"
        );
    }
}
