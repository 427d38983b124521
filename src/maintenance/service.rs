//! Maintenance mode per pod and per region
//!
//! The flag lives in a config map (`data[<pod>] = "true"`). Turning it on
//! for a pod whose database container is running also fails the pod so the
//! orchestrator restarts it into its maintenance init container.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use crate::cluster::{ClusterApi, ClusterApiError};

/// Init container that holds a pod in maintenance
pub const MAINTENANCE_CONTAINER: &str = "maintenance-mode";
pub const DATABASE_CONTAINER: &str = "cassandra";
const FAILED_PHASE: &str = "Failed";

#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error("Pod {0} does not exist.")]
    PodNotFound(String),
    #[error("No matches found for dc {0}.")]
    NoMatches(String),
    #[error("Failed to update maintenance mode: {0}")]
    Api(#[from] ClusterApiError),
}

pub struct MaintenanceService {
    api: Arc<dyn ClusterApi>,
    config_map: String,
    endpoint_labels: String,
}

impl MaintenanceService {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        config_map: impl Into<String>,
        endpoint_labels: impl Into<String>,
    ) -> Self {
        Self {
            api,
            config_map: config_map.into(),
            endpoint_labels: endpoint_labels.into(),
        }
    }

    pub async fn config(&self) -> Result<Value, ClusterApiError> {
        self.api.config_map(&self.config_map).await
    }

    /// Whether the pod is currently held in its maintenance init container
    pub async fn pod_mode(&self, pod: &str) -> Result<bool, MaintenanceError> {
        let status = self.api.pod(pod).await.map_err(|e| {
            error!(pod = %pod, error = %e, "Failed to get status of pod");
            MaintenanceError::PodNotFound(pod.to_string())
        })?;
        Ok(status.is_init_container_running(MAINTENANCE_CONTAINER))
    }

    pub async fn set_pod_mode(&self, pod: &str, mode: bool) -> Result<bool, MaintenanceError> {
        let status = self.api.pod(pod).await.map_err(|e| {
            error!(pod = %pod, error = %e, "Pod does not exist");
            MaintenanceError::PodNotFound(pod.to_string())
        })?;

        self.update_config_map(mode, std::slice::from_ref(&status.metadata.name))
            .await?;
        if mode && status.is_container_running(DATABASE_CONTAINER) {
            self.api.patch_pod_phase(pod, FAILED_PHASE).await?;
        }
        info!(pod = %pod, mode, "Pod maintenance mode updated");
        Ok(mode)
    }

    /// True when every pod of the region is flagged
    pub async fn region_mode(&self, region: &str) -> Result<bool, MaintenanceError> {
        let pods = self.region_pods(region).await?;
        let config = self.api.config_map(&self.config_map).await?;
        let flagged = config.get("data").and_then(Value::as_object);
        Ok(match flagged {
            Some(flagged) => pods.iter().all(|pod| flagged.contains_key(pod)),
            None => false,
        })
    }

    /// Flag or unflag every pod of the region
    ///
    /// Per-pod failures after the config map update are reported in the
    /// returned list rather than failing the whole call.
    pub async fn set_region_mode(&self, region: &str, mode: bool) -> Result<Vec<Value>, MaintenanceError> {
        let pods = self.region_pods(region).await?;
        self.update_config_map(mode, &pods).await?;

        let mut results = Vec::with_capacity(pods.len());
        for pod in &pods {
            let result = self.restart_if_running(pod, mode).await;
            results.push(match result {
                Ok(()) => json!({ pod.as_str(): mode }),
                Err(e) => json!({ "error": e.to_string() }),
            });
        }
        info!(region = %region, mode, pods = pods.len(), "Region maintenance mode updated");
        Ok(results)
    }

    async fn restart_if_running(&self, pod: &str, mode: bool) -> Result<(), ClusterApiError> {
        let status = self.api.pod(pod).await?;
        if mode && status.is_container_running(DATABASE_CONTAINER) {
            self.api.patch_pod_phase(pod, FAILED_PHASE).await?;
        }
        Ok(())
    }

    async fn update_config_map(&self, mode: bool, pods: &[String]) -> Result<(), ClusterApiError> {
        let data: Map<String, Value> = pods
            .iter()
            .map(|pod| {
                let value = if mode {
                    Value::String("true".to_string())
                } else {
                    Value::Null
                };
                (pod.clone(), value)
            })
            .collect();
        debug!(config_map = %self.config_map, data = ?data, "Patching maintenance config map");
        self.api.patch_config_map_data(&self.config_map, data).await
    }

    /// Database pods whose name contains the region, in ordinal order
    async fn region_pods(&self, region: &str) -> Result<Vec<String>, MaintenanceError> {
        let mut pods: Vec<String> = self
            .api
            .pod_names(&self.endpoint_labels)
            .await?
            .into_iter()
            .filter(|name| name.contains(region))
            .collect();
        if pods.is_empty() {
            return Err(MaintenanceError::NoMatches(region.to_string()));
        }
        pods.sort_by_key(|name| (ordinal(name), name.clone()));
        Ok(pods)
    }
}

/// Trailing `-<n>` of a stateful set pod name
fn ordinal(name: &str) -> u64 {
    name.rsplit('-')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(u64::MAX)
}
