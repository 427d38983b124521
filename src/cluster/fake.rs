//! In-memory orchestrator used by unit tests

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use super::{ClusterApi, ClusterApiError, Pod, ReplicaStatus};

#[derive(Default)]
pub(crate) struct FakeCluster {
    pub statefulsets: Mutex<BTreeMap<String, Vec<ReplicaStatus>>>,
    pub pods: Mutex<BTreeMap<String, Value>>,
    pub config_map: Mutex<Map<String, Value>>,
    pub phase_patches: Mutex<Vec<(String, String)>>,
    pub selectors: Mutex<Vec<String>>,
    pub unavailable: Mutex<bool>,
}

impl FakeCluster {
    pub fn add_statefulset(&self, selector: &str, replicas: u32, ready: u32) {
        self.statefulsets
            .lock()
            .entry(selector.to_string())
            .or_default()
            .push(ReplicaStatus::new(replicas, ready));
    }

    /// Pod whose `cassandra` and `maintenance-mode` containers run as given
    pub fn add_pod(&self, name: &str, host_ip: &str, cassandra: bool, maintenance: bool) {
        let state = |running: bool| {
            if running {
                json!({"running": {"startedAt": "2024-01-01T00:00:00Z"}})
            } else {
                json!({"waiting": {"reason": "PodInitializing"}})
            }
        };
        self.pods.lock().insert(
            name.to_string(),
            json!({
                "metadata": {"name": name},
                "status": {
                    "hostIP": host_ip,
                    "phase": "Running",
                    "containerStatuses": [{"name": "cassandra", "state": state(cassandra)}],
                    "initContainerStatuses": [{"name": "maintenance-mode", "state": state(maintenance)}]
                }
            }),
        );
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }

    fn check(&self) -> Result<(), ClusterApiError> {
        if *self.unavailable.lock() {
            return Err(ClusterApiError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn statefulset_status(&self, selector: &str) -> Result<Vec<ReplicaStatus>, ClusterApiError> {
        self.check()?;
        self.selectors.lock().push(selector.to_string());
        Ok(self
            .statefulsets
            .lock()
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn pod(&self, name: &str) -> Result<Pod, ClusterApiError> {
        self.check()?;
        let pod = self
            .pods
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterApiError::NotFound {
                kind: "pod",
                name: name.to_string(),
            })?;
        serde_json::from_value(pod).map_err(|e| ClusterApiError::Decode(e.to_string()))
    }

    async fn pod_names(&self, _selector: &str) -> Result<Vec<String>, ClusterApiError> {
        self.check()?;
        Ok(self.pods.lock().keys().cloned().collect())
    }

    async fn config_map(&self, name: &str) -> Result<Value, ClusterApiError> {
        self.check()?;
        Ok(json!({
            "metadata": {"name": name},
            "data": Value::Object(self.config_map.lock().clone())
        }))
    }

    async fn patch_config_map_data(
        &self,
        _name: &str,
        data: Map<String, Value>,
    ) -> Result<(), ClusterApiError> {
        self.check()?;
        let mut current = self.config_map.lock();
        for (key, value) in data {
            if value.is_null() {
                current.remove(&key);
            } else {
                current.insert(key, value);
            }
        }
        Ok(())
    }

    async fn patch_pod_phase(&self, name: &str, phase: &str) -> Result<(), ClusterApiError> {
        self.check()?;
        self.phase_patches
            .lock()
            .push((name.to_string(), phase.to_string()));
        Ok(())
    }
}
