//! Orchestrator objects, reduced to the fields the prober reads

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StatefulSet {
    #[serde(default)]
    pub spec: StatefulSetSpec,
    #[serde(default)]
    pub status: StatefulSetStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StatefulSetSpec {
    #[serde(default)]
    pub replicas: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatefulSetStatus {
    #[serde(default)]
    pub ready_replicas: Option<u32>,
}

/// Desired and ready replica counts of a region's database workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaStatus {
    pub replicas: u32,
    pub ready_replicas: u32,
    pub ready: bool,
}

impl ReplicaStatus {
    pub fn new(replicas: u32, ready_replicas: u32) -> Self {
        Self {
            replicas,
            ready_replicas,
            ready: replicas == ready_replicas,
        }
    }
}

impl From<&StatefulSet> for ReplicaStatus {
    fn from(set: &StatefulSet) -> Self {
        Self::new(
            set.spec.replicas.unwrap_or(0),
            set.status.ready_replicas.unwrap_or(0),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(rename = "hostIP", default)]
    pub host_ip: Option<String>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,
    #[serde(default)]
    pub init_container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    #[serde(default)]
    pub state: ContainerState,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerState {
    #[serde(default)]
    pub running: Option<serde_json::Value>,
}

impl Pod {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn host_ip(&self) -> Option<&str> {
        self.status.host_ip.as_deref().filter(|ip| !ip.is_empty())
    }

    pub fn is_container_running(&self, container: &str) -> bool {
        is_running(&self.status.container_statuses, container)
    }

    pub fn is_init_container_running(&self, container: &str) -> bool {
        is_running(&self.status.init_container_statuses, container)
    }
}

fn is_running(statuses: &[ContainerStatus], container: &str) -> bool {
    statuses
        .iter()
        .any(|s| s.name == container && s.state.running.is_some())
}
