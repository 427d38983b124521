//! Orchestrator API
//!
//! Replica status of region workloads, seed pod addresses and the
//! maintenance config map all come from here.

mod client;
mod model;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{ClusterApi, ClusterApiError, KubeClient};
pub use model::{Pod, ReplicaStatus};
