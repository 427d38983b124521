//! Stale node eviction
//!
//! A node is stale when, once `Unknown` entries are stripped, its vector
//! holds exactly one entry and that entry is a failed request. Callers only
//! act on the result after a cycle with at least one successful read.

use super::state::{ClusterView, NodeState};

pub fn is_stale(vector: &[NodeState]) -> bool {
    let mut recorded = vector.iter().filter(|s| !s.is_unknown());
    matches!(
        (recorded.next(), recorded.next()),
        (Some(NodeState::RequestFailed(_)), None)
    )
}

/// Addresses whose only recorded signal is a failed request
pub fn stale_nodes(view: &ClusterView) -> Vec<String> {
    view.states()
        .iter()
        .filter(|(_, vector)| is_stale(vector))
        .map(|(address, _)| address.clone())
        .collect()
}
