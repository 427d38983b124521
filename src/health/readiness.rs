//! Per-node readiness verdict
//!
//! A node is ready when every region peer sees it UP, with room for one
//! column that is not UP (its own self-reference or a peer the two nodes
//! have not mutually discovered yet).

use super::state::{ClusterView, NodeState};

/// Verdict returned to a readiness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    /// Region-scoped vector the verdict was computed from
    pub states: Vec<NodeState>,
}

/// The node's vector restricted to columns in the node's own region
///
/// When the node's region is unresolved the whole vector is returned.
/// `None` when the view holds no vector for the address.
pub fn scoped_states<'a>(view: &'a ClusterView, address: &str) -> Option<Vec<&'a NodeState>> {
    let vector = view.vector(address)?;
    let region = view.column(address).and_then(|c| c.region.as_deref());

    let scoped = match region {
        None => vector.iter().collect(),
        Some(region) => view
            .columns()
            .iter()
            .zip(vector.iter())
            .filter(|(column, _)| column.region.as_deref() == Some(region))
            .map(|(_, state)| state)
            .collect(),
    };
    Some(scoped)
}

/// UP count must reach the scoped length minus one
///
/// A node without any recorded vector is not ready.
pub fn is_ready(view: &ClusterView, address: &str) -> bool {
    match scoped_states(view, address) {
        Some(states) if !states.is_empty() => {
            let up = states.iter().filter(|s| s.is_up()).count();
            up + 1 >= states.len()
        }
        _ => false,
    }
}

pub fn evaluate(view: &ClusterView, address: &str) -> Readiness {
    let states = scoped_states(view, address)
        .map(|states| states.into_iter().cloned().collect())
        .unwrap_or_default();
    Readiness {
        ready: is_ready(view, address),
        states,
    }
}
