//! Node-state aggregation and readiness
//!
//! This module provides:
//! - The node registry and its immutable cluster view
//! - The state matrix builder reconciling per-node failure-detector views
//! - Region-scoped readiness verdicts
//! - Stale node eviction and the periodic poll loop

mod hostname;
mod matrix;
mod poller;
pub mod readiness;
mod reaper;
mod registry;
mod state;
mod summary;

pub use hostname::{DnsHostnameResolver, HostnameResolver, LookupError};
pub use matrix::{BuiltMatrix, CycleReport, MatrixBuilder};
pub use poller::{CycleError, CycleOutcome, StatePoller};
pub use readiness::Readiness;
pub use reaper::stale_nodes;
pub use registry::{node_address, NodeAttributes, NodeRegistry};
pub use state::{render_states, Column, ClusterView, NodeState, StateVector};
