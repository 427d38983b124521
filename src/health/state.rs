//! Node state definitions
//!
//! A node's view of the cluster is a [`StateVector`] aligned with the
//! ordered known addresses of the [`ClusterView`] it belongs to.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use super::summary;

/// Liveness status reported by the failure detector for a healthy peer
pub const STATUS_UP: &str = "UP";

/// What one node believes about one known address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Status string reported by the node's failure detector
    Observed(String),
    /// The batched read for this node itself failed with this status
    RequestFailed(u16),
    /// Known address the node did not mention; not the same as down
    Unknown,
}

impl NodeState {
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Observed(status) if status == STATUS_UP)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Label used when counting states
    pub fn count_key(&self) -> String {
        match self {
            Self::Observed(status) => status.clone(),
            Self::RequestFailed(code) => code.to_string(),
            Self::Unknown => "?".to_string(),
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observed(status) => write!(f, "{}", status),
            Self::RequestFailed(code) => write!(f, "{}", code),
            Self::Unknown => Ok(()),
        }
    }
}

impl Serialize for NodeState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Observed(status) => serializer.serialize_str(status),
            Self::RequestFailed(code) => serializer.serialize_u16(*code),
            Self::Unknown => serializer.serialize_none(),
        }
    }
}

pub type StateVector = Vec<NodeState>;

/// Comma-joined rendering used in readiness probe bodies
pub fn render_states<'a, I>(states: I) -> String
where
    I: IntoIterator<Item = &'a NodeState>,
{
    states
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Occurrences of each state in a vector
pub fn count_states(states: &[NodeState]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for state in states {
        *counts.entry(state.count_key()).or_insert(0) += 1;
    }
    counts
}

/// One known address together with the attributes that order it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub address: String,
    pub hostname: Option<String>,
    pub region: Option<String>,
}

impl Column {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            hostname: None,
            region: None,
        }
    }

    /// Hostname when resolved, otherwise the address
    pub fn label(&self) -> &str {
        self.hostname.as_deref().unwrap_or(&self.address)
    }

    /// Ordering key: hostname, else region, else address
    fn sort_key(&self) -> &str {
        self.hostname
            .as_deref()
            .or(self.region.as_deref())
            .unwrap_or(&self.address)
    }
}

/// Sort columns into the known-address order
///
/// Ties on the primary key fall back to the address so the order never
/// depends on arrival order.
pub fn sort_columns(columns: &mut [Column]) {
    columns.sort_by(|a, b| {
        a.sort_key()
            .cmp(b.sort_key())
            .then_with(|| a.address.cmp(&b.address))
    });
}

/// Immutable result of one aggregation cycle
///
/// Readers hold an `Arc` to a complete view; the poll loop swaps in a new
/// one wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterView {
    columns: Vec<Column>,
    states: BTreeMap<String, StateVector>,
    summary: String,
}

impl ClusterView {
    pub fn new(columns: Vec<Column>, states: BTreeMap<String, StateVector>) -> Self {
        let mut view = Self {
            columns,
            states,
            summary: String::new(),
        };
        view.summary = summary::render_table(&view);
        view
    }

    /// Known addresses in column order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn known_addresses(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.address.as_str())
    }

    pub fn column(&self, address: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.address == address)
    }

    pub fn states(&self) -> &BTreeMap<String, StateVector> {
        &self.states
    }

    pub fn vector(&self, address: &str) -> Option<&StateVector> {
        self.states.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.states.contains_key(address)
    }

    /// Rendered state table
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Copy of this view without the given nodes' vectors
    pub fn without(&self, evicted: &[String]) -> Self {
        let states = self
            .states
            .iter()
            .filter(|(address, _)| !evicted.contains(address))
            .map(|(address, vector)| (address.clone(), vector.clone()))
            .collect();
        Self::new(self.columns.clone(), states)
    }

    /// State counts per node, as logged on every change
    pub fn status_counts(&self) -> BTreeMap<&str, BTreeMap<String, usize>> {
        self.states
            .iter()
            .map(|(address, vector)| (address.as_str(), count_states(vector)))
            .collect()
    }
}
