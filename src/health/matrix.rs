//! State matrix builder
//!
//! One cycle queries the failure detector of every polled node, widens the
//! set of known addresses with every peer those nodes mention, and aligns
//! each node's answer against that ordered set.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::protocol::{Attribute, BatchQuery, QueryError, ReadResponse, RequestFactory};

use super::registry::NodeRegistry;
use super::state::{sort_columns, ClusterView, NodeState, StateVector};

/// Counts describing one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub polled: usize,
    pub successes: usize,
    pub failures: usize,
    pub known: usize,
}

#[derive(Debug)]
pub struct BuiltMatrix {
    pub view: ClusterView,
    pub report: CycleReport,
}

pub struct MatrixBuilder {
    client: Arc<dyn BatchQuery>,
    requests: RequestFactory,
}

impl MatrixBuilder {
    pub fn new(client: Arc<dyn BatchQuery>, requests: RequestFactory) -> Self {
        Self { client, requests }
    }

    /// Build a fresh view from live queries
    ///
    /// `Ok(None)` when there is nothing to poll. Fails only when the
    /// failure-detector batch as a whole fails. The registry's view is not
    /// touched; only region attributes are recorded.
    pub async fn build(&self, registry: &NodeRegistry) -> Result<Option<BuiltMatrix>, QueryError> {
        let polled = registry.polled_addresses();
        if polled.is_empty() {
            return Ok(None);
        }

        let requests = self.requests.reads(Attribute::PeerStates, &polled);
        let responses = self.client.batch_query(&requests).await?;

        let peer_views: Vec<Option<BTreeMap<String, String>>> = responses
            .iter()
            .map(|response| {
                response
                    .is_success()
                    .then(|| response.peer_states().unwrap_or_default())
            })
            .collect();

        let responding: BTreeSet<String> = peer_views
            .iter()
            .flatten()
            .flat_map(|peers| peers.keys().cloned())
            .collect();

        for address in responding.iter().filter(|a| !polled.contains(*a)) {
            info!(addr = %address, "Found a new node from peer states");
        }

        self.resolve_regions(registry, &responding).await;

        let known: BTreeSet<&String> = polled.iter().chain(responding.iter()).collect();
        let mut columns: Vec<_> = known.iter().map(|a| registry.column_for(a)).collect();
        sort_columns(&mut columns);

        let width = columns.len();
        let slots: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.address.as_str(), i))
            .collect();

        // Discovered but not yet polled addresses carry no information yet
        let mut states: BTreeMap<String, StateVector> = columns
            .iter()
            .map(|c| (c.address.clone(), vec![NodeState::Unknown; width]))
            .collect();

        let mut report = CycleReport {
            polled: polled.len(),
            known: width,
            ..Default::default()
        };

        for ((address, response), peers) in polled.iter().zip(&responses).zip(&peer_views) {
            let vector = match peers {
                Some(peers) => {
                    report.successes += 1;
                    columns
                        .iter()
                        .map(|c| match peers.get(&c.address) {
                            Some(status) => NodeState::Observed(status.clone()),
                            None => NodeState::Unknown,
                        })
                        .collect()
                }
                None => {
                    report.failures += 1;
                    debug!(addr = %address, status = response.status, "Peer states request failed");
                    let mut vector = vec![NodeState::Unknown; width];
                    if let Some(&slot) = slots.get(address.as_str()) {
                        vector[slot] = NodeState::RequestFailed(response.status);
                    }
                    vector
                }
            };
            states.insert(address.clone(), vector);
        }

        Ok(Some(BuiltMatrix {
            view: ClusterView::new(columns, states),
            report,
        }))
    }

    /// Look up the region of responding addresses that have none yet
    async fn resolve_regions(&self, registry: &NodeRegistry, responding: &BTreeSet<String>) {
        let missing: Vec<String> = responding
            .iter()
            .filter(|a| registry.region(a).is_none())
            .cloned()
            .collect();
        if missing.is_empty() {
            return;
        }

        let requests = self.requests.reads(Attribute::Region, &missing);
        let responses = match self.client.batch_query(&requests).await {
            Ok(responses) => responses,
            Err(e) => {
                warn!(error = %e, count = missing.len(), "Region lookup failed");
                return;
            }
        };

        for (address, response) in missing.iter().zip(&responses) {
            match response.string_value() {
                Some(region) => registry.set_region(address, region),
                None => warn_region_failure(address, response),
            }
        }
    }
}

fn warn_region_failure(address: &str, response: &ReadResponse) {
    warn!(
        addr = %address,
        status = response.status,
        error = ?response.error,
        "Failed request of attribute: {}",
        Attribute::Region.name()
    );
}
