//! Node registry
//!
//! Holds the attributes of every node the prober knows about and the
//! current [`ClusterView`]. Attributes live in a concurrent map written by
//! readiness probes and the poll loop; the view is replaced wholesale so
//! readers always see a complete snapshot.

use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::hostname::HostnameResolver;
use super::state::{Column, ClusterView};

/// Registry key of a node: `/` followed by its broadcast or raw address
pub fn node_address(raw_address: &str, broadcast_address: Option<&str>) -> String {
    let address = broadcast_address
        .filter(|b| !b.is_empty())
        .unwrap_or(raw_address);
    format!("/{}", address)
}

/// Lazily resolved attributes of one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeAttributes {
    /// Address the node's readiness probe came from
    pub raw_address: Option<String>,
    pub broadcast_address: Option<String>,
    pub hostname: Option<String>,
    pub region: Option<String>,
    #[serde(skip)]
    hostname_resolved: bool,
    /// Set by the one registration that owns the in-flight lookup
    #[serde(skip)]
    lookup_pending: bool,
}

/// Registry of known nodes
pub struct NodeRegistry {
    attributes: DashMap<String, NodeAttributes>,
    view: RwLock<Arc<ClusterView>>,
    resolver: Arc<dyn HostnameResolver>,
}

impl NodeRegistry {
    pub fn new(resolver: Arc<dyn HostnameResolver>) -> Self {
        Self {
            attributes: DashMap::new(),
            view: RwLock::new(Arc::new(ClusterView::default())),
            resolver,
        }
    }

    /// Record a node seen through its own readiness probe
    ///
    /// Idempotent. The hostname is looked up once, even when registrations
    /// race; a failed lookup is retried on a later registration. Returns the
    /// node's address key.
    pub async fn register(&self, raw_address: &str, broadcast_address: Option<&str>) -> String {
        let address = node_address(raw_address, broadcast_address);

        let needs_lookup = {
            let mut entry = self.attributes.entry(address.clone()).or_default();
            if entry.raw_address.is_none() && !self.view.read().contains(&address) {
                info!(addr = %address, "Found a new node from readiness probe");
            }
            entry.raw_address = Some(raw_address.to_string());
            entry.broadcast_address = broadcast_address
                .filter(|b| !b.is_empty())
                .map(str::to_string);
            let needs_lookup = !entry.hostname_resolved && !entry.lookup_pending;
            if needs_lookup {
                entry.lookup_pending = true;
            }
            needs_lookup
        };

        if needs_lookup {
            self.resolve_hostname(&address, raw_address).await;
        }
        address
    }

    async fn resolve_hostname(&self, address: &str, raw_address: &str) {
        let ip: IpAddr = match raw_address.parse() {
            Ok(ip) => ip,
            Err(_) => {
                warn!(addr = %address, raw = %raw_address, "Not an IP address, skipping hostname lookup");
                self.finish_lookup(address, None);
                return;
            }
        };

        match self.resolver.reverse_lookup(ip).await {
            Ok(hostname) => {
                debug!(addr = %address, hostname = ?hostname, "Resolved hostname");
                self.finish_lookup(address, Some(hostname));
            }
            Err(e) => {
                warn!(addr = %address, error = %e, "Hostname lookup failed");
                self.finish_lookup(address, None);
            }
        }
    }

    /// Release the lookup; `None` leaves the hostname to a later registration
    fn finish_lookup(&self, address: &str, resolved: Option<Option<String>>) {
        if let Some(mut entry) = self.attributes.get_mut(address) {
            entry.lookup_pending = false;
            if let Some(hostname) = resolved {
                entry.hostname = hostname;
                entry.hostname_resolved = true;
            }
        }
    }

    /// Addresses to poll this cycle: every registered node plus every node
    /// the current view holds a vector for
    pub fn polled_addresses(&self) -> Vec<String> {
        let view = self.snapshot();
        let mut addresses: Vec<String> = self
            .attributes
            .iter()
            .map(|entry| entry.key().clone())
            .chain(view.states().keys().cloned())
            .collect();
        addresses.sort();
        addresses.dedup();
        addresses
    }

    pub fn region(&self, address: &str) -> Option<String> {
        self.attributes.get(address).and_then(|a| a.region.clone())
    }

    pub fn set_region(&self, address: &str, region: impl Into<String>) {
        self.attributes.entry(address.to_string()).or_default().region = Some(region.into());
    }

    pub fn hostname(&self, address: &str) -> Option<String> {
        self.attributes.get(address).and_then(|a| a.hostname.clone())
    }

    pub fn attributes(&self, address: &str) -> Option<NodeAttributes> {
        self.attributes.get(address).map(|a| a.clone())
    }

    /// Column for an address from its currently resolved attributes
    pub fn column_for(&self, address: &str) -> Column {
        match self.attributes.get(address) {
            Some(attributes) => Column {
                address: address.to_string(),
                hostname: attributes.hostname.clone(),
                region: attributes.region.clone(),
            },
            None => Column::new(address),
        }
    }

    /// Current view; cheap to clone and never partially updated
    pub fn snapshot(&self) -> Arc<ClusterView> {
        self.view.read().clone()
    }

    pub fn replace(&self, view: ClusterView) {
        *self.view.write() = Arc::new(view);
    }

    /// Drop nodes entirely: their attributes and their rows in the view
    ///
    /// Columns stay until the next cycle recomputes the known addresses.
    pub fn evict(&self, addresses: &[String]) {
        if addresses.is_empty() {
            return;
        }
        for address in addresses {
            self.attributes.remove(address);
        }
        let mut view = self.view.write();
        *view = Arc::new(view.without(addresses));
    }

    /// Number of addresses that would be polled
    pub fn len(&self) -> usize {
        self.polled_addresses().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.snapshot().states().is_empty()
    }
}
