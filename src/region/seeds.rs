//! Seed discovery
//!
//! Local seeds are the host addresses of the configured seed pods. The
//! aggregated list adds the local seeds every external region reports.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::cluster::ClusterApi;
use crate::config::{RegionsConfig, SeedsConfig};

use super::peer::PeerClient;

pub struct SeedDiscovery {
    pods: Vec<String>,
    peer_urls: Vec<String>,
    api: Arc<dyn ClusterApi>,
    peers: Arc<dyn PeerClient>,
}

impl SeedDiscovery {
    pub fn new(
        pods: Vec<String>,
        peer_urls: Vec<String>,
        api: Arc<dyn ClusterApi>,
        peers: Arc<dyn PeerClient>,
    ) -> Self {
        Self {
            pods,
            peer_urls,
            api,
            peers,
        }
    }

    pub fn from_config(
        seeds: &SeedsConfig,
        regions: &RegionsConfig,
        api: Arc<dyn ClusterApi>,
        peers: Arc<dyn PeerClient>,
    ) -> Self {
        let peer_urls = regions
            .external_ingress_domains
            .iter()
            .map(|domain| format!("https://{}.{}/seedslocal", regions.prober_subdomain, domain))
            .collect();
        Self::new(seeds.pod_names(), peer_urls, api, peers)
    }

    /// Host addresses of the local seed pods; pods that cannot be read are dropped
    pub async fn local_seeds(&self) -> Vec<String> {
        let lookups = self.pods.iter().map(|name| async move {
            match self.api.pod(name).await {
                Ok(pod) => pod.host_ip().map(str::to_string),
                Err(e) => {
                    debug!(pod = %name, error = %e, "Seed pod unavailable");
                    None
                }
            }
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }

    /// Local seeds followed by every reachable external region's seeds
    pub async fn all_seeds(&self) -> Vec<String> {
        let remote = self.peer_urls.iter().map(|url| async move {
            match self.peers.seeds(url).await {
                Ok(seeds) => seeds,
                Err(e) => {
                    warn!(error = %e, "Skipping seeds of unreachable region");
                    Vec::new()
                }
            }
        });
        let (mut seeds, remote) = futures::join!(self.local_seeds(), join_all(remote));
        seeds.extend(remote.into_iter().flatten());
        seeds
    }
}
