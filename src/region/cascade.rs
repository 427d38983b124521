//! Cross-region readiness fan-out
//!
//! Every region in scope is queried concurrently and every outcome is
//! awaited; one region failing never stops the others from being reported.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::RegionsConfig;

use super::peer::PeerClient;

/// A region and the readiness endpoint that speaks for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionTarget {
    pub name: String,
    pub url: String,
}

/// Targets in configured order
///
/// Local mode loops back to this process; ingress mode goes through each
/// region's public ingress.
pub fn region_targets(config: &RegionsConfig, listen_port: u16) -> Vec<RegionTarget> {
    match &config.all_ingress_domains {
        Some(domains) => domains
            .iter()
            .map(|domain| RegionTarget {
                name: domain.clone(),
                url: format!("http://{}.{}/readydc/", config.prober_subdomain, domain),
            })
            .collect(),
        None => config
            .local
            .iter()
            .map(|region| RegionTarget {
                name: region.clone(),
                url: format!("http://127.0.0.1:{}/readydc/{}", listen_port, region),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionOutcome {
    pub region: String,
    pub ready: bool,
    /// The peer's own answer, or `{url, message}` when there was none
    pub detail: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeReport {
    pub ready: bool,
    /// Region whose predecessors were checked, for a bootstrap gate
    pub cutoff: Option<String>,
    pub outcomes: Vec<RegionOutcome>,
}

impl CascadeReport {
    pub fn details(&self) -> Vec<&Value> {
        self.outcomes.iter().map(|o| &o.detail).collect()
    }

    /// Text body returned to the caller
    pub fn render(&self) -> String {
        let details = serde_json::to_string(&self.details()).unwrap_or_default();
        match (&self.cutoff, self.ready) {
            (_, false) => format!("WAITING UNREADY DCS:\n{}", details),
            (Some(cutoff), true) => format!("OK TO START: {}", cutoff),
            (None, true) => format!("READY ALL DCS:\n{}", details),
        }
    }
}

pub struct RegionCascade {
    targets: Vec<RegionTarget>,
    /// In ingress mode the gate is always this instance's own region
    ingress_cutoff: Option<String>,
    peers: Arc<dyn PeerClient>,
}

impl RegionCascade {
    pub fn new(targets: Vec<RegionTarget>, peers: Arc<dyn PeerClient>) -> Self {
        Self {
            targets,
            ingress_cutoff: None,
            peers,
        }
    }

    pub fn from_config(config: &RegionsConfig, listen_port: u16, peers: Arc<dyn PeerClient>) -> Self {
        let mut cascade = Self::new(region_targets(config, listen_port), peers);
        if config.is_ingress_mode() {
            cascade.ingress_cutoff = Some(config.local_ingress_domain.clone());
        }
        cascade
    }

    pub fn targets(&self) -> &[RegionTarget] {
        &self.targets
    }

    /// Readiness of every configured region
    pub async fn ready_all_regions(&self) -> CascadeReport {
        let report = self.fan_out(&self.targets, None).await;
        if report.ready {
            info!("READY ALL DCS");
        } else {
            warn!(unready = ?unready(&report), "WAITING UNREADY DCS");
        }
        report
    }

    /// Readiness of the regions configured before `region`
    ///
    /// Neither `region` nor anything after it is queried. A region that is
    /// not configured at all gates on every configured region.
    pub async fn start_region_init(&self, region: &str) -> CascadeReport {
        let cutoff = self.ingress_cutoff.as_deref().unwrap_or(region);
        let preceding: Vec<RegionTarget> = self
            .targets
            .iter()
            .take_while(|t| t.name != cutoff)
            .cloned()
            .collect();

        let report = self.fan_out(&preceding, Some(cutoff.to_string())).await;
        if report.ready {
            info!(region = %cutoff, "OK TO START");
        } else {
            warn!(region = %cutoff, unready = ?unready(&report), "WAITING UNREADY DCS");
        }
        report
    }

    async fn fan_out(&self, targets: &[RegionTarget], cutoff: Option<String>) -> CascadeReport {
        let calls = targets.iter().map(|target| async move {
            match self.peers.readiness(&target.url).await {
                Ok(body) => RegionOutcome {
                    region: target.name.clone(),
                    ready: true,
                    detail: body,
                },
                Err(e) => RegionOutcome {
                    region: target.name.clone(),
                    ready: false,
                    detail: e.detail(),
                },
            }
        });
        let outcomes = join_all(calls).await;
        debug!(outcomes = ?outcomes, "Region readiness");

        CascadeReport {
            ready: outcomes.iter().all(|o| o.ready),
            cutoff,
            outcomes,
        }
    }
}

fn unready(report: &CascadeReport) -> Vec<&str> {
    report
        .outcomes
        .iter()
        .filter(|o| !o.ready)
        .map(|o| o.region.as_str())
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::region::peer::ProbeError;

    /// Peer client answering from a table keyed by url; unknown urls are unreachable
    #[derive(Default)]
    pub(crate) struct FakePeers {
        pub ready: Mutex<HashMap<String, bool>>,
        pub seeds: Mutex<HashMap<String, Vec<String>>>,
        pub calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PeerClient for FakePeers {
        async fn readiness(&self, url: &str) -> Result<Value, ProbeError> {
            self.calls.lock().push(url.to_string());
            match self.ready.lock().get(url) {
                Some(true) => Ok(json!({"url": url, "ready": true})),
                Some(false) => Err(ProbeError::NotReady {
                    url: url.to_string(),
                    status: 503,
                    body: json!({"url": url, "ready": false}),
                }),
                None => Err(ProbeError::Unreachable {
                    url: url.to_string(),
                    message: "connect ECONNREFUSED".to_string(),
                }),
            }
        }

        async fn seeds(&self, url: &str) -> Result<Vec<String>, ProbeError> {
            self.calls.lock().push(url.to_string());
            self.seeds
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| ProbeError::Unreachable {
                    url: url.to_string(),
                    message: "timeout of 2000ms exceeded".to_string(),
                })
        }
    }

    fn local_config(regions: &[&str]) -> RegionsConfig {
        RegionsConfig {
            local: regions.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    fn url(region: &str) -> String {
        format!("http://127.0.0.1:8888/readydc/{}", region)
    }

    #[test]
    fn test_targets_local_and_ingress() {
        let targets = region_targets(&local_config(&["dc1", "dc2"]), 8888);
        assert_eq!(targets[1].url, "http://127.0.0.1:8888/readydc/dc2");

        let config = RegionsConfig {
            all_ingress_domains: Some(vec!["eu.example.com".to_string(), "us.example.com".to_string()]),
            prober_subdomain: "prober".to_string(),
            ..Default::default()
        };
        let targets = region_targets(&config, 8888);
        assert_eq!(targets[0].name, "eu.example.com");
        assert_eq!(targets[0].url, "http://prober.eu.example.com/readydc/");
    }

    #[tokio::test]
    async fn test_ready_all_regions_waits_for_every_region() {
        let peers = Arc::new(FakePeers::default());
        peers.ready.lock().insert(url("dc1"), true);
        // dc2 unreachable, dc3 ready
        peers.ready.lock().insert(url("dc3"), true);
        let cascade = RegionCascade::from_config(&local_config(&["dc1", "dc2", "dc3"]), 8888, peers.clone());

        let report = cascade.ready_all_regions().await;
        assert!(!report.ready);
        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes[0].ready);
        assert!(!report.outcomes[1].ready);
        assert_eq!(report.outcomes[1].detail["message"], "connect ECONNREFUSED");
        assert!(report.outcomes[2].ready);
        assert_eq!(peers.calls.lock().len(), 3);
        assert!(report.render().starts_with("WAITING UNREADY DCS"));
    }

    #[tokio::test]
    async fn test_ready_all_regions() {
        let peers = Arc::new(FakePeers::default());
        peers.ready.lock().insert(url("dc1"), true);
        peers.ready.lock().insert(url("dc2"), true);
        let cascade = RegionCascade::from_config(&local_config(&["dc1", "dc2"]), 8888, peers);

        let report = cascade.ready_all_regions().await;
        assert!(report.ready);
        assert!(report.render().starts_with("READY ALL DCS"));
    }

    #[tokio::test]
    async fn test_start_region_init_only_queries_predecessors() {
        let peers = Arc::new(FakePeers::default());
        peers.ready.lock().insert(url("dc1"), true);
        peers.ready.lock().insert(url("dc2"), true);
        let cascade =
            RegionCascade::from_config(&local_config(&["dc1", "dc2", "dc3", "dc4"]), 8888, peers.clone());

        let report = cascade.start_region_init("dc3").await;
        assert!(report.ready);
        assert_eq!(report.render(), "OK TO START: dc3");

        let calls = peers.calls.lock().clone();
        assert_eq!(calls.len(), 2);
        assert!(!calls.contains(&url("dc3")));
        assert!(!calls.contains(&url("dc4")));
    }

    #[tokio::test]
    async fn test_first_region_starts_without_queries() {
        let peers = Arc::new(FakePeers::default());
        let cascade = RegionCascade::from_config(&local_config(&["dc1", "dc2"]), 8888, peers.clone());

        let report = cascade.start_region_init("dc1").await;
        assert!(report.ready);
        assert!(report.outcomes.is_empty());
        assert!(peers.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unready_predecessor_blocks_start() {
        let peers = Arc::new(FakePeers::default());
        peers.ready.lock().insert(url("dc1"), false);
        let cascade = RegionCascade::from_config(&local_config(&["dc1", "dc2"]), 8888, peers);

        let report = cascade.start_region_init("dc2").await;
        assert!(!report.ready);
        assert_eq!(report.outcomes[0].detail["ready"], false);
    }

    #[tokio::test]
    async fn test_ingress_mode_cuts_at_local_domain() {
        let peers = Arc::new(FakePeers::default());
        peers.ready.lock().insert("http://prober.a.example/readydc/".to_string(), true);
        let config = RegionsConfig {
            all_ingress_domains: Some(vec![
                "a.example".to_string(),
                "b.example".to_string(),
                "c.example".to_string(),
            ]),
            local_ingress_domain: "b.example".to_string(),
            prober_subdomain: "prober".to_string(),
            ..Default::default()
        };
        let cascade = RegionCascade::from_config(&config, 8888, peers.clone());

        // The path argument is ignored in ingress mode
        let report = cascade.start_region_init("c.example").await;
        assert!(report.ready);
        assert_eq!(report.cutoff.as_deref(), Some("b.example"));
        assert_eq!(
            peers.calls.lock().clone(),
            vec!["http://prober.a.example/readydc/".to_string()]
        );
    }
}
