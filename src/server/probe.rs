//! Probe server routes

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use hyper::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::health::{readiness, render_states, NodeRegistry};
use crate::metrics::metrics;
use crate::region::{LocalRegions, RegionCascade, SeedDiscovery};

use super::{json_response, not_found, segments, text, HttpResponse};

pub struct ProbeRoutes {
    registry: Arc<NodeRegistry>,
    local_regions: LocalRegions,
    cascade: RegionCascade,
    seeds: SeedDiscovery,
}

impl ProbeRoutes {
    pub fn new(
        registry: Arc<NodeRegistry>,
        local_regions: LocalRegions,
        cascade: RegionCascade,
        seeds: SeedDiscovery,
    ) -> Self {
        Self {
            registry,
            local_regions,
            cascade,
            seeds,
        }
    }

    pub async fn handle(&self, method: &Method, path: &str, peer: SocketAddr) -> HttpResponse {
        if method != Method::GET {
            return not_found();
        }
        match segments(path).as_slice() {
            ["healthz"] => self.healthz(peer.ip(), None).await,
            ["healthz", broadcast] => self.healthz(peer.ip(), Some(*broadcast)).await,
            ["readydc"] => self.ready_region(None).await,
            ["readydc", region] => self.ready_region(Some(*region)).await,
            ["readyalldcs"] => {
                let report = self.cascade.ready_all_regions().await;
                text(status_for(report.ready), report.render())
            }
            ["startdcinit", region] => {
                let report = self.cascade.start_region_init(region).await;
                text(status_for(report.ready), report.render())
            }
            ["seedslocal"] => json_response(StatusCode::OK, &self.seeds.local_seeds().await),
            ["seeds"] => text(StatusCode::OK, self.seeds.all_seeds().await.join(",")),
            ["nodes"] => json_response(StatusCode::OK, &self.nodes()),
            ["ping"] => text(StatusCode::OK, "pong"),
            ["metrics"] => text(StatusCode::OK, metrics().gather()),
            _ => not_found(),
        }
    }

    /// Register the caller and answer with its region-scoped verdict
    async fn healthz(&self, peer: IpAddr, broadcast: Option<&str>) -> HttpResponse {
        let raw = peer.to_canonical().to_string();
        let address = self.registry.register(&raw, broadcast).await;
        let verdict = readiness::evaluate(&self.registry.snapshot(), &address);
        debug!(addr = %address, ready = verdict.ready, "Readiness probe");

        let status = if verdict.ready {
            StatusCode::OK
        } else {
            StatusCode::NOT_FOUND
        };
        text(status, render_states(&verdict.states))
    }

    async fn ready_region(&self, region: Option<&str>) -> HttpResponse {
        match self.local_regions.status(region).await {
            Ok((region, status)) => json_response(status_for(status.ready), &json!({ region: status })),
            Err(e) if e.is_client_error() => text(StatusCode::BAD_REQUEST, e.to_string()),
            Err(e) => {
                warn!(error = %e, "Region readiness unavailable");
                text(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
        }
    }

    /// Read-only view of every known node
    fn nodes(&self) -> Value {
        let view = self.registry.snapshot();
        let nodes: Vec<Value> = view
            .columns()
            .iter()
            .map(|column| {
                let attributes = self.registry.attributes(&column.address);
                json!({
                    "address": column.address,
                    "hostname": column.hostname,
                    "region": column.region,
                    "rawAddress": attributes.as_ref().and_then(|a| a.raw_address.clone()),
                    "broadcastAddress": attributes.as_ref().and_then(|a| a.broadcast_address.clone()),
                    "ready": readiness::is_ready(&view, &column.address),
                    "states": view.vector(&column.address),
                })
            })
            .collect();
        json!({
            "knownAddresses": view.known_addresses().collect::<Vec<_>>(),
            "nodes": nodes,
        })
    }
}

fn status_for(ready: bool) -> StatusCode {
    if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use http_body_util::BodyExt;

    use super::*;
    use crate::cluster::fake::FakeCluster;
    use crate::config::RegionsConfig;
    use crate::health::{ClusterView, Column, HostnameResolver, LookupError, NodeState};
    use crate::region::FakePeers;

    struct NoHostnames;

    #[async_trait::async_trait]
    impl HostnameResolver for NoHostnames {
        async fn reverse_lookup(&self, _ip: IpAddr) -> Result<Option<String>, LookupError> {
            Ok(None)
        }
    }

    const LABELS: &str = "app.kubernetes.io/component=database";

    struct Fixture {
        routes: ProbeRoutes,
        registry: Arc<NodeRegistry>,
        cluster: Arc<FakeCluster>,
        peers: Arc<FakePeers>,
    }

    fn fixture(local: &[&str]) -> Fixture {
        let registry = Arc::new(NodeRegistry::new(Arc::new(NoHostnames)));
        let cluster = Arc::new(FakeCluster::default());
        let peers = Arc::new(FakePeers::default());
        let regions = RegionsConfig {
            local: local.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        };
        let routes = ProbeRoutes::new(
            registry.clone(),
            LocalRegions::new(regions.local.clone(), LABELS, cluster.clone()),
            RegionCascade::from_config(&regions, 8888, peers.clone()),
            SeedDiscovery::new(
                vec!["cass-dc1-0".to_string()],
                Vec::new(),
                cluster.clone(),
                peers.clone(),
            ),
        );
        Fixture {
            routes,
            registry,
            cluster,
            peers,
        }
    }

    fn peer(ip: &str) -> SocketAddr {
        SocketAddr::new(ip.parse().unwrap(), 40000)
    }

    async fn get(routes: &ProbeRoutes, path: &str) -> (StatusCode, String) {
        let response = routes.handle(&Method::GET, path, peer("10.0.0.1")).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_healthz_registers_and_reports_not_ready() {
        let f = fixture(&["dc1"]);
        let (status, body) = get(&f.routes, "/healthz/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "");
        assert_eq!(f.registry.polled_addresses(), vec!["/10.0.0.1".to_string()]);

        let (_, _) = get(&f.routes, "/healthz/34.1.1.1").await;
        assert!(f.registry.attributes("/34.1.1.1").is_some());
    }

    #[tokio::test]
    async fn test_healthz_ready_node() {
        let f = fixture(&["dc1"]);
        let up = NodeState::Observed("UP".to_string());
        let mut states = BTreeMap::new();
        states.insert("/10.0.0.1".to_string(), vec![up.clone(), NodeState::Unknown]);
        f.registry.replace(ClusterView::new(
            vec![Column::new("/10.0.0.1"), Column::new("/10.0.0.2")],
            states,
        ));

        let (status, body) = get(&f.routes, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "UP,");
    }

    #[tokio::test]
    async fn test_readydc() {
        let f = fixture(&["dc1", "dc2"]);
        f.cluster
            .add_statefulset(&format!("datacenter=dc1,{}", LABELS), 3, 3);
        f.cluster
            .add_statefulset(&format!("datacenter=dc2,{}", LABELS), 3, 2);

        let (status, body) = get(&f.routes, "/readydc/dc1").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({"dc1": {"replicas": 3, "readyReplicas": 3, "ready": true}}));

        let (status, _) = get(&f.routes, "/readydc/dc2").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = get(&f.routes, "/readydc/").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get(&f.routes, "/readydc/dc9").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_readydc_without_workload() {
        let f = fixture(&["dc1"]);
        let (status, _) = get(&f.routes, "/readydc").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_cascade_routes() {
        let f = fixture(&["dc1", "dc2"]);
        f.peers
            .ready
            .lock()
            .insert("http://127.0.0.1:8888/readydc/dc1".to_string(), true);

        let (status, body) = get(&f.routes, "/startdcinit/dc2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK TO START: dc2");

        let (status, body) = get(&f.routes, "/readyalldcs").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.starts_with("WAITING UNREADY DCS"));

        let (status, _) = get(&f.routes, "/startdcinit").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_seed_routes() {
        let f = fixture(&["dc1"]);
        f.cluster.add_pod("cass-dc1-0", "192.168.0.1", true, false);

        let (status, body) = get(&f.routes, "/seedslocal").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"["192.168.0.1"]"#);

        let (_, body) = get(&f.routes, "/seeds").await;
        assert_eq!(body, "192.168.0.1");
    }

    #[tokio::test]
    async fn test_misc_routes() {
        let f = fixture(&["dc1"]);
        assert_eq!(get(&f.routes, "/ping").await, (StatusCode::OK, "pong".to_string()));
        assert_eq!(get(&f.routes, "/unknown").await.0, StatusCode::NOT_FOUND);

        get(&f.routes, "/healthz").await;
        let (status, body) = get(&f.routes, "/nodes").await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert!(body["knownAddresses"].is_array());

        let response = f
            .routes
            .handle(&Method::POST, "/ping", peer("10.0.0.1"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
