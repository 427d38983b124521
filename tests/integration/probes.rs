//! Probe server integration tests

use serde_json::Value;

use crate::{get, get_test_config, skip_if_not_enabled};

#[tokio::test]
async fn test_ping() {
    skip_if_not_enabled!();
    let config = get_test_config();

    let (status, body) = get(&format!("{}/ping", config.probe_url)).await;
    assert_eq!(status, 200);
    assert_eq!(body, "pong");
}

/// A probe registers the caller; the verdict depends on the cluster
#[tokio::test]
async fn test_healthz_answers_with_state_vector() {
    skip_if_not_enabled!();
    let config = get_test_config();

    let (status, body) = get(&format!("{}/healthz", config.probe_url)).await;
    assert!(status == 200 || status == 404, "unexpected status {}", status);
    assert!(!body.contains(char::is_whitespace), "unexpected body {:?}", body);

    let (_, nodes) = get(&format!("{}/nodes", config.probe_url)).await;
    let nodes: Value = serde_json::from_str(&nodes).expect("nodes is JSON");
    assert!(!nodes["knownAddresses"]
        .as_array()
        .expect("knownAddresses is an array")
        .is_empty());
}

#[tokio::test]
async fn test_readydc_reports_replicas() {
    skip_if_not_enabled!();
    let config = get_test_config();

    let (status, body) = get(&format!("{}/readydc/{}", config.probe_url, config.region)).await;
    assert!(status == 200 || status == 503, "unexpected status {}", status);
    if status == 200 {
        let body: Value = serde_json::from_str(&body).expect("readydc is JSON");
        assert_eq!(body[&config.region]["ready"], true);
    }

    let (status, _) = get(&format!("{}/readydc/no-such-region", config.probe_url)).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_cascade_bodies() {
    skip_if_not_enabled!();
    let config = get_test_config();

    let (status, body) = get(&format!("{}/readyalldcs", config.probe_url)).await;
    match status {
        200 => assert!(body.starts_with("READY ALL DCS")),
        503 => assert!(body.starts_with("WAITING UNREADY DCS")),
        other => panic!("unexpected status {}", other),
    }

    let (status, body) = get(&format!("{}/startdcinit/{}", config.probe_url, config.region)).await;
    if status == 200 {
        assert_eq!(body, format!("OK TO START: {}", config.region));
    } else {
        assert_eq!(status, 503);
    }
}

#[tokio::test]
async fn test_seeds_and_metrics() {
    skip_if_not_enabled!();
    let config = get_test_config();

    let (status, body) = get(&format!("{}/seedslocal", config.probe_url)).await;
    assert_eq!(status, 200);
    let _: Vec<String> = serde_json::from_str(&body).expect("seedslocal is a JSON list");

    let (status, _) = get(&format!("{}/seeds", config.probe_url)).await;
    assert_eq!(status, 200);

    let (status, body) = get(&format!("{}/metrics", config.probe_url)).await;
    assert_eq!(status, 200);
    assert!(body.contains("cassprober_http_requests_total"));
}
