//! Maintenance server integration tests
//!
//! The write test flips a real pod into maintenance and back, so it only
//! runs when PROBER_TEST_POD names a pod that may be restarted.

use serde_json::Value;

use crate::{client, get, get_test_config, skip_if_not_enabled};

#[tokio::test]
async fn test_config_and_region_mode() {
    skip_if_not_enabled!();
    let config = get_test_config();

    let (status, body) = get(&format!("{}/config", config.maintenance_url)).await;
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).expect("config is JSON");
    assert!(body.is_object());

    let (status, body) = get(&format!("{}/dcs/{}", config.maintenance_url, config.region)).await;
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).expect("dc mode is JSON");
    assert!(body[&config.region].is_boolean());

    let (status, _) = get(&format!("{}/pods/no-such-pod-0", config.maintenance_url)).await;
    assert_eq!(status, 404);
}

#[tokio::test]
#[ignore = "Restarts a database pod"]
async fn test_pod_mode_toggle() {
    skip_if_not_enabled!();
    let config = get_test_config();
    let Some(pod) = config.pod else {
        eprintln!("Skipping: PROBER_TEST_POD not set");
        return;
    };
    let url = format!("{}/pods/{}", config.maintenance_url, pod);

    let response = client().put(&url).send().await.expect("PUT failed");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("PUT body is JSON");
    assert_eq!(body[&pod], true);

    let (_, config_map) = get(&format!("{}/config", config.maintenance_url)).await;
    let config_map: Value = serde_json::from_str(&config_map).expect("config is JSON");
    assert_eq!(config_map["data"][&pod], "true");

    let response = client().delete(&url).send().await.expect("DELETE failed");
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("DELETE body is JSON");
    assert_eq!(body[&pod], false);
}
