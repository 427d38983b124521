//! Integration test entry point
//!
//! Run against a deployed prober with:
//! PROBER_RUN_INTEGRATION_TESTS=1 cargo test --test integration
//!
//! Environment variables:
//! - PROBER_RUN_INTEGRATION_TESTS: Set to "1" to enable integration tests
//! - PROBER_TEST_URL: Probe server base URL (default: http://127.0.0.1:8888)
//! - PROBER_TEST_MAINTENANCE_URL: Maintenance server base URL (default: http://127.0.0.1:8889)
//! - PROBER_TEST_REGION: A local region name (default: dc1)
//! - PROBER_TEST_POD: A database pod name, required by the maintenance write tests

mod maintenance;
mod probes;

use std::env;
use std::time::Duration;

/// Check if integration tests should run
pub fn should_run_integration_tests() -> bool {
    env::var("PROBER_RUN_INTEGRATION_TESTS")
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Skip test if integration tests are not enabled
#[macro_export]
macro_rules! skip_if_not_enabled {
    () => {
        if !crate::should_run_integration_tests() {
            eprintln!("Skipping integration test (set PROBER_RUN_INTEGRATION_TESTS=1 to run)");
            return;
        }
    };
}

/// Target endpoints from environment
#[derive(Debug, Clone)]
pub struct ProberTestConfig {
    pub probe_url: String,
    pub maintenance_url: String,
    pub region: String,
    pub pod: Option<String>,
}

pub fn get_test_config() -> ProberTestConfig {
    ProberTestConfig {
        probe_url: env::var("PROBER_TEST_URL").unwrap_or_else(|_| "http://127.0.0.1:8888".to_string()),
        maintenance_url: env::var("PROBER_TEST_MAINTENANCE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8889".to_string()),
        region: env::var("PROBER_TEST_REGION").unwrap_or_else(|_| "dc1".to_string()),
        pod: env::var("PROBER_TEST_POD").ok(),
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build HTTP client")
}

/// GET a URL and return status and body
pub async fn get(url: &str) -> (u16, String) {
    let response = client()
        .get(url)
        .send()
        .await
        .unwrap_or_else(|e| panic!("GET {} failed: {}", url, e));
    let status = response.status().as_u16();
    let body = response.text().await.expect("Failed to read body");
    (status, body)
}
