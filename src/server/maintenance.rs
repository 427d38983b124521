//! Maintenance server routes

use hyper::{Method, StatusCode};
use serde_json::json;
use tracing::error;

use crate::maintenance::{MaintenanceError, MaintenanceService};

use super::{json_response, not_found, segments, text, HttpResponse};

pub struct MaintenanceRoutes {
    service: MaintenanceService,
}

impl MaintenanceRoutes {
    pub fn new(service: MaintenanceService) -> Self {
        Self { service }
    }

    pub async fn handle(&self, method: &Method, path: &str) -> HttpResponse {
        match (method.as_str(), segments(path).as_slice()) {
            ("GET", ["config"]) => match self.service.config().await {
                Ok(config) => json_response(StatusCode::OK, &config),
                Err(e) => {
                    error!(error = %e, "Error getting ConfigMap");
                    text(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("{}: error getting ConfigMap", e),
                    )
                }
            },
            ("GET", ["pods", pod]) => match self.service.pod_mode(pod).await {
                Ok(mode) => json_response(StatusCode::OK, &json!({ "inMaintenance": mode })),
                Err(e) => failure(e),
            },
            ("PUT", ["pods", pod]) => self.set_pod(pod, true).await,
            ("DELETE", ["pods", pod]) => self.set_pod(pod, false).await,
            ("GET", ["dcs", region]) => match self.service.region_mode(region).await {
                Ok(mode) => json_response(StatusCode::OK, &json!({ *region: mode })),
                Err(e) => failure(e),
            },
            ("PUT", ["dcs", region]) => self.set_region(region, true).await,
            ("DELETE", ["dcs", region]) => self.set_region(region, false).await,
            _ => not_found(),
        }
    }

    async fn set_pod(&self, pod: &str, mode: bool) -> HttpResponse {
        match self.service.set_pod_mode(pod, mode).await {
            Ok(mode) => json_response(StatusCode::OK, &json!({ pod: mode })),
            Err(e) => failure(e),
        }
    }

    async fn set_region(&self, region: &str, mode: bool) -> HttpResponse {
        match self.service.set_region_mode(region, mode).await {
            Ok(results) => json_response(StatusCode::OK, &results),
            Err(e) => failure(e),
        }
    }
}

fn failure(e: MaintenanceError) -> HttpResponse {
    let status = match e {
        MaintenanceError::PodNotFound(_) | MaintenanceError::NoMatches(_) => StatusCode::NOT_FOUND,
        MaintenanceError::Api(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    error!(error = %e, "Maintenance request failed");
    text(status, e.to_string())
}
