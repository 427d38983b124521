//! Readiness of the regions this instance serves, from workload replica counts

use std::sync::Arc;

use tracing::warn;

use crate::cluster::{ClusterApi, ClusterApiError, ReplicaStatus};

#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("[/readydc/<dc>]: <dc> must be specified if more than one local dc is configured")]
    Ambiguous,
    #[error("[/readydc/<dc>] {region} must exist in: {known}")]
    Unknown { region: String, known: String },
    #[error("No database workload found for dc {0}")]
    NoWorkload(String),
    #[error(transparent)]
    Api(#[from] ClusterApiError),
}

impl RegionError {
    /// Caller mistakes, as opposed to the region simply not being ready
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Ambiguous | Self::Unknown { .. })
    }
}

pub struct LocalRegions {
    names: Vec<String>,
    endpoint_labels: String,
    api: Arc<dyn ClusterApi>,
}

impl LocalRegions {
    pub fn new(names: Vec<String>, endpoint_labels: impl Into<String>, api: Arc<dyn ClusterApi>) -> Self {
        Self {
            names,
            endpoint_labels: endpoint_labels.into(),
            api,
        }
    }

    /// Resolve the requested region, defaulting to the sole configured one
    pub fn select(&self, requested: Option<&str>) -> Result<String, RegionError> {
        let region = match requested.filter(|r| !r.is_empty()) {
            Some(region) => region,
            None if self.names.len() > 1 => return Err(RegionError::Ambiguous),
            None => self.names.first().map(String::as_str).unwrap_or_default(),
        };
        if self.names.iter().any(|n| n == region) {
            Ok(region.to_string())
        } else {
            Err(RegionError::Unknown {
                region: region.to_string(),
                known: self.names.join(","),
            })
        }
    }

    /// Replica status of the region's database workload
    pub async fn status(&self, requested: Option<&str>) -> Result<(String, ReplicaStatus), RegionError> {
        let region = self.select(requested)?;
        let selector = format!("datacenter={},{}", region, self.endpoint_labels);
        let statuses = self.api.statefulset_status(&selector).await?;
        match statuses.first() {
            Some(status) => Ok((region, *status)),
            None => {
                warn!(region = %region, selector = %selector, "No stateful set matches region");
                Err(RegionError::NoWorkload(region))
            }
        }
    }
}
