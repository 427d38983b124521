//! Region-level readiness
//!
//! This module provides:
//! - Replica-based readiness of the local regions
//! - The cross-region cascade gating region bootstrap
//! - Seed discovery, local and across regions

mod cascade;
mod local;
mod peer;
mod seeds;

pub use cascade::{region_targets, CascadeReport, RegionCascade, RegionOutcome, RegionTarget};
pub use local::{LocalRegions, RegionError};
pub use peer::{HttpPeerClient, PeerClient, ProbeError};
pub use seeds::SeedDiscovery;

#[cfg(test)]
pub(crate) use cascade::tests::FakePeers;
