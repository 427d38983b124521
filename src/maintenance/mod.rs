//! Maintenance-mode sub-API
//!
//! Served on its own port; see [`crate::server::maintenance`] for the routes.

mod service;

pub use service::{MaintenanceError, MaintenanceService, DATABASE_CONTAINER, MAINTENANCE_CONTAINER};
