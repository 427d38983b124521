//! Credentials used against the management-protocol proxy
//!
//! This module provides:
//! - A two-variant selector (file-sourced / fallback) flipped by the poll loop
//! - A polling watcher that reloads the file-sourced pair from a directory

mod resolver;
mod watcher;

pub use resolver::{CredentialResolver, CredentialSource, Credentials};
pub use watcher::{parse_credentials, CredentialError, CredentialWatcher, DirectoryScanner};
