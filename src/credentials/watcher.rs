//! Credentials directory watcher
//!
//! Change detection ([`DirectoryScanner`]) is kept apart from parsing
//! ([`parse_credentials`]); [`CredentialWatcher`] wires the two to the
//! resolver's reload hook.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::resolver::{CredentialResolver, Credentials};

/// Error while reading a credential file
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Reports files that appeared or were rewritten since the previous scan
///
/// Only the top level of the directory is considered.
#[derive(Debug)]
pub struct DirectoryScanner {
    dir: PathBuf,
    seen: HashMap<PathBuf, SystemTime>,
}

impl DirectoryScanner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seen: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Changed files ordered oldest write first
    pub async fn scan(&mut self) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut present = HashMap::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            present.insert(entry.path(), modified);
        }

        let mut changed: Vec<(PathBuf, SystemTime)> = present
            .iter()
            .filter(|(path, modified)| self.seen.get(*path) != Some(*modified))
            .map(|(path, modified)| (path.clone(), *modified))
            .collect();
        changed.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        // Removed files are forgotten; the last credentials they supplied stay active.
        self.seen = present;
        Ok(changed.into_iter().map(|(path, _)| path).collect())
    }
}

/// Extract credentials from a credential file body
///
/// Only documents flagged with a truthy `nodetoolUser` qualify.
pub fn parse_credentials(value: &Value) -> Option<Credentials> {
    let flagged = match value.get("nodetoolUser") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        Some(Value::Null) | None => false,
    };
    if !flagged {
        return None;
    }
    let user = value.get("username")?.as_str()?;
    let password = value.get("password")?.as_str()?;
    Some(Credentials::new(user, password))
}

async fn read_credentials(path: &Path) -> Result<Option<Credentials>, CredentialError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| CredentialError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_credentials(&value))
}

/// Periodically rescans the credentials directory and feeds the resolver
pub struct CredentialWatcher {
    scanner: DirectoryScanner,
    resolver: Arc<CredentialResolver>,
    interval: Duration,
}

impl CredentialWatcher {
    pub fn new(dir: impl Into<PathBuf>, resolver: Arc<CredentialResolver>, interval: Duration) -> Self {
        Self {
            scanner: DirectoryScanner::new(dir),
            resolver,
            interval,
        }
    }

    /// Apply every pending change once
    pub async fn reload(&mut self) -> io::Result<usize> {
        let changed = self.scanner.scan().await?;
        let mut applied = 0;
        for path in changed {
            match read_credentials(&path).await {
                Ok(Some(credentials)) => {
                    debug!(path = %path.display(), "Credential file accepted");
                    self.resolver.on_credential_file_changed(credentials);
                    applied += 1;
                }
                Ok(None) => debug!(path = %path.display(), "Ignoring file without nodetoolUser"),
                Err(e) => warn!(error = %e, "Failed to load credential file"),
            }
        }
        Ok(applied)
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Credential watcher stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.reload().await {
                        error!(dir = %self.scanner.dir().display(), error = %e, "File watcher error");
                    }
                }
            }
        }
    }
}
