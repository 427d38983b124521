//! Active credential selection
//!
//! Two mutually exclusive variants: the pair read from the credentials
//! directory and a fixed fallback pair. The selector is a single bit that
//! only the poll loop flips, once per cycle that produced no successful query.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::info;

use crate::config::CredentialsConfig;

/// A user/secret pair sent to the management proxy
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Which credential variant is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    File,
    Fallback,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Process-wide credential selector
pub struct CredentialResolver {
    from_file: RwLock<Credentials>,
    fallback: Credentials,
    use_fallback: AtomicBool,
    toggles: AtomicU64,
}

impl CredentialResolver {
    pub fn new(fallback: Credentials) -> Self {
        Self {
            from_file: RwLock::new(Credentials::default()),
            fallback,
            use_fallback: AtomicBool::new(false),
            toggles: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CredentialsConfig) -> Self {
        Self::new(Credentials::new(
            config.fallback_user.clone(),
            config.fallback_password.clone(),
        ))
    }

    /// The credential pair to send with the next batch
    pub fn current(&self) -> Credentials {
        match self.source() {
            CredentialSource::File => self.from_file.read().clone(),
            CredentialSource::Fallback => self.fallback.clone(),
        }
    }

    pub fn source(&self) -> CredentialSource {
        if self.use_fallback.load(Ordering::Acquire) {
            CredentialSource::Fallback
        } else {
            CredentialSource::File
        }
    }

    /// Flip to the other variant, returning the newly active one
    pub fn toggle(&self) -> CredentialSource {
        let was_fallback = self.use_fallback.fetch_xor(true, Ordering::AcqRel);
        self.toggles.fetch_add(1, Ordering::Relaxed);
        crate::metrics::metrics().record_credential_toggle();
        if was_fallback {
            CredentialSource::File
        } else {
            CredentialSource::Fallback
        }
    }

    /// Number of flips since startup
    pub fn toggle_count(&self) -> u64 {
        self.toggles.load(Ordering::Relaxed)
    }

    /// Replace the file-sourced pair; the active variant is left alone
    pub fn on_credential_file_changed(&self, credentials: Credentials) {
        let mut current = self.from_file.write();
        if *current != credentials {
            info!(user = %credentials.user, "Credentials reloaded from file");
            *current = credentials;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> CredentialResolver {
        CredentialResolver::new(Credentials::new("cassandra", "cassandra"))
    }

    #[test]
    fn test_starts_with_file_credentials() {
        let resolver = resolver();
        assert_eq!(resolver.source(), CredentialSource::File);
        assert_eq!(resolver.current(), Credentials::default());
    }

    #[test]
    fn test_toggle_flips_between_variants() {
        let resolver = resolver();
        resolver.on_credential_file_changed(Credentials::new("admin", "s3cret"));

        assert_eq!(resolver.toggle(), CredentialSource::Fallback);
        assert_eq!(resolver.current(), Credentials::new("cassandra", "cassandra"));

        assert_eq!(resolver.toggle(), CredentialSource::File);
        assert_eq!(resolver.current(), Credentials::new("admin", "s3cret"));
    }

    #[test]
    fn test_file_change_does_not_switch_variant() {
        let resolver = resolver();
        resolver.toggle();
        resolver.on_credential_file_changed(Credentials::new("admin", "s3cret"));

        assert_eq!(resolver.source(), CredentialSource::Fallback);
        assert_eq!(resolver.current().user, "cassandra");
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("admin", "s3cret"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("s3cret"));
    }
}
