//! Reverse lookup of a node's hostname

use std::net::IpAddr;

use async_trait::async_trait;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::TokioAsyncResolver;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Resolver unavailable: {0}")]
    Init(String),
    #[error("Reverse lookup of {ip} failed: {message}")]
    Failed { ip: IpAddr, message: String },
}

/// Resolves the short hostname of an address
#[async_trait]
pub trait HostnameResolver: Send + Sync {
    /// `Ok(None)` when the address has no PTR record
    async fn reverse_lookup(&self, ip: IpAddr) -> Result<Option<String>, LookupError>;
}

/// System-configured DNS resolver
pub struct DnsHostnameResolver {
    resolver: TokioAsyncResolver,
}

impl DnsHostnameResolver {
    pub fn from_system_conf() -> Result<Self, LookupError> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e: ResolveError| LookupError::Init(e.to_string()))?;
        Ok(Self { resolver })
    }
}

#[async_trait]
impl HostnameResolver for DnsHostnameResolver {
    async fn reverse_lookup(&self, ip: IpAddr) -> Result<Option<String>, LookupError> {
        match self.resolver.reverse_lookup(ip).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .next()
                .and_then(|name| first_label(&name.to_string()))),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(None),
            Err(e) => Err(LookupError::Failed {
                ip,
                message: e.to_string(),
            }),
        }
    }
}

/// `cass-dc1-0.cass-dc1.default.svc.cluster.local.` -> `cass-dc1-0`
pub fn first_label(name: &str) -> Option<String> {
    name.split('.')
        .next()
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_label() {
        assert_eq!(
            first_label("cass-dc1-0.cass-dc1.default.svc.cluster.local."),
            Some("cass-dc1-0".to_string())
        );
        assert_eq!(first_label("host"), Some("host".to_string()));
        assert_eq!(first_label(""), None);
        assert_eq!(first_label("."), None);
    }
}
