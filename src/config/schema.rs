use serde::Deserialize;

use super::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Management-protocol proxy and polling
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Region layout used by readiness, bootstrap gating and seed discovery
    #[serde(default)]
    pub regions: RegionsConfig,
    #[serde(default)]
    pub seeds: SeedsConfig,
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Reject combinations that would make the sidecar misbehave silently
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "proxy.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.server.listen_port == self.server.maintenance_port {
            return Err(ConfigError::Invalid(format!(
                "server.listen_port and server.maintenance_port are both {}",
                self.server.listen_port
            )));
        }
        if self.regions.all_ingress_domains.is_some() && self.regions.prober_subdomain.is_empty() {
            return Err(ConfigError::Invalid(
                "regions.prober_subdomain is required when regions.all_ingress_domains is set"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Probe API port (health checks, region gates, seeds, metrics)
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Maintenance sub-API port
    #[serde(default = "default_maintenance_port")]
    pub maintenance_port: u16,
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8888
}

fn default_maintenance_port() -> u16 {
    8889
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            maintenance_port: default_maintenance_port(),
        }
    }
}

// ============================================================================
// Management-protocol proxy
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Batch endpoint of the proxy
    #[serde(default = "default_proxy_url")]
    pub url: String,
    /// Management port of every database node
    #[serde(default = "default_jmx_port")]
    pub jmx_port: u16,
    /// Period between aggregation cycles (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Client-side deadline for a batch call; 0 leaves it to the proxy
    #[serde(default)]
    pub request_timeout_ms: u64,
}

fn default_proxy_url() -> String {
    "http://localhost:8080/jolokia".to_string()
}

fn default_jmx_port() -> u16 {
    7199
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            url: default_proxy_url(),
            jmx_port: default_jmx_port(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: 0,
        }
    }
}

// ============================================================================
// Credentials
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Directory holding credential files
    #[serde(default = "default_credentials_dir")]
    pub dir: String,
    /// How often the directory is rescanned (milliseconds)
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
    #[serde(default = "default_fallback_user")]
    pub fallback_user: String,
    #[serde(default = "default_fallback_password")]
    pub fallback_password: String,
}

fn default_credentials_dir() -> String {
    "./users".to_string()
}

fn default_watch_interval_ms() -> u64 {
    1000
}

fn default_fallback_user() -> String {
    "cassandra".to_string()
}

fn default_fallback_password() -> String {
    "cassandra".to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            dir: default_credentials_dir(),
            watch_interval_ms: default_watch_interval_ms(),
            fallback_user: default_fallback_user(),
            fallback_password: default_fallback_password(),
        }
    }
}

// ============================================================================
// Regions
// ============================================================================

/// Region layout
///
/// Local mode (`all_ingress_domains` absent): the cascade walks `local` and
/// calls back into this process. Ingress mode: the cascade walks
/// `all_ingress_domains` and calls every region's public prober ingress.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionsConfig {
    /// Ordered local region names
    #[serde(default)]
    pub local: Vec<String>,
    /// Ordered ingress domains of every region, this one included
    #[serde(default)]
    pub all_ingress_domains: Option<Vec<String>>,
    /// Ingress domain of this region (bootstrap cutoff in ingress mode)
    #[serde(default)]
    pub local_ingress_domain: String,
    /// Ingress domains of the other regions, used for seed aggregation
    #[serde(default)]
    pub external_ingress_domains: Vec<String>,
    /// Host label prepended to ingress domains
    #[serde(default)]
    pub prober_subdomain: String,
    /// Timeout for calls to peer regions (milliseconds)
    #[serde(default = "default_peer_timeout_ms")]
    pub peer_timeout_ms: u64,
}

fn default_peer_timeout_ms() -> u64 {
    2000
}

impl Default for RegionsConfig {
    fn default() -> Self {
        Self {
            local: Vec::new(),
            all_ingress_domains: None,
            local_ingress_domain: String::new(),
            external_ingress_domains: Vec::new(),
            prober_subdomain: String::new(),
            peer_timeout_ms: default_peer_timeout_ms(),
        }
    }
}

impl RegionsConfig {
    pub fn is_ingress_mode(&self) -> bool {
        self.all_ingress_domains.is_some()
    }
}

// ============================================================================
// Seeds
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedsConfig {
    /// Seed pod hostnames; only the first DNS label is used as the pod name
    #[serde(default)]
    pub hostnames: Vec<String>,
}

impl SeedsConfig {
    pub fn pod_names(&self) -> Vec<String> {
        self.hostnames
            .iter()
            .filter_map(|host| host.split('.').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// ============================================================================
// Kubernetes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_token_path")]
    pub token_path: String,
    #[serde(default = "default_ca_path")]
    pub ca_path: String,
    /// Label selector of the database pods and stateful sets
    #[serde(default = "default_endpoint_labels")]
    pub endpoint_labels: String,
    /// Config map holding per-pod maintenance flags
    #[serde(default = "default_maintenance_config_map")]
    pub maintenance_config_map: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_api_url() -> String {
    "https://kubernetes.default.svc".to_string()
}

fn default_token_path() -> String {
    "/var/run/secrets/kubernetes.io/serviceaccount/token".to_string()
}

fn default_ca_path() -> String {
    "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt".to_string()
}

fn default_endpoint_labels() -> String {
    "app.kubernetes.io/component=database".to_string()
}

fn default_maintenance_config_map() -> String {
    "cassandra-maintenance".to_string()
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            api_url: default_api_url(),
            token_path: default_token_path(),
            ca_path: default_ca_path(),
            endpoint_labels: default_endpoint_labels(),
            maintenance_config_map: default_maintenance_config_map(),
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.listen_port, 8888);
        assert_eq!(config.server.maintenance_port, 8889);
        assert_eq!(config.proxy.poll_interval_ms, 10_000);
        assert_eq!(config.proxy.jmx_port, 7199);
        assert_eq!(config.credentials.fallback_user, "cassandra");
        assert!(config.regions.local.is_empty());
        assert!(!config.regions.is_ingress_mode());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
listen_addr = "127.0.0.1"
listen_port = 9000
maintenance_port = 9001

[proxy]
url = "http://jolokia:8080/jolokia"
jmx_port = 7200
poll_interval_ms = 5000

[credentials]
dir = "/etc/cassandra/users"

[regions]
local = ["dc1", "dc2"]
all_ingress_domains = ["us.example.com", "eu.example.com"]
local_ingress_domain = "eu.example.com"
external_ingress_domains = ["us.example.com"]
prober_subdomain = "db-prober"

[seeds]
hostnames = ["cluster-dc1-0.cluster.ns.svc.cluster.local", "cluster-dc2-0"]

[kubernetes]
namespace = "db"

[log]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1");
        assert_eq!(config.proxy.url, "http://jolokia:8080/jolokia");
        assert_eq!(config.proxy.poll_interval_ms, 5000);
        assert_eq!(config.credentials.dir, "/etc/cassandra/users");
        assert_eq!(config.credentials.watch_interval_ms, 1000); // default
        assert_eq!(config.regions.local, vec!["dc1", "dc2"]);
        assert!(config.regions.is_ingress_mode());
        assert_eq!(config.regions.peer_timeout_ms, 2000);
        assert_eq!(
            config.seeds.pod_names(),
            vec!["cluster-dc1-0".to_string(), "cluster-dc2-0".to_string()]
        );
        assert_eq!(config.kubernetes.namespace, "db");
        assert_eq!(
            config.kubernetes.endpoint_labels,
            "app.kubernetes.io/component=database"
        );
        assert_eq!(config.log.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.proxy.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_shared_ports() {
        let mut config = Config::default();
        config.server.maintenance_port = config.server.listen_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_subdomain_in_ingress_mode() {
        let mut config = Config::default();
        config.regions.all_ingress_domains = Some(vec!["a.example.com".to_string()]);
        assert!(config.validate().is_err());

        config.regions.prober_subdomain = "prober".to_string();
        assert!(config.validate().is_ok());
    }
}
