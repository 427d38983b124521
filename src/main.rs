mod cluster;
mod config;
mod credentials;
mod health;
mod maintenance;
mod metrics;
mod protocol;
mod region;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cluster::{ClusterApi, KubeClient};
use config::Config;
use credentials::{CredentialResolver, CredentialWatcher};
use health::{DnsHostnameResolver, MatrixBuilder, NodeRegistry, StatePoller};
use maintenance::MaintenanceService;
use protocol::{ProxyClient, RequestFactory};
use region::{HttpPeerClient, LocalRegions, PeerClient, RegionCascade, SeedDiscovery};
use server::{MaintenanceRoutes, ProbeRoutes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, source) = load_or_default_config();

    // Initialize logging; RUST_LOG overrides the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .init();
    source.log();

    let shutdown = CancellationToken::new();

    // Credentials and the management proxy
    let credentials = Arc::new(CredentialResolver::from_config(&config.credentials));
    let watcher = CredentialWatcher::new(
        &config.credentials.dir,
        credentials.clone(),
        Duration::from_millis(config.credentials.watch_interval_ms),
    );
    let proxy = Arc::new(ProxyClient::new(&config.proxy)?);
    let requests = RequestFactory::new(config.proxy.jmx_port, credentials.clone());

    // Node state aggregation
    let registry = Arc::new(NodeRegistry::new(Arc::new(
        DnsHostnameResolver::from_system_conf()?,
    )));
    let poller = Arc::new(StatePoller::new(
        registry.clone(),
        MatrixBuilder::new(proxy, requests),
        credentials.clone(),
        Duration::from_millis(config.proxy.poll_interval_ms),
    ));

    // Orchestrator and peer regions
    let cluster: Arc<dyn ClusterApi> = Arc::new(KubeClient::from_config(&config.kubernetes)?);
    let peers: Arc<dyn PeerClient> = Arc::new(HttpPeerClient::new(Duration::from_millis(
        config.regions.peer_timeout_ms,
    ))?);

    let probe_routes = Arc::new(ProbeRoutes::new(
        registry,
        LocalRegions::new(
            config.regions.local.clone(),
            config.kubernetes.endpoint_labels.clone(),
            cluster.clone(),
        ),
        RegionCascade::from_config(&config.regions, config.server.listen_port, peers.clone()),
        SeedDiscovery::from_config(&config.seeds, &config.regions, cluster.clone(), peers),
    ));
    let maintenance_routes = Arc::new(MaintenanceRoutes::new(MaintenanceService::new(
        cluster,
        config.kubernetes.maintenance_config_map.clone(),
        config.kubernetes.endpoint_labels.clone(),
    )));

    let probe_listener = TcpListener::bind((
        config.server.listen_addr.as_str(),
        config.server.listen_port,
    ))
    .await?;
    let maintenance_listener = TcpListener::bind((
        config.server.listen_addr.as_str(),
        config.server.maintenance_port,
    ))
    .await?;

    info!(
        proxy = %config.proxy.url,
        local_regions = ?config.regions.local,
        ingress_mode = config.regions.is_ingress_mode(),
        "Cassandra readiness prober starting"
    );

    let poll_task = poller.start(shutdown.clone());
    let watcher_task = tokio::spawn(watcher.run(shutdown.clone()));
    let probe_task = tokio::spawn(server::serve(
        probe_listener,
        "probe",
        shutdown.clone(),
        move |method, path, peer| {
            let routes = probe_routes.clone();
            async move { routes.handle(&method, &path, peer).await }
        },
    ));
    let maintenance_task = tokio::spawn(server::serve(
        maintenance_listener,
        "maintenance",
        shutdown.clone(),
        move |method, path, _peer| {
            let routes = maintenance_routes.clone();
            async move { routes.handle(&method, &path).await }
        },
    ));

    shutdown_signal().await;
    info!("Shutdown signal received");
    shutdown.cancel();

    let (poll, watch, probe, maintenance) =
        tokio::join!(poll_task, watcher_task, probe_task, maintenance_task);
    for (name, result) in [("poll loop", poll), ("credential watcher", watch)] {
        if let Err(e) = result {
            error!(task = name, error = %e, "Task failed");
        }
    }
    for (name, result) in [("probe server", probe), ("maintenance server", maintenance)] {
        match result {
            Ok(Err(e)) => error!(task = name, error = %e, "Server failed"),
            Err(e) => error!(task = name, error = %e, "Task failed"),
            Ok(Ok(())) => {}
        }
    }

    info!("Prober stopped");
    Ok(())
}

/// Where the configuration came from, logged once logging is up
enum ConfigSource {
    File(PathBuf),
    Default(Vec<String>),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            Self::File(path) => info!(path = %path.display(), "Loaded configuration"),
            Self::Default(failures) => {
                for failure in failures {
                    warn!(error = %failure, "Failed to load config");
                }
                info!("Using default configuration");
            }
        }
    }
}

fn load_or_default_config() -> (Config, ConfigSource) {
    // (path, explicitly requested)
    let mut config_paths: Vec<(PathBuf, bool)> = Vec::new();
    if let Ok(path) = std::env::var("PROBER_CONFIG") {
        config_paths.push((PathBuf::from(path), true));
    }
    config_paths.push((PathBuf::from("config/prober.toml"), false));
    config_paths.push((PathBuf::from("prober.toml"), false));
    load_first_config(config_paths)
}

/// First loadable config among `(path, explicitly requested)` candidates
fn load_first_config(config_paths: Vec<(PathBuf, bool)>) -> (Config, ConfigSource) {
    let mut failures = Vec::new();
    for (path, explicit) in config_paths {
        // Only an explicitly requested file is expected to exist
        if !explicit && !path.exists() {
            continue;
        }
        match config::load_config(&path) {
            Ok(config) => return (config, ConfigSource::File(path)),
            Err(e) => failures.push(format!("{}: {}", path.display(), e)),
        }
    }

    (Config::default(), ConfigSource::Default(failures))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "SIGTERM handler unavailable"),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
    }
}
