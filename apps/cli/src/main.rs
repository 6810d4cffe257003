mod args;
mod config;
mod dirs;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use http_api::HttpState;
use relay_app::{AppPaths, IntervalTicker, RefreshOrchestrator, ensure_data_dirs, run_scheduler};
use relay_sources::{CredentialPaths, FileCredentialStore, SourceRegistry};
use relay_store::{MetricsCache, PublicationStore};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = args::parse_args().map_err(|err| {
        eprintln!("{err}");
        args::print_help();
        io::Error::new(io::ErrorKind::InvalidInput, "invalid arguments")
    })?;

    let config = config::load_or_create().map_err(io::Error::other)?;
    if config.created {
        info!(
            path = %config.paths.file.display(),
            port = config.config.port,
            "created default config"
        );
    }

    let data_dir = dirs::resolve_data_dir(args.data_dir).map_err(io::Error::other)?;
    info!(dir = %data_dir.dir.display(), existing = data_dir.matched_existing, "using data dir");

    let paths = AppPaths::new(data_dir.dir);
    ensure_data_dirs(&paths).map_err(io::Error::other)?;

    let credential_paths = CredentialPaths::discover()
        .ok_or_else(|| io::Error::other("could not determine home directory"))?;
    let credentials = Arc::new(FileCredentialStore::new(credential_paths));

    let registry = SourceRegistry::with_default_clients(credentials.clone())
        .map_err(|err| io::Error::other(format!("build http client: {err}")))?;

    let cache = MetricsCache::new(paths.cache_path.clone());
    let publication = PublicationStore::new(
        paths.publication_dir.clone(),
        config.config.publication_namespace.clone(),
    );

    let orchestrator = Arc::new(RefreshOrchestrator::new(
        registry,
        credentials,
        cache,
        publication,
    ));

    let minutes = args.interval_minutes.unwrap_or(config.config.refresh_minutes);
    let ticker = IntervalTicker::new(Duration::from_secs(minutes * 60));
    // First tick fires immediately, so this also covers the startup refresh.
    tokio::spawn(run_scheduler(orchestrator.clone(), ticker));

    let state = HttpState::new(orchestrator);
    let router = http_api::router(state);

    let port = args.port.unwrap_or(config.config.port);
    let (listener, actual_port) = bind_api_port(port).await?;
    info!("quota-relay is serving on http://127.0.0.1:{actual_port}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Binds the loopback listener, preferring the configured port but falling
/// back to an ephemeral one rather than refusing to start. Port 0 asks for
/// an ephemeral port directly.
async fn bind_api_port(preferred: u16) -> io::Result<(tokio::net::TcpListener, u16)> {
    let loopback = std::net::Ipv4Addr::LOCALHOST;
    if preferred != 0 {
        match tokio::net::TcpListener::bind((loopback, preferred)).await {
            Ok(listener) => return Ok((listener, preferred)),
            Err(err) => {
                warn!("port {preferred} is unavailable ({err}); falling back to an ephemeral port")
            }
        }
    }
    let listener = tokio::net::TcpListener::bind((loopback, 0)).await?;
    let port = listener.local_addr()?.port();
    Ok((listener, port))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
    }
}
