use log::*;
use service::{config::Config, logging::Logger, AppState};
use sse::producer::{
    HeartbeatSource, HttpVersionProvider, StaticVersionProvider, VersionProvider, VersionSource,
    VersionWatcher,
};
use sse::Manager;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!(
        "Starting push events service [{}] (revision {})",
        config.runtime_env(),
        config.backend_revision
    );

    let app_state = AppState::new(config.clone());
    let shutdown = CancellationToken::new();

    let producers = vec![
        HeartbeatSource::new(app_state.sse_manager.clone(), config.heartbeat_interval())
            .spawn(shutdown.clone()),
        spawn_version_source(&config, app_state.sse_manager.clone(), shutdown.clone()),
    ];

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
            return;
        }
        info!("Shutdown signal received, stopping producers");
        server_shutdown.cancel();
    });

    let signal = shutdown.clone();
    let served = web::init_server(app_state, async move { signal.cancelled().await }).await;

    shutdown.cancel();
    for producer in producers {
        if let Err(e) = producer.await {
            warn!("Producer task ended abnormally: {e}");
        }
    }

    if let Err(e) = served {
        error!("Server failed: {e}");
        std::process::exit(1);
    }
    info!("Server stopped");
}

fn spawn_version_source(
    config: &Config,
    manager: Arc<Manager>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let provider: Box<dyn VersionProvider> = match config.version_url() {
        Some(url) => match HttpVersionProvider::new(url) {
            Ok(provider) => Box::new(provider),
            Err(e) => {
                error!("Failed to create version provider for {url}: {e}");
                std::process::exit(1);
            }
        },
        None => {
            info!("No version URL configured, reporting the backend revision as frontend version");
            Box::new(StaticVersionProvider(config.backend_revision.clone()))
        }
    };

    let watcher = VersionWatcher::new(
        provider,
        config.backend_revision.clone(),
        config.build_date.clone(),
    );
    VersionSource::new(watcher, manager, config.version_poll_interval()).spawn(shutdown)
}
