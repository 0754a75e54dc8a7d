use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

use userworkers::{Client, DockerEngine, FileStore};
use userworkers_controller::{
    BackendKind, Config, DockerBackend, DockerSettings, FissionBackend, FissionSettings,
    Reconciler, Schedule,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn shutdown_on_ctrl_c() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received shutdown signal, stopping controller..."),
            Err(err) => tracing::error!("Failed to listen for shutdown signal: {err}"),
        }
        token.cancel();
    });
    shutdown
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
    let config = Config::load()?;
    let shutdown = shutdown_on_ctrl_c();
    let store = FileStore::new(&config.workers_file);
    let schedule = Schedule::from_config(&config);

    match config.backend {
        BackendKind::Kubernetes => {
            let mut builder = Client::builder();
            builder.name(&config.name);
            if let Some(namespace) = &config.namespace {
                builder.namespace(namespace);
            }
            let client = builder.build().await?;
            let settings = FissionSettings::from_config(&config, client.default_namespace())?;
            tracing::info!(
                "Reconciling Fission resources in {} namespace...",
                client.default_namespace()
            );
            let backend = FissionBackend::from_client(&client, settings);
            let reconciler = Reconciler::new(backend, store).with_page_size(config.page_size);
            userworkers_controller::run(&reconciler, schedule, shutdown).await;
        }
        BackendKind::Docker => {
            let engine = DockerEngine::connect()?;
            let network_id = match &config.docker.network_id {
                Some(id) => Some(id.clone()),
                None => engine.find_network(&config.docker.network_name).await?,
            };
            if network_id.is_none() {
                tracing::warn!(
                    "No Docker network matches {}, containers will use the default network",
                    config.docker.network_name
                );
            }
            let settings = DockerSettings::from_config(&config, network_id);
            tracing::info!("Reconciling Docker containers...");
            let backend = DockerBackend::new(settings, Arc::new(engine));
            let reconciler = Reconciler::new(backend, store).with_page_size(config.page_size);
            userworkers_controller::run(&reconciler, schedule, shutdown).await;
        }
        BackendKind::None => {
            tracing::info!("No backend configured, idling until shutdown");
            shutdown.cancelled().await;
        }
    }
    Ok(())
}
