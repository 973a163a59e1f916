//! REITTI Router - single entry point
//!
//! Run with: `cargo run`
//!
//! Environment variables:
//! - `REITTI_HTTP_ADDR`: HTTP bind address (default: "0.0.0.0:8082")
//! - `REITTI_INGRESS_TOPIC`: ingress topic name (default: "ingress-topic")
//! - `REITTI_INGRESS_SUB`: ingress subscription name (default: "ingress-sub")
//! - `REITTI_PIPELINE_WORKERS`: worker pool size (default: 10)
//! - `REITTI_QUEUE_CAPACITY`: in-memory topic buffer (default: 1024)
//! - `REITTI_PUSH_WEBHOOK_URL`: push bridge URL (default: stdout notifier)
//! - `REITTI_LOG_LEVEL` / `REITTI_LOG_FORMAT`: logging (default: "info" / pretty)

use reitti_router::config::{Config, LogFormat};
use reitti_router::metrics::Metrics;
use reitti_router::notify::{DeviceToken, PushNotifier, StdoutNotifier, WebhookNotifier};
use reitti_router::presence::{ConnectionInfo, MemoryCache};
use reitti_router::queue::{MemoryBroker, MemoryConsumer};
use reitti_router::service::{Dependencies, RoutingService};
use reitti_router::store::MemoryMessageStore;
use reitti_router::{MemoryDeliveryProducer, MemoryIngestionProducer, Urn};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_level.clone().into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    info!(
        project_id = %config.project_id,
        http_addr = %config.http_listen_addr,
        ingress_topic = %config.ingress_topic_id,
        ingress_sub = %config.ingress_subscription_id,
        workers = config.num_pipeline_workers,
        "starting REITTI router"
    );

    Metrics::init()?;

    // In-memory backends behind the capability seams; a managed broker,
    // document store, and push vendor slot in here by configuration.
    let broker = Arc::new(MemoryBroker::new(config.queue_capacity));
    let consumer = Arc::new(MemoryConsumer::new(
        broker.subscribe(&config.ingress_topic_id)?,
    ));
    let producer = Arc::new(MemoryIngestionProducer::new(
        Arc::clone(&broker),
        config.ingress_topic_id.clone(),
    ));

    let notifier: Arc<dyn PushNotifier> = match &config.push_webhook_url {
        Some(url) => {
            info!(url = %url, "using webhook push notifier");
            Arc::new(WebhookNotifier::new(url.clone())?)
        }
        None => {
            info!("no push bridge configured, using stdout notifier");
            Arc::new(StdoutNotifier::new())
        }
    };

    let deps = Dependencies {
        presence: Arc::new(MemoryCache::<Urn, ConnectionInfo>::new()),
        device_tokens: Arc::new(MemoryCache::<Urn, Vec<DeviceToken>>::new()),
        delivery: Arc::new(MemoryDeliveryProducer::new(Arc::clone(&broker))),
        notifier,
        store: Arc::new(MemoryMessageStore::new()),
    };

    let service = RoutingService::new(&config, deps, consumer, producer).await?;
    service.start().await?;
    info!(port = service.http_port(), "REITTI router started");

    shutdown_signal().await;

    info!("shutdown signal received, stopping service");
    service.shutdown(SHUTDOWN_GRACE).await?;
    info!("REITTI router shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "failed to install Ctrl+C handler");
            // Fall through - rely on SIGTERM
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
