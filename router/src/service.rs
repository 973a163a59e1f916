//! Service wrapper: pipeline + HTTP listener under one lifecycle
//!
//! `new` binds the listener immediately (so `:0` resolves to a real port
//! before anything starts), `start` runs the pipeline and the HTTP
//! server, and `shutdown` stops both concurrently. Each side is always
//! attempted; the first error wins.

use crate::config::Config;
use crate::deliver::DeliveryProducer;
use crate::error::{Result, RouterError};
use crate::ingest::IngestionProducer;
use crate::notify::{DeviceToken, PushNotifier};
use crate::pipeline::Pipeline;
use crate::presence::{ConnectionInfo, Fetcher};
use crate::processor::RoutingProcessor;
use crate::queue::MessageConsumer;
use crate::server::{AppState, build_router};
use crate::store::MessageStore;
use crate::urn::Urn;
use axum::Router;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::sync::watch;
use tracing::{error, info};

/// The five capability objects the routing core depends on
///
/// All durable and real-time state lives behind these; the core itself
/// holds nothing but wiring.
pub struct Dependencies {
    pub presence: Arc<dyn Fetcher<Urn, ConnectionInfo>>,
    pub device_tokens: Arc<dyn Fetcher<Urn, Vec<DeviceToken>>>,
    pub delivery: Arc<dyn DeliveryProducer>,
    pub notifier: Arc<dyn PushNotifier>,
    pub store: Arc<dyn MessageStore>,
}

/// The assembled routing service
pub struct RoutingService {
    local_addr: SocketAddr,
    listener: Mutex<Option<TcpListener>>,
    router: Mutex<Option<Router>>,
    pipeline: Arc<Pipeline>,
    shutdown: watch::Sender<bool>,
    server_task: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
}

impl RoutingService {
    /// Wire up the whole service. Binds the HTTP listener but does not
    /// serve or consume yet.
    pub async fn new(
        cfg: &Config,
        deps: Dependencies,
        consumer: Arc<dyn MessageConsumer>,
        producer: Arc<dyn IngestionProducer>,
    ) -> Result<Self> {
        let processor = Arc::new(RoutingProcessor::new(
            deps.presence,
            deps.device_tokens,
            deps.delivery,
            deps.notifier,
            Arc::clone(&deps.store),
        ));
        let pipeline = Arc::new(Pipeline::new(
            cfg.num_pipeline_workers,
            consumer,
            processor,
        )?);

        let listener = TcpListener::bind(cfg.http_listen_addr).await?;
        let local_addr = listener.local_addr()?;

        let router = build_router(AppState {
            producer,
            store: deps.store,
        });

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            local_addr,
            listener: Mutex::new(Some(listener)),
            router: Mutex::new(Some(router)),
            pipeline,
            shutdown,
            server_task: Mutex::new(None),
        })
    }

    /// Start the processing pipeline and the HTTP server.
    pub async fn start(&self) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .take()
            .ok_or_else(|| RouterError::Pipeline("service already started".to_string()))?;
        let router = self
            .router
            .lock()
            .take()
            .ok_or_else(|| RouterError::Pipeline("service already started".to_string()))?;

        self.pipeline.start().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                })
                .await
        });
        *self.server_task.lock() = Some(handle);

        info!(addr = %self.local_addr, "HTTP server listening");
        Ok(())
    }

    /// The address the HTTP listener actually bound
    pub fn http_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The port the HTTP listener actually bound (useful with `:0`)
    pub fn http_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stop accepting HTTP requests and consuming messages, then wait up
    /// to `timeout` for in-flight work on both sides.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        info!("shutting down service components");
        let _ = self.shutdown.send(true);
        let server_task = self.server_task.lock().take();

        let http = async {
            let Some(handle) = server_task else {
                return Ok(());
            };
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(e))) => {
                    error!(error = %e, "HTTP server shutdown failed");
                    Err(RouterError::Io(e))
                }
                Ok(Err(e)) => {
                    error!(error = %e, "HTTP server task failed");
                    Err(RouterError::Shutdown(e.to_string()))
                }
                Err(_) => Err(RouterError::Shutdown(
                    "HTTP server did not stop before the deadline".to_string(),
                )),
            }
        };
        let pipe = self.pipeline.stop(timeout);

        let (http_result, pipeline_result) = tokio::join!(http, pipe);
        let result = http_result.and(pipeline_result);
        if result.is_ok() {
            info!("service shutdown complete");
        }
        result
    }
}
