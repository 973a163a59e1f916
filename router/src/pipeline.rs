//! Pipeline orchestrator
//!
//! Assembles the consumer, the transformer, and the routing processor
//! into a fixed-size worker pool:
//!
//! ```text
//! MessageConsumer ──► shared receiver ──► worker × N
//!                                           │
//!                                           ├─ transform error ⇒ ack + drop
//!                                           ├─ process error   ⇒ nack
//!                                           └─ process ok      ⇒ ack
//! ```
//!
//! The pool bounds concurrency: when every worker is busy the consumer's
//! bounded channel fills and the broker stops being drained.

use crate::error::{Result, RouterError};
use crate::metrics;
use crate::processor::RoutingProcessor;
use crate::queue::{MessageConsumer, RawMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Worker pool over a message consumer
pub struct Pipeline {
    consumer: Arc<dyn MessageConsumer>,
    processor: Arc<RoutingProcessor>,
    num_workers: usize,
    workers: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Pipeline {
    /// Create a pipeline with `num_workers` workers. Wiring is immutable
    /// after this point.
    pub fn new(
        num_workers: usize,
        consumer: Arc<dyn MessageConsumer>,
        processor: Arc<RoutingProcessor>,
    ) -> Result<Self> {
        if num_workers == 0 {
            return Err(RouterError::Config(
                "pipeline requires at least one worker".to_string(),
            ));
        }
        Ok(Self {
            consumer,
            processor,
            num_workers,
            workers: parking_lot::Mutex::new(Vec::new()),
        })
    }

    /// Start the consumer and launch the worker pool.
    pub async fn start(&self) -> Result<()> {
        {
            let workers = self.workers.lock();
            if !workers.is_empty() {
                return Err(RouterError::Pipeline("pipeline already started".to_string()));
            }
        }

        let rx = self.consumer.start().await?;
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = self.workers.lock();
        for worker_id in 0..self.num_workers {
            let rx = Arc::clone(&rx);
            let processor = Arc::clone(&self.processor);
            workers.push(tokio::spawn(async move {
                worker_loop(worker_id, rx, processor).await;
            }));
        }

        if let Some(m) = metrics::Metrics::get() {
            m.pipeline_workers.set(self.num_workers as f64);
        }
        info!(workers = self.num_workers, "pipeline started");
        Ok(())
    }

    /// Stop the consumer, then wait up to `drain_timeout` for in-flight
    /// workers. Workers still running after the deadline are aborted;
    /// their unacked messages are redelivered by the broker.
    pub async fn stop(&self, drain_timeout: Duration) -> Result<()> {
        self.consumer.stop().await;

        let mut handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let drained = tokio::time::timeout(drain_timeout, async {
            for handle in &mut handles {
                let _ = handle.await;
            }
        })
        .await;

        if let Some(m) = metrics::Metrics::get() {
            m.pipeline_workers.set(0.0);
        }

        match drained {
            Ok(()) => {
                info!("pipeline stopped");
                Ok(())
            }
            Err(_) => {
                for handle in &handles {
                    handle.abort();
                }
                warn!("pipeline workers did not drain in time, aborted");
                Err(RouterError::Shutdown(
                    "pipeline workers did not drain before the deadline".to_string(),
                ))
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<RawMessage>>>,
    processor: Arc<RoutingProcessor>,
) {
    debug!(worker_id, "worker started");
    loop {
        let msg = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(msg) = msg else { break };
        handle_message(msg, &processor).await;
    }
    debug!(worker_id, "worker drained");
}

async fn handle_message(msg: RawMessage, processor: &RoutingProcessor) {
    let envelope = match crate::transform::transform(&msg) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(delivery_id = %msg.id, error = %e, "dropping malformed message");
            metrics::try_record_dropped("malformed", 1);
            msg.ack().await;
            return;
        }
    };

    match processor.process(&envelope).await {
        Ok(outcome) => {
            debug!(
                message_id = %envelope.message_id,
                recipient = %envelope.recipient_id,
                outcome = outcome.label(),
                "message routed"
            );
            metrics::try_record_routed(outcome.label());
            msg.ack().await;
        }
        Err(e) => {
            error!(
                message_id = %envelope.message_id,
                error = %e,
                "routing failed, nacking for redelivery"
            );
            metrics::try_record_nacked(1);
            msg.nack().await;
        }
    }
}
