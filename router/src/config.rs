//! Configuration for the routing service

use crate::error::{Result, RouterError};
use std::env;
use std::net::SocketAddr;

/// Main configuration, loaded from `REITTI_*` environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Tenant id for managed-broker deployments (informational for the
    /// in-memory backends)
    pub project_id: String,

    /// HTTP bind address; port 0 requests an ephemeral port
    pub http_listen_addr: SocketAddr,

    /// Ingress topic all accepted envelopes land on
    pub ingress_topic_id: String,

    /// Subscription the pipeline consumes from
    pub ingress_subscription_id: String,

    /// Worker pool size
    pub num_pipeline_workers: usize,

    /// Per-topic buffer capacity of the in-memory broker
    pub queue_capacity: usize,

    /// Push bridge URL; unset means the stdout notifier
    pub push_webhook_url: Option<String>,

    /// Log level
    pub log_level: String,

    /// Log format (json or pretty)
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: "local-dev".to_string(),
            http_listen_addr: SocketAddr::from(([0, 0, 0, 0], 8082)),
            ingress_topic_id: "ingress-topic".to_string(),
            ingress_subscription_id: "ingress-sub".to_string(),
            num_pipeline_workers: 10,
            queue_capacity: 1024,
            push_webhook_url: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(id) = env::var("REITTI_PROJECT_ID") {
            config.project_id = id;
        }

        if let Ok(addr) = env::var("REITTI_HTTP_ADDR") {
            config.http_listen_addr = addr
                .parse()
                .map_err(|e| RouterError::Config(format!("invalid REITTI_HTTP_ADDR: {e}")))?;
        }

        if let Ok(topic) = env::var("REITTI_INGRESS_TOPIC") {
            config.ingress_topic_id = topic;
        }

        if let Ok(sub) = env::var("REITTI_INGRESS_SUB") {
            config.ingress_subscription_id = sub;
        }

        if let Ok(workers) = env::var("REITTI_PIPELINE_WORKERS") {
            config.num_pipeline_workers = workers
                .parse()
                .map_err(|e| RouterError::Config(format!("invalid REITTI_PIPELINE_WORKERS: {e}")))?;
        }

        if let Ok(capacity) = env::var("REITTI_QUEUE_CAPACITY") {
            config.queue_capacity = capacity
                .parse()
                .map_err(|e| RouterError::Config(format!("invalid REITTI_QUEUE_CAPACITY: {e}")))?;
        }

        if let Ok(url) = env::var("REITTI_PUSH_WEBHOOK_URL") {
            config.push_webhook_url = Some(url);
        }

        if let Ok(level) = env::var("REITTI_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(format) = env::var("REITTI_LOG_FORMAT") {
            config.log_format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(RouterError::Config(format!(
                        "invalid REITTI_LOG_FORMAT: {other} (expected 'json' or 'pretty')"
                    )));
                }
            };
        }

        Ok(config)
    }
}
