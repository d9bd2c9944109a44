//! # Registry
//!
//! Process-wide owner of the transports, returned from cloudwatch_bridge::Builder

use super::appender::{AppenderOptions, LogAppender};
use super::emitter::MetricsEmitter;
use super::error::CallError;
use super::transport::{LogsTransport, MetricsTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

/// Configuration via Builder
pub struct Config {
    pub region: String,
    pub metrics: Option<Arc<dyn MetricsTransport>>,
    pub logs: Option<Arc<dyn LogsTransport>>,
    pub runtime: Handle,
    pub appender_options: AppenderOptions,
}

/// Transport handles shared read-only by every emitter and appender created from one registry
pub(crate) struct Shared {
    metrics: Option<Arc<dyn MetricsTransport>>,
    logs: Option<Arc<dyn LogsTransport>>,
    running: AtomicBool,
}

impl Shared {
    pub(crate) fn metrics(&self) -> Result<Arc<dyn MetricsTransport>, CallError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(CallError::NotConfigured);
        }
        self.metrics.clone().ok_or(CallError::NotConfigured)
    }

    pub(crate) fn logs(&self) -> Result<Arc<dyn LogsTransport>, CallError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(CallError::NotConfigured);
        }
        self.logs.clone().ok_or(CallError::NotConfigured)
    }
}

/// CloudWatch client registry
///
/// Use [Builder](super::Builder) to construct. Dropping the registry (or calling
/// [ClientRegistry::shutdown]) detaches every emitter and appender created from it, later calls
/// on them are dropped with [CallError::NotConfigured]. Requests already submitted run to completion.
///
/// # Example
/// ```no_run
/// # async fn example(transport: std::sync::Arc<dyn cloudwatch_bridge::MetricsTransport>) -> Result<(), cloudwatch_bridge::Error> {
/// let registry = cloudwatch_bridge::Builder::new()
///     .region("us-west-2")
///     .metrics_transport(transport)
///     .init()?;
///
/// let metrics = registry.metrics_emitter("GameServer", "Map");
/// metrics.emit("Forest", "PlayersOnline", 12.0);
///
/// registry.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct ClientRegistry {
    shared: Arc<Shared>,
    runtime: Handle,
    region: String,
    appender_options: AppenderOptions,
}

impl ClientRegistry {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            shared: Arc::new(Shared {
                metrics: config.metrics,
                logs: config.logs,
                running: AtomicBool::new(true),
            }),
            runtime: config.runtime,
            region: config.region,
            appender_options: config.appender_options,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn has_metrics(&self) -> bool {
        self.shared.metrics.is_some()
    }

    pub fn has_logs(&self) -> bool {
        self.shared.logs.is_some()
    }

    /// Creates an emitter that tags every sample with the dimension `group` under `namespace`
    pub fn metrics_emitter(&self, namespace: impl Into<String>, group: impl Into<String>) -> MetricsEmitter {
        MetricsEmitter::new(namespace.into(), group.into(), self.shared.clone(), self.runtime.clone())
    }

    /// Creates an appender writing to `stream` within `group`, both are created on first use if missing
    pub fn log_appender(&self, group: impl Into<String>, stream: impl Into<String>) -> LogAppender {
        LogAppender::new(
            group.into(),
            stream.into(),
            self.appender_options.clone(),
            self.shared.clone(),
            self.runtime.clone(),
        )
    }

    pub fn shutdown(self) {
        drop(self)
    }
}

impl Drop for ClientRegistry {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        info!("Shutting down CloudWatch clients in {}", self.region);
    }
}
