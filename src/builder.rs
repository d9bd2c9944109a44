use super::appender::AppenderOptions;
use super::config::{ClientConfig, Credentials};
use super::registry::{self, ClientRegistry};
use super::transport::{LogsTransport, MetricsTransport};
use super::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, warn};

/// Builder for the CloudWatch client registry
///
/// # Example
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = cloudwatch_bridge::Builder::new()
///     .metrics_transport(std::sync::Arc::new(cloudwatch_bridge::EmfTransport::new(std::io::stdout())))
///     .init()
///     .unwrap();
/// # }
/// ```
pub struct Builder {
    config: ClientConfig,
    metrics: Option<Arc<dyn MetricsTransport>>,
    logs: Option<Arc<dyn LogsTransport>>,
    runtime: Option<Handle>,
    appender_options: AppenderOptions,
    #[cfg(feature = "aws")]
    aws: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::from_config(ClientConfig::default())
    }

    /// Start from an existing configuration, e.g. [ClientConfig::from_env]
    pub fn from_config(config: ClientConfig) -> Self {
        Builder {
            config,
            metrics: None,
            logs: None,
            runtime: None,
            appender_options: AppenderOptions::default(),
            #[cfg(feature = "aws")]
            aws: false,
        }
    }

    /// Sets the AWS region, defaults to us-east-1
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    /// Sets the access key and secret of your AWS user
    ///
    /// <http://docs.aws.amazon.com/general/latest/gr/managing-aws-access-keys.html>
    pub fn credentials(mut self, access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        self.config.credentials = Some(Credentials::new(access_key_id, secret_access_key));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Transport used by every [MetricsEmitter](super::MetricsEmitter)
    pub fn metrics_transport(mut self, transport: Arc<dyn MetricsTransport>) -> Self {
        self.metrics = Some(transport);
        self
    }

    /// Transport used by every [LogAppender](super::LogAppender)
    pub fn logs_transport(mut self, transport: Arc<dyn LogsTransport>) -> Self {
        self.logs = Some(transport);
        self
    }

    /// Use the AWS SDK for whichever transports were not set explicitly
    /// * Credentials must be set or init() will return Err("credentials missing")
    #[cfg(feature = "aws")]
    pub fn with_aws(mut self) -> Self {
        self.aws = true;
        self
    }

    /// Runtime that completion handlers and flush cycles are spawned on
    /// * Defaults to the runtime init() is called from
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Put a batch back in front of the buffer when PutLogEvents fails, instead of dropping it
    pub fn requeue_failed_batches(mut self, requeue: bool) -> Self {
        self.appender_options.requeue_failed_batches = requeue;
        self
    }

    /// Private helper for consuming the builder into registry configuration
    fn build(self) -> Result<registry::Config, Error> {
        self.config.validate()?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| "no tokio runtime, call init() from within one or set Builder::runtime")?,
        };

        #[allow(unused_mut)]
        let (mut metrics, mut logs) = (self.metrics, self.logs);

        #[cfg(feature = "aws")]
        if self.aws {
            if metrics.is_none() {
                metrics = Some(Arc::new(super::aws::AwsMetricsTransport::new(&self.config)?));
            }
            if logs.is_none() {
                logs = Some(Arc::new(super::aws::AwsLogsTransport::new(&self.config)?));
            }
        }

        Ok(registry::Config {
            region: self.config.region,
            metrics,
            logs,
            runtime,
            appender_options: self.appender_options,
        })
    }

    /// Initialize the registry, the returned handle is shared by every emitter and appender created from it
    pub fn init(self) -> Result<ClientRegistry, Error> {
        let config = self.build()?;

        if config.metrics.is_none() && config.logs.is_none() {
            warn!("CloudWatch registry has no transports, every call will be dropped");
        }
        info!(
            "CloudWatch clients initialized in {} (metrics: {}, logs: {})",
            config.region,
            config.metrics.is_some(),
            config.logs.is_some()
        );

        Ok(ClientRegistry::new(config))
    }
}
