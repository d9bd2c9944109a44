pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

pub use {
    appender::{AppenderOptions, AppenderStatus, LogAppender},
    builder::Builder,
    config::{ClientConfig, ConfigError, Credentials},
    emf::EmfTransport,
    emitter::{Callbacks, MetricsEmitter, Observer},
    error::{CallError, TransportError, TransportErrorKind},
    registry::ClientRegistry,
    transport::{LogEvent, LogStreamDescription, LogsTransport, MetricSample, MetricsTransport},
};

#[cfg(feature = "aws")]
pub use aws::{AwsLogsTransport, AwsMetricsTransport};

mod appender;
#[cfg(feature = "aws")]
mod aws;
mod builder;
mod config;
mod emf;
mod emitter;
mod error;
mod registry;
mod transport;
