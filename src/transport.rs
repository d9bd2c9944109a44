//! # Transport
//!
//! The capability that actually talks to CloudWatch. Emitters and appenders only ever see
//! these traits, the `aws` feature and [EmfTransport](super::EmfTransport) provide implementations.
//!
//! Every method returns a `'static` boxed future, so an implementation must copy what it needs
//! out of the borrowed arguments before returning.

use super::error::TransportError;
use futures::future::BoxFuture;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single measurement for PutMetricData
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub namespace: String,
    pub dimension_name: String,
    pub dimension_value: String,
    pub metric_name: String,
    pub value: f64,
    pub unit: Option<metrics::Unit>,
}

/// One line queued for PutLogEvents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Microseconds since the unix epoch
    pub timestamp_micros: i64,
    pub message: String,
}

impl LogEvent {
    pub fn new(timestamp_micros: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp_micros,
            message: message.into(),
        }
    }

    /// CloudWatch Logs wants milliseconds on the wire
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_micros / 1_000
    }
}

/// Wall clock in microseconds since the unix epoch
pub(crate) fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or_default()
}

/// A stream listed by DescribeLogStreams
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStreamDescription {
    pub name: String,
    pub upload_sequence_token: Option<String>,
}

pub trait MetricsTransport: Send + Sync {
    fn put_metric(&self, sample: MetricSample) -> BoxFuture<'static, Result<(), TransportError>>;
}

pub trait LogsTransport: Send + Sync {
    /// Lists the streams of `group` whose name starts with `prefix`
    fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> BoxFuture<'static, Result<Vec<LogStreamDescription>, TransportError>>;

    fn create_log_group(&self, group: &str) -> BoxFuture<'static, Result<(), TransportError>>;

    fn create_log_stream(&self, group: &str, stream: &str) -> BoxFuture<'static, Result<(), TransportError>>;

    /// Appends `events` and resolves to the token the next call must carry
    fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: Vec<LogEvent>,
        sequence_token: Option<String>,
    ) -> BoxFuture<'static, Result<Option<String>, TransportError>>;
}
