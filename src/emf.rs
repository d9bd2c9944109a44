//! # EMF
//!
//! Helpers for serializing CloudWatch Embedded Metrics via serde_json, and a [MetricsTransport]
//! that writes each sample as an embedded metrics document instead of calling PutMetricData
//!
//! <https://docs.aws.amazon.com/AmazonCloudWatch/latest/monitoring/CloudWatch_Embedded_Metric_Format_Specification.html>

use super::error::TransportError;
use super::transport::{MetricSample, MetricsTransport};
use futures::future::{self, BoxFuture, FutureExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize)]
pub struct EmbeddedMetrics<'a> {
    #[serde(rename = "_aws")]
    pub aws: EmbeddedMetricsAws<'a>,
    #[serde(flatten)]
    pub dimensions: BTreeMap<&'a str, &'a str>,
    #[serde(flatten)]
    pub values: BTreeMap<&'a str, f64>,
}

#[derive(Serialize)]
pub struct EmbeddedMetricsAws<'a> {
    #[serde(rename = "Timestamp")]
    pub timestamp: u64,
    // A sample only ever belongs to one namespace
    #[serde(rename = "CloudWatchMetrics")]
    pub cloudwatch_metrics: [EmbeddedNamespace<'a>; 1],
}

#[derive(Serialize)]
pub struct EmbeddedNamespace<'a> {
    #[serde(rename = "Namespace")]
    pub namespace: &'a str,
    #[serde(rename = "Dimensions")]
    pub dimensions: [Vec<&'a str>; 1],
    #[serde(rename = "Metrics")]
    pub metrics: Vec<EmbeddedMetric<'a>>,
}

#[derive(Serialize)]
pub struct EmbeddedMetric<'a> {
    #[serde(rename = "Name")]
    pub name: &'a str,
    #[serde(rename = "Unit")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'a str>,
}

/// Convert a metrics::Unit into the cloudwatch string
///
/// <https://docs.aws.amazon.com/AmazonCloudWatch/latest/APIReference/API_MetricDatum.html>
pub fn unit_to_str(unit: &metrics::Unit) -> &'static str {
    match unit {
        metrics::Unit::Count => "Count",
        metrics::Unit::Percent => "Percent",
        metrics::Unit::Seconds => "Seconds",
        metrics::Unit::Milliseconds => "Milliseconds",
        metrics::Unit::Microseconds => "Microseconds",
        metrics::Unit::Nanoseconds => "Nanoseconds",
        metrics::Unit::Tebibytes => "Terabytes",
        metrics::Unit::Gibibytes => "Gigabytes",
        metrics::Unit::Mebibytes => "Megabytes",
        metrics::Unit::Kibibytes => "Kilobytes",
        metrics::Unit::Bytes => "Bytes",
        metrics::Unit::TerabitsPerSecond => "Terabits/Second",
        metrics::Unit::GigabitsPerSecond => "Gigabits/Second",
        metrics::Unit::MegabitsPerSecond => "Megabits/Second",
        metrics::Unit::KilobitsPerSecond => "Kilobits/Second",
        metrics::Unit::BitsPerSecond => "Bits/Second",
        metrics::Unit::CountPerSecond => "Count/Second",
    }
}

/// Write one sample as an embedded metrics document followed by a newline
///
/// Dimension and metric share the document's top level, so their names must differ from each
/// other and from `_aws`.
pub fn write_sample(sample: &MetricSample, timestamp: u64, mut writer: impl Write) -> std::io::Result<()> {
    let dimension = sample.dimension_name.as_str();
    let metric = sample.metric_name.as_str();
    if dimension == metric || dimension == "_aws" || metric == "_aws" {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("dimension {dimension} and metric {metric} would share a key"),
        ));
    }

    let mut emf = EmbeddedMetrics {
        aws: EmbeddedMetricsAws {
            timestamp,
            cloudwatch_metrics: [EmbeddedNamespace {
                namespace: &sample.namespace,
                dimensions: [vec![sample.dimension_name.as_str()]],
                metrics: vec![EmbeddedMetric {
                    name: &sample.metric_name,
                    unit: sample.unit.as_ref().map(unit_to_str),
                }],
            }],
        },
        dimensions: BTreeMap::new(),
        values: BTreeMap::new(),
    };
    emf.dimensions.insert(&sample.dimension_name, &sample.dimension_value);
    emf.values.insert(&sample.metric_name, sample.value);

    serde_json::to_writer(&mut writer, &emf)?;
    writeln!(writer)
}

/// [MetricsTransport] writing embedded metrics documents to an implementation of [std::io::Write]
///
/// On Lambda, or anywhere the CloudWatch agent collects stdout, this publishes metrics without
/// credentials or network calls from the process itself.
///
/// # Example
/// ```
/// let transport = std::sync::Arc::new(cloudwatch_bridge::EmfTransport::new(std::io::stdout()));
/// ```
pub struct EmfTransport<W> {
    writer: Mutex<W>,
    timestamp: Option<u64>,
}

impl<W: Write + Send> EmfTransport<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            timestamp: None,
        }
    }

    /// Use a fixed timestamp instead of the wall clock
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn timestamp(&self) -> u64 {
        match self.timestamp {
            Some(t) => t,
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
        }
    }
}

impl<W: Write + Send> MetricsTransport for EmfTransport<W> {
    fn put_metric(&self, sample: MetricSample) -> BoxFuture<'static, Result<(), TransportError>> {
        let timestamp = self.timestamp();
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let result = write_sample(&sample, timestamp, &mut *writer);
        future::ready(result.map_err(|err| TransportError::new("PutMetricData", err.to_string()))).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(unit: Option<metrics::Unit>) -> MetricSample {
        MetricSample {
            namespace: "GameServerMetrics".to_string(),
            dimension_name: "Map".to_string(),
            dimension_value: "Forest".to_string(),
            metric_name: "FrameTime".to_string(),
            value: 10.5,
            unit,
        }
    }

    #[test]
    fn embedded_metrics() {
        let mut output = Vec::new();
        write_sample(&sample(Some(metrics::Unit::Milliseconds)), 1687394207903, &mut output).unwrap();
        assert_eq!(
            std::str::from_utf8(&output).unwrap(),
            "{\"_aws\":{\"Timestamp\":1687394207903,\"CloudWatchMetrics\":[{\"Namespace\":\"GameServerMetrics\",\"Dimensions\":[[\"Map\"]],\"Metrics\":[{\"Name\":\"FrameTime\",\"Unit\":\"Milliseconds\"}]}]},\"Map\":\"Forest\",\"FrameTime\":10.5}\n"
        );
    }

    #[test]
    fn unit_is_omitted_when_unset() {
        let mut output = Vec::new();
        write_sample(&sample(None), 0, &mut output).unwrap();
        assert!(!std::str::from_utf8(&output).unwrap().contains("Unit"));
    }

    #[test]
    fn transport_writes_one_line_per_sample() {
        let transport = EmfTransport::new(Vec::new()).with_timestamp(42);
        futures::executor::block_on(transport.put_metric(sample(None))).unwrap();
        futures::executor::block_on(transport.put_metric(sample(Some(metrics::Unit::Count)))).unwrap();

        let output = String::from_utf8(transport.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"_aws":{"Timestamp":42,"#));
        assert!(lines[1].contains(r#""Unit":"Count""#));
    }

    #[test]
    fn dimension_named_like_metric_is_rejected() {
        let transport = EmfTransport::new(Vec::new()).with_timestamp(42);
        let mut clash = sample(None);
        clash.dimension_name = clash.metric_name.clone();

        let err = futures::executor::block_on(transport.put_metric(clash)).unwrap_err();
        assert_eq!(err.operation, "PutMetricData");
        assert!(err.message.contains("FrameTime"));

        let mut reserved = sample(None);
        reserved.metric_name = "_aws".to_string();
        assert!(futures::executor::block_on(transport.put_metric(reserved)).is_err());

        assert!(transport.into_inner().is_empty());
    }
}
