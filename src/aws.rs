//! AWS SDK backed transports
//!
//! *this module requires the `aws` feature flag*
//!
//! Both clients are built from static credentials in [ClientConfig], with its region and
//! connect/request timeouts. Retries and signing are left to the SDK.

use super::config::{ClientConfig, Credentials};
use super::emf::unit_to_str;
use super::error::TransportError;
use super::transport::{LogEvent, LogStreamDescription, LogsTransport, MetricSample, MetricsTransport};
use super::Error;
use futures::future::{self, BoxFuture, FutureExt};

const PROVIDER_NAME: &str = "cloudwatch_bridge";

fn credentials(config: &ClientConfig) -> Result<&Credentials, Error> {
    Ok(config.credentials.as_ref().ok_or("credentials missing")?)
}

/// PutMetricData through [aws_sdk_cloudwatch]
#[derive(Clone, Debug)]
pub struct AwsMetricsTransport {
    client: aws_sdk_cloudwatch::Client,
}

impl AwsMetricsTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        use aws_sdk_cloudwatch::config::timeout::TimeoutConfig;
        use aws_sdk_cloudwatch::config::{BehaviorVersion, Credentials as SdkCredentials, Region};

        let credentials = credentials(config)?;
        let sdk_config = aws_sdk_cloudwatch::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(SdkCredentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                credentials.session_token.clone(),
                None,
                PROVIDER_NAME,
            ))
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(config.connect_timeout())
                    .operation_attempt_timeout(config.request_timeout())
                    .build(),
            )
            .build();

        Ok(Self::from_client(aws_sdk_cloudwatch::Client::from_conf(sdk_config)))
    }

    pub fn from_client(client: aws_sdk_cloudwatch::Client) -> Self {
        Self { client }
    }
}

impl MetricsTransport for AwsMetricsTransport {
    fn put_metric(&self, sample: MetricSample) -> BoxFuture<'static, Result<(), TransportError>> {
        use aws_sdk_cloudwatch::error::DisplayErrorContext;
        use aws_sdk_cloudwatch::types::{Dimension, MetricDatum, StandardUnit};

        let unit = match &sample.unit {
            Some(unit) => StandardUnit::from(unit_to_str(unit)),
            None => StandardUnit::None,
        };
        let dimension = Dimension::builder()
            .name(sample.dimension_name)
            .value(sample.dimension_value)
            .build();
        let datum = MetricDatum::builder()
            .metric_name(sample.metric_name)
            .unit(unit)
            .value(sample.value)
            .dimensions(dimension)
            .build();
        let request = self
            .client
            .put_metric_data()
            .namespace(sample.namespace)
            .metric_data(datum);

        async move {
            request
                .send()
                .await
                .map(|_| ())
                .map_err(|err| TransportError::new("PutMetricData", DisplayErrorContext(&err).to_string()))
        }
        .boxed()
    }
}

/// CloudWatch Logs calls through [aws_sdk_cloudwatchlogs]
#[derive(Clone, Debug)]
pub struct AwsLogsTransport {
    client: aws_sdk_cloudwatchlogs::Client,
}

impl AwsLogsTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        use aws_sdk_cloudwatchlogs::config::timeout::TimeoutConfig;
        use aws_sdk_cloudwatchlogs::config::{BehaviorVersion, Credentials as SdkCredentials, Region};

        let credentials = credentials(config)?;
        let sdk_config = aws_sdk_cloudwatchlogs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(SdkCredentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                credentials.session_token.clone(),
                None,
                PROVIDER_NAME,
            ))
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(config.connect_timeout())
                    .operation_attempt_timeout(config.request_timeout())
                    .build(),
            )
            .build();

        Ok(Self::from_client(aws_sdk_cloudwatchlogs::Client::from_conf(sdk_config)))
    }

    pub fn from_client(client: aws_sdk_cloudwatchlogs::Client) -> Self {
        Self { client }
    }
}

impl LogsTransport for AwsLogsTransport {
    fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> BoxFuture<'static, Result<Vec<LogStreamDescription>, TransportError>> {
        use aws_sdk_cloudwatchlogs::error::DisplayErrorContext;
        const OPERATION: &str = "DescribeLogStreams";

        let request = self
            .client
            .describe_log_streams()
            .log_group_name(group)
            .log_stream_name_prefix(prefix);

        async move {
            let output = request.send().await.map_err(|err| {
                let message = DisplayErrorContext(&err).to_string();
                match err.as_service_error() {
                    Some(service) if service.is_resource_not_found_exception() => {
                        TransportError::not_found(OPERATION, message)
                    }
                    _ => TransportError::new(OPERATION, message),
                }
            })?;

            Ok(output
                .log_streams()
                .iter()
                .filter_map(|stream| {
                    Some(LogStreamDescription {
                        name: stream.log_stream_name()?.to_string(),
                        upload_sequence_token: stream.upload_sequence_token().map(str::to_string),
                    })
                })
                .collect())
        }
        .boxed()
    }

    fn create_log_group(&self, group: &str) -> BoxFuture<'static, Result<(), TransportError>> {
        use aws_sdk_cloudwatchlogs::error::DisplayErrorContext;
        const OPERATION: &str = "CreateLogGroup";

        let request = self.client.create_log_group().log_group_name(group);

        async move {
            request.send().await.map(|_| ()).map_err(|err| {
                let message = DisplayErrorContext(&err).to_string();
                match err.as_service_error() {
                    Some(service) if service.is_resource_already_exists_exception() => {
                        TransportError::already_exists(OPERATION, message)
                    }
                    _ => TransportError::new(OPERATION, message),
                }
            })
        }
        .boxed()
    }

    fn create_log_stream(&self, group: &str, stream: &str) -> BoxFuture<'static, Result<(), TransportError>> {
        use aws_sdk_cloudwatchlogs::error::DisplayErrorContext;
        const OPERATION: &str = "CreateLogStream";

        let request = self
            .client
            .create_log_stream()
            .log_group_name(group)
            .log_stream_name(stream);

        async move {
            request.send().await.map(|_| ()).map_err(|err| {
                let message = DisplayErrorContext(&err).to_string();
                match err.as_service_error() {
                    Some(service) if service.is_resource_already_exists_exception() => {
                        TransportError::already_exists(OPERATION, message)
                    }
                    Some(service) if service.is_resource_not_found_exception() => {
                        TransportError::not_found(OPERATION, message)
                    }
                    _ => TransportError::new(OPERATION, message),
                }
            })
        }
        .boxed()
    }

    fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: Vec<LogEvent>,
        sequence_token: Option<String>,
    ) -> BoxFuture<'static, Result<Option<String>, TransportError>> {
        use aws_sdk_cloudwatchlogs::error::DisplayErrorContext;
        use aws_sdk_cloudwatchlogs::types::InputLogEvent;
        const OPERATION: &str = "PutLogEvents";

        let events: Result<Vec<InputLogEvent>, _> = events
            .into_iter()
            .map(|event| {
                InputLogEvent::builder()
                    .timestamp(event.timestamp_millis())
                    .message(event.message)
                    .build()
            })
            .collect();
        let events = match events {
            Ok(events) => events,
            Err(err) => return future::ready(Err(TransportError::new(OPERATION, err.to_string()))).boxed(),
        };

        let request = self
            .client
            .put_log_events()
            .log_group_name(group)
            .log_stream_name(stream)
            .set_log_events(Some(events))
            .set_sequence_token(sequence_token);

        async move {
            let output = request
                .send()
                .await
                .map_err(|err| TransportError::new(OPERATION, DisplayErrorContext(&err).to_string()))?;
            Ok(output.next_sequence_token().map(str::to_string))
        }
        .boxed()
    }
}
