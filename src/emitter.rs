//! # Emitter
//!
//! Sends one CloudWatch metric per call, optionally reporting the outcome to an [Observer]

use super::error::{CallError, TransportError};
use super::registry::Shared;
use super::transport::MetricSample;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

/// Completion callbacks for a submitted request, invoked at most once per request
pub trait Observer: Send + Sync {
    fn on_success(&self);
    fn on_failure(&self, message: &str);
}

/// [Observer] built from a pair of closures
pub struct Callbacks<S, F> {
    on_success: S,
    on_failure: F,
}

impl<S, F> Callbacks<S, F>
where
    S: Fn() + Send + Sync,
    F: Fn(&str) + Send + Sync,
{
    pub fn new(on_success: S, on_failure: F) -> Self {
        Self { on_success, on_failure }
    }
}

impl<S, F> Observer for Callbacks<S, F>
where
    S: Fn() + Send + Sync,
    F: Fn(&str) + Send + Sync,
{
    fn on_success(&self) {
        (self.on_success)()
    }

    fn on_failure(&self, message: &str) {
        (self.on_failure)(message)
    }
}

/// In-flight flag shared with the completion task
struct RequestState {
    in_flight: AtomicBool,
    idle: Notify,
}

impl RequestState {
    fn finish(&self) {
        self.in_flight.store(false, Ordering::Release);
        self.idle.notify_waiters();
    }
}

/// Clears the in-flight flag when dropped, also when the completion task panics
struct FinishOnDrop(Arc<RequestState>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// CloudWatch custom metrics emitter
///
/// Use [ClientRegistry::metrics_emitter](super::ClientRegistry::metrics_emitter) to construct.
///
/// Only one request is in flight at a time, calls made while one is outstanding are dropped.
/// Without an observer the request is fire-and-forget and the emitter is free again as soon as
/// it is submitted.
pub struct MetricsEmitter {
    namespace: String,
    group: String,
    unit: Option<metrics::Unit>,
    observer: Option<Arc<dyn Observer>>,
    state: Arc<RequestState>,
    shared: Arc<Shared>,
    runtime: Handle,
}

impl MetricsEmitter {
    pub(crate) fn new(namespace: String, group: String, shared: Arc<Shared>, runtime: Handle) -> Self {
        Self {
            namespace,
            group,
            unit: None,
            observer: None,
            state: Arc::new(RequestState {
                in_flight: AtomicBool::new(false),
                idle: Notify::new(),
            }),
            shared,
            runtime,
        }
    }

    /// Attach a CloudWatch unit to every sample, samples carry no unit otherwise
    pub fn with_unit(mut self, unit: metrics::Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Registers completion callbacks, switching the emitter to wait for each response
    pub fn set_observer(&mut self, observer: Arc<dyn Observer>) {
        self.observer = Some(observer);
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once no request is in flight
    pub async fn idle(&self) {
        loop {
            let notified = self.state.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_in_flight() {
                return;
            }
            notified.await;
        }
    }

    /// Send `value` as `metric_name` with the dimension (group, `dimension_key`)
    ///
    /// Problems are logged rather than returned, see [MetricsEmitter::try_emit]
    pub fn emit(&self, dimension_key: &str, metric_name: &str, value: f32) {
        match self.try_emit(dimension_key, metric_name, value) {
            Ok(()) => {}
            Err(CallError::AlreadyInFlight) => {
                debug!(
                    "Dropping {metric_name} for {}: previous custom metrics call is still in progress",
                    self.namespace
                );
            }
            Err(err) => error!("Dropping {metric_name} for {}: {err}", self.namespace),
        }
    }

    /// Same as [MetricsEmitter::emit] but reports why a call was dropped
    pub fn try_emit(&self, dimension_key: &str, metric_name: &str, value: f32) -> Result<(), CallError> {
        let transport = self.shared.metrics()?;

        if self
            .state
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CallError::AlreadyInFlight);
        }
        let finish = FinishOnDrop(self.state.clone());

        let sample = MetricSample {
            namespace: self.namespace.clone(),
            dimension_name: self.group.clone(),
            dimension_value: dimension_key.to_string(),
            metric_name: metric_name.to_string(),
            value: f64::from(value),
            unit: self.unit,
        };
        let request = transport.put_metric(sample);

        match &self.observer {
            None => {
                let namespace = self.namespace.clone();
                self.runtime.spawn(async move {
                    if let Err(err) = request.await {
                        warn!("Custom metrics call for {namespace} failed: {err}");
                    }
                });
                drop(finish);
            }
            Some(observer) => {
                let observer = observer.clone();
                let namespace = self.namespace.clone();
                self.runtime.spawn(async move {
                    let _finish = finish;
                    let result: Result<(), TransportError> = request.await;
                    match result {
                        Ok(()) => {
                            debug!("Custom metrics call for {namespace} succeeded");
                            observer.on_success();
                        }
                        Err(err) => {
                            warn!("Custom metrics call for {namespace} failed: {err}");
                            observer.on_failure(&err.message);
                        }
                    }
                });
            }
        }

        Ok(())
    }
}
