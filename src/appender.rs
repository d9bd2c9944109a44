//! # Appender
//!
//! Buffers log lines and ships them to a CloudWatch Logs stream.
//!
//! Before a batch can be sent the destination has to exist and, for streams that already hold
//! events, the upload sequence token has to be known. Each flush cycle walks the bootstrap steps
//! it still needs:
//!
//! ```plaintext
//! NeedsToken ──found──────────────────────────────┐
//!     │ not found / error                         ▼
//!     ├─ group unconfirmed ──► CreatingGroup ──► CreatingStream ──► Sending ──► Idle
//!     ├─ stream unconfirmed ─────────────────────► CreatingStream
//!     └─ both confirmed ──► Idle
//! ```
//!
//! A token the service leaves out is stored as empty, so after the first successful describe or
//! put the cycle starts at Sending.
//!
//! Any failed step ends the cycle, the next append starts over. Nothing is retried.

use super::error::CallError;
use super::registry::Shared;
use super::transport::{now_micros, LogEvent, LogsTransport};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// PutLogEvents accepts at most 10,000 events per batch
const MAX_BATCH_EVENTS: usize = 10_000;

/// Behaviour shared by every appender created from one registry
#[derive(Debug, Clone, Default)]
pub struct AppenderOptions {
    /// Put a failed batch back at the front of the buffer instead of dropping it
    pub requeue_failed_batches: bool,
}

/// Point-in-time view of an appender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppenderStatus {
    pub pending: Vec<LogEvent>,
    /// `Some("")` once the stream answered without a token
    pub sequence_token: Option<String>,
    pub group_exists: bool,
    pub stream_exists: bool,
    pub flush_in_flight: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    NeedsToken,
    CreatingGroup,
    CreatingStream,
    Sending,
    Idle,
}

/// Mutable state, never held across an await
#[derive(Default)]
struct LogBuffer {
    pending: Vec<LogEvent>,
    sequence_token: Option<String>,
    group_exists: bool,
    stream_exists: bool,
    flush_in_flight: bool,
    last_timestamp: i64,
}

impl LogBuffer {
    /// Queue `message` stamped with `now`, never earlier than the previous event
    fn push(&mut self, now: i64, message: impl Into<String>) {
        // Batches must be in chronological order, don't let a clock step backwards break that
        let timestamp = now.max(self.last_timestamp);
        self.last_timestamp = timestamp;
        self.pending.push(LogEvent::new(timestamp, message));
    }

    /// Where to go after a describe that did not find our stream
    fn after_missing_stream(&self) -> Step {
        if !self.group_exists {
            Step::CreatingGroup
        } else if !self.stream_exists {
            Step::CreatingStream
        } else {
            Step::Idle
        }
    }
}

struct AppenderInner {
    group: String,
    stream: String,
    options: AppenderOptions,
    buffer: Mutex<LogBuffer>,
    idle: Notify,
}

impl AppenderInner {
    fn buffer(&self) -> MutexGuard<'_, LogBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_cycle(self: Arc<Self>, transport: Arc<dyn LogsTransport>) {
        let mut step = if self.buffer().sequence_token.is_some() {
            Step::Sending
        } else {
            Step::NeedsToken
        };

        while step != Step::Idle {
            debug!("{}/{}: {step:?}", self.group, self.stream);
            step = match step {
                Step::NeedsToken => self.fetch_token(&*transport).await,
                Step::CreatingGroup => self.create_group(&*transport).await,
                Step::CreatingStream => self.create_stream(&*transport).await,
                Step::Sending => self.send(&*transport).await,
                Step::Idle => Step::Idle,
            };
        }
    }

    async fn fetch_token(&self, transport: &dyn LogsTransport) -> Step {
        let result = transport.describe_log_streams(&self.group, &self.stream).await;
        let mut buffer = self.buffer();

        match result {
            Ok(streams) => match streams.into_iter().find(|s| s.name == self.stream) {
                Some(found) => {
                    buffer.group_exists = true;
                    buffer.stream_exists = true;
                    buffer.sequence_token = Some(found.upload_sequence_token.unwrap_or_default());
                    Step::Sending
                }
                None => {
                    // The group answered, so it exists even though our stream does not
                    buffer.group_exists = true;
                    debug!("{}/{}: log stream not found", self.group, self.stream);
                    buffer.after_missing_stream()
                }
            },
            Err(err) => {
                debug!("{}/{}: {err}", self.group, self.stream);
                let next = buffer.after_missing_stream();
                if next == Step::Idle {
                    warn!(
                        "{}/{}: unable to fetch the sequence token, will retry on the next append: {err}",
                        self.group, self.stream
                    );
                }
                next
            }
        }
    }

    async fn create_group(&self, transport: &dyn LogsTransport) -> Step {
        match transport.create_log_group(&self.group).await {
            Ok(()) => info!("Created log group {}", self.group),
            Err(err) if err.is_already_exists() => debug!("Log group {} already exists", self.group),
            Err(err) => {
                error!("Unable to create log group {}: {err}", self.group);
                return Step::Idle;
            }
        }
        self.buffer().group_exists = true;
        Step::CreatingStream
    }

    async fn create_stream(&self, transport: &dyn LogsTransport) -> Step {
        match transport.create_log_stream(&self.group, &self.stream).await {
            Ok(()) => info!("Created log stream {}/{}", self.group, self.stream),
            Err(err) if err.is_already_exists() => {
                debug!("Log stream {}/{} already exists", self.group, self.stream)
            }
            Err(err) => {
                error!("Unable to create log stream {}/{}: {err}", self.group, self.stream);
                return Step::Idle;
            }
        }
        self.buffer().stream_exists = true;
        Step::Sending
    }

    async fn send(&self, transport: &dyn LogsTransport) -> Step {
        let (batch, token) = {
            let mut buffer = self.buffer();
            if buffer.pending.is_empty() {
                return Step::Idle;
            }
            let count = buffer.pending.len().min(MAX_BATCH_EVENTS);
            let batch: Vec<LogEvent> = buffer.pending.drain(..count).collect();
            let token = buffer.sequence_token.clone().filter(|t| !t.is_empty());
            (batch, token)
        };

        let retained = self.options.requeue_failed_batches.then(|| batch.clone());
        let count = batch.len();
        let result = transport.put_log_events(&self.group, &self.stream, batch, token).await;
        let mut buffer = self.buffer();

        match result {
            Ok(next_token) => {
                debug!("{}/{}: sent {count} events", self.group, self.stream);
                buffer.sequence_token = Some(next_token.unwrap_or_default());
                if count == MAX_BATCH_EVENTS && !buffer.pending.is_empty() {
                    return Step::Sending;
                }
            }
            Err(err) => match retained {
                Some(retained) => {
                    warn!(
                        "{}/{}: requeueing {count} events after failed put: {err}",
                        self.group, self.stream
                    );
                    buffer.pending.splice(0..0, retained);
                }
                None => error!("{}/{}: dropped {count} events after failed put: {err}", self.group, self.stream),
            },
        }
        Step::Idle
    }
}

/// Ends a flush cycle when dropped, including when the cycle task panics or is cancelled
struct CycleDone(Arc<AppenderInner>);

impl Drop for CycleDone {
    fn drop(&mut self) {
        self.0.buffer().flush_in_flight = false;
        self.0.idle.notify_waiters();
    }
}

/// CloudWatch Logs appender
///
/// Use [ClientRegistry::log_appender](super::ClientRegistry::log_appender) to construct.
///
/// # Example
/// ```no_run
/// # fn example(registry: &cloudwatch_bridge::ClientRegistry) {
/// let logs = registry.log_appender("GameServer", "match-0042");
/// logs.append("player joined");
/// logs.append("player left");
/// # }
/// ```
pub struct LogAppender {
    inner: Arc<AppenderInner>,
    shared: Arc<Shared>,
    runtime: Handle,
}

impl LogAppender {
    pub(crate) fn new(
        group: String,
        stream: String,
        options: AppenderOptions,
        shared: Arc<Shared>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(AppenderInner {
                group,
                stream,
                options,
                buffer: Mutex::new(LogBuffer::default()),
                idle: Notify::new(),
            }),
            shared,
            runtime,
        }
    }

    pub fn group(&self) -> &str {
        &self.inner.group
    }

    pub fn stream(&self) -> &str {
        &self.inner.stream
    }

    pub fn status(&self) -> AppenderStatus {
        let buffer = self.inner.buffer();
        AppenderStatus {
            pending: buffer.pending.clone(),
            sequence_token: buffer.sequence_token.clone(),
            group_exists: buffer.group_exists,
            stream_exists: buffer.stream_exists,
            flush_in_flight: buffer.flush_in_flight,
        }
    }

    /// Resolves once no flush cycle is running
    pub async fn idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.inner.buffer().flush_in_flight {
                return;
            }
            notified.await;
        }
    }

    /// Queue `message` and start a flush cycle unless one is already running
    ///
    /// Problems are logged rather than returned, see [LogAppender::try_append]
    pub fn append(&self, message: impl Into<String>) {
        if let Err(err) = self.try_append(message) {
            error!("Dropping log line for {}/{}: {err}", self.inner.group, self.inner.stream);
        }
    }

    /// Same as [LogAppender::append] but reports why a line was dropped
    pub fn try_append(&self, message: impl Into<String>) -> Result<(), CallError> {
        let transport = self.shared.logs()?;

        let start = {
            let mut buffer = self.inner.buffer();
            buffer.push(now_micros(), message);
            Self::begin_cycle(&mut buffer)
        };

        if start {
            self.spawn_cycle(transport);
        }
        Ok(())
    }

    /// Start a flush cycle for already buffered lines
    ///
    /// Returns false if there is nothing to send or a cycle is already running
    pub fn flush(&self) -> Result<bool, CallError> {
        let transport = self.shared.logs()?;

        let start = {
            let mut buffer = self.inner.buffer();
            !buffer.pending.is_empty() && Self::begin_cycle(&mut buffer)
        };

        if start {
            self.spawn_cycle(transport);
        }
        Ok(start)
    }

    fn spawn_cycle(&self, transport: Arc<dyn LogsTransport>) {
        let done = CycleDone(self.inner.clone());
        self.runtime.spawn(async move {
            let inner = done.0.clone();
            inner.run_cycle(transport).await;
        });
    }

    fn begin_cycle(buffer: &mut LogBuffer) -> bool {
        if buffer.flush_in_flight {
            return false;
        }
        buffer.flush_in_flight = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_stepping_back_keeps_previous_timestamp() {
        let mut buffer = LogBuffer::default();
        buffer.push(2_000, "a");
        buffer.push(1_500, "b");
        buffer.push(2_500, "c");

        let stamps: Vec<i64> = buffer.pending.iter().map(|e| e.timestamp_micros).collect();
        assert_eq!(stamps, vec![2_000, 2_000, 2_500]);
        assert_eq!(buffer.last_timestamp, 2_500);
    }

    #[test]
    fn missing_stream_step_follows_latched_flags() {
        let mut buffer = LogBuffer::default();
        assert_eq!(buffer.after_missing_stream(), Step::CreatingGroup);
        buffer.group_exists = true;
        assert_eq!(buffer.after_missing_stream(), Step::CreatingStream);
        buffer.stream_exists = true;
        assert_eq!(buffer.after_missing_stream(), Step::Idle);
    }
}
