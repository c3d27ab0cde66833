//! Logger, subscribers and reporters

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::VerboseLevel;
use crate::error::{HistError, Result};

/// One reported event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub level: VerboseLevel,
    /// Name of the reporter that raised the message
    pub source: String,
    pub event_name: String,
    pub message: String,
    pub details: String,
    /// Rendered error chain, if an error was attached
    pub error: Option<String>,
}

struct Subscription {
    id: u64,
    levels: VerboseLevel,
    sender: Sender<LogMessage>,
}

struct LoggerInner {
    subscriptions: Mutex<Vec<Subscription>>,
    /// Union of all subscription masks
    verbose: AtomicU8,
    next_id: AtomicU64,
}

impl LoggerInner {
    /// Recompute the union mask. Caller holds the subscription lock.
    fn refresh(&self, subscriptions: &[Subscription]) {
        let mut verbose = VerboseLevel::NONE;
        for subscription in subscriptions {
            verbose |= subscription.levels;
        }
        self.verbose.store(verbose.bits(), Ordering::Release);
    }

    fn verbose(&self) -> VerboseLevel {
        VerboseLevel::from_bits_truncate(self.verbose.load(Ordering::Acquire))
    }

    fn raise(&self, message: &LogMessage) {
        let mut subscriptions = self.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|subscription| {
            if !subscription.levels.contains(message.level) {
                return true;
            }
            subscription.sender.send(message.clone()).is_ok()
        });
        if subscriptions.len() != before {
            self.refresh(&subscriptions);
        }
    }
}

/// Fans log messages out to in-process subscribers.
///
/// Cloning a logger shares its subscriber set.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                subscriptions: Mutex::new(Vec::new()),
                verbose: AtomicU8::new(0),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Receive every message whose level is in `levels`
    pub fn subscribe(&self, levels: VerboseLevel) -> LogSubscriber {
        let (sender, receiver) = channel::unbounded();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let mut subscriptions = self.inner.subscriptions.lock();
        subscriptions.push(Subscription {
            id,
            levels,
            sender,
        });
        self.inner.refresh(&subscriptions);

        LogSubscriber {
            id,
            receiver,
            logger: Arc::clone(&self.inner),
        }
    }

    /// Levels at least one subscriber listens to
    pub fn verbose(&self) -> VerboseLevel {
        self.inner.verbose()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    /// Reporter for one named source, forwarding every level
    pub fn reporter(&self, source: impl Into<String>) -> LogReporter {
        self.reporter_with_limit(source, VerboseLevel::ALL)
    }

    /// Reporter that never forwards levels outside `limit`
    pub fn reporter_with_limit(&self, source: impl Into<String>, limit: VerboseLevel) -> LogReporter {
        LogReporter {
            source: source.into(),
            limit,
            logger: Arc::clone(&self.inner),
        }
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
pub struct LogSubscriber {
    id: u64,
    receiver: Receiver<LogMessage>,
    logger: Arc<LoggerInner>,
}

impl LogSubscriber {
    /// Next queued message, if any
    pub fn try_recv(&self) -> Option<LogMessage> {
        self.receiver.try_recv().ok()
    }

    /// Drain every queued message
    pub fn drain(&self) -> Vec<LogMessage> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for LogSubscriber {
    fn drop(&mut self) {
        let mut subscriptions = self.logger.subscriptions.lock();
        subscriptions.retain(|subscription| subscription.id != self.id);
        self.logger.refresh(&subscriptions);
    }
}

/// Raises messages for a single source.
///
/// Every accepted message is emitted as a `tracing` event; it reaches
/// subscribers only when one listens to its level.
#[derive(Clone)]
pub struct LogReporter {
    source: String,
    limit: VerboseLevel,
    logger: Arc<LoggerInner>,
}

impl LogReporter {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Levels that currently reach at least one subscriber
    pub fn verbose(&self) -> VerboseLevel {
        self.logger.verbose() & self.limit
    }

    /// True if a message at `level` would reach a subscriber
    pub fn should_report(&self, level: VerboseLevel) -> bool {
        self.verbose().intersects(level)
    }

    /// Raise one message.
    ///
    /// `level` must name exactly one severity; the `ALL` sentinel is
    /// rejected with `ReservedLevel`. `event_name` must not be empty.
    pub fn log_message(
        &self,
        level: VerboseLevel,
        event_name: &str,
        message: &str,
        details: &str,
        err: Option<&dyn std::error::Error>,
    ) -> Result<()> {
        if level == VerboseLevel::ALL {
            return Err(HistError::ReservedLevel);
        }
        if !level.is_single() {
            return Err(HistError::InvalidArgument(format!(
                "message level must be a single severity, got {}",
                level
            )));
        }
        if event_name.is_empty() {
            return Err(HistError::InvalidArgument(
                "event name must not be empty".to_string(),
            ));
        }

        let rendered = err.map(render_error);
        emit_tracing(level, &self.source, event_name, message, rendered.as_deref());

        if !self.should_report(level) {
            return Ok(());
        }

        self.logger.raise(&LogMessage {
            level,
            source: self.source.clone(),
            event_name: event_name.to_string(),
            message: message.to_string(),
            details: details.to_string(),
            error: rendered,
        });
        Ok(())
    }

    pub fn debug(&self, event_name: &str, message: &str) -> Result<()> {
        self.log_message(VerboseLevel::DEBUG, event_name, message, "", None)
    }

    pub fn info(&self, event_name: &str, message: &str) -> Result<()> {
        self.log_message(VerboseLevel::INFO, event_name, message, "", None)
    }

    pub fn warning(&self, event_name: &str, message: &str) -> Result<()> {
        self.log_message(VerboseLevel::WARNING, event_name, message, "", None)
    }

    pub fn error(&self, event_name: &str, message: &str, err: Option<&dyn std::error::Error>) -> Result<()> {
        self.log_message(VerboseLevel::ERROR, event_name, message, "", err)
    }
}

fn render_error(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

fn emit_tracing(level: VerboseLevel, source: &str, event: &str, message: &str, err: Option<&str>) {
    match level {
        VerboseLevel::DEBUG => debug!(source, event, error = err, "{}", message),
        VerboseLevel::INFO => info!(source, event, error = err, "{}", message),
        VerboseLevel::WARNING => warn!(source, event, error = err, "{}", message),
        VerboseLevel::ERROR => error!(source, event, error = err, "{}", message),
        _ => error!(source, event, error = err, fatal = true, "{}", message),
    }
}
