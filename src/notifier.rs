//! Progress and status reporting for measurement sessions.
//!
//! The [`Notifier`] holds two optional callback slots that the measurement
//! client invokes synchronously, on whichever thread is running the
//! session. Callers that update UI state must marshal the call onto their
//! own thread; [`Notifier::channel`] does that by forwarding every call
//! into an unbounded channel the UI can drain.

use log::debug;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Progress callback: percentage in `0..=100` and a short message.
pub type ProgressFn = Arc<dyn Fn(f64, &str) + Send + Sync>;

/// Status callback: a human-readable status line.
pub type StatusFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Events emitted during a measurement session.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Overall progress has moved.
    Progress {
        /// Percentage complete, 0 to 100
        percent: f64,
        /// What the session is doing now
        message: String,
    },
    /// A status line for the user.
    Status(String),
}

/// Observer interface for progress updates.
///
/// Implementations are called in-line by the measurement thread and must
/// not block.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, percent: f64, message: &str);

    fn on_status(&self, message: &str);
}

/// The pair of callback slots a measurement client reports through.
#[derive(Clone, Default)]
pub struct Notifier {
    progress: Option<ProgressFn>,
    status: Option<StatusFn>,
}

impl Notifier {
    /// A notifier with no callbacks; every report is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both callback slots.
    pub fn set_callbacks(
        &mut self,
        progress: Option<ProgressFn>,
        status: Option<StatusFn>,
    ) {
        self.progress = progress;
        self.status = status;
    }

    /// A notifier forwarding both slots to `observer`.
    pub fn from_observer(observer: Arc<dyn ProgressObserver>) -> Self {
        let status_observer = Arc::clone(&observer);

        Self {
            progress: Some(Arc::new(move |percent: f64, message: &str| {
                observer.on_progress(percent, message)
            })),
            status: Some(Arc::new(move |message: &str| {
                status_observer.on_status(message)
            })),
        }
    }

    /// A notifier that turns every report into a [`ProgressEvent`] on the
    /// returned receiver. Reports made after the receiver is dropped are
    /// discarded.
    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = unbounded_channel();
        let status_tx = tx.clone();

        let notifier = Self {
            progress: Some(Arc::new(move |percent: f64, message: &str| {
                let _ = tx.send(ProgressEvent::Progress {
                    percent,
                    message: message.to_string(),
                });
            })),
            status: Some(Arc::new(move |message: &str| {
                let _ = status_tx.send(ProgressEvent::Status(message.to_string()));
            })),
        };

        (notifier, rx)
    }

    pub fn report_progress(&self, percent: f64, message: &str) {
        let percent = percent.clamp(0.0, 100.0);
        debug!("progress {:.0}%: {}", percent, message);

        if let Some(ref progress) = self.progress {
            progress(percent, message);
        }
    }

    pub fn report_status(&self, message: &str) {
        debug!("status: {}", message);

        if let Some(ref status) = self.status {
            status(message);
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("progress", &self.progress.is_some())
            .field("status", &self.status.is_some())
            .finish()
    }
}
