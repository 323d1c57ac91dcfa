//! TUI state management.
//!
//! Holds everything needed to draw a frame: overall progress, the current
//! step, recent status lines and, once the session ends, its outcome.

use std::collections::VecDeque;

use crate::notifier::ProgressEvent;
use crate::results::ResultRecord;

/// Status lines kept for the log pane.
pub const STATUS_LOG_LEN: usize = 8;

const CONNECTED_PREFIX: &str = "Connected to: ";

/// Phase of the session, as inferred from its progress checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    Initializing,
    Download,
    Upload,
    Complete,
}

impl TestPhase {
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 100.0 {
            TestPhase::Complete
        } else if percent >= 80.0 {
            TestPhase::Upload
        } else if percent >= 60.0 {
            TestPhase::Download
        } else {
            TestPhase::Initializing
        }
    }
}

/// Error information for display.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub suggestion: Option<String>,
}

/// State for the TUI display.
#[derive(Debug, Clone)]
pub struct TuiState {
    pub phase: TestPhase,
    /// Overall progress, 0 to 100
    pub percent: f64,
    /// Message attached to the latest progress report
    pub step: String,
    /// "{host} ({country})" once a server is selected
    pub server: Option<String>,
    /// Newest last
    pub statuses: VecDeque<String>,
    pub result: Option<ResultRecord>,
    pub error: Option<ErrorInfo>,
    /// Terminal width for layout
    pub terminal_width: u16,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            phase: TestPhase::Initializing,
            percent: 0.0,
            step: "Starting...".to_string(),
            server: None,
            statuses: VecDeque::with_capacity(STATUS_LOG_LEN),
            result: None,
            error: None,
            terminal_width: 80,
        }
    }
}

impl TuiState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update state from a notifier event.
    pub fn update_from_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Progress { percent, message } => {
                self.percent = percent.clamp(0.0, 100.0);
                self.phase = TestPhase::from_percent(self.percent);
                self.step = message.clone();
            }
            ProgressEvent::Status(message) => {
                if let Some(server) = message.strip_prefix(CONNECTED_PREFIX) {
                    self.server = Some(server.to_string());
                }

                if self.statuses.len() == STATUS_LOG_LEN {
                    self.statuses.pop_front();
                }
                self.statuses.push_back(message.clone());
            }
        }
    }

    /// Record the final result. Partial progress stays visible.
    pub fn set_result(&mut self, record: ResultRecord) {
        self.phase = TestPhase::Complete;
        self.percent = 100.0;
        self.result = Some(record);
    }

    /// Set an error state with optional suggestion.
    ///
    /// This preserves the status log collected before the error.
    pub fn set_error(&mut self, message: String, suggestion: Option<String>) {
        self.error = Some(ErrorInfo { message, suggestion });
    }
}
