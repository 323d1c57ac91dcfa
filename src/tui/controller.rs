//! TUI controller for managing the display lifecycle.
//!
//! The TuiController owns the terminal while a session runs. It drains
//! the notifier's event channel on the caller's task, so the session
//! thread never touches the terminal.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::{
    cursor, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;

use super::display_mode::DisplayMode;
use super::renderer::render_frame;
use super::state::TuiState;
use crate::notifier::ProgressEvent;
use crate::report::progress_bar;
use crate::results::ResultRecord;

/// How often the TUI redraws while waiting for events.
const RENDER_INTERVAL: Duration = Duration::from_millis(100);

/// How long the final frame stays up before the terminal is restored.
const FINAL_FRAME_HOLD: Duration = Duration::from_millis(1500);

pub const FAILURE_MESSAGE: &str =
    "Speed test failed! Please check your internet connection.";

/// Controller for the live progress display.
pub struct TuiController {
    /// Current display mode
    mode: DisplayMode,
    state: TuiState,
    /// Terminal instance (only present in TUI mode)
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    /// Whether the terminal has been initialized
    initialized: bool,
}

impl TuiController {
    pub fn new(mode: DisplayMode) -> Self {
        Self {
            mode,
            state: TuiState::new(),
            terminal: None,
            initialized: false,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn state(&self) -> &TuiState {
        &self.state
    }

    /// Initialize the TUI.
    ///
    /// In TUI mode, this enters the alternate screen and hides the cursor.
    /// In other modes, this is a no-op.
    pub fn init(&mut self) -> io::Result<()> {
        if self.mode != DisplayMode::Tui {
            return Ok(());
        }

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        self.state.terminal_width = terminal.size()?.width;
        self.terminal = Some(terminal);
        self.initialized = true;

        Ok(())
    }

    /// Leave the alternate screen and show the cursor again.
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }

        if let Some(ref mut terminal) = self.terminal {
            execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;
        }

        self.initialized = false;
        self.terminal = None;

        Ok(())
    }

    /// Apply one notifier event.
    ///
    /// Plain mode echoes it as a progress bar or status line. TUI mode
    /// redraws on the next tick.
    pub fn handle_event(&mut self, event: &ProgressEvent) -> io::Result<()> {
        self.state.update_from_event(event);

        if self.mode == DisplayMode::Plain {
            let mut stdout = io::stdout().lock();
            match event {
                ProgressEvent::Progress { percent, message } => {
                    write!(stdout, "\r{}", progress_bar(*percent, message))?;
                }
                ProgressEvent::Status(message) => {
                    writeln!(stdout, "\n{}", message)?;
                }
            }
            stdout.flush()?;
        }

        Ok(())
    }

    /// Draw the current state. A no-op outside TUI mode.
    pub fn render(&mut self) -> io::Result<()> {
        if let Some(ref mut terminal) = self.terminal {
            self.state.terminal_width = terminal.size()?.width;

            let state = &self.state;
            terminal.draw(|frame| render_frame(frame, state))?;
        }

        Ok(())
    }

    /// Show events until the session reports completion, then show its
    /// outcome and return it.
    pub async fn drive(
        &mut self,
        mut events: UnboundedReceiver<ProgressEvent>,
        mut done: oneshot::Receiver<Option<ResultRecord>>,
    ) -> io::Result<Option<ResultRecord>> {
        let mut tick = tokio::time::interval(RENDER_INTERVAL);

        let outcome = loop {
            tokio::select! {
                Some(event) = events.recv() => self.handle_event(&event)?,
                outcome = &mut done => break outcome.ok().flatten(),
                _ = tick.tick() => self.render()?,
            }
        };

        // Completion is signalled after the last report, so anything still
        // queued belongs to this session.
        while let Ok(event) = events.try_recv() {
            self.handle_event(&event)?;
        }

        match outcome {
            Some(ref record) => self.state.set_result(record.clone()),
            None => self.state.set_error(
                FAILURE_MESSAGE.to_string(),
                Some("Run with -v for details.".to_string()),
            ),
        }

        if self.mode == DisplayMode::Plain {
            println!();
        }

        if self.terminal.is_some() {
            self.render()?;
            tokio::time::sleep(FINAL_FRAME_HOLD).await;
        }

        debug!("Display finished, result: {}", outcome.is_some());

        Ok(outcome)
    }
}

impl Drop for TuiController {
    /// Restore the terminal even if cleanup() was not called.
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::Notifier;
    use crate::tui::state::TestPhase;

    fn record() -> ResultRecord {
        ResultRecord {
            download_mbps: 94.3,
            upload_mbps: 11.2,
            ping_ms: 14.3,
            server_host: "example.net".to_string(),
            server_location: "Springfield, US".to_string(),
            isp: "ExampleISP".to_string(),
            timestamp: "2024-03-09 14:05:07".to_string(),
            test_duration: 20.0,
        }
    }

    #[test]
    fn test_mode_returns_correct_mode() {
        assert_eq!(TuiController::new(DisplayMode::Json).mode(), DisplayMode::Json);
        assert_eq!(TuiController::new(DisplayMode::Plain).mode(), DisplayMode::Plain);
        assert_eq!(TuiController::new(DisplayMode::Tui).mode(), DisplayMode::Tui);
    }

    #[test]
    fn test_init_noop_for_non_tui_modes() {
        let mut controller = TuiController::new(DisplayMode::Plain);
        assert!(controller.init().is_ok());
        assert!(controller.terminal.is_none());

        let mut controller = TuiController::new(DisplayMode::Json);
        assert!(controller.init().is_ok());
        assert!(controller.terminal.is_none());
    }

    #[test]
    fn test_render_and_cleanup_noop_when_not_initialized() {
        let mut controller = TuiController::new(DisplayMode::Json);
        assert!(controller.render().is_ok());
        assert!(controller.cleanup().is_ok());
    }

    #[test]
    fn test_handle_event_updates_state() {
        let mut controller = TuiController::new(DisplayMode::Json);

        controller
            .handle_event(&ProgressEvent::Progress {
                percent: 80.0,
                message: "Starting upload test...".to_string(),
            })
            .unwrap();

        assert_eq!(controller.state().phase, TestPhase::Upload);
        assert_eq!(controller.state().step, "Starting upload test...");
    }

    #[tokio::test]
    async fn test_drive_collects_events_until_completion() {
        let (notifier, events) = Notifier::channel();
        let (tx, done) = oneshot::channel();

        notifier.report_progress(50.0, "Server selected");
        notifier.report_status("Connected to: example.net (US)");
        notifier.report_progress(100.0, "Test completed!");
        tx.send(Some(record())).unwrap();

        let mut controller = TuiController::new(DisplayMode::Json);
        let outcome = controller.drive(events, done).await.unwrap();

        assert_eq!(outcome, Some(record()));
        assert_eq!(controller.state().server.as_deref(), Some("example.net (US)"));
        assert_eq!(controller.state().phase, TestPhase::Complete);
        assert!(controller.state().result.is_some());
    }

    #[tokio::test]
    async fn test_drive_reports_failure_when_sender_dropped() {
        let (_notifier, events) = Notifier::channel();
        let (tx, done) = oneshot::channel::<Option<ResultRecord>>();
        drop(tx);

        let mut controller = TuiController::new(DisplayMode::Json);
        let outcome = controller.drive(events, done).await.unwrap();

        assert!(outcome.is_none());
        assert_eq!(
            controller.state().error.as_ref().unwrap().message,
            FAILURE_MESSAGE
        );
    }
}
