//! Live progress display for speed test sessions.
//!
//! The session thread reports through the notifier; this module renders
//! those reports as a ratatui view, a plain progress bar, or nothing
//! (JSON output).

pub mod controller;
pub mod display_mode;
pub mod renderer;
pub mod state;

pub use controller::TuiController;
pub use display_mode::DisplayMode;
pub use state::TuiState;
