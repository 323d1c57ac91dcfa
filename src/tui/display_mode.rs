//! Display mode detection and configuration.
//!
//! Determines whether to use the TUI, plain text, or JSON output mode
//! based on CLI flags and terminal capabilities.

/// The display mode for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Full TUI with a progress gauge and live status log
    Tui,
    /// Plain text progress bar and status lines
    Plain,
    /// JSON mode - structured output only
    Json,
}

impl DisplayMode {
    /// Determine display mode from CLI flags and environment.
    ///
    /// # Arguments
    /// * `json_flag` - Whether the `--json` flag was provided
    /// * `plain_flag` - Whether the `--plain` flag was provided
    /// * `is_tty` - Whether stdout is a TTY (interactive terminal)
    ///
    /// # Returns
    /// * `Json` when json_flag is true (regardless of anything else)
    /// * `Plain` when plain_flag is true or stdout is not a TTY
    /// * `Tui` otherwise
    pub fn detect(json_flag: bool, plain_flag: bool, is_tty: bool) -> Self {
        if json_flag {
            DisplayMode::Json
        } else if plain_flag || !is_tty {
            DisplayMode::Plain
        } else {
            DisplayMode::Tui
        }
    }
}
