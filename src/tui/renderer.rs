//! TUI rendering logic using ratatui.
//!
//! Handles the actual rendering of the TUI using ratatui widgets,
//! including layout, formatting, and color coding.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use super::state::{ErrorInfo, TestPhase, TuiState};
use crate::rating::{analyze_performance, format_speed, get_speed_rating};
use crate::results::ResultRecord;

/// Get color for speed value based on thresholds.
///
/// - Green: >= 100 Mbps (fast)
/// - Yellow: 25-100 Mbps (moderate)
/// - Red: < 25 Mbps (slow)
pub fn speed_color(speed_mbps: f64) -> Color {
    if speed_mbps >= 100.0 {
        Color::Green
    } else if speed_mbps >= 25.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Format latency value with 2 decimal places.
pub fn format_latency(latency_ms: f64) -> String {
    format!("{:.2} ms", latency_ms)
}

/// Minimal mode threshold in columns.
const MINIMAL_MODE_THRESHOLD: u16 = 60;

/// Check if minimal mode should be used based on terminal width.
pub fn is_minimal_mode(width: u16) -> bool {
    width < MINIMAL_MODE_THRESHOLD
}

fn label(text: &str) -> Span<'_> {
    Span::styled(
        text,
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )
}

/// Render the TUI to the terminal.
///
/// This is the main entry point for rendering. It determines whether
/// to use normal or minimal mode based on terminal width.
pub fn render_frame(frame: &mut Frame, state: &TuiState) {
    if is_minimal_mode(frame.area().width) {
        render_minimal_frame(frame, state);
    } else {
        render_normal_frame(frame, state);
    }
}

fn render_normal_frame(frame: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Server
            Constraint::Length(2), // Current phase
            Constraint::Length(3), // Gauge
            Constraint::Min(6),    // Status log or results
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_server(frame, chunks[0], state);
    render_phase_indicator(frame, chunks[1], state);
    render_gauge(frame, chunks[2], state);
    render_body(frame, chunks[3], state);
    render_status_bar(frame, chunks[4], state);
}

/// Render the minimal mode layout for narrow terminals.
pub fn render_minimal_frame(frame: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Progress
            Constraint::Min(2),    // Latest status or results
        ])
        .split(frame.area());

    let progress = Paragraph::new(format!("{:.0}% {}", state.percent, state.step))
        .style(Style::default().fg(Color::Cyan));
    frame.render_widget(progress, chunks[0]);

    if let Some(ref error) = state.error {
        render_error(frame, chunks[1], error);
    } else if let Some(ref record) = state.result {
        let lines = vec![
            Line::from(Span::styled(
                format!("D {}", format_speed(record.download_mbps)),
                Style::default().fg(speed_color(record.download_mbps)),
            )),
            Line::from(Span::styled(
                format!("U {}", format_speed(record.upload_mbps)),
                Style::default().fg(speed_color(record.upload_mbps)),
            )),
            Line::from(format!("P {}", format_latency(record.ping_ms))),
        ];
        frame.render_widget(Paragraph::new(lines), chunks[1]);
    } else if let Some(status) = state.statuses.back() {
        frame.render_widget(Paragraph::new(status.as_str()), chunks[1]);
    }
}

/// Render the selected server line.
pub fn render_server(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let server = match state.server {
        Some(ref server) => Span::styled(server.as_str(), Style::default().fg(Color::Cyan)),
        None => Span::styled("selecting...", Style::default().fg(Color::DarkGray)),
    };

    frame.render_widget(Paragraph::new(Line::from(vec![label("Server: "), server])), inner);
}

pub fn render_phase_indicator(frame: &mut Frame, area: Rect, state: &TuiState) {
    let phase_text = match state.phase {
        TestPhase::Initializing => "◐ Initializing...",
        TestPhase::Download => "▶ Download Test",
        TestPhase::Upload => "▶ Upload Test",
        TestPhase::Complete => "✓ Complete",
    };

    let style = match state.phase {
        TestPhase::Complete => {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        }
        _ => Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    };

    frame.render_widget(Paragraph::new(phase_text).style(style), area);
}

fn render_gauge(frame: &mut Frame, area: Rect, state: &TuiState) {
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::NONE))
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(state.percent.clamp(0.0, 100.0) as u16)
        .label(format!("{:.0}% - {}", state.percent, state.step));
    frame.render_widget(gauge, area);
}

/// Render the status log while running, or the outcome once finished.
pub fn render_body(frame: &mut Frame, area: Rect, state: &TuiState) {
    if let Some(ref error) = state.error {
        render_error(frame, area, error);
        return;
    }

    if let Some(ref record) = state.result {
        render_final_results(frame, area, record);
        return;
    }

    let lines: Vec<Line> = state
        .statuses
        .iter()
        .map(|status| {
            let style = if status.contains("failed") {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(Span::styled(status.as_str(), style))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), area);
}

pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &TuiState) {
    let status_text = match state.phase {
        TestPhase::Initializing => "Finding the best server...",
        TestPhase::Download => "Measuring download throughput...",
        TestPhase::Upload => "Measuring upload throughput...",
        TestPhase::Complete => "Speed test complete. Press q to exit.",
    };

    let paragraph = Paragraph::new(status_text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_final_results(frame: &mut Frame, area: Rect, record: &ResultRecord) {
    let rating = get_speed_rating(record.download_mbps);
    let analysis =
        analyze_performance(record.download_mbps, record.upload_mbps, record.ping_ms);

    let lines = vec![
        Line::from(vec![
            label("Download: "),
            Span::styled(
                format_speed(record.download_mbps),
                Style::default().fg(speed_color(record.download_mbps)),
            ),
        ]),
        Line::from(vec![
            label("Upload:   "),
            Span::styled(
                format_speed(record.upload_mbps),
                Style::default().fg(speed_color(record.upload_mbps)),
            ),
        ]),
        Line::from(vec![label("Ping:     "), Span::raw(format_latency(record.ping_ms))]),
        Line::from(vec![
            label("Rating:   "),
            Span::styled(
                rating.label(),
                Style::default()
                    .fg(speed_color(record.download_mbps))
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            label("Server:   "),
            Span::raw(format!("{} ({})", record.server_location, record.server_host)),
        ]),
        Line::from(vec![label("ISP:      "), Span::raw(record.isp.as_str())]),
        Line::from(""),
        Line::from(Span::styled(analysis.download, Style::default().fg(Color::DarkGray))),
        Line::from(Span::styled(analysis.upload, Style::default().fg(Color::DarkGray))),
        Line::from(Span::styled(analysis.ping, Style::default().fg(Color::DarkGray))),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}

fn render_error(frame: &mut Frame, area: Rect, error: &ErrorInfo) {
    let mut lines = vec![Line::from(Span::styled(
        format!("Error: {}", error.message),
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ))];

    if let Some(ref suggestion) = error.suggestion {
        lines.push(Line::from(Span::styled(
            format!("Suggestion: {}", suggestion),
            Style::default().fg(Color::Yellow),
        )));
    }

    frame.render_widget(Paragraph::new(lines), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::ProgressEvent;
    use proptest::prelude::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn render_to_string(state: &TuiState, width: u16, height: u16) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();

        terminal.draw(|frame| render_frame(frame, state)).unwrap();

        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.cell((x, y)).unwrap().symbol());
            }
            text.push('\n');
        }
        text
    }

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
    fn test_speed_color_boundaries() {
        assert_eq!(speed_color(100.0), Color::Green);
        assert_eq!(speed_color(99.9), Color::Yellow);
        assert_eq!(speed_color(25.0), Color::Yellow);
        assert_eq!(speed_color(24.9), Color::Red);
    }

    #[test]
    fn test_minimal_mode_boundary() {
        assert!(!is_minimal_mode(60));
        assert!(is_minimal_mode(59));
    }

    #[test]
    fn test_running_frame_shows_progress_and_log() {
        let mut state = TuiState::new();
        state.update_from_event(&ProgressEvent::Status(
            "Connected to: example.net (US)".to_string(),
        ));
        state.update_from_event(&ProgressEvent::Progress {
            percent: 60.0,
            message: "Starting download test...".to_string(),
        });
        state.update_from_event(&ProgressEvent::Status(
            "Testing download speed...".to_string(),
        ));

        let text = render_to_string(&state, 80, 20);

        assert!(text.contains("example.net (US)"));
        assert!(text.contains("Download Test"));
        assert!(text.contains("60% - Starting download test..."));
        assert!(text.contains("Testing download speed..."));
    }

    #[test]
    fn test_final_frame_shows_results_and_rating() {
        let mut state = TuiState::new();
        state.set_result(record());

        let text = render_to_string(&state, 80, 24);

        assert!(text.contains("94.30 Mbps"));
        assert!(text.contains("11.20 Mbps"));
        assert!(text.contains("14.30 ms"));
        assert!(text.contains("Very Good"));
        assert!(text.contains("ExampleISP"));
    }

    #[test]
    fn test_error_frame_shows_suggestion() {
        let mut state = TuiState::new();
        state.set_error(
            "Speed test failed!".to_string(),
            Some("Check your internet connection.".to_string()),
        );

        let text = render_to_string(&state, 80, 20);

        assert!(text.contains("Error: Speed test failed!"));
        assert!(text.contains("Suggestion: Check your internet connection."));
    }

    #[test]
    fn test_minimal_frame_shows_results() {
        let mut state = TuiState::new();
        state.set_result(record());

        let text = render_to_string(&state, 40, 6);

        assert!(text.contains("D 94.30 Mbps"));
        assert!(text.contains("P 14.30 ms"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_latency_formatting_precision(latency in 0.0f64..10_000.0) {
            let formatted = format_latency(latency);
            prop_assert!(formatted.ends_with(" ms"));
            let numeric_part = formatted.trim_end_matches(" ms");
            let dot_pos = numeric_part.find('.').unwrap();
            prop_assert_eq!(numeric_part.len() - dot_pos - 1, 2);
        }

        #[test]
        fn prop_speed_color_is_monotonic(a in 0.0f64..1000.0, b in 0.0f64..1000.0) {
            let rank = |color: Color| match color {
                Color::Red => 0,
                Color::Yellow => 1,
                _ => 2,
            };
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(rank(speed_color(low)) <= rank(speed_color(high)));
        }

        /// Rendering never panics for any progress value and width.
        #[test]
        fn prop_render_any_progress(percent in -50.0f64..150.0, width in 20u16..120) {
            let mut state = TuiState::new();
            state.update_from_event(&ProgressEvent::Progress {
                percent,
                message: "step".to_string(),
            });
            render_to_string(&state, width, 16);
        }
    }
}
