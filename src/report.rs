//! Plain terminal output: results, history, servers and comparisons.
//!
//! Everything renders into a `String` so the CLI decides where it goes.

use crate::rating::{analyze_performance, format_speed, get_speed_rating, SpeedRating};
use crate::results::ResultRecord;
use crate::speedtest::ServerDescriptor;
use crate::stats::{Change, Comparison, HistoryStatistics};
use colored::{ColoredString, Colorize};
use std::fmt::Write;

/// Width of the text progress bar, in cells.
const BAR_LENGTH: usize = 40;

/// `[████░░░░] 50.0% - message`
pub fn progress_bar(percent: f64, message: &str) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let filled = (BAR_LENGTH as f64 * percent / 100.0) as usize;

    format!(
        "[{}{}] {:.1}% - {}",
        "█".repeat(filled),
        "░".repeat(BAR_LENGTH - filled),
        percent,
        message
    )
}

fn rating_colored(rating: SpeedRating) -> ColoredString {
    let label = rating.label();
    match rating {
        SpeedRating::Excellent | SpeedRating::VeryGood => label.bright_green(),
        SpeedRating::Good | SpeedRating::Fair => label.bright_yellow(),
        SpeedRating::Slow | SpeedRating::VerySlow => label.bright_red(),
    }
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", title.bold().white());
    let _ = writeln!(out, "{}", "-".repeat(title.len()).dimmed());
}

pub fn result(record: &ResultRecord) -> String {
    let mut out = String::new();
    heading(&mut out, "SPEED TEST RESULTS");

    let _ = writeln!(
        out,
        "{} {}",
        "Download Speed:".bold().white(),
        format_speed(record.download_mbps).bright_cyan()
    );
    let _ = writeln!(
        out,
        "{} {}",
        "Upload Speed:  ".bold().white(),
        format_speed(record.upload_mbps).bright_cyan()
    );
    let _ = writeln!(
        out,
        "{} {}",
        "Ping:          ".bold().white(),
        format!("{:.2} ms", record.ping_ms).bright_cyan()
    );
    let _ = writeln!(
        out,
        "{} {}",
        "Speed Rating:  ".bold().white(),
        rating_colored(get_speed_rating(record.download_mbps))
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "Test Server:".bold().white());
    let _ = writeln!(out, "   Location: {}", record.server_location.bright_blue());
    let _ = writeln!(out, "   Host: {}", record.server_host.bright_blue());
    let _ = writeln!(out);
    let _ = writeln!(out, "{} {}", "Your ISP:".bold().white(), record.isp.bright_blue());
    let _ = writeln!(out, "{} {}", "Test Time:".bold().white(), record.timestamp);

    let analysis =
        analyze_performance(record.download_mbps, record.upload_mbps, record.ping_ms);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "Performance Analysis:".bold().white());
    let _ = writeln!(out, "   Download: {}", analysis.download);
    let _ = writeln!(out, "   Upload:   {}", analysis.upload);
    let _ = writeln!(out, "   Ping:     {}", analysis.ping);

    out
}

/// The newest `limit` records, newest first, followed by statistics over
/// all of `records` when there is more than one.
pub fn history(records: &[ResultRecord], limit: usize) -> String {
    let mut out = String::new();
    heading(&mut out, "TEST HISTORY");

    if records.is_empty() {
        let _ = writeln!(out, "No test history available!");
        return out;
    }

    let _ = writeln!(out, "Total tests: {}", records.len());
    let _ = writeln!(out, "Showing last {} tests:", limit.min(records.len()));
    let _ = writeln!(out);

    for (i, record) in records.iter().rev().take(limit).enumerate() {
        let _ = writeln!(out, "{:2}. {}", i + 1, record.timestamp);
        let _ = writeln!(
            out,
            "    down {:<12} up {:<12} ping {:.1}ms",
            format_speed(record.download_mbps),
            format_speed(record.upload_mbps),
            record.ping_ms
        );
    }

    if records.len() > 1 {
        if let Some(stats) = HistoryStatistics::from_records(records) {
            let _ = writeln!(out);
            out.push_str(&statistics(&stats));
        }
    }

    out
}

pub fn statistics(stats: &HistoryStatistics) -> String {
    let mut out = String::new();
    heading(&mut out, "STATISTICS");

    let _ = writeln!(
        out,
        "Download - Avg: {}, Max: {}, Min: {}",
        format_speed(stats.download.average),
        format_speed(stats.download.maximum),
        format_speed(stats.download.minimum)
    );
    let _ = writeln!(
        out,
        "Upload   - Avg: {}, Max: {}, Min: {}",
        format_speed(stats.upload.average),
        format_speed(stats.upload.maximum),
        format_speed(stats.upload.minimum)
    );
    if let Some(ping) = stats.ping {
        let _ = writeln!(
            out,
            "Ping     - Avg: {:.1}ms, Max: {:.1}ms, Min: {:.1}ms",
            ping.average, ping.maximum, ping.minimum
        );
    }

    out
}

pub fn servers(servers: &[ServerDescriptor]) -> String {
    let mut out = String::new();
    heading(&mut out, "SERVER INFORMATION");

    if servers.is_empty() {
        let _ = writeln!(out, "No servers found!");
        return out;
    }

    let _ = writeln!(out, "Available servers (showing top {}):", servers.len());
    let _ = writeln!(out);

    for (i, server) in servers.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:2}. {}",
            i + 1,
            format!("{}, {}", server.name, server.country).bold()
        );
        let _ = writeln!(out, "    Host: {}", server.host.bright_blue());
        let _ = writeln!(out, "    Distance: {:.1} km", server.distance);
        let _ = writeln!(out, "    ID: {}", server.id);
    }

    out
}

fn change_line(change: &Change, unit: &str) -> ColoredString {
    let line = format!("{:+.2} {} ({:+.1}%)", change.difference, unit, change.percent);
    if change.improved() {
        line.green()
    } else if change.difference < 0.0 {
        line.red()
    } else {
        line.normal()
    }
}

pub fn comparison(comparison: &Comparison) -> String {
    let mut out = String::new();
    heading(&mut out, "Latest vs Previous Test");

    let _ = writeln!(out, "{}", "Download:".bold().white());
    let _ = writeln!(out, "   Latest:   {}", format_speed(comparison.download.latest));
    let _ = writeln!(out, "   Previous: {}", format_speed(comparison.download.previous));
    let _ = writeln!(out, "   Change:   {}", change_line(&comparison.download, "Mbps"));

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "Upload:".bold().white());
    let _ = writeln!(out, "   Latest:   {}", format_speed(comparison.upload.latest));
    let _ = writeln!(out, "   Previous: {}", format_speed(comparison.upload.previous));
    let _ = writeln!(out, "   Change:   {}", change_line(&comparison.upload, "Mbps"));

    // Lower latency is the improvement.
    let ping = format!("{:+.2} ms", comparison.ping_difference);
    let ping = if comparison.ping_difference < 0.0 {
        ping.green()
    } else if comparison.ping_difference > 0.0 {
        ping.red()
    } else {
        ping.normal()
    };

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "Ping:".bold().white());
    let _ = writeln!(out, "   Change:   {}", ping);

    out
}
