//! Speed formatting, ratings and usage hints.
//!
//! These are the presentation helpers shared by every output mode. They
//! are pure functions of the measured values.

use serde::Serialize;
use std::fmt;

/// Rating of a connection by its download speed.
///
/// Variants are ordered from worst to best for correct derived Ord behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedRating {
    /// Below 5 Mbps
    VerySlow,
    /// 5 Mbps and up
    Slow,
    /// 10 Mbps and up
    Fair,
    /// 25 Mbps and up
    Good,
    /// 50 Mbps and up
    VeryGood,
    /// 100 Mbps and up
    Excellent,
}

impl SpeedRating {
    /// Rate a download speed in Mbps.
    pub fn from_download(download_mbps: f64) -> Self {
        if download_mbps >= 100.0 {
            SpeedRating::Excellent
        } else if download_mbps >= 50.0 {
            SpeedRating::VeryGood
        } else if download_mbps >= 25.0 {
            SpeedRating::Good
        } else if download_mbps >= 10.0 {
            SpeedRating::Fair
        } else if download_mbps >= 5.0 {
            SpeedRating::Slow
        } else {
            SpeedRating::VerySlow
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SpeedRating::Excellent => "Excellent",
            SpeedRating::VeryGood => "Very Good",
            SpeedRating::Good => "Good",
            SpeedRating::Fair => "Fair",
            SpeedRating::Slow => "Slow",
            SpeedRating::VerySlow => "Very Slow",
        }
    }
}

impl fmt::Display for SpeedRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Format a speed in Mbps for display, switching to Gbps from 1000 Mbps.
pub fn format_speed(speed_mbps: f64) -> String {
    if speed_mbps >= 1000.0 {
        format!("{:.2} Gbps", speed_mbps / 1000.0)
    } else {
        format!("{:.2} Mbps", speed_mbps)
    }
}

pub fn get_speed_rating(download_mbps: f64) -> SpeedRating {
    SpeedRating::from_download(download_mbps)
}

/// What a connection is good for, one hint per measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerformanceAnalysis {
    pub download: &'static str,
    pub upload: &'static str,
    pub ping: &'static str,
}

pub fn analyze_performance(
    download_mbps: f64,
    upload_mbps: f64,
    ping_ms: f64,
) -> PerformanceAnalysis {
    let download = if download_mbps >= 100.0 {
        "Perfect for 4K streaming, large file downloads"
    } else if download_mbps >= 50.0 {
        "Great for HD streaming, video calls"
    } else if download_mbps >= 25.0 {
        "Good for regular streaming, web browsing"
    } else if download_mbps >= 10.0 {
        "Suitable for basic web browsing, email"
    } else {
        "May struggle with video streaming"
    };

    let upload = if upload_mbps >= 10.0 {
        "Excellent for video calls, file uploads"
    } else if upload_mbps >= 5.0 {
        "Good for video calls, cloud backup"
    } else if upload_mbps >= 1.0 {
        "Basic video calls, email attachments"
    } else {
        "Limited for video calls, slow uploads"
    };

    // Lower is better for latency.
    let ping = if ping_ms <= 20.0 {
        "Excellent for gaming, video calls"
    } else if ping_ms <= 50.0 {
        "Good for most online activities"
    } else if ping_ms <= 100.0 {
        "Acceptable for general use"
    } else {
        "May cause delays in real-time applications"
    };

    PerformanceAnalysis { download, upload, ping }
}
