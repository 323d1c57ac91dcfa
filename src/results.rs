//! The normalized outcome of a measurement session.
//!
//! [`ResultRecord`] is what gets displayed, serialized to JSON output and
//! persisted in the history file. It is built once, by [`aggregate`], and
//! never changed afterwards.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::speedtest::{ClientInfo, Server};

/// Placeholder for metadata the session could not obtain.
pub const UNKNOWN: &str = "Unknown";

/// Timestamp format used in records, in local time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bits per megabit.
const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// Outcome of one complete measurement session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Download throughput in Mbps
    pub download_mbps: f64,
    /// Upload throughput in Mbps
    pub upload_mbps: f64,
    /// Latency to the selected server in milliseconds
    pub ping_ms: f64,
    /// Host (and port) of the selected server
    pub server_host: String,
    /// "{city}, {country}" of the selected server
    pub server_location: String,
    /// ISP name reported for the client
    pub isp: String,
    /// When the session started, `%Y-%m-%d %H:%M:%S` local time
    pub timestamp: String,
    /// Wall-clock duration of the session in seconds
    pub test_duration: f64,
}

/// Raw outputs of a session, as handed to [`aggregate`].
#[derive(Debug, Clone)]
pub struct SessionOutputs<'a> {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub server: Option<&'a Server>,
    pub client: Option<&'a ClientInfo>,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
}

/// Convert a raw probe throughput in bits per second to Mbps.
pub fn bits_to_mbps(bits_per_second: f64) -> f64 {
    bits_per_second / BITS_PER_MEGABIT
}

/// Build the record for a finished session.
///
/// Missing server metadata becomes [`UNKNOWN`], as does an ISP the session
/// could not retrieve (or that came back empty). Negative measurements are
/// clamped to zero.
pub fn aggregate(outputs: SessionOutputs<'_>) -> ResultRecord {
    let (server_host, server_location) = match outputs.server {
        Some(server) => (
            server.host.clone(),
            format!("{}, {}", or_unknown(&server.name), or_unknown(&server.country)),
        ),
        None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
    };

    let isp = outputs
        .client
        .map(|client| or_unknown(&client.isp).to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let test_duration = (outputs.finished - outputs.started)
        .to_std()
        .map(|duration| duration.as_secs_f64())
        .unwrap_or(0.0);

    ResultRecord {
        download_mbps: outputs.download_mbps.max(0.0),
        upload_mbps: outputs.upload_mbps.max(0.0),
        ping_ms: outputs.ping_ms.max(0.0),
        server_host,
        server_location,
        isp,
        timestamp: outputs.started.format(TIMESTAMP_FORMAT).to_string(),
        test_duration,
    }
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        UNKNOWN
    } else {
        value
    }
}
