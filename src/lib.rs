//! Internet speed measurement against speedtest.net servers.
//!
//! A [`MeasurementClient`] runs one session at a time: it selects the best
//! server, measures download and upload throughput, reads the latency and
//! aggregates everything into a [`ResultRecord`]. Progress is reported
//! through a [`Notifier`], sessions can run on their own thread with
//! [`MeasurementClient::run_threaded`], and results are kept in a bounded
//! [`HistoryStore`].

pub mod config;
pub mod errors;
pub mod history;
pub mod notifier;
pub mod rating;
pub mod report;
pub mod results;
pub mod retry;
pub mod runner;
pub mod session;
pub mod speedtest;
pub mod stats;
pub mod tui;

#[cfg(test)]
mod testing;

pub use errors::{ErrorKind, SpeedTestError};
pub use history::HistoryStore;
pub use notifier::{Notifier, ProgressEvent, ProgressObserver};
pub use rating::{format_speed, get_speed_rating, SpeedRating};
pub use results::ResultRecord;
pub use runner::{SessionHandle, SessionTarget};
pub use session::{MeasurementClient, ServerInfo, SessionConfig, SessionState};
