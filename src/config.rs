//! Runtime settings assembled from the command line.

use crate::errors::SpeedTestError;
use crate::history::{HistoryStore, DEFAULT_CAPACITY, DEFAULT_FILE_NAME};
use crate::session::{MeasurementClient, SessionConfig};
use crate::speedtest::client::BASE_URL;
use crate::speedtest::{Client, HttpProvider, ProbeConfig};
use directories::ProjectDirs;
use log::debug;
use std::path::PathBuf;

/// Everything a command needs to build its client and history store.
#[derive(Debug, Clone)]
pub struct Settings {
    pub history_file: PathBuf,
    pub history_cap: usize,
    pub session: SessionConfig,
    pub probe: ProbeConfig,
    /// Root of the server discovery and configuration API.
    pub base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_file: default_history_path(),
            history_cap: DEFAULT_CAPACITY,
            session: SessionConfig::default(),
            probe: ProbeConfig::default(),
            base_url: BASE_URL.to_string(),
        }
    }
}

/// `history.json` in the platform data directory, or
/// `speedtest_history.json` in the working directory when the platform
/// has none.
pub fn default_history_path() -> PathBuf {
    ProjectDirs::from("net", "speedcheck", "speedcheck")
        .map(|dirs| dirs.data_dir().join("history.json"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_NAME))
}

impl Settings {
    pub fn provider(&self) -> Result<HttpProvider, SpeedTestError> {
        let client = Client::with_base_url(&self.base_url, self.probe.request_timeout)?;

        Ok(HttpProvider::new(client, self.probe.clone()))
    }

    pub fn measurement_client(&self) -> Result<MeasurementClient<HttpProvider>, SpeedTestError> {
        Ok(MeasurementClient::new(self.provider()?, self.session.clone()))
    }

    pub fn history(&self) -> HistoryStore {
        debug!("Using history file {}", self.history_file.display());

        HistoryStore::load(&self.history_file, self.history_cap)
    }
}
