//! The measurement client: one speed test session from initialization to
//! an aggregated [`ResultRecord`].
//!
//! A session walks through [`SessionState`] in order. Initialization picks
//! the best server (or validates a pinned one), then the download and
//! upload probes run against it, and the latency measured during selection
//! is read back. Each step reports progress and status through the
//! client's [`Notifier`].
//!
//! Probe failures never abort a session; the affected measurement becomes
//! `0.0` and the fault is reported as a status line. Only a failed
//! initialization ends a session without a result.

use crate::errors::SpeedTestError;
use crate::notifier::{Notifier, ProgressFn, StatusFn};
use crate::results::{aggregate, bits_to_mbps, ResultRecord, SessionOutputs};
use crate::speedtest::{ClientInfo, Server, ServerDescriptor, SpeedProvider};
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A latency sample that failed counts as this many seconds.
const FAILED_SAMPLE_PENALTY_SECS: f64 = 3600.0;

/// Tunables for server selection and listing.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Closest servers considered during best-server selection.
    /// Default: 5
    pub candidate_servers: usize,
    /// Latency samples taken per candidate.
    /// Default: 3
    pub latency_samples: usize,
    /// Servers listed per distance group.
    /// Default: 5
    pub servers_per_group: usize,
    /// Servers listed in total.
    /// Default: 20
    pub max_listed_servers: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            candidate_servers: 5,
            latency_samples: 3,
            servers_per_group: 5,
            max_listed_servers: 20,
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Initializing,
    ServerSelected,
    DownloadTesting,
    UploadTesting,
    LatencyRead,
    Complete,
    Failed,
}

impl SessionState {
    /// Whether the session has ended, successfully or not.
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Complete | SessionState::Failed)
    }
}

/// Outcome of a server listing, shaped for JSON output as either
/// `{"servers": [...]}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerInfo {
    Servers(Vec<ServerDescriptor>),
    Error(String),
}

#[derive(Debug)]
struct MeasurementSession {
    state: SessionState,
    started: DateTime<Local>,
    pinned: Option<Server>,
    server: Option<Server>,
    latency_ms: f64,
    client: Option<ClientInfo>,
}

impl MeasurementSession {
    fn new(pinned: Option<Server>) -> Self {
        Self {
            state: SessionState::Unstarted,
            started: Local::now(),
            pinned,
            server: None,
            latency_ms: 0.0,
            client: None,
        }
    }
}

/// Runs speed test sessions against a [`SpeedProvider`].
///
/// A client owns at most one session at a time. Starting a run replaces
/// whatever session came before it.
#[derive(Debug)]
pub struct MeasurementClient<P> {
    provider: P,
    config: SessionConfig,
    notifier: Notifier,
    session: MeasurementSession,
}

impl<P: SpeedProvider> MeasurementClient<P> {
    pub fn new(provider: P, config: SessionConfig) -> Self {
        Self {
            provider,
            config,
            notifier: Notifier::new(),
            session: MeasurementSession::new(None),
        }
    }

    /// Install the progress and status callbacks, replacing any previous
    /// ones. `None` clears a slot.
    pub fn set_callbacks(&mut self, progress: Option<ProgressFn>, status: Option<StatusFn>) {
        self.notifier.set_callbacks(progress, status);
    }

    pub fn set_notifier(&mut self, notifier: Notifier) {
        self.notifier = notifier;
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// The server the current session measures against, once selected.
    pub fn selected_server(&self) -> Option<&Server> {
        self.session.server.as_ref()
    }

    /// Start a fresh session and select the best available server.
    pub async fn initialize(&mut self) -> Result<(), SpeedTestError> {
        self.session = MeasurementSession::new(None);
        self.initialize_session().await
    }

    async fn initialize_session(&mut self) -> Result<(), SpeedTestError> {
        self.session.state = SessionState::Initializing;
        self.notifier.report_status("Initializing speed test...");
        self.notifier.report_progress(10.0, "Creating speed test client...");

        match self.provider.client_info().await {
            Ok(client) => {
                debug!("Client {} on {}", client.ip, client.isp);
                self.session.client = Some(client);
            }
            Err(e) => warn!("Could not retrieve client configuration: {}", e.message),
        }

        self.notifier.report_progress(30.0, "Getting server list...");
        self.notifier.report_status("Getting best server...");

        let candidates = match self.session.pinned.clone() {
            Some(server) => Ok(vec![server]),
            None => self.provider.servers().await,
        };

        let selection = match candidates {
            Ok(candidates) => self.select_best_server(candidates).await,
            Err(e) => Err(e),
        };

        match selection {
            Ok((server, latency_ms)) => {
                info!(
                    "Selected {} ({}, {}) at {:.3} ms",
                    server.host, server.name, server.country, latency_ms
                );

                self.notifier.report_progress(50.0, "Server selected");
                self.notifier.report_status(&format!(
                    "Connected to: {} ({})",
                    server.host, server.country
                ));

                self.session.server = Some(server);
                self.session.latency_ms = latency_ms;
                self.session.state = SessionState::ServerSelected;
                Ok(())
            }
            Err(e) => {
                warn!("Initialization failed: {}", e.message);
                self.session.state = SessionState::Failed;
                self.notifier
                    .report_status(&format!("Initialization failed: {}", e.message));
                Err(e)
            }
        }
    }

    /// Sample the closest candidates and return the lowest-latency one
    /// with its latency in milliseconds.
    async fn select_best_server(
        &self,
        mut candidates: Vec<Server>,
    ) -> Result<(Server, f64), SpeedTestError> {
        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        candidates.truncate(self.config.candidate_servers.max(1));

        let samples = self.config.latency_samples.max(1);
        let mut best: Option<(Server, f64)> = None;

        for server in candidates {
            let mut total_secs = 0.0;
            let mut answered = 0;

            for _ in 0..samples {
                match self.provider.ping(&server).await {
                    Ok(round_trip) => {
                        total_secs += round_trip.as_secs_f64();
                        answered += 1;
                    }
                    Err(e) => {
                        debug!("Latency sample to {} failed: {}", server.host, e.message);
                        total_secs += FAILED_SAMPLE_PENALTY_SECS;
                    }
                }
            }

            if answered == 0 {
                warn!("{} did not answer any latency sample", server.host);
                continue;
            }

            let latency_ms = round_millis(total_secs / (2.0 * samples as f64) * 1000.0);
            debug!("{}: {:.3} ms", server.host, latency_ms);

            if best.as_ref().map_or(true, |(_, lowest)| latency_ms < *lowest) {
                best = Some((server, latency_ms));
            }
        }

        best.ok_or_else(|| {
            SpeedTestError::no_servers("none of the candidate servers answered")
        })
    }

    /// The server to probe, unless the session cannot run probes.
    fn probe_target(&self) -> Result<Server, SpeedTestError> {
        if self.session.state.is_finished() {
            return Err(SpeedTestError::config("the session has already finished"));
        }

        self.session
            .server
            .clone()
            .ok_or_else(|| SpeedTestError::config("no server selected"))
    }

    /// Run the download probe, in Mbps. Faults yield `0.0`.
    pub async fn measure_download(&mut self) -> f64 {
        self.notifier.report_status("Testing download speed...");

        let server = match self.probe_target() {
            Ok(server) => server,
            Err(e) => return self.probe_failed("Download", e),
        };

        self.session.state = SessionState::DownloadTesting;
        self.notifier.report_progress(60.0, "Starting download test...");

        match self.provider.download(&server).await {
            Ok(bits) => {
                let mbps = bits_to_mbps(bits);
                let line = format!("Download: {:.2} Mbps", mbps);
                self.notifier.report_progress(70.0, &line);
                self.notifier.report_status(&line);
                mbps
            }
            Err(e) => self.probe_failed("Download", e),
        }
    }

    /// Run the upload probe, in Mbps. Faults yield `0.0`.
    pub async fn measure_upload(&mut self) -> f64 {
        self.notifier.report_status("Testing upload speed...");

        let server = match self.probe_target() {
            Ok(server) => server,
            Err(e) => return self.probe_failed("Upload", e),
        };

        self.session.state = SessionState::UploadTesting;
        self.notifier.report_progress(80.0, "Starting upload test...");

        match self.provider.upload(&server).await {
            Ok(bits) => {
                let mbps = bits_to_mbps(bits);
                let line = format!("Upload: {:.2} Mbps", mbps);
                self.notifier.report_progress(90.0, &line);
                self.notifier.report_status(&line);
                mbps
            }
            Err(e) => self.probe_failed("Upload", e),
        }
    }

    fn probe_failed(&self, direction: &str, error: SpeedTestError) -> f64 {
        warn!("{} test failed: {}", direction, error);
        self.notifier
            .report_status(&format!("{} test failed: {}", direction, error.message));
        0.0
    }

    /// Latency to the selected server in milliseconds, as measured during
    /// selection. `0.0` when no server has been selected.
    pub fn read_latency(&mut self) -> f64 {
        if self.session.server.is_none() {
            return 0.0;
        }

        if !self.session.state.is_finished() {
            self.session.state = SessionState::LatencyRead;
        }

        let latency_ms = self.session.latency_ms;
        self.notifier.report_status(&format!("Ping: {:.2} ms", latency_ms));
        latency_ms
    }

    /// Discovered servers grouped by distance, nearest group first.
    pub async fn list_servers(&self) -> Result<Vec<ServerDescriptor>, SpeedTestError> {
        let servers = self.provider.servers().await?;

        let mut groups: BTreeMap<u64, Vec<&Server>> = BTreeMap::new();
        for server in &servers {
            // Group by distance at metre resolution.
            let key = (server.distance.max(0.0) * 1000.0).round() as u64;
            groups.entry(key).or_default().push(server);
        }

        Ok(groups
            .values()
            .flat_map(|group| group.iter().take(self.config.servers_per_group))
            .take(self.config.max_listed_servers)
            .map(|server| ServerDescriptor::from(*server))
            .collect())
    }

    /// [`list_servers`](Self::list_servers), with failures folded into the
    /// result.
    pub async fn get_server_info(&self) -> ServerInfo {
        match self.list_servers().await {
            Ok(servers) => ServerInfo::Servers(servers),
            Err(e) => ServerInfo::Error(e.message),
        }
    }

    /// Run a full session against the server with the given id.
    ///
    /// The id is looked up among the servers discovery returns, so only the
    /// nearest `ProbeConfig::server_limit` servers (30 by default) can be
    /// pinned. Returns `None`, with a status line, when the id is unknown or
    /// the session cannot initialize.
    pub async fn test_with_server(
        &mut self,
        server_id: &str,
    ) -> Option<ResultRecord> {
        let server = match self.find_server(server_id).await {
            Ok(server) => server,
            Err(e) => {
                warn!("Server test failed: {}", e.message);
                self.session = MeasurementSession::new(None);
                self.session.state = SessionState::Failed;
                self.notifier
                    .report_status(&format!("Server test failed: {}", e.message));
                return None;
            }
        };

        self.session = MeasurementSession::new(Some(server));
        self.run_session().await
    }

    /// Same as [`test_with_server`](Self::test_with_server).
    pub async fn test_specific_server(&mut self, server_id: &str) -> Option<ResultRecord> {
        self.test_with_server(server_id).await
    }

    async fn find_server(&self, server_id: &str) -> Result<Server, SpeedTestError> {
        let id = server_id.trim();

        self.provider
            .servers()
            .await?
            .into_iter()
            .find(|server| server.id == id)
            .ok_or_else(|| {
                SpeedTestError::config(format!("no server with id {}", id))
                    .with_suggestion("Run `speedcheck servers` to list available ids.")
            })
    }

    /// Run a full session against the best available server.
    pub async fn run_full_test(&mut self) -> Option<ResultRecord> {
        self.session = MeasurementSession::new(None);
        self.run_session().await
    }

    async fn run_session(&mut self) -> Option<ResultRecord> {
        self.notifier.report_progress(0.0, "Initializing...");

        if self.initialize_session().await.is_err() {
            return None;
        }

        let download_mbps = self.measure_download().await;
        let upload_mbps = self.measure_upload().await;
        let ping_ms = self.read_latency();

        let record = aggregate(SessionOutputs {
            download_mbps,
            upload_mbps,
            ping_ms,
            server: self.session.server.as_ref(),
            client: self.session.client.as_ref(),
            started: self.session.started,
            finished: Local::now(),
        });

        self.session.state = SessionState::Complete;

        info!(
            "Session complete: {:.2} Mbps down, {:.2} Mbps up, {:.2} ms in {:.1}s",
            record.download_mbps, record.upload_mbps, record.ping_ms, record.test_duration
        );

        self.notifier.report_progress(100.0, "Test completed!");
        self.notifier.report_status("Speed test completed successfully!");

        Some(record)
    }
}

fn round_millis(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::ProgressEvent;
    use crate::rating::{get_speed_rating, SpeedRating};
    use crate::testing::{server, StubProvider};
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn client_for(
        provider: StubProvider,
    ) -> (MeasurementClient<StubProvider>, UnboundedReceiver<ProgressEvent>) {
        let (notifier, rx) = Notifier::channel();
        let mut client = MeasurementClient::new(provider, SessionConfig::default());
        client.set_notifier(notifier);
        (client, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn statuses(events: &[ProgressEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Status(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn percents(events: &[ProgressEvent]) -> Vec<f64> {
        events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    fn healthy() -> StubProvider {
        // Three 28.6 ms samples average out to 14.3 ms one way.
        StubProvider::healthy(server("4242", "example.net", 4.2), Duration::from_micros(28_600))
    }

    #[tokio::test]
    async fn test_full_test_end_to_end() {
        let (mut client, mut rx) = client_for(healthy());

        let record = client.run_full_test().await.unwrap();

        assert_eq!(record.download_mbps, 94.3);
        assert_eq!(record.upload_mbps, 11.2);
        assert_eq!(record.ping_ms, 14.3);
        assert_eq!(record.server_host, "example.net");
        assert_eq!(record.server_location, "Springfield, US");
        assert_eq!(record.isp, "ExampleISP");
        assert!(record.test_duration >= 0.0);
        assert_eq!(get_speed_rating(record.download_mbps), SpeedRating::VeryGood);
        assert_eq!(client.state(), SessionState::Complete);

        let events = drain(&mut rx);
        assert_eq!(
            statuses(&events),
            vec![
                "Initializing speed test...",
                "Getting best server...",
                "Connected to: example.net (US)",
                "Testing download speed...",
                "Download: 94.30 Mbps",
                "Testing upload speed...",
                "Upload: 11.20 Mbps",
                "Ping: 14.30 ms",
                "Speed test completed successfully!",
            ]
        );
    }

    #[tokio::test]
    async fn test_progress_checkpoints_are_ordered() {
        let (mut client, mut rx) = client_for(healthy());

        client.run_full_test().await.unwrap();

        let progress = percents(&drain(&mut rx));
        assert_eq!(progress, vec![0.0, 10.0, 30.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]);
    }

    #[tokio::test]
    async fn test_initialization_failure_yields_no_result() {
        let provider = StubProvider { discovery_fails: true, ..healthy() };
        let calls = provider.calls.clone();
        let (mut client, mut rx) = client_for(provider);

        assert!(client.run_full_test().await.is_none());
        assert_eq!(client.state(), SessionState::Failed);
        assert_eq!(calls.probes(), 0);

        let events = drain(&mut rx);
        let statuses = statuses(&events);
        assert_eq!(
            statuses.last().unwrap(),
            "Initialization failed: connection refused"
        );
        assert!(!statuses.iter().any(|s| s.starts_with("Testing")));
        assert!(!percents(&events).contains(&100.0));
    }

    #[tokio::test]
    async fn test_unreachable_servers_fail_initialization() {
        let provider = StubProvider { pings: HashMap::new(), ..healthy() };
        let (mut client, _rx) = client_for(provider);

        let error = client.initialize().await.unwrap_err();

        assert_eq!(error.kind, crate::errors::ErrorKind::NoServers);
        assert_eq!(client.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_best_server_has_lowest_latency_among_closest() {
        let mut provider = StubProvider::healthy(
            server("1", "near.example", 1.0),
            Duration::from_millis(80),
        );
        provider.servers.extend([
            server("2", "fast.example", 2.0),
            server("3", "flaky.example", 3.0),
            server("9", "far.example", 900.0),
        ]);
        provider.pings.insert("2".to_string(), Duration::from_millis(20));
        provider.pings.insert("9".to_string(), Duration::from_millis(1));
        let config = SessionConfig { candidate_servers: 3, ..SessionConfig::default() };

        let mut client = MeasurementClient::new(provider, config);
        client.initialize().await.unwrap();

        assert_eq!(client.selected_server().unwrap().host, "fast.example");
        assert_eq!(client.read_latency(), 10.0);
    }

    #[tokio::test]
    async fn test_missing_client_config_reports_unknown_isp() {
        let provider = StubProvider { client: None, ..healthy() };
        let (mut client, _rx) = client_for(provider);

        let record = client.run_full_test().await.unwrap();

        assert_eq!(record.isp, "Unknown");
    }

    #[tokio::test]
    async fn test_upload_failure_is_zero_and_session_completes() {
        let provider = StubProvider { upload_bits: None, ..healthy() };
        let (mut client, mut rx) = client_for(provider);

        let record = client.run_full_test().await.unwrap();

        assert_eq!(record.download_mbps, 94.3);
        assert_eq!(record.upload_mbps, 0.0);
        assert_eq!(record.ping_ms, 14.3);
        assert!(statuses(&drain(&mut rx))
            .contains(&"Upload test failed: connection reset by peer".to_string()));
    }

    #[tokio::test]
    async fn test_download_failure_is_zero_and_session_completes() {
        let provider = StubProvider { download_bits: None, ..healthy() };
        let (mut client, mut rx) = client_for(provider);

        let record = client.run_full_test().await.unwrap();

        assert_eq!(record.download_mbps, 0.0);
        assert_eq!(record.upload_mbps, 11.2);
        assert_eq!(record.ping_ms, 14.3);
        assert_eq!(client.state(), SessionState::Complete);

        let statuses = statuses(&drain(&mut rx));
        assert!(statuses
            .contains(&"Download test failed: connection reset by peer".to_string()));
        assert!(!statuses.iter().any(|s| s.starts_with("Download: ")));
        assert_eq!(
            statuses.last().map(String::as_str),
            Some("Speed test completed successfully!")
        );
    }

    #[tokio::test]
    async fn test_read_latency_without_server_is_zero() {
        let (mut client, mut rx) = client_for(healthy());

        assert_eq!(client.read_latency(), 0.0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_probes_before_initialization_do_not_touch_provider() {
        let provider = healthy();
        let calls = provider.calls.clone();
        let (mut client, _rx) = client_for(provider);

        assert_eq!(client.measure_download().await, 0.0);
        assert_eq!(client.measure_upload().await, 0.0);
        assert_eq!(calls.probes(), 0);
    }

    #[tokio::test]
    async fn test_finished_session_does_not_probe_again() {
        let provider = healthy();
        let calls = provider.calls.clone();
        let (mut client, _rx) = client_for(provider);

        client.run_full_test().await.unwrap();
        let downloads = calls.download.load(Ordering::SeqCst);

        assert_eq!(client.measure_download().await, 0.0);
        assert_eq!(calls.download.load(Ordering::SeqCst), downloads);
    }

    #[tokio::test]
    async fn test_failed_session_does_not_probe() {
        let provider = StubProvider { discovery_fails: true, ..healthy() };
        let calls = provider.calls.clone();
        let (mut client, _rx) = client_for(provider);

        assert!(client.initialize().await.is_err());
        assert_eq!(client.state(), SessionState::Failed);

        assert_eq!(client.measure_download().await, 0.0);
        assert_eq!(client.measure_upload().await, 0.0);
        assert_eq!(calls.probes(), 0);
    }

    #[tokio::test]
    async fn test_with_server_uses_pinned_server() {
        let mut provider = healthy();
        provider.servers.push(server("7", "pinned.example", 50.0));
        provider.pings.insert("7".to_string(), Duration::from_millis(40));
        let (mut client, _rx) = client_for(provider);

        let record = client.test_with_server("7").await.unwrap();

        assert_eq!(record.server_host, "pinned.example");
        assert_eq!(record.ping_ms, 20.0);
    }

    #[tokio::test]
    async fn test_with_unknown_server_reports_failure() {
        let provider = healthy();
        let calls = provider.calls.clone();
        let (mut client, mut rx) = client_for(provider);

        assert!(client.test_with_server("999999").await.is_none());
        assert_eq!(calls.probes(), 0);
        assert_eq!(
            statuses(&drain(&mut rx)),
            vec!["Server test failed: no server with id 999999"]
        );
    }

    #[tokio::test]
    async fn test_list_servers_caps_groups_and_total() {
        let mut provider = healthy();
        provider.servers.clear();
        // Eight groups of six servers each.
        for group in 0..8 {
            for n in 0..6 {
                let id = format!("{}{}", group, n);
                provider.servers.push(server(&id, &format!("{}.example", id), group as f64 * 10.0));
            }
        }
        let (client, _rx) = client_for(provider);

        let listed = client.list_servers().await.unwrap();

        assert_eq!(listed.len(), 20);
        assert!(listed.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(listed.iter().filter(|s| s.distance == 0.0).count(), 5);
    }

    #[tokio::test]
    async fn test_get_server_info_shapes() {
        let (client, _rx) = client_for(healthy());
        let info = client.get_server_info().await;
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["servers"][0]["id"], "4242");

        let failing = StubProvider { discovery_fails: true, ..healthy() };
        let (client, _rx) = client_for(failing);
        let json = serde_json::to_value(client.get_server_info().await).unwrap();
        assert_eq!(json["error"], "connection refused");
    }

    #[tokio::test]
    async fn test_set_callbacks_receive_reports() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_status = Arc::clone(&seen);
        let mut client = MeasurementClient::new(healthy(), SessionConfig::default());
        client.set_callbacks(
            None,
            Some(Arc::new(move |message: &str| {
                seen_status.lock().unwrap().push(message.to_string())
            })),
        );

        client.run_full_test().await.unwrap();

        assert_eq!(
            seen.lock().unwrap().last().unwrap(),
            "Speed test completed successfully!"
        );
    }
}
