//! Scripted [`SpeedProvider`] for session and runner tests.

use crate::errors::SpeedTestError;
use crate::speedtest::{ClientInfo, Server, SpeedProvider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct CallCounts {
    pub servers: AtomicUsize,
    pub client_info: AtomicUsize,
    pub ping: AtomicUsize,
    pub download: AtomicUsize,
    pub upload: AtomicUsize,
}

impl CallCounts {
    pub fn probes(&self) -> usize {
        self.ping.load(Ordering::SeqCst)
            + self.download.load(Ordering::SeqCst)
            + self.upload.load(Ordering::SeqCst)
    }
}

/// Returns whatever it was configured with. `None` results fail.
#[derive(Debug, Clone, Default)]
pub struct StubProvider {
    pub servers: Vec<Server>,
    pub discovery_fails: bool,
    pub client: Option<ClientInfo>,
    /// Round trip per server id; servers without an entry fail every ping.
    pub pings: HashMap<String, Duration>,
    pub download_bits: Option<f64>,
    pub upload_bits: Option<f64>,
    pub calls: Arc<CallCounts>,
}

impl StubProvider {
    /// One reachable server with the given round trip, and working probes.
    pub fn healthy(server: Server, round_trip: Duration) -> Self {
        let mut pings = HashMap::new();
        pings.insert(server.id.clone(), round_trip);

        Self {
            servers: vec![server],
            client: Some(ClientInfo {
                ip: "192.0.2.10".to_string(),
                isp: "ExampleISP".to_string(),
                country: "US".to_string(),
                lat: None,
                lon: None,
            }),
            pings,
            download_bits: Some(94_300_000.0),
            upload_bits: Some(11_200_000.0),
            ..Self::default()
        }
    }
}

pub fn server(id: &str, host: &str, distance: f64) -> Server {
    Server {
        id: id.to_string(),
        host: host.to_string(),
        url: url::Url::parse(&format!("http://{}/speedtest/upload.php", host))
            .unwrap(),
        name: "Springfield".to_string(),
        country: "US".to_string(),
        cc: "US".to_string(),
        sponsor: "Example".to_string(),
        distance,
    }
}

impl SpeedProvider for StubProvider {
    async fn servers(&self) -> Result<Vec<Server>, SpeedTestError> {
        self.calls.servers.fetch_add(1, Ordering::SeqCst);

        if self.discovery_fails {
            return Err(SpeedTestError::network("connection refused"));
        }
        if self.servers.is_empty() {
            return Err(SpeedTestError::no_servers("server discovery returned no servers"));
        }

        Ok(self.servers.clone())
    }

    async fn client_info(&self) -> Result<ClientInfo, SpeedTestError> {
        self.calls.client_info.fetch_add(1, Ordering::SeqCst);

        self.client
            .clone()
            .ok_or_else(|| SpeedTestError::api("configuration unavailable"))
    }

    async fn ping(&self, server: &Server) -> Result<Duration, SpeedTestError> {
        self.calls.ping.fetch_add(1, Ordering::SeqCst);

        self.pings
            .get(&server.id)
            .copied()
            .ok_or_else(|| SpeedTestError::timeout(format!("{} did not answer", server.host)))
    }

    async fn download(&self, _server: &Server) -> Result<f64, SpeedTestError> {
        self.calls.download.fetch_add(1, Ordering::SeqCst);

        self.download_bits
            .ok_or_else(|| SpeedTestError::network("connection reset by peer"))
    }

    async fn upload(&self, _server: &Server) -> Result<f64, SpeedTestError> {
        self.calls.upload.fetch_add(1, Ordering::SeqCst);

        self.upload_bits
            .ok_or_else(|| SpeedTestError::network("connection reset by peer"))
    }
}
