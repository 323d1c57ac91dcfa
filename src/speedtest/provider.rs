use crate::errors::SpeedTestError;
use crate::retry::{retry_async, RetryConfig};
use crate::speedtest::client::{Client, Transfer};
use crate::speedtest::requests::config::ConfigRequest;
use crate::speedtest::requests::latency::{LatencyRequest, LATENCY_BODY};
use crate::speedtest::requests::probe::{upload_payload, DownloadProbe, UploadProbe};
use crate::speedtest::requests::servers::ServersRequest;
use crate::speedtest::requests::Request;
use crate::speedtest::{ClientInfo, Server, SpeedProvider};
use futures::{future, stream, StreamExt};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::Instant;

/// A data block configuration for bandwidth probes.
#[derive(Debug, Clone)]
pub struct DataBlock {
    /// For downloads, the edge length of the `random{n}x{n}.jpg` asset;
    /// for uploads, the payload size in bytes.
    pub size: u64,
    /// Number of requests to issue at this size.
    pub count: usize,
}

impl DataBlock {
    pub const fn new(size: u64, count: usize) -> Self {
        Self { size, count }
    }
}

/// Configuration for the HTTP probes.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Image sizes fetched by the download probe.
    /// Default: 1500..=4000 in steps of 500, 4 requests each.
    pub download_images: Vec<DataBlock>,

    /// Payload sizes posted by the upload probe.
    /// Default: 512KiB, 1MiB and 7MiB, 17 requests each.
    pub upload_sizes: Vec<DataBlock>,

    /// Requests in flight at once during a probe.
    /// Default: 8
    pub concurrency: usize,

    /// No new requests are started once a probe has run this long.
    /// Default: 10s
    pub test_length: Duration,

    /// Per-request timeout.
    /// Default: 10s
    pub request_timeout: Duration,

    /// Number of servers requested from discovery.
    /// Default: 30
    pub server_limit: usize,

    /// Retry policy for discovery and configuration requests.
    pub retry: RetryConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            download_images: vec![
                DataBlock::new(1500, 4),
                DataBlock::new(2000, 4),
                DataBlock::new(2500, 4),
                DataBlock::new(3000, 4),
                DataBlock::new(3500, 4),
                DataBlock::new(4000, 4),
            ],
            upload_sizes: vec![
                DataBlock::new(524_288, 17),   // 512KiB
                DataBlock::new(1_048_576, 17), // 1MiB
                DataBlock::new(7_340_032, 17), // 7MiB
            ],
            concurrency: 8,
            test_length: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            server_limit: 30,
            retry: RetryConfig::default(),
        }
    }
}

/// [`SpeedProvider`] backed by speedtest.net servers over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    config: ProbeConfig,
}

impl HttpProvider {
    pub fn new(client: Client, config: ProbeConfig) -> Self {
        Self { client, config }
    }

    /// Run `requests` with bounded concurrency until they are exhausted or
    /// the test length elapses, and convert the bytes counted by
    /// `bytes_of` into bits per second.
    async fn run_probe<R, F>(
        &self,
        direction: &str,
        requests: Vec<R>,
        bytes_of: F,
    ) -> Result<f64, SpeedTestError>
    where
        R: Request,
        F: Fn(&Transfer) -> u64,
    {
        if requests.is_empty() {
            return Err(SpeedTestError::measurement(format!(
                "no {} requests configured",
                direction
            )));
        }

        let planned = requests.len();
        let start = Instant::now();
        let deadline = start + self.config.test_length;

        let outcomes: Vec<Result<Transfer, SpeedTestError>> =
            stream::iter(requests)
                .take_while(|_| future::ready(Instant::now() < deadline))
                .map(|request| self.client.transfer(request))
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

        let elapsed = start.elapsed().as_secs_f64();

        let issued = outcomes.len();
        let mut total_bytes = 0u64;
        let mut failed = 0;
        let mut first_error = None;

        for outcome in outcomes {
            match outcome {
                Ok(transfer) => total_bytes += bytes_of(&transfer),
                Err(e) => {
                    failed += 1;
                    debug!("{} request failed: {}", direction, e.message);
                    first_error.get_or_insert(e);
                }
            }
        }

        if total_bytes == 0 || elapsed <= 0.0 {
            return Err(first_error.unwrap_or_else(|| {
                SpeedTestError::measurement(format!(
                    "{} probe transferred no data",
                    direction
                ))
            }));
        }

        if failed > 0 {
            warn!(
                "{} of {} {} requests failed, continuing with {} successful",
                failed,
                issued,
                direction,
                issued - failed
            );
        }

        let bits_per_second = total_bytes as f64 * 8.0 / elapsed;

        info!(
            "{}: {} bytes in {:.2}s over {}/{} requests ({:.0} bit/s)",
            direction, total_bytes, elapsed, issued, planned, bits_per_second
        );

        Ok(bits_per_second)
    }
}

impl SpeedProvider for HttpProvider {
    async fn servers(&self) -> Result<Vec<Server>, SpeedTestError> {
        let limit = self.config.server_limit;

        let servers = retry_async(&self.config.retry, "server discovery", || {
            self.client.send(ServersRequest { limit })
        })
        .await?;

        if servers.is_empty() {
            return Err(SpeedTestError::no_servers(
                "server discovery returned no servers",
            ));
        }

        debug!("Discovered {} servers", servers.len());

        Ok(servers)
    }

    async fn client_info(&self) -> Result<ClientInfo, SpeedTestError> {
        retry_async(&self.config.retry, "client configuration", || {
            self.client.send(ConfigRequest {})
        })
        .await
    }

    async fn ping(&self, server: &Server) -> Result<Duration, SpeedTestError> {
        let request = LatencyRequest::new(&server.url)?;

        let start = Instant::now();
        let body = self.client.send(request).await?;
        let elapsed = start.elapsed();

        if body.trim() != LATENCY_BODY {
            return Err(SpeedTestError::api(format!(
                "unexpected latency response from {}",
                server.host
            )));
        }

        Ok(elapsed)
    }

    async fn download(&self, server: &Server) -> Result<f64, SpeedTestError> {
        let mut requests = Vec::new();

        for block in &self.config.download_images {
            for _ in 0..block.count {
                requests.push(DownloadProbe::new(
                    &server.url,
                    block.size,
                    requests.len(),
                )?);
            }
        }

        info!("Beginning download probe against {}", server.host);

        self.run_probe("download", requests, |transfer| transfer.received)
            .await
    }

    async fn upload(&self, server: &Server) -> Result<f64, SpeedTestError> {
        let mut requests = Vec::new();

        for block in &self.config.upload_sizes {
            let payload = upload_payload(block.size as usize);
            for _ in 0..block.count {
                requests.push(UploadProbe::new(&server.url, payload.clone()));
            }
        }

        info!("Beginning upload probe against {}", server.host);

        self.run_probe("upload", requests, |transfer| transfer.sent).await
    }
}
