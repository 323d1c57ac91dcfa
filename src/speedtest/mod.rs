//! The network measurement backend.
//!
//! [`SpeedProvider`] is the seam between the measurement session and the
//! infrastructure it measures against. [`HttpProvider`] talks to
//! speedtest.net servers; tests substitute their own providers.

pub mod client;
pub mod provider;
pub mod requests;

pub use client::{Client, Transfer};
pub use provider::{DataBlock, HttpProvider, ProbeConfig};

use crate::errors::SpeedTestError;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use url::Url;

/// A test server as returned by server discovery.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Server {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub host: String,
    /// Upload script URL; probe assets live next to it.
    pub url: Url,
    /// City the server is located in.
    pub name: String,
    pub country: String,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub sponsor: String,
    /// Distance from the client in kilometres.
    #[serde(default)]
    pub distance: f64,
}

/// Read-only projection of a [`Server`] for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub id: String,
    pub host: String,
    pub name: String,
    pub country: String,
    pub distance: f64,
}

impl From<&Server> for ServerDescriptor {
    fn from(server: &Server) -> Self {
        Self {
            id: server.id.clone(),
            host: server.host.clone(),
            name: server.name.clone(),
            country: server.country.clone(),
            distance: server.distance,
        }
    }
}

/// What the measurement infrastructure knows about the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientInfo {
    pub ip: String,
    pub isp: String,
    pub country: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// A network speed-measurement capability.
///
/// Probe results are raw: throughput in bits per second, latency as a
/// single round trip.
#[allow(async_fn_in_trait)]
pub trait SpeedProvider {
    /// Discover candidate test servers.
    async fn servers(&self) -> Result<Vec<Server>, SpeedTestError>;

    /// Retrieve the client's configuration (ISP, public address).
    async fn client_info(&self) -> Result<ClientInfo, SpeedTestError>;

    /// Measure one round trip to `server`.
    async fn ping(&self, server: &Server) -> Result<Duration, SpeedTestError>;

    /// Run the download probe against `server`, in bits per second.
    async fn download(&self, server: &Server) -> Result<f64, SpeedTestError>;

    /// Run the upload probe against `server`, in bits per second.
    async fn upload(&self, server: &Server) -> Result<f64, SpeedTestError>;
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}
