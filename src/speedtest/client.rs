use crate::errors::SpeedTestError;
use crate::speedtest::requests::{Request, RequestBody};
use reqwest::{Body, Client as ReqwestClient, RequestBuilder};
use std::time::Duration;
use url::Url;

pub(crate) static BASE_URL: &str = "https://www.speedtest.net";

/// Bytes moved by one probe request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transfer {
    pub sent: u64,
    pub received: u64,
}

#[derive(Debug, Clone)]
pub struct Client {
    client: ReqwestClient,
    base_url: Url,
}

impl Client {
    /// Create a client against the public speedtest.net API.
    pub fn new(request_timeout: Duration) -> Result<Self, SpeedTestError> {
        Self::with_base_url(BASE_URL, request_timeout)
    }

    /// Create a client whose relative endpoints resolve against `base_url`.
    pub fn with_base_url(
        base_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, SpeedTestError> {
        let client = ReqwestClient::builder().timeout(request_timeout).build()?;

        Ok(Client { client, base_url: Url::parse(base_url)? })
    }

    /// Send a request and deserialize its response.
    pub async fn send<R: Request>(
        &self,
        request: R,
    ) -> Result<R::Response, SpeedTestError> {
        let text = self
            .request(&request)?
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        // JSON endpoints first; the configuration endpoint answers with XML
        // that the response type parses from the raw text.
        if let Ok(parsed) = serde_json::from_str::<R::Response>(&text) {
            return Ok(parsed);
        }

        serde_plain::from_str(&text).map_err(|e| {
            SpeedTestError::api(format!(
                "unexpected response from {}: {}",
                request.endpoint(),
                e
            ))
            .with_source(e)
        })
    }

    /// Send a request and read its whole response body, returning how many
    /// bytes went each way. The body itself is discarded.
    pub async fn transfer<R: Request>(
        &self,
        request: R,
    ) -> Result<Transfer, SpeedTestError> {
        let (builder, sent) = self.request_with_len(&request)?;

        let received = builder.send().await?.error_for_status()?.bytes().await?;

        Ok(Transfer { sent, received: received.len() as u64 })
    }

    fn request<R: Request>(&self, request: &R) -> Result<RequestBuilder, SpeedTestError> {
        self.request_with_len(request).map(|(builder, _)| builder)
    }

    fn request_with_len<R: Request>(
        &self,
        request: &R,
    ) -> Result<(RequestBuilder, u64), SpeedTestError> {
        let url = self.resolve(&request.endpoint())?;

        self.client
            .request(R::METHOD, url)
            .headers(request.headers())
            .speedtest_body(request.body())
    }

    fn resolve(&self, endpoint: &str) -> Result<Url, SpeedTestError> {
        if let Ok(url) = Url::parse(endpoint) {
            return Ok(url);
        }

        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }
}

trait RequestBuilderExt: Sized {
    fn speedtest_body<T: Into<Body>>(
        self,
        body: RequestBody<T>,
    ) -> Result<(Self, u64), SpeedTestError>;
}

impl RequestBuilderExt for RequestBuilder {
    fn speedtest_body<T: Into<Body>>(
        self,
        body: RequestBody<T>,
    ) -> Result<(Self, u64), SpeedTestError> {
        Ok(match body {
            RequestBody::None => (self, 0),
            RequestBody::Bytes(value) => {
                let body: Body = value.into();
                let len = body.as_bytes().map_or(0, |bytes| bytes.len() as u64);
                (self.body(body), len)
            }
        })
    }
}
