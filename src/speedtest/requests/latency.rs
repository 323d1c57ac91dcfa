use crate::speedtest::requests::{cache_buster, Request};
use std::borrow::Cow;
use url::Url;

/// Body a healthy server answers to a latency request with.
pub(crate) const LATENCY_BODY: &str = "test=test";

/// One round trip to `latency.txt` next to the server's upload URL.
pub(crate) struct LatencyRequest {
    url: Url,
}

impl LatencyRequest {
    pub fn new(server_url: &Url) -> Result<Self, url::ParseError> {
        let mut url = server_url.join("latency.txt")?;
        url.set_query(Some(&format!("x={}", cache_buster())));
        Ok(Self { url })
    }
}

impl Request for LatencyRequest {
    type Body = Vec<u8>;

    type Response = String;

    fn endpoint(&self) -> Cow<'_, str> {
        self.url.as_str().into()
    }
}
