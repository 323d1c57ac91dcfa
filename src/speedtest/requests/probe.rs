use crate::speedtest::requests::{cache_buster, user_agent, Request, RequestBody};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use std::borrow::Cow;
use url::Url;

const PAYLOAD_PREFIX: &[u8] = b"content1=";
const PAYLOAD_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Download of one `random{n}x{n}.jpg` asset from a test server.
#[derive(Clone)]
pub(crate) struct DownloadProbe {
    url: Url,
}

impl DownloadProbe {
    pub fn new(
        server_url: &Url,
        edge: u64,
        sequence: usize,
    ) -> Result<Self, url::ParseError> {
        let mut url = server_url.join(&format!("random{edge}x{edge}.jpg"))?;
        url.set_query(Some(&format!("x={}.{}", cache_buster(), sequence)));
        Ok(Self { url })
    }
}

impl Request for DownloadProbe {
    type Body = Vec<u8>;

    type Response = ();

    fn endpoint(&self) -> Cow<'_, str> {
        self.url.as_str().into()
    }
}

/// Upload of a generated form payload to a test server's upload script.
#[derive(Clone)]
pub(crate) struct UploadProbe {
    url: Url,
    payload: Bytes,
}

impl UploadProbe {
    pub fn new(server_url: &Url, payload: Bytes) -> Self {
        let mut url = server_url.clone();
        url.set_query(Some(&format!("x={}", cache_buster())));
        Self { url, payload }
    }
}

impl Request for UploadProbe {
    type Body = Bytes;

    type Response = ();

    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        self.url.as_str().into()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&user_agent()) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        headers
    }

    fn body(&self) -> RequestBody<Self::Body> {
        RequestBody::Bytes(self.payload.clone())
    }
}

/// Build an upload payload of exactly `bytes` bytes (`content1=` followed by
/// a repeating alphanumeric pattern). Clones share the buffer.
pub(crate) fn upload_payload(bytes: usize) -> Bytes {
    let mut payload = Vec::with_capacity(bytes);
    payload.extend(PAYLOAD_PREFIX.iter().take(bytes));
    payload.extend(
        PAYLOAD_ALPHABET
            .iter()
            .cycle()
            .take(bytes.saturating_sub(payload.len())),
    );
    Bytes::from(payload)
}
