pub mod config;
pub mod latency;
pub mod probe;
pub mod servers;

use reqwest::{
    header::{HeaderMap, HeaderValue, CACHE_CONTROL, USER_AGENT},
    Method,
};
use serde::Deserialize;
use std::borrow::Cow;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) fn user_agent() -> String {
    format!(
        "Mozilla/5.0 ({}; U; {}) {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        NAME,
        VERSION
    )
}

/// Body attached to an outgoing request.
pub enum RequestBody<T> {
    None,
    Bytes(T),
}

/// A single HTTP exchange with the speedtest.net infrastructure.
///
/// `endpoint` is either a path relative to the API base URL or an absolute
/// URL pointing at a test server.
pub trait Request {
    type Body: Into<reqwest::Body>;

    type Response: for<'de> Deserialize<'de>;

    const METHOD: Method = Method::GET;

    fn endpoint(&self) -> Cow<'_, str>;

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&user_agent()) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        headers
    }

    fn body(&self) -> RequestBody<Self::Body> {
        RequestBody::None
    }
}

impl<R: Request> Request for &R {
    type Body = R::Body;
    type Response = R::Response;

    const METHOD: Method = R::METHOD;

    fn endpoint(&self) -> Cow<'_, str> {
        (**self).endpoint()
    }

    fn headers(&self) -> HeaderMap {
        (**self).headers()
    }

    fn body(&self) -> RequestBody<Self::Body> {
        (**self).body()
    }
}

/// Milliseconds since the epoch, appended to probe URLs so caches between
/// the client and the test server never answer for it.
pub(crate) fn cache_buster() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}
