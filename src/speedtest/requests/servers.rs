use crate::speedtest::requests::Request;
use crate::speedtest::Server;
use std::borrow::Cow;

/// Discovery of the test servers closest to the client.
pub(crate) struct ServersRequest {
    pub limit: usize,
}

impl Request for ServersRequest {
    type Body = Vec<u8>;

    type Response = Vec<Server>;

    fn endpoint(&self) -> Cow<'_, str> {
        format!(
            "/api/js/servers?engine=js&https_functional=true&limit={}",
            self.limit
        )
        .into()
    }
}
