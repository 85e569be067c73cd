use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};

use crate::header::{sanitize_header_name, HeaderBlock};

/// HTTP method implied by a request.
///
/// The transport has no method message: a request carrying a body is sent
/// as a POST, anything else as a GET.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
}

/// Streaming request body.
pub type Body = Box<dyn Read + Send>;

/// An HTTP request to send through an `Opener`.
#[derive(Default)]
pub struct HttpRequest {
    /// Full request URL, passed to the transport verbatim.
    pub url: String,

    /// Request headers, in the order they are announced.
    pub headers: Vec<(String, String)>,

    /// Outbound body, streamed to `postdata`.
    pub body: Option<Body>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn post(url: impl Into<String>, body: impl Read + Send + 'static) -> Self {
        Self::get(url).with_body(body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Read + Send + 'static) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    pub fn with_bytes(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.with_body(Cursor::new(bytes.into()))
    }

    pub fn with_json_body(self, body: &impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(self.with_bytes(serde_json::to_vec(body)?))
    }

    pub fn method(&self) -> Method {
        if self.body.is_some() {
            Method::POST
        } else {
            Method::GET
        }
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn header_block(&self) -> HeaderBlock {
        HeaderBlock::from_pairs(
            self.headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

/// A fully read response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    /// URL the connection was opened for.
    pub url: String,

    /// Headers that were present, keyed by sanitized name.
    pub headers: BTreeMap<String, String>,

    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Look up a captured header by any spelling of its name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&sanitize_header_name(name))
            .map(String::as_str)
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
