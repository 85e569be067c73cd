//! Generic HTTP client over an injected [`Opener`].

use std::collections::BTreeMap;

use url::Url;

use crate::config::{MountConfig, DEFAULT_CHUNK_SIZE};
use crate::error::Result;
use crate::header::{sanitize_header_name, HeaderLookup};
use crate::mount::DirMount;
use crate::opener::{Connection, Opener, WebOpener};
use crate::types::{HttpRequest, HttpResponse};

/// A blocking HTTP client.
///
/// The client owns its opener; how requests travel is decided entirely by
/// the opener it was built with.
///
/// # Example
///
/// ```rust
/// use webfs_http::{HttpClient, MemoryMount, MemoryResponse, WebOpener};
///
/// let mount = MemoryMount::new()
///     .with_response("http://example.com/", MemoryResponse::new("hello"));
/// let client = HttpClient::new(WebOpener::new(mount));
///
/// let response = client.get("http://example.com/").unwrap();
/// assert_eq!(response.text(), "hello");
/// ```
pub struct HttpClient<O: Opener> {
    opener: O,
    chunk_size: usize,
    response_headers: Vec<String>,
}

impl<O: Opener> HttpClient<O> {
    pub fn new(opener: O) -> Self {
        let defaults = MountConfig::default();
        Self {
            opener,
            chunk_size: DEFAULT_CHUNK_SIZE,
            response_headers: defaults.response_headers,
        }
    }

    /// Capture these response headers in `fetch` results instead of the
    /// defaults.
    pub fn with_response_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_headers = names.into_iter().map(Into::into).collect();
        self
    }

    /// Size of each read when draining a response body.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Open a connection and hand it back unread.
    pub fn open(&self, request: HttpRequest) -> Result<Box<dyn Connection>> {
        Url::parse(&request.url)?;
        self.opener.open(request)
    }

    /// Send `request` and read the whole response.
    pub fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut conn = self.open(request)?;
        let result = self.drain(conn.as_mut());
        conn.close()?;
        result
    }

    pub fn get(&self, url: &str) -> Result<HttpResponse> {
        self.fetch(HttpRequest::get(url))
    }

    pub fn post(&self, url: &str, body: impl Into<Vec<u8>>) -> Result<HttpResponse> {
        self.fetch(HttpRequest::get(url).with_bytes(body))
    }

    pub fn close(&self) {
        self.opener.close();
    }

    fn drain(&self, conn: &mut dyn Connection) -> Result<HttpResponse> {
        let mut headers = BTreeMap::new();
        for name in &self.response_headers {
            if let HeaderLookup::Found(value) = conn.header(name) {
                headers.insert(sanitize_header_name(name), value);
            }
        }

        let mut body = Vec::new();
        loop {
            let chunk = conn.read(self.chunk_size)?;
            if chunk.is_empty() {
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            url: conn.url().to_string(),
            headers,
            body,
        })
    }
}

impl HttpClient<WebOpener<DirMount>> {
    /// A client over the mount described by `config`.
    pub fn from_config(config: &MountConfig) -> Result<Self> {
        let opener = WebOpener::from_config(config)?;
        Ok(Self::new(opener)
            .with_chunk_size(config.chunk_size)
            .with_response_headers(config.response_headers.iter().cloned()))
    }
}
