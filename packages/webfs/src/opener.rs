//! URL-opening strategies.
//!
//! An [`HttpClient`](crate::HttpClient) does not know how requests reach the
//! network. It is handed an [`Opener`] at construction, and the opener turns
//! each request into a [`Connection`].

use std::sync::Arc;

use crate::config::{MountConfig, DEFAULT_CHUNK_SIZE};
use crate::error::Result;
use crate::header::HeaderLookup;
use crate::mount::{DirMount, Mount};
use crate::session::WebConn;
use crate::types::HttpRequest;

/// An open request/response exchange.
pub trait Connection: Send {
    /// Read up to `amount` bytes of the response body.
    fn read(&mut self, amount: usize) -> Result<Vec<u8>>;

    fn close(&mut self) -> Result<()>;

    /// The URL the connection was opened for.
    fn url(&self) -> &str;

    fn header(&self, key: &str) -> HeaderLookup;
}

/// Produces a connection per request.
pub trait Opener: Send + Sync {
    fn open(&self, request: HttpRequest) -> Result<Box<dyn Connection>>;

    /// Release opener-wide resources.
    fn close(&self) {}
}

impl Connection for WebConn {
    fn read(&mut self, amount: usize) -> Result<Vec<u8>> {
        WebConn::read(self, amount)
    }

    fn close(&mut self) -> Result<()> {
        WebConn::close(self)
    }

    fn url(&self) -> &str {
        WebConn::url(self)
    }

    fn header(&self, key: &str) -> HeaderLookup {
        WebConn::header(self, key)
    }
}

/// Credentials a caller may pass when installing an opener.
///
/// The web transport handles authentication itself, so these are accepted
/// and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthInfo {
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Opens every request as a new [`WebConn`] on a mount.
///
/// Holds no per-request state: each `open` allocates a fresh connection and
/// nothing is reused between calls.
pub struct WebOpener<M: Mount> {
    mount: Arc<M>,
    chunk_size: usize,
}

impl<M: Mount + 'static> WebOpener<M> {
    pub fn new(mount: M) -> Self {
        Self::from_shared(Arc::new(mount))
    }

    pub fn from_shared(mount: Arc<M>) -> Self {
        Self {
            mount,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn mount(&self) -> &M {
        &self.mount
    }
}

impl WebOpener<DirMount> {
    pub fn from_config(config: &MountConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(DirMount::new(config.root.clone())).with_chunk_size(config.chunk_size))
    }
}

impl<M: Mount + 'static> Opener for WebOpener<M> {
    fn open(&self, request: HttpRequest) -> Result<Box<dyn Connection>> {
        let mount: Arc<dyn Mount> = self.mount.clone();
        let conn = WebConn::open_with_chunk_size(mount, request, self.chunk_size)?;
        Ok(Box::new(conn))
    }
}

/// Build the opener installed into an [`HttpClient`](crate::HttpClient).
///
/// `auth` is ignored.
pub fn web_opener(config: &MountConfig, _auth: Option<&AuthInfo>) -> Result<WebOpener<DirMount>> {
    WebOpener::from_config(config)
}
