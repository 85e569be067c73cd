//! One request/response exchange over the mount.

use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::control::ControlChannel;
use crate::error::{Error, Result};
use crate::header::{self, HeaderLookup};
use crate::mount::{Mount, MountFile, OpenMode};
use crate::types::HttpRequest;

/// A live connection: the request has been announced and sent, and the
/// response body is open for reading.
///
/// The connection directory is owned by this session alone. After `close`
/// the body handle and directory are released and reads fail with
/// `Error::Closed`.
pub struct WebConn {
    mount: Arc<dyn Mount>,
    url: String,
    directory: Option<String>,
    body: Option<Box<dyn MountFile>>,
}

impl WebConn {
    /// Open a connection for `request`, streaming any body in 4096-byte chunks.
    pub fn open(mount: Arc<dyn Mount>, request: HttpRequest) -> Result<Self> {
        Self::open_with_chunk_size(mount, request, DEFAULT_CHUNK_SIZE)
    }

    /// Open a connection for `request`.
    ///
    /// The steps run in a fixed order on a single control handle: allocate a
    /// directory, announce the URL, announce the headers if there are any,
    /// copy the body to `postdata`, then open `body`. The control handle is
    /// released on every path out of this function, as is the `postdata`
    /// handle.
    pub fn open_with_chunk_size(
        mount: Arc<dyn Mount>,
        request: HttpRequest,
        chunk_size: usize,
    ) -> Result<Self> {
        let headers = request.header_block();
        let HttpRequest { url, body, .. } = request;

        let mut ctl = ControlChannel::open(&*mount)?;
        let dir = ctl.allocate()?;
        ctl.announce_url(&url)?;
        if !headers.is_empty() {
            ctl.announce_headers(&headers)?;
        }

        if let Some(mut source) = body {
            let mut postdata = mount.open(&format!("{}/postdata", dir), OpenMode::Write)?;
            let sent = copy_chunked(&mut source, &mut postdata, chunk_size)?;
            log::debug!("connection {}: posted {} bytes", dir, sent);
        }

        let body = mount.open(&format!("{}/body", dir), OpenMode::Read)?;
        drop(ctl);

        Ok(Self {
            mount,
            url,
            directory: Some(dir),
            body: Some(body),
        })
    }

    /// Read up to `amount` bytes of the response body.
    ///
    /// Returns fewer bytes near the end of the body and an empty buffer once
    /// it is exhausted. The buffer grows with what is read, not with `amount`.
    pub fn read(&mut self, amount: usize) -> Result<Vec<u8>> {
        let body = self.body.as_mut().ok_or(Error::Closed)?;
        let mut buf = Vec::new();
        body.take(amount as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Release the body handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(dir) = self.directory.take() {
            log::debug!("connection {}: closed", dir);
        }
        self.body = None;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.body.is_none()
    }

    /// The URL this connection was opened for, verbatim.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Full path of the connection directory, while open.
    pub fn directory(&self) -> Option<PathBuf> {
        self.directory
            .as_ref()
            .map(|dir| self.mount.root().join(dir))
    }

    /// Look up a response header. See [`HeaderLookup`] for failure handling.
    pub fn header(&self, key: &str) -> HeaderLookup {
        match &self.directory {
            Some(dir) => header::lookup(&*self.mount, dir, key),
            None => HeaderLookup::Absent,
        }
    }
}

impl Read for WebConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.body.as_mut() {
            Some(body) => body.read(buf),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection is closed",
            )),
        }
    }
}

impl fmt::Debug for WebConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebConn")
            .field("url", &self.url)
            .field("directory", &self.directory)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Copy `source` into `sink` in writes of exactly `chunk_size` bytes, except
/// the last. Each chunk is filled until it is full or `source` is exhausted,
/// so short reads never produce short writes. Returns the number of bytes
/// copied.
fn copy_chunked(source: &mut dyn Read, sink: &mut dyn Write, chunk_size: usize) -> Result<u64> {
    let limit = chunk_size.max(1) as u64;
    let mut chunk = Vec::with_capacity(chunk_size.max(1));
    let mut total = 0u64;
    loop {
        chunk.clear();
        let count = (&mut *source).take(limit).read_to_end(&mut chunk)?;
        if count == 0 {
            break;
        }
        sink.write_all(&chunk)?;
        total += count as u64;
    }
    sink.flush()?;
    Ok(total)
}
