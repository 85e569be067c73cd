//! In-memory web transport.
//!
//! `MemoryMount` behaves like a mounted web filesystem without touching the
//! network: reading `clone` allocates numbered connection directories, control
//! writes are parsed as `url`/`headers` messages, and opening `body` serves a
//! scripted response for the announced URL. Every completed exchange is
//! recorded so tests can assert on exactly what the bridge sent.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::DEFAULT_ROOT;
use crate::header::sanitize_header_name;
use crate::mount::{Mount, MountFile, OpenMode};

/// A scripted response served from a connection directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryResponse {
    body: Vec<u8>,
    /// Values keyed by sanitized header name.
    headers: BTreeMap<String, String>,
}

impl MemoryResponse {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Add a response header. Names that sanitize to the same file overwrite
    /// each other.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .insert(sanitize_header_name(name), value.into());
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// A request as the transport saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Connection directory name.
    pub connection: String,
    pub url: String,
    /// Raw header block, empty if none was announced.
    pub headers: String,
    pub postdata: Vec<u8>,
    /// Length of each write made to `postdata`.
    pub postdata_writes: Vec<usize>,
}

#[derive(Debug, Default)]
struct ConnectionState {
    url: Option<String>,
    headers: Option<String>,
    postdata: Vec<u8>,
    postdata_writes: Vec<usize>,
    response: Option<MemoryResponse>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    /// Every allocated connection. Entries are never reclaimed.
    connections: BTreeMap<u64, ConnectionState>,
    responses: HashMap<String, MemoryResponse>,
    default_response: Option<MemoryResponse>,
    exchanges: Vec<Exchange>,
}

/// An in-memory web transport for tests.
///
/// Allocated connection directories are never reclaimed, so the emulator is
/// meant for short-lived use.
#[derive(Clone)]
pub struct MemoryMount {
    root: PathBuf,
    state: Arc<Mutex<State>>,
}

impl MemoryMount {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Serve `response` for requests to exactly `url`.
    pub fn with_response(self, url: impl Into<String>, response: MemoryResponse) -> Self {
        if let Ok(mut state) = self.lock() {
            state.responses.insert(url.into(), response);
        }
        self
    }

    /// Serve `response` when no URL-specific response matches.
    pub fn with_default_response(self, response: MemoryResponse) -> Self {
        if let Ok(mut state) = self.lock() {
            state.default_response = Some(response);
        }
        self
    }

    /// Exchanges whose `body` has been opened, in order.
    pub fn recorded_exchanges(&self) -> Vec<Exchange> {
        self.lock()
            .map(|state| state.exchanges.clone())
            .unwrap_or_default()
    }

    /// Number of connection directories allocated so far. Closing a
    /// connection does not release its directory.
    pub fn allocated(&self) -> usize {
        self.lock().map(|state| state.connections.len()).unwrap_or(0)
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| io::Error::other("memory mount state poisoned"))
    }

    fn open_connection_file(
        &self,
        id: &str,
        name: &str,
        mode: OpenMode,
    ) -> io::Result<Box<dyn MountFile>> {
        let conn_id: u64 = id.parse().map_err(|_| not_found(id))?;
        let mut state = self.lock()?;

        match name {
            "postdata" => {
                if mode == OpenMode::Read {
                    return Err(permission_denied(name));
                }
                let conn = state
                    .connections
                    .get_mut(&conn_id)
                    .ok_or_else(|| not_found(id))?;
                conn.postdata.clear();
                conn.postdata_writes.clear();
                Ok(Box::new(PostdataFile {
                    state: Arc::clone(&self.state),
                    conn_id,
                }))
            }
            "body" => {
                if mode != OpenMode::Read {
                    return Err(permission_denied(name));
                }
                let body = perform(&mut state, conn_id, id)?;
                Ok(Box::new(ReadOnlyFile(Cursor::new(body))))
            }
            header => {
                if mode != OpenMode::Read {
                    return Err(permission_denied(header));
                }
                let conn = state.connections.get(&conn_id).ok_or_else(|| not_found(id))?;
                let value = conn
                    .response
                    .as_ref()
                    .and_then(|response| response.headers.get(header))
                    .ok_or_else(|| not_found(header))?;
                Ok(Box::new(ReadOnlyFile(Cursor::new(value.clone().into_bytes()))))
            }
        }
    }
}

impl Default for MemoryMount {
    fn default() -> Self {
        Self::new()
    }
}

impl Mount for MemoryMount {
    fn root(&self) -> &Path {
        &self.root
    }

    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Box<dyn MountFile>> {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        match components.as_slice() {
            ["clone"] => Ok(Box::new(CloneFile {
                state: Arc::clone(&self.state),
                line: None,
                position: 0,
            })),
            [id, name] => self.open_connection_file(id, name, mode),
            _ => Err(not_found(path)),
        }
    }
}

/// Run the exchange for a connection the first time its body is opened.
fn perform(state: &mut State, conn_id: u64, id: &str) -> io::Result<Vec<u8>> {
    let default_response = state.default_response.clone();
    let conn = state
        .connections
        .get_mut(&conn_id)
        .ok_or_else(|| not_found(id))?;

    if let Some(response) = &conn.response {
        return Ok(response.body.clone());
    }

    let url = conn.url.clone().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("connection {} has no url", id),
        )
    })?;
    let response = state
        .responses
        .get(&url)
        .cloned()
        .or(default_response)
        .ok_or_else(|| not_found(&url))?;

    let exchange = Exchange {
        connection: id.to_string(),
        url,
        headers: conn.headers.clone().unwrap_or_default(),
        postdata: conn.postdata.clone(),
        postdata_writes: conn.postdata_writes.clone(),
    };
    let body = response.body.clone();
    conn.response = Some(response);
    state.exchanges.push(exchange);
    Ok(body)
}

fn not_found(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} does not exist", what))
}

fn permission_denied(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("{}: wrong open mode", what),
    )
}

fn unsupported(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, what.to_string())
}

/// Handle on `clone`. The first read allocates a connection.
struct CloneFile {
    state: Arc<Mutex<State>>,
    line: Option<(u64, Vec<u8>)>,
    position: u64,
}

impl CloneFile {
    fn lock(&self) -> io::Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| io::Error::other("memory mount state poisoned"))
    }
}

impl Read for CloneFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.line.is_none() {
            let mut state = self.lock()?;
            let id = state.next_id;
            state.next_id += 1;
            state.connections.insert(id, ConnectionState::default());
            drop(state);
            self.line = Some((id, format!("{}\n", id).into_bytes()));
        }

        let line = match &self.line {
            Some((_, line)) => line,
            None => return Ok(0),
        };
        let start = (self.position as usize).min(line.len());
        let count = buf.len().min(line.len() - start);
        buf[..count].copy_from_slice(&line[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Write for CloneFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let id = self
            .line
            .as_ref()
            .map(|(id, _)| *id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no connection allocated"))?;

        let message = std::str::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let (verb, argument) = message.split_once(' ').unwrap_or((message, ""));

        {
            let mut state = self.lock()?;
            let conn = state
                .connections
                .get_mut(&id)
                .ok_or_else(|| not_found(&id.to_string()))?;
            match verb {
                "url" => conn.url = Some(argument.to_string()),
                "headers" => conn.headers = Some(argument.to_string()),
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("unknown control message: {}", verb),
                    ))
                }
            }
        }

        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for CloneFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match pos {
            SeekFrom::Start(offset) => self.position = offset,
            _ => return Err(unsupported("clone only seeks from the start")),
        }
        Ok(self.position)
    }
}

/// Write-only sink for a request body.
struct PostdataFile {
    state: Arc<Mutex<State>>,
    conn_id: u64,
}

impl Read for PostdataFile {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(permission_denied("postdata"))
    }
}

impl Write for PostdataFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("memory mount state poisoned"))?;
        let conn = state
            .connections
            .get_mut(&self.conn_id)
            .ok_or_else(|| not_found("postdata"))?;
        conn.postdata.extend_from_slice(buf);
        conn.postdata_writes.push(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for PostdataFile {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(unsupported("postdata is not seekable"))
    }
}

/// A read-only snapshot of a file.
struct ReadOnlyFile(Cursor<Vec<u8>>);

impl Read for ReadOnlyFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for ReadOnlyFile {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(permission_denied("read-only file"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for ReadOnlyFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(file: &mut Box<dyn MountFile>) -> String {
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    fn announce(mount: &MemoryMount, url: &str) -> String {
        let mut ctl = mount.open("clone", OpenMode::ReadWrite).unwrap();
        let line = read_all(&mut ctl);
        let dir = line.trim_end_matches('\n').to_string();
        ctl.seek(SeekFrom::Start(0)).unwrap();
        ctl.write_all(format!("url {}", url).as_bytes()).unwrap();
        dir
    }

    #[test]
    fn clone_allocates_sequential_directories() {
        let mount = MemoryMount::new();
        let mut first = mount.open("clone", OpenMode::ReadWrite).unwrap();
        let mut second = mount.open("clone", OpenMode::ReadWrite).unwrap();

        assert_eq!(read_all(&mut first), "0\n");
        assert_eq!(read_all(&mut second), "1\n");
        assert_eq!(mount.allocated(), 2);
    }

    #[test]
    fn clone_reread_after_seek_returns_same_name() {
        let mount = MemoryMount::new();
        let mut ctl = mount.open("clone", OpenMode::ReadWrite).unwrap();
        assert_eq!(read_all(&mut ctl), "0\n");
        ctl.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(read_all(&mut ctl), "0\n");
        assert_eq!(mount.allocated(), 1);
    }

    #[test]
    fn write_before_allocation_fails() {
        let mount = MemoryMount::new();
        let mut ctl = mount.open("clone", OpenMode::ReadWrite).unwrap();
        let err = ctl.write_all(b"url http://x/").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn unknown_control_message_fails() {
        let mount = MemoryMount::new();
        let mut ctl = mount.open("clone", OpenMode::ReadWrite).unwrap();
        read_all(&mut ctl);
        let err = ctl.write_all(b"hangup now").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn body_serves_scripted_response() {
        let mount = MemoryMount::new().with_response(
            "http://x/y",
            MemoryResponse::new("hello").with_header("Content-Type", "text/plain"),
        );
        let dir = announce(&mount, "http://x/y");

        let mut body = mount.open(&format!("{}/body", dir), OpenMode::Read).unwrap();
        assert_eq!(read_all(&mut body), "hello");

        let mut header = mount
            .open(&format!("{}/contenttype", dir), OpenMode::Read)
            .unwrap();
        assert_eq!(read_all(&mut header), "text/plain");

        let exchanges = mount.recorded_exchanges();
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].url, "http://x/y");
        assert_eq!(exchanges[0].connection, dir);
    }

    #[test]
    fn body_falls_back_to_default_response() {
        let mount = MemoryMount::new().with_default_response(MemoryResponse::new("fallback"));
        let dir = announce(&mount, "http://elsewhere/");

        let mut body = mount.open(&format!("{}/body", dir), OpenMode::Read).unwrap();
        assert_eq!(read_all(&mut body), "fallback");
    }

    #[test]
    fn body_without_response_is_not_found() {
        let mount = MemoryMount::new();
        let dir = announce(&mount, "http://x/missing");
        let err = mount
            .open(&format!("{}/body", dir), OpenMode::Read)
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(mount.recorded_exchanges().is_empty());
    }

    #[test]
    fn body_without_url_fails() {
        let mount = MemoryMount::new().with_default_response(MemoryResponse::new(""));
        let mut ctl = mount.open("clone", OpenMode::ReadWrite).unwrap();
        read_all(&mut ctl);
        let err = mount.open("0/body", OpenMode::Read).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn header_before_body_is_not_found() {
        let mount = MemoryMount::new().with_default_response(
            MemoryResponse::new("").with_header("Location", "http://x/z"),
        );
        let dir = announce(&mount, "http://x/y");
        assert!(mount
            .open(&format!("{}/location", dir), OpenMode::Read)
            .is_err());
    }

    #[test]
    fn postdata_records_writes() {
        let mount = MemoryMount::new().with_default_response(MemoryResponse::new("ok"));
        let dir = announce(&mount, "http://x/upload");

        let mut post = mount
            .open(&format!("{}/postdata", dir), OpenMode::Write)
            .unwrap();
        post.write_all(b"abc").unwrap();
        post.write_all(b"de").unwrap();
        drop(post);

        mount.open(&format!("{}/body", dir), OpenMode::Read).unwrap();
        let exchange = &mount.recorded_exchanges()[0];
        assert_eq!(exchange.postdata, b"abcde");
        assert_eq!(exchange.postdata_writes, vec![3, 2]);
    }

    #[test]
    fn wrong_modes_are_rejected() {
        let mount = MemoryMount::new().with_default_response(MemoryResponse::new("ok"));
        let dir = announce(&mount, "http://x/");

        let err = mount
            .open(&format!("{}/postdata", dir), OpenMode::Read)
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        let err = mount
            .open(&format!("{}/body", dir), OpenMode::Write)
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn body_is_read_only() {
        let mount = MemoryMount::new().with_default_response(MemoryResponse::new("ok"));
        let dir = announce(&mount, "http://x/");
        let mut body = mount.open(&format!("{}/body", dir), OpenMode::Read).unwrap();
        assert!(body.write_all(b"nope").is_err());
    }

    #[test]
    fn unknown_connection_is_not_found() {
        let mount = MemoryMount::new();
        for path in ["9/body", "nine/body", "a/b/c"] {
            let err = mount.open(path, OpenMode::Read).err().unwrap();
            assert_eq!(err.kind(), io::ErrorKind::NotFound);
        }
    }

    #[test]
    fn allocations_outlive_their_connections() {
        let mount = MemoryMount::new();
        for _ in 0..3 {
            let mut ctl = mount.open("clone", OpenMode::ReadWrite).unwrap();
            read_all(&mut ctl);
        }
        assert_eq!(mount.allocated(), 3);

        let mut next = mount.open("clone", OpenMode::ReadWrite).unwrap();
        assert_eq!(read_all(&mut next), "3\n");
    }

    #[test]
    fn response_header_names_are_sanitized() {
        let response = MemoryResponse::new("x").with_header("X-Foo", "1");
        assert_eq!(response.headers.get("xfoo"), Some(&"1".to_string()));
        assert_eq!(response.body(), b"x");
    }
}
