//! `webget`: fetch a URL through a mounted web filesystem.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;

use webfs_http::config::{DEFAULT_CHUNK_SIZE, DEFAULT_ROOT};
use webfs_http::{HttpClient, HttpRequest, MountConfig};

/// Fetch a URL through a mounted web filesystem
#[derive(Parser, Debug)]
#[command(name = "webget")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory the web filesystem is mounted on
    #[arg(long, env = "WEBFS_ROOT", default_value = DEFAULT_ROOT)]
    pub root: PathBuf,

    /// Request header, as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "request-header", value_name = "HEADER")]
    pub request_headers: Vec<String>,

    /// Send the contents of FILE as the request body ('-' for stdin)
    #[arg(short, long, value_name = "FILE")]
    pub data: Option<String>,

    /// Print this response header to stderr (repeatable)
    #[arg(long = "header", value_name = "NAME")]
    pub lookups: Vec<String>,

    /// Size of each body chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// URL to fetch
    pub url: String,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Webfs(#[from] webfs_http::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header '{line}': expected 'Name: value'")]
    InvalidHeader { line: String },
}

/// Split a `Name: value` header line.
pub fn parse_header_line(line: &str) -> Result<(String, String), Error> {
    let (name, value) = line.split_once(':').ok_or_else(|| Error::InvalidHeader {
        line: line.to_string(),
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidHeader {
            line: line.to_string(),
        });
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn build_request(args: &Args) -> Result<HttpRequest, Error> {
    let mut request = HttpRequest::get(args.url.clone());
    for line in &args.request_headers {
        let (name, value) = parse_header_line(line)?;
        request = request.with_header(name, value);
    }

    match args.data.as_deref() {
        Some("-") => request = request.with_body(io::stdin()),
        Some(path) => request = request.with_body(File::open(path)?),
        None => {}
    }

    Ok(request)
}

/// Fetch `args.url`, writing the body to `out` and header lookups to `err`.
pub fn run(args: &Args, out: &mut dyn Write, err: &mut dyn Write) -> Result<(), Error> {
    let config = MountConfig::default()
        .with_root(args.root.clone())
        .with_chunk_size(args.chunk_size)
        .with_response_headers(args.lookups.iter().cloned());
    let client = HttpClient::from_config(&config)?;

    let request = build_request(args)?;
    log::debug!("fetching {} via {}", request.url, args.root.display());
    let response = client.fetch(request)?;

    out.write_all(&response.body)?;
    out.flush()?;

    for name in &args.lookups {
        match response.header(name) {
            Some(value) => writeln!(err, "{}: {}", name, value)?,
            None => writeln!(err, "{}: <absent>", name)?,
        }
    }
    Ok(())
}
