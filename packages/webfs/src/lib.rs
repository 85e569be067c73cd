//! # webfs-http
//!
//! HTTP requests over a mounted web filesystem.
//!
//! Instead of opening sockets, this crate talks to a transport service that
//! exposes the web as files. A request is carried out entirely with file
//! operations:
//!
//! ```text
//! /mnt/web/
//!     clone           # read: allocate a connection; write: url / headers
//!     <n>/
//!         postdata    # request body, written in chunks
//!         body        # response body
//!         <header>    # one file per response header, e.g. contenttype
//! ```
//!
//! ## Layers
//!
//! - [`Mount`]: the file transport. [`DirMount`] uses the host filesystem,
//!   [`MemoryMount`] emulates a transport in memory.
//! - [`ControlChannel`]: the `clone` protocol.
//! - [`WebConn`]: one request/response exchange.
//! - [`Opener`] / [`WebOpener`]: produce a connection per request.
//! - [`HttpClient`]: a client built around an injected opener.
//! - [`Peer`]: capability checks for repository peers reached over HTTP.
//!
//! ## Example
//!
//! ```rust,ignore
//! use webfs_http::{HttpClient, HttpRequest, MountConfig};
//!
//! let client = HttpClient::from_config(&MountConfig::from_env()?)?;
//! let response = client.fetch(
//!     HttpRequest::get("https://example.com/").with_header("Accept", "text/html"),
//! )?;
//! println!("{}", response.text());
//! ```

pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod header;
pub mod memory;
pub mod mount;
pub mod opener;
pub mod peer;
pub mod session;
pub mod types;

pub use client::HttpClient;
pub use config::MountConfig;
pub use control::ControlChannel;
pub use error::{Error, Result};
pub use header::{sanitize_header_name, HeaderBlock, HeaderLookup};
pub use memory::{Exchange, MemoryMount, MemoryResponse};
pub use mount::{DirMount, Mount, MountFile, OpenMode};
pub use opener::{web_opener, AuthInfo, Connection, Opener, WebOpener};
pub use peer::{Capabilities, Capability, CapabilityError, Peer, RemotePeer};
pub use session::WebConn;
pub use types::{HttpRequest, HttpResponse, Method};
