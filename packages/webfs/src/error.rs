use std::io;

use crate::peer::CapabilityError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Failure opening, reading, writing or closing a mount file.
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("control channel allocation failed: {message}")]
    Allocation { message: String },

    #[error("control channel has no allocated connection")]
    NotAllocated,

    #[error("connection is closed")]
    Closed,

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

pub type Result<T> = std::result::Result<T, Error>;
