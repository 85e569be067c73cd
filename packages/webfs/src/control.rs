//! The `clone` control channel.
//!
//! Reading `clone` allocates a connection directory and returns its name.
//! Each subsequent write, issued from offset 0, announces request metadata
//! for that connection: first `url <url>`, then optionally
//! `headers <block>`. The channel keeps no state of its own between
//! allocations, so a fresh handle is opened for every connection and all
//! steps happen on that handle.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::header::HeaderBlock;
use crate::mount::{Mount, MountFile, OpenMode};

/// Name of the control file at the mount root.
pub const CLONE: &str = "clone";

pub struct ControlChannel {
    file: Box<dyn MountFile>,
    directory: Option<String>,
}

impl ControlChannel {
    /// Open a new handle on the control file for reading and writing.
    pub fn open(mount: &dyn Mount) -> Result<Self> {
        let file = mount.open(CLONE, OpenMode::ReadWrite)?;
        Ok(Self {
            file,
            directory: None,
        })
    }

    /// Allocate a connection directory and return its name.
    ///
    /// Reads a single line one byte at a time so nothing past the
    /// terminator is consumed. May only be called once per channel.
    pub fn allocate(&mut self) -> Result<String> {
        if let Some(dir) = &self.directory {
            return Err(Error::Allocation {
                message: format!("connection {} already allocated on this handle", dir),
            });
        }

        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.file.read(&mut byte)? {
                0 => break,
                _ if byte[0] == b'\n' => break,
                _ => line.push(byte[0]),
            }
        }

        let name = String::from_utf8(line).map_err(|e| Error::Allocation {
            message: format!("directory name is not UTF-8: {}", e),
        })?;
        if name.is_empty() {
            return Err(Error::Allocation {
                message: "empty directory name".to_string(),
            });
        }

        log::debug!("allocated connection {}", name);
        self.directory = Some(name.clone());
        Ok(name)
    }

    /// Name returned by `allocate`, if it has been called.
    pub fn directory(&self) -> Option<&str> {
        self.directory.as_deref()
    }

    /// Associate the allocated connection with `url`.
    pub fn announce_url(&mut self, url: &str) -> Result<()> {
        self.announce(&format!("url {}", url))
    }

    /// Send the request headers for the allocated connection.
    pub fn announce_headers(&mut self, headers: &HeaderBlock) -> Result<()> {
        self.announce(&format!("headers {}", headers))
    }

    fn announce(&mut self, message: &str) -> Result<()> {
        let dir = self.directory.as_deref().ok_or(Error::NotAllocated)?;
        log::debug!(
            "connection {}: {}",
            dir,
            message.split(' ').next().unwrap_or_default()
        );

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(message.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}
