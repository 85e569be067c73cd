//! The file transport the bridge talks through.
//!
//! A mount exposes a `clone` control file at its root and one directory per
//! allocated connection. The bridge never touches the network itself; it only
//! opens, seeks, reads, writes and closes files below the root.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

/// An open handle on a mount file.
///
/// Handles must be unbuffered: the control channel relies on every read and
/// write reaching the transport as issued.
pub trait MountFile: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> MountFile for T {}

/// How a mount file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create or truncate, then write.
    Write,
    /// Read and write an existing file without truncating it.
    ReadWrite,
}

/// A mounted web transport.
pub trait Mount: Send + Sync {
    /// Directory under which the transport is mounted.
    fn root(&self) -> &Path;

    /// Open `path`, relative to the root and `/`-separated.
    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Box<dyn MountFile>>;
}

impl<M: Mount + ?Sized> Mount for std::sync::Arc<M> {
    fn root(&self) -> &Path {
        (**self).root()
    }

    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Box<dyn MountFile>> {
        (**self).open(path, mode)
    }
}

/// A mount backed by the host filesystem.
#[derive(Debug, Clone)]
pub struct DirMount {
    root: PathBuf,
}

impl DirMount {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if component == "." || component == ".." {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path escapes mount root: {}", path),
                ));
            }
            resolved.push(component);
        }
        Ok(resolved)
    }
}

impl Mount for DirMount {
    fn root(&self) -> &Path {
        &self.root
    }

    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Box<dyn MountFile>> {
        let file_path = self.resolve(path)?;
        log::debug!("Opening {} ({:?})...", file_path.display(), mode);

        let file = match mode {
            OpenMode::Read => File::open(&file_path),
            OpenMode::Write => File::create(&file_path),
            OpenMode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .truncate(false)
                .open(&file_path),
        }?;

        Ok(Box::new(file))
    }
}
