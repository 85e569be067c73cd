//! Request header blocks and response header lookup.
//!
//! Response headers live as one file per header inside a connection
//! directory. File names are the header name lowercased with everything
//! outside `a`-`z` removed, so `Content-Type`, `content_type` and
//! `contenttype` all name the same file.

use std::fmt;
use std::io::Read;

use crate::mount::{Mount, OpenMode};

/// Map a header name to the file that holds its value.
pub fn sanitize_header_name(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase())
        .collect()
}

/// Result of looking up a response header.
///
/// Every failure to read the header file is reported as `Absent`: a missing
/// file and an unreadable one are indistinguishable to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLookup {
    Found(String),
    Absent,
}

impl HeaderLookup {
    pub fn is_found(&self) -> bool {
        matches!(self, HeaderLookup::Found(_))
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            HeaderLookup::Found(value) => Some(value),
            HeaderLookup::Absent => None,
        }
    }

    pub fn into_option(self) -> Option<String> {
        match self {
            HeaderLookup::Found(value) => Some(value),
            HeaderLookup::Absent => None,
        }
    }
}

impl From<Option<String>> for HeaderLookup {
    fn from(value: Option<String>) -> Self {
        value.map_or(HeaderLookup::Absent, HeaderLookup::Found)
    }
}

/// Read the header `key` from connection directory `dir`.
pub(crate) fn lookup(mount: &dyn Mount, dir: &str, key: &str) -> HeaderLookup {
    let name = sanitize_header_name(key);
    if name.is_empty() {
        return HeaderLookup::Absent;
    }

    let path = format!("{}/{}", dir, name);
    let result = mount.open(&path, OpenMode::Read).and_then(|mut file| {
        let mut value = String::new();
        file.read_to_string(&mut value)?;
        Ok(value)
    });

    match result {
        Ok(value) => HeaderLookup::Found(value),
        Err(e) => {
            log::trace!("header {} unavailable in {}: {}", key, dir, e);
            HeaderLookup::Absent
        }
    }
}

/// Request headers serialized for the control channel.
///
/// Each pair is written as `name: value\r\n`, in the order given, with
/// repeated names kept as separate lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    text: String,
}

impl HeaderBlock {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut text = String::new();
        for (name, value) in pairs {
            text.push_str(name);
            text.push_str(": ");
            text.push_str(value);
            text.push_str("\r\n");
        }
        Self { text }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for HeaderBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
