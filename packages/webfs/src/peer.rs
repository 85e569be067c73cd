//! Repository peers and their advertised capabilities.
//!
//! Capabilities travel as whitespace-separated tokens: a bare `name` for a
//! boolean capability and `name=value` for a string-valued one. Inside the
//! crate they are a map from name to [`Capability`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::client::HttpClient;
use crate::error::Result;
use crate::opener::Opener;

/// A single advertised capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Boolean,
    StringValued(String),
}

impl Capability {
    /// The value of a string-valued capability.
    pub fn value(&self) -> Option<&str> {
        match self {
            Capability::Boolean => None,
            Capability::StringValued(value) => Some(value),
        }
    }
}

/// Stands in for a `name=value` query that matches an advertised token.
static ADVERTISED: Capability = Capability::Boolean;

/// Capabilities keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    entries: BTreeMap<String, Capability>,
    tokens: BTreeSet<String>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse capability tokens.
    ///
    /// A bare `name` wins over any `name=value` token. Among several
    /// `name=value` tokens the first one wins.
    pub fn from_tokens<'a, I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut entries = BTreeMap::new();
        let mut raw = BTreeSet::new();
        for token in tokens {
            raw.insert(token.to_string());
            match token.split_once('=') {
                Some((name, value)) => {
                    entries
                        .entry(name.to_string())
                        .or_insert_with(|| Capability::StringValued(value.to_string()));
                }
                None => {
                    entries.insert(token.to_string(), Capability::Boolean);
                }
            }
        }
        Self {
            entries,
            tokens: raw,
        }
    }

    /// Parse a whitespace-separated capability line.
    pub fn parse(text: &str) -> Self {
        Self::from_tokens(text.split_whitespace())
    }

    pub fn with_boolean(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.tokens.insert(name.clone());
        self.entries.insert(name, Capability::Boolean);
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value) = (name.into(), value.into());
        self.tokens.insert(format!("{}={}", name, value));
        self.entries.insert(name, Capability::StringValued(value));
        self
    }

    /// Look up `name`. A whole advertised token such as `x=v` also matches,
    /// as a boolean.
    pub fn get(&self, name: &str) -> Option<&Capability> {
        match self.entries.get(name) {
            Some(capability) => Some(capability),
            None if self.tokens.contains(name) => Some(&ADVERTISED),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render back to the token format, sorted by name.
    pub fn to_tokens(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(name, capability)| match capability {
                Capability::Boolean => name.clone(),
                Capability::StringValued(value) => format!("{}={}", name, value),
            })
            .collect()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_tokens().join(" "))
    }
}

/// A required capability is missing from the remote repository.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot {purpose}; remote repository does not support the '{name}' capability")]
pub struct CapabilityError {
    pub name: String,
    pub purpose: String,
}

/// A repository that can be talked to, local or remote.
pub trait Peer {
    /// Base URL of the repository.
    fn url(&self) -> &str;

    fn capabilities(&self) -> &Capabilities;

    /// The named capability, or `None` if it is not supported.
    fn capable(&self, name: &str) -> Option<&Capability> {
        self.capabilities().get(name)
    }

    /// Whether `name` is supported. A string-valued capability with an
    /// empty value counts as unsupported.
    fn is_capable(&self, name: &str) -> bool {
        match self.capable(name) {
            Some(Capability::Boolean) => true,
            Some(Capability::StringValued(value)) => !value.is_empty(),
            None => false,
        }
    }

    /// Fail unless the named capability is supported. `purpose` describes
    /// what the caller was trying to do.
    fn requirecap(&self, name: &str, purpose: &str) -> std::result::Result<(), CapabilityError> {
        if self.is_capable(name) {
            Ok(())
        } else {
            Err(CapabilityError {
                name: name.to_string(),
                purpose: purpose.to_string(),
            })
        }
    }

    fn local(&self) -> bool {
        false
    }

    fn cancopy(&self) -> bool {
        self.local()
    }

    /// Join `path` onto the base URL with exactly one separating slash.
    fn rjoin(&self, path: &str) -> String {
        let url = self.url();
        if url.ends_with('/') {
            format!("{}{}", url, path)
        } else {
            format!("{}/{}", url, path)
        }
    }
}

/// A remote repository reached over HTTP.
#[derive(Debug, Clone)]
pub struct RemotePeer {
    url: String,
    capabilities: Capabilities,
}

impl RemotePeer {
    pub fn new(url: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            url: url.into(),
            capabilities,
        }
    }

    /// Discover the capabilities of the repository at `url`.
    pub fn connect<O: Opener>(client: &HttpClient<O>, url: &str) -> Result<Self> {
        let response = client.get(&format!("{}?cmd=capabilities", url))?;
        let capabilities = Capabilities::parse(&response.text());
        log::debug!("{} advertises {} capabilities", url, capabilities.len());
        Ok(Self::new(url, capabilities))
    }
}

impl Peer for RemotePeer {
    fn url(&self) -> &str {
        &self.url
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
}
