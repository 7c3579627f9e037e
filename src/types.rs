//! Public data types shared by the transports and the fetcher.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A Subversion property list (`name -> raw bytes`).
///
/// Iteration order is sorted by property name, which keeps the serialized
/// `attributes` block stable for a fixed set of properties.
pub type PropertyList = BTreeMap<String, Vec<u8>>;

/// Repository metadata returned by the server during the handshake.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryInfo {
    /// Repository UUID.
    pub uuid: String,
    /// Repository root URL.
    ///
    /// Some older servers may not provide a root URL during handshake; in that
    /// case this is an empty string.
    pub root_url: String,
    /// Server-reported repository capabilities.
    pub capabilities: Vec<String>,
}

/// Information negotiated during the initial handshake.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerInfo {
    /// Capabilities from the greeting plus those announced in `repos-info`.
    pub server_caps: Vec<String>,
    /// Repository metadata.
    pub repository: RepositoryInfo,
}

/// A file as served by a transport: contents, properties and the revision
/// that was actually read.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedFile {
    /// The revision that was actually served.
    pub rev: u64,
    /// Optional checksum string (as reported by the server).
    pub checksum: Option<String>,
    /// Regular and entry properties of the file.
    pub props: PropertyList,
    /// Full file contents.
    pub contents: Vec<u8>,
}

/// The kind of a node in the repository.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    /// No node exists at the requested path/revision.
    None,
    /// A file node.
    File,
    /// A directory node.
    Dir,
    /// An unknown kind (usually a forward-compatibility fallback).
    Unknown,
}

impl NodeKind {
    /// Maps a node kind word to a [`NodeKind`].
    ///
    /// Accepts both the `ra_svn` spelling (`dir`) and the one printed by the
    /// command-line client (`directory`).
    pub(crate) fn from_word(word: &str) -> Self {
        match word {
            "none" => Self::None,
            "file" => Self::File,
            "dir" | "directory" => Self::Dir,
            _ => Self::Unknown,
        }
    }

    /// Returns the `ra_svn` spelling of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::File => "file",
            Self::Dir => "dir",
            Self::Unknown => "unknown",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A protocol capability that may be announced during handshake.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The mandatory edit pipelining capability.
    EditPipeline,
    /// Support for depth-related parameters.
    Depth,
}

impl Capability {
    /// Returns the wire capability word used by the `ra_svn` protocol.
    pub fn as_wire_word(self) -> &'static str {
        match self {
            Self::EditPipeline => "edit-pipeline",
            Self::Depth => "depth",
        }
    }
}
