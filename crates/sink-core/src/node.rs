//! Snapshot node types.

use std::cmp::Ordering;
use std::fs::Metadata;

use serde::{Deserialize, Serialize};

use crate::signature::{compare_times, epoch_seconds};

/// Type of file system node.
///
/// Serialized as an integer: Null 0, File 1, Symlink 2, Directory 3,
/// Special 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum NodeType {
    /// The entry is absent (vanished or unreadable during the walk).
    Null,
    /// Regular file.
    File,
    /// Symbolic link.
    Symlink,
    /// Directory.
    Directory,
    /// Sockets, devices, fifos.
    Special,
}

impl From<NodeType> for u8 {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Null => 0,
            NodeType::File => 1,
            NodeType::Symlink => 2,
            NodeType::Directory => 3,
            NodeType::Special => 10,
        }
    }
}

impl TryFrom<u8> for NodeType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NodeType::Null),
            1 => Ok(NodeType::File),
            2 => Ok(NodeType::Symlink),
            3 => Ok(NodeType::Directory),
            10 => Ok(NodeType::Special),
            other => Err(format!("unknown node type: {other}")),
        }
    }
}

impl NodeType {
    /// Classify a metadata record.
    pub fn of(metadata: &Metadata) -> Self {
        let file_type = metadata.file_type();
        if file_type.is_file() {
            NodeType::File
        } else if file_type.is_dir() {
            NodeType::Directory
        } else if file_type.is_symlink() {
            NodeType::Symlink
        } else {
            NodeType::Special
        }
    }
}

/// Stat-equivalent metadata recorded for a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    /// Status change time, epoch seconds.
    pub ctime: f64,
    /// Modification time, epoch seconds.
    pub mtime: f64,
}

impl NodeMeta {
    /// Capture the metadata of an entry.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            mode: metadata.mode(),
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.len(),
            ctime: metadata.ctime() as f64 + metadata.ctime_nsec() as f64 / 1e9,
            mtime: metadata.modified().map(epoch_seconds).unwrap_or(0.0),
        }
    }

    /// Capture the metadata of an entry.
    #[cfg(not(unix))]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mtime = metadata.modified().map(epoch_seconds).unwrap_or(0.0);
        Self {
            mode: if metadata.permissions().readonly() { 0o444 } else { 0o644 },
            uid: 0,
            gid: 0,
            size: metadata.len(),
            ctime: metadata.created().map(epoch_seconds).unwrap_or(mtime),
            mtime,
        }
    }

    /// Order of `self.mtime` relative to `other.mtime`.
    pub fn compare_mtime(&self, other: &NodeMeta) -> Ordering {
        compare_times(self.mtime, other.mtime)
    }
}

/// One entry of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Root-relative path, `/`-separated.
    pub path: String,

    /// Node type.
    #[serde(rename = "type")]
    pub kind: NodeType,

    /// Metadata, absent for `Null` nodes.
    pub meta: Option<NodeMeta>,

    /// Hex content signature, regular files only.
    pub sig: Option<String>,
}

impl Node {
    /// Create a node.
    pub fn new(
        path: impl Into<String>,
        kind: NodeType,
        meta: Option<NodeMeta>,
        sig: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            meta,
            sig,
        }
    }

    /// Create a node recording that the entry is absent.
    pub fn null(path: impl Into<String>) -> Self {
        Self::new(path, NodeType::Null, None, None)
    }

    /// Whether the entry was present when the walk observed it.
    pub fn exists(&self) -> bool {
        self.kind != NodeType::Null
    }

    /// Check if this node is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == NodeType::File
    }

    /// Same signature and same metadata.
    pub fn is_same(&self, other: &Node) -> bool {
        self.sig == other.sig && self.meta == other.meta
    }

    /// Order of this node's mtime relative to `other`'s.
    ///
    /// A node without metadata sorts before any node with metadata.
    pub fn compare_mtime(&self, other: &Node) -> Ordering {
        match (&self.meta, &other.meta) {
            (Some(a), Some(b)) => a.compare_mtime(b),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Number of path components, used to list shallow entries first.
    pub fn depth(&self) -> usize {
        path_depth(&self.path)
    }
}

/// Number of `/`-separated components in a relative path.
pub fn path_depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}
