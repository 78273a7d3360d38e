//! Immutable, content-addressed record of a file tree.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::node::Node;

/// A snapshot maps root-relative paths to nodes.
///
/// Built once through [`SnapshotBuilder`] and read-only afterwards. The
/// signature index is derived at construction and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SnapshotData", into = "SnapshotData")]
pub struct Snapshot {
    root: PathBuf,
    nodes: BTreeMap<String, Node>,
    by_signature: HashMap<String, Vec<String>>,
}

impl Snapshot {
    /// Start building a snapshot of `root`.
    pub fn builder(root: impl Into<PathBuf>) -> SnapshotBuilder {
        SnapshotBuilder::new(root)
    }

    /// An empty snapshot.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        SnapshotBuilder::new(root).build()
    }

    fn from_nodes(root: PathBuf, nodes: BTreeMap<String, Node>) -> Self {
        let mut by_signature: HashMap<String, Vec<String>> = HashMap::new();
        for node in nodes.values() {
            if let Some(sig) = &node.sig {
                by_signature
                    .entry(sig.clone())
                    .or_default()
                    .push(node.path.clone());
            }
        }
        Self {
            root,
            nodes,
            by_signature,
        }
    }

    /// Absolute root the snapshot was taken from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up a node by relative path.
    pub fn get(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    /// Whether a node is registered at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// Nodes in path order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Relative paths in path order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the snapshot holds no node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Paths of the nodes whose content has signature `sig`, in path order.
    pub fn paths_with_signature(&self, sig: &str) -> &[String] {
        self.by_signature
            .get(sig)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Combine two snapshots into a new one rooted at `self`'s root.
    ///
    /// Fails if both snapshots register the same relative path.
    pub fn merge(&self, other: &Snapshot) -> Result<Snapshot, SnapshotError> {
        let mut builder = SnapshotBuilder::new(self.root.clone());
        for node in self.iter().chain(other.iter()) {
            builder.insert(node.clone())?;
        }
        Ok(builder.build())
    }
}

/// Accumulates nodes during a walk.
#[derive(Debug)]
pub struct SnapshotBuilder {
    root: PathBuf,
    nodes: BTreeMap<String, Node>,
}

impl SnapshotBuilder {
    /// Create a builder for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            nodes: BTreeMap::new(),
        }
    }

    /// Register a node. Paths must be normalized and unique.
    pub fn insert(&mut self, node: Node) -> Result<(), SnapshotError> {
        if !is_normalized(&node.path) {
            return Err(SnapshotError::InvalidPath { path: node.path });
        }
        if self.nodes.contains_key(&node.path) {
            return Err(SnapshotError::DuplicatePath { path: node.path });
        }
        self.nodes.insert(node.path.clone(), node);
        Ok(())
    }

    /// Number of nodes registered so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node was registered yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Freeze into a snapshot.
    pub fn build(self) -> Snapshot {
        Snapshot::from_nodes(self.root, self.nodes)
    }
}

/// Whether `path` is relative, `/`-separated and free of `.`/`..` segments.
pub fn is_normalized(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

/// Serialized shape: `{"root": ..., "nodes": {"<path>": Node}}`.
#[derive(Serialize, Deserialize)]
struct SnapshotData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root: Option<PathBuf>,
    #[serde(default)]
    nodes: BTreeMap<String, Node>,
}

impl TryFrom<SnapshotData> for Snapshot {
    type Error = SnapshotError;

    fn try_from(data: SnapshotData) -> Result<Self, Self::Error> {
        for (key, node) in &data.nodes {
            if key != &node.path {
                return Err(SnapshotError::KeyMismatch {
                    key: key.clone(),
                    path: node.path.clone(),
                });
            }
            if !is_normalized(key) {
                return Err(SnapshotError::InvalidPath { path: key.clone() });
            }
        }
        Ok(Snapshot::from_nodes(
            data.root.unwrap_or_default(),
            data.nodes,
        ))
    }
}

impl From<Snapshot> for SnapshotData {
    fn from(snapshot: Snapshot) -> Self {
        let root = (!snapshot.root.as_os_str().is_empty()).then_some(snapshot.root);
        Self {
            root,
            nodes: snapshot.nodes,
        }
    }
}
