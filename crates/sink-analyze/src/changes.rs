//! Change tracking between two snapshots of the same tree.
//!
//! Where [`crate::DiffEngine`] compares parallel trees, the tracker
//! compares one tree at two points in time and also detects content that
//! was copied or moved to a new path.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use sink_core::{compare_times, Node, Snapshot};

/// How paths present in both snapshots are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TrackMethod {
    /// Content signatures.
    #[default]
    Content,
    /// Modification times.
    Time,
}

/// A new path whose content already existed elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    /// Path in the current snapshot.
    pub path: String,
    /// Path the content came from in the previous snapshot.
    pub from: String,
}

/// Classification of every path of two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// New paths with new content.
    pub created: Vec<String>,
    /// New paths whose content is still present at its previous path.
    pub copied: Vec<Relocation>,
    /// New paths whose content only existed at now removed paths.
    pub moved: Vec<Relocation>,
    /// Paths gone from the current snapshot and not moved.
    pub removed: Vec<String>,
    /// Paths present in both snapshots that changed.
    pub modified: Vec<String>,
    /// Paths present in both snapshots that did not change.
    pub unmodified: Vec<String>,
}

impl ChangeSet {
    /// Whether anything but unmodified paths was found.
    pub fn has_changes(&self) -> bool {
        !(self.created.is_empty()
            && self.copied.is_empty()
            && self.moved.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty())
    }

    /// Number of classified paths, moved origins excluded.
    pub fn len(&self) -> usize {
        self.created.len()
            + self.copied.len()
            + self.moved.len()
            + self.removed.len()
            + self.modified.len()
            + self.unmodified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Detects changes between two snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeTracker {
    method: TrackMethod,
}

impl ChangeTracker {
    /// Create a tracker using `method` for paths present on both sides.
    pub fn new(method: TrackMethod) -> Self {
        Self { method }
    }

    /// Classify the paths of `previous` and `current`.
    pub fn track(&self, previous: &Snapshot, current: &Snapshot) -> ChangeSet {
        let mut changes = ChangeSet::default();

        let before: BTreeSet<&str> = present_paths(previous).collect();
        let after: BTreeSet<&str> = present_paths(current).collect();
        let mut removed: BTreeSet<&str> = before.difference(&after).copied().collect();

        for path in after.difference(&before) {
            let Some(node) = current.get(path) else {
                continue;
            };
            let Some(sig) = node.sig.as_deref() else {
                changes.created.push(path.to_string());
                continue;
            };
            let sources = previous.paths_with_signature(sig);

            if let Some(from) = sources.iter().find(|p| after.contains(p.as_str())) {
                changes.copied.push(Relocation {
                    path: path.to_string(),
                    from: from.clone(),
                });
            } else if let Some(from) = sources.iter().find(|p| removed.contains(p.as_str())) {
                removed.remove(from.as_str());
                changes.moved.push(Relocation {
                    path: path.to_string(),
                    from: from.clone(),
                });
            } else {
                changes.created.push(path.to_string());
            }
        }

        changes.removed = removed.into_iter().map(str::to_string).collect();

        for path in before.intersection(&after) {
            let (Some(old), Some(new)) = (previous.get(path), current.get(path)) else {
                continue;
            };
            if self.differs(old, new) {
                changes.modified.push(path.to_string());
            } else {
                changes.unmodified.push(path.to_string());
            }
        }

        tracing::debug!(
            created = changes.created.len(),
            copied = changes.copied.len(),
            moved = changes.moved.len(),
            removed = changes.removed.len(),
            modified = changes.modified.len(),
            "changes tracked"
        );
        changes
    }

    fn differs(&self, old: &Node, new: &Node) -> bool {
        match self.method {
            TrackMethod::Content => old.sig != new.sig || old.kind != new.kind,
            TrackMethod::Time => match (&old.meta, &new.meta) {
                (Some(a), Some(b)) => compare_times(a.mtime, b.mtime).is_ne(),
                (a, b) => a.is_some() != b.is_some(),
            },
        }
    }
}

/// Compare `previous` and `current` with `method`.
pub fn track(previous: &Snapshot, current: &Snapshot, method: TrackMethod) -> ChangeSet {
    ChangeTracker::new(method).track(previous, current)
}

fn present_paths(snapshot: &Snapshot) -> impl Iterator<Item = &str> {
    snapshot.iter().filter(|n| n.exists()).map(|n| n.path.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sink_core::{NodeMeta, NodeType};

    fn file(path: &str, sig: &str, mtime: f64) -> Node {
        Node::new(
            path,
            NodeType::File,
            Some(NodeMeta {
                mode: 0o100644,
                uid: 0,
                gid: 0,
                size: 1,
                ctime: 0.0,
                mtime,
            }),
            Some(sig.to_string()),
        )
    }

    fn snapshot(nodes: Vec<Node>) -> Snapshot {
        let mut builder = Snapshot::builder("/t");
        for node in nodes {
            builder.insert(node).unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_modified_by_content_and_time() {
        let previous = snapshot(vec![file("a", "h1", 1.0), file("b", "h2", 1.0)]);
        let current = snapshot(vec![file("a", "h1", 5.0), file("b", "h3", 1.0)]);

        let by_content = track(&previous, &current, TrackMethod::Content);
        assert_eq!(by_content.modified, vec!["b"]);
        assert_eq!(by_content.unmodified, vec!["a"]);

        let by_time = track(&previous, &current, TrackMethod::Time);
        assert_eq!(by_time.modified, vec!["a"]);
        assert_eq!(by_time.unmodified, vec!["b"]);
    }

    #[test]
    fn test_null_nodes_count_as_absent() {
        let previous = snapshot(vec![file("a", "h1", 1.0)]);
        let current = snapshot(vec![Node::null("a")]);

        let changes = track(&previous, &current, TrackMethod::Content);
        assert_eq!(changes.removed, vec!["a"]);
        assert!(changes.unmodified.is_empty());
    }

    #[test]
    fn test_method_parses() {
        assert_eq!("time".parse::<TrackMethod>().unwrap(), TrackMethod::Time);
        assert_eq!(TrackMethod::default(), TrackMethod::Content);
    }
}
