//! Multi-way comparison of snapshots against an origin.
//!
//! Every path seen in any snapshot gets one row. Column 0 summarizes the
//! origin's position; column `i + 1` classifies `compared[i]` against the
//! origin. Rows are ordered shallow-first, then lexicographically.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use derive_builder::Builder;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use sink_core::{path_depth, Node, Snapshot, Status};

/// Configuration for the diff engine.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct DiffConfig {
    /// Classify rows on the rayon pool once the path union reaches this size.
    #[builder(default = "4096")]
    pub parallel_threshold: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 4096,
        }
    }
}

impl DiffConfig {
    /// Create a new config builder.
    pub fn builder() -> DiffConfigBuilder {
        DiffConfigBuilder::default()
    }
}

/// Result of a diff: one status vector per path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    /// Root of the origin snapshot.
    pub origin: PathBuf,

    /// Roots of the compared snapshots, in column order.
    pub compared: Vec<PathBuf>,

    /// Status vectors keyed by path, in display order. Each vector holds
    /// the aggregate followed by one entry per compared snapshot.
    pub rows: IndexMap<String, Vec<Status>>,
}

impl DiffReport {
    /// Status vector of `path`.
    pub fn get(&self, path: &str) -> Option<&[Status]> {
        self.rows.get(path).map(Vec::as_slice)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows where at least one column differs from the origin.
    pub fn changed_rows(&self) -> impl Iterator<Item = (&str, &[Status])> {
        self.rows
            .iter()
            .filter(|(_, statuses)| statuses.iter().any(Status::is_change))
            .map(|(path, statuses)| (path.as_str(), statuses.as_slice()))
    }

    /// Whether any column of any row differs from the origin.
    pub fn has_changes(&self) -> bool {
        self.changed_rows().next().is_some()
    }

    /// Occurrences of each status over the compared columns.
    pub fn counts(&self) -> HashMap<Status, usize> {
        let mut counts = HashMap::new();
        for statuses in self.rows.values() {
            for status in statuses.iter().skip(1) {
                *counts.entry(*status).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Computes [`DiffReport`]s. Holds no state besides its configuration.
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    config: DiffConfig,
}

impl DiffEngine {
    /// Create an engine with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with custom configuration.
    pub fn with_config(config: DiffConfig) -> Self {
        Self { config }
    }

    /// Compare every snapshot of `compared` against `origin`.
    pub fn diff(&self, origin: &Snapshot, compared: &[&Snapshot]) -> DiffReport {
        let paths = path_union(origin, compared);

        let row = |path: &str| -> (String, Vec<Status>) {
            let base = present(origin, path);
            let columns: Vec<Status> = compared
                .iter()
                .map(|snapshot| classify(base, present(snapshot, path)))
                .collect();
            let mut statuses = Vec::with_capacity(columns.len() + 1);
            statuses.push(aggregate(base.is_some(), &columns));
            statuses.extend(columns);
            (path.to_string(), statuses)
        };

        let rows: IndexMap<String, Vec<Status>> = if paths.len() >= self.config.parallel_threshold {
            // `collect` on an indexed parallel iterator keeps input order.
            let rows: Vec<_> = paths.par_iter().map(|&p| row(p)).collect();
            rows.into_iter().collect()
        } else {
            paths.iter().map(|&p| row(p)).collect()
        };

        tracing::debug!(
            rows = rows.len(),
            columns = compared.len(),
            "diff computed"
        );

        DiffReport {
            origin: origin.root().to_path_buf(),
            compared: compared.iter().map(|s| s.root().to_path_buf()).collect(),
            rows,
        }
    }
}

/// Compare `compared` against `origin` with the default engine.
pub fn diff(origin: &Snapshot, compared: &[&Snapshot]) -> DiffReport {
    DiffEngine::new().diff(origin, compared)
}

/// Union of all paths, ordered by depth then lexicographically.
pub fn path_union<'a>(origin: &'a Snapshot, compared: &[&'a Snapshot]) -> Vec<&'a str> {
    let mut union: BTreeSet<&str> = origin.paths().collect();
    for snapshot in compared {
        union.extend(snapshot.paths());
    }
    let mut paths: Vec<&str> = union.into_iter().collect();
    // The set is already lexicographic; a stable sort keeps that within a depth.
    paths.sort_by_key(|p| path_depth(p));
    paths
}

/// A node counts as present only when it exists on disk.
fn present<'a>(snapshot: &'a Snapshot, path: &str) -> Option<&'a Node> {
    snapshot.get(path).filter(|node| node.exists())
}

/// Status of one compared node relative to the origin node.
pub fn classify(origin: Option<&Node>, compared: Option<&Node>) -> Status {
    match (origin, compared) {
        (Some(_), None) => Status::Removed,
        (None, Some(_)) => Status::Added,
        (None, None) => Status::Absent,
        (Some(o), Some(c)) if o.is_same(c) => Status::Same,
        (Some(o), Some(c)) => match c.compare_mtime(o) {
            Ordering::Greater => Status::Newer,
            Ordering::Less => Status::Older,
            Ordering::Equal if o.sig != c.sig => Status::Changed,
            Ordering::Equal => Status::Same,
        },
    }
}

/// Aggregate status of the origin column.
///
/// Only `Newer`, `Older` and `Changed` columns take part. When every one of
/// them says the copies are older the origin is `Newer`, and the reverse;
/// any other mix is `Changed`. With none of them the origin is `Origin`.
pub fn aggregate(origin_present: bool, statuses: &[Status]) -> Status {
    if !origin_present {
        return Status::Absent;
    }

    let mut divergent = statuses
        .iter()
        .filter(|s| matches!(s, Status::Newer | Status::Older | Status::Changed))
        .peekable();

    let Some(first) = divergent.peek().copied().copied() else {
        return Status::Origin;
    };
    if first != Status::Changed && divergent.all(|s| *s == first) {
        if first == Status::Older {
            Status::Newer
        } else {
            Status::Older
        }
    } else {
        Status::Changed
    }
}
