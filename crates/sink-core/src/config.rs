//! Snapshot and filter configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for taking a snapshot.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct SnapshotConfig {
    /// Root path to walk.
    pub root: PathBuf,

    /// Follow symbolic links.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Maximum depth to traverse (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Number of walker threads (0 = serial walk).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,

    /// Include hidden files (starting with .).
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub include_hidden: bool,

    /// Hash regular files. Without signatures only metadata is compared.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub compute_signatures: bool,
}

fn default_true() -> bool {
    true
}

impl SnapshotConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        Ok(())
    }
}

impl SnapshotConfig {
    /// Create a new snapshot config builder.
    pub fn builder() -> SnapshotConfigBuilder {
        SnapshotConfigBuilder::default()
    }

    /// Create a simple config for walking a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_symlinks: false,
            max_depth: None,
            threads: 0,
            include_hidden: true,
            compute_signatures: true,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Uncompiled filter request, as given on the command line.
///
/// Named sets in `filter_sets` contribute to all three lists; the other
/// `*_sets` fields contribute to one list only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Patterns rejecting paths.
    pub ignores: Vec<String>,
    /// Patterns restricting the walk to matching paths.
    pub accepts: Vec<String>,
    /// Patterns re-admitting rejected paths.
    pub keeps: Vec<String>,
    /// Named sets whose rejects are used.
    pub ignore_sets: Vec<String>,
    /// Named sets whose accepts are used.
    pub accept_sets: Vec<String>,
    /// Named sets whose keeps are used.
    pub keep_sets: Vec<String>,
    /// Named sets used for every category.
    pub filter_sets: Vec<String>,
}

impl FilterSpec {
    /// Whether nothing at all was requested.
    pub fn is_unset(&self) -> bool {
        self.ignores.is_empty()
            && self.accepts.is_empty()
            && self.keeps.is_empty()
            && self.ignore_sets.is_empty()
            && self.accept_sets.is_empty()
            && self.keep_sets.is_empty()
            && self.filter_sets.is_empty()
    }
}
