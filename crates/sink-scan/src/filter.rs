//! Glob filters compiled into a reusable path matcher.
//!
//! A filter has three pattern lists. `rejects` exclude matching paths
//! unless a `keeps` pattern re-admits them; `accepts`, when non-empty,
//! restricts the result to matching paths.
//!
//! Each pattern is either *exact* (starting with `/` or `./`, anchored at
//! the snapshot root) or *partial* (matching at any depth). Both forms also
//! match every path below a matching directory. `*` and `?` behave like
//! shell wildcards and may cross `/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sink_core::FilterSpec;

use crate::sets::FilterSet;

/// Errors raised while resolving or compiling filters.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A glob pattern could not be compiled.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// A named filter set does not exist.
    #[error("Unknown filter set '{name}', pick one of: git, gitignore, none")]
    UnknownSet { name: String },

    /// The version control index could not be read.
    #[cfg(feature = "git")]
    #[error("Cannot read git index from {path}: {source}")]
    Git {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    /// An ignore file could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolved, uncompiled pattern lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFilters {
    pub rejects: Vec<String>,
    pub accepts: Vec<String>,
    pub keeps: Vec<String>,
}

impl RawFilters {
    /// Whether no list holds a pattern.
    pub fn is_empty(&self) -> bool {
        self.rejects.is_empty() && self.accepts.is_empty() && self.keeps.is_empty()
    }
}

/// A compiled union of exact and partial patterns.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl PatternSet {
    /// Compile `patterns` into a single matcher.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, FilterError> {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let Some(globs) = expand_pattern(pattern) else {
                continue;
            };
            for glob in globs {
                let glob = GlobBuilder::new(&glob)
                    .literal_separator(false)
                    .backslash_escape(true)
                    .build()
                    .map_err(|source| FilterError::InvalidPattern {
                        pattern: pattern.to_string(),
                        source,
                    })?;
                builder.add(glob);
            }
            kept.push(pattern.to_string());
        }

        let set = builder.build().map_err(|source| FilterError::InvalidPattern {
            pattern: kept.join(", "),
            source,
        })?;
        Ok(Self {
            patterns: kept,
            set,
        })
    }

    /// An empty set, matching nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// Whether `path` (root-relative, `/`-separated) matches any pattern.
    pub fn is_match(&self, path: &str) -> bool {
        !self.patterns.is_empty() && self.set.is_match(path)
    }

    /// Whether the set holds no pattern.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The source patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Translate one pattern into the globs covering it and its subtree.
fn expand_pattern(pattern: &str) -> Option<Vec<String>> {
    let pattern = pattern.trim();
    let (exact, body) = if let Some(rest) = pattern.strip_prefix("./") {
        (true, rest)
    } else if let Some(rest) = pattern.strip_prefix('/') {
        (true, rest)
    } else {
        (false, pattern)
    };
    let body = body.trim_start_matches('/').trim_end_matches('/');

    if body.is_empty() {
        // A bare `/` or `./` designates the whole tree.
        return exact.then(|| vec!["**".to_string()]);
    }

    Some(if exact {
        vec![body.to_string(), format!("{body}/**")]
    } else {
        vec![
            body.to_string(),
            format!("**/{body}"),
            format!("{body}/**"),
            format!("**/{body}/**"),
        ]
    })
}

/// Compiled filter deciding whether a path takes part in a walk.
#[derive(Debug, Clone)]
pub struct Matcher {
    rejects: PatternSet,
    accepts: PatternSet,
    keeps: PatternSet,
}

impl Matcher {
    /// Compile the three pattern lists.
    pub fn compile<S: AsRef<str>>(
        rejects: &[S],
        accepts: &[S],
        keeps: &[S],
    ) -> Result<Self, FilterError> {
        Ok(Self {
            rejects: PatternSet::compile(rejects)?,
            accepts: PatternSet::compile(accepts)?,
            keeps: PatternSet::compile(keeps)?,
        })
    }

    /// Compile resolved filters.
    pub fn from_raw(raw: &RawFilters) -> Result<Self, FilterError> {
        Self::compile(&raw.rejects, &raw.accepts, &raw.keeps)
    }

    /// A matcher accepting every path.
    pub fn accept_all() -> Self {
        Self {
            rejects: PatternSet::empty(),
            accepts: PatternSet::empty(),
            keeps: PatternSet::empty(),
        }
    }

    /// Whether `path` passes the filter.
    pub fn matches(&self, path: &str) -> bool {
        if self.rejects.is_match(path) && !self.keeps.is_match(path) {
            return false;
        }
        self.accepts.is_empty() || self.accepts.is_match(path)
    }

    /// Whether a whole directory can be skipped.
    ///
    /// Only rejects prune, and only when no keep pattern could re-admit a
    /// descendant.
    pub fn prunes(&self, dir: &str) -> bool {
        self.keeps.is_empty() && self.rejects.is_match(dir)
    }

    pub fn rejects(&self) -> &PatternSet {
        &self.rejects
    }

    pub fn accepts(&self) -> &PatternSet {
        &self.accepts
    }

    pub fn keeps(&self) -> &PatternSet {
        &self.keeps
    }
}

/// Compile the three lists into a matcher.
pub fn compile<S: AsRef<str>>(
    rejects: &[S],
    accepts: &[S],
    keeps: &[S],
) -> Result<Matcher, FilterError> {
    Matcher::compile(rejects, accepts, keeps)
}

/// Resolves a [`FilterSpec`] against named sets and compiles it.
///
/// Named sets are looked up relative to `base` (ignore file search, git
/// repository discovery).
#[derive(Debug, Clone)]
pub struct FilterCompiler {
    base: PathBuf,
}

impl FilterCompiler {
    /// Create a compiler resolving sets from `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Directory named sets are resolved from.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Merge explicit lists with the named sets they reference.
    ///
    /// An empty `FilterSpec` falls back to the `gitignore` set.
    pub fn resolve(&self, spec: &FilterSpec) -> Result<RawFilters, FilterError> {
        if spec.is_unset() {
            return FilterSet::Gitignore.load(&self.base);
        }

        let mut loaded: HashMap<&str, RawFilters> = HashMap::new();
        for name in spec
            .ignore_sets
            .iter()
            .chain(&spec.accept_sets)
            .chain(&spec.keep_sets)
            .chain(&spec.filter_sets)
        {
            if !loaded.contains_key(name.as_str()) {
                let set: FilterSet = name.parse().map_err(|_| FilterError::UnknownSet {
                    name: name.clone(),
                })?;
                loaded.insert(name.as_str(), set.load(&self.base)?);
            }
        }

        let gather = |explicit: &[String], sets: &[String], pick: fn(&RawFilters) -> &[String]| {
            let mut patterns = explicit.to_vec();
            for name in sets.iter().chain(&spec.filter_sets) {
                if let Some(raw) = loaded.get(name.as_str()) {
                    patterns.extend(pick(raw).iter().cloned());
                }
            }
            patterns
        };

        Ok(RawFilters {
            rejects: gather(&spec.ignores, &spec.ignore_sets, |r| &r.rejects),
            accepts: gather(&spec.accepts, &spec.accept_sets, |r| &r.accepts),
            keeps: gather(&spec.keeps, &spec.keep_sets, |r| &r.keeps),
        })
    }

    /// Resolve and compile in one step.
    pub fn compile(&self, spec: &FilterSpec) -> Result<Matcher, FilterError> {
        let raw = self.resolve(spec)?;
        tracing::debug!(
            rejects = raw.rejects.len(),
            accepts = raw.accepts.len(),
            keeps = raw.keeps.len(),
            "compiled filters"
        );
        Matcher::from_raw(&raw)
    }
}
