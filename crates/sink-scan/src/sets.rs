//! Named filter sets: `gitignore`, `git` and `none`.

use std::fs;
use std::path::{Path, PathBuf};

use strum::{Display, EnumString};

use crate::filter::{FilterError, RawFilters};

/// Rejects that every ignore-file based set carries.
pub const DEFAULT_REJECTS: &[&str] = &[".git", ".svn", ".hg", ".cache", "*.swp", "*.pyc"];

/// Name of the ignore file looked up by the `gitignore` set.
pub const IGNORE_FILE: &str = ".gitignore";

/// A predefined source of filter patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum FilterSet {
    /// Nothing.
    None,
    /// Paths tracked in the git index, as exact accepts.
    Git,
    /// The nearest ignore file plus [`DEFAULT_REJECTS`].
    Gitignore,
}

impl FilterSet {
    /// Produce the raw patterns of this set for a tree at `base`.
    pub fn load(self, base: &Path) -> Result<RawFilters, FilterError> {
        match self {
            FilterSet::None => Ok(RawFilters::default()),
            FilterSet::Gitignore => gitignored(base),
            FilterSet::Git => git_tracked(base),
        }
    }
}

/// Locate the nearest ignore file at or above `base`.
///
/// The search stops after the home directory, so a stray ignore file above
/// it is never picked up.
pub fn find_ignore_file(base: &Path) -> Option<PathBuf> {
    let home = dirs::home_dir();
    let start = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());

    for dir in start.ancestors() {
        let candidate = dir.join(IGNORE_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if home.as_deref() == Some(dir) {
            break;
        }
    }
    None
}

/// Build the `gitignore` set for a tree at `base`.
pub fn gitignored(base: &Path) -> Result<RawFilters, FilterError> {
    let mut raw = RawFilters {
        rejects: DEFAULT_REJECTS.iter().map(|p| p.to_string()).collect(),
        ..Default::default()
    };

    let Some(path) = find_ignore_file(base) else {
        return Ok(raw);
    };
    tracing::debug!(path = %path.display(), "reading ignore file");

    let text = fs::read_to_string(&path).map_err(|source| FilterError::Io {
        path: path.clone(),
        source,
    })?;
    let parsed = parse_ignore_lines(&text);
    raw.rejects.extend(parsed.rejects);
    raw.keeps.extend(parsed.keeps);
    Ok(raw)
}

/// Split ignore file text into rejects and keeps.
///
/// Blank lines and `#` comments are skipped, `!` lines re-admit, and one
/// trailing `/` is dropped.
pub fn parse_ignore_lines(text: &str) -> RawFilters {
    let mut raw = RawFilters::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (negated, pattern) = match line.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, line),
        };
        let pattern = pattern.strip_suffix('/').unwrap_or(pattern);
        if pattern.is_empty() {
            continue;
        }
        if negated {
            raw.keeps.push(pattern.to_string());
        } else {
            raw.rejects.push(pattern.to_string());
        }
    }
    raw
}

/// Build the `git` set: every indexed path below `base`, as exact accepts.
#[cfg(feature = "git")]
fn git_tracked(base: &Path) -> Result<RawFilters, FilterError> {
    let git_err = |source| FilterError::Git {
        path: base.to_path_buf(),
        source,
    };

    let repo = git2::Repository::discover(base).map_err(git_err)?;
    let index = repo.index().map_err(git_err)?;

    // Index paths are relative to the work tree; filters are relative to `base`.
    let prefix = match repo.workdir() {
        Some(workdir) => {
            let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());
            let base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
            base.strip_prefix(&workdir)
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default()
        }
        None => String::new(),
    };

    let mut accepts = Vec::with_capacity(index.len());
    for entry in index.iter() {
        let path = String::from_utf8_lossy(&entry.path);
        let relative = if prefix.is_empty() {
            Some(path.as_ref())
        } else {
            path.strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
        };
        if let Some(relative) = relative {
            accepts.push(format!("/{}", globset::escape(relative)));
        }
    }
    tracing::debug!(tracked = accepts.len(), "loaded git index");

    Ok(RawFilters {
        accepts,
        ..Default::default()
    })
}

#[cfg(not(feature = "git"))]
fn git_tracked(base: &Path) -> Result<RawFilters, FilterError> {
    tracing::warn!(base = %base.display(), "git support not compiled in, 'git' set is empty");
    Ok(RawFilters::default())
}
