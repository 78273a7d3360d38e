//! JWalk-based directory snapshotter.

use std::fs::{self, Metadata};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;

use sink_core::{
    hash_file, FilesystemError, Node, NodeMeta, NodeType, ScanWarning, Snapshot, SnapshotConfig,
    WarningKind,
};

use crate::filter::Matcher;
use crate::progress::ScanProgress;

/// Result of a snapshot walk.
#[derive(Debug, Clone)]
pub struct SnapshotReport {
    /// The recorded tree.
    pub snapshot: Snapshot,
    /// Entries that could not be fully recorded.
    pub warnings: Vec<ScanWarning>,
    /// Wall time of the walk.
    pub duration: Duration,
}

/// Walks a directory tree and records it as a [`Snapshot`].
pub struct Snapshotter {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl Snapshotter {
    /// Create a new snapshotter.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Record every non-directory entry below `config.root` that `matcher`
    /// admits.
    ///
    /// Entries that vanish or cannot be read mid-walk are recorded as `Null`
    /// nodes and reported as warnings. Only an unusable root is an error.
    pub fn snapshot(
        &self,
        config: &SnapshotConfig,
        matcher: &Matcher,
    ) -> Result<SnapshotReport, FilesystemError> {
        let start = Instant::now();
        let root_path = config
            .root
            .canonicalize()
            .map_err(|e| FilesystemError::io(&config.root, e))?;

        if !root_path.is_dir() {
            return Err(FilesystemError::NotADirectory { path: root_path });
        }

        let parallelism = match config.threads {
            0 => Parallelism::Serial,
            n => Parallelism::RayonNewPool(n),
        };

        // Rejected directories are dropped before jwalk descends into them.
        let pruner = Arc::new(matcher.clone());
        let prune_root = root_path.clone();
        let walker = WalkDir::new(&root_path)
            .parallelism(parallelism)
            .skip_hidden(!config.include_hidden)
            .follow_links(config.follow_symlinks)
            .min_depth(1)
            .max_depth(config.max_depth.map(|d| d as usize).unwrap_or(usize::MAX))
            .process_read_dir(move |_depth, _path, _state, children| {
                children.retain(|entry| match entry {
                    Ok(entry) if entry.file_type().is_dir() => {
                        relative_key(&prune_root, &entry.path())
                            .is_none_or(|key| !pruner.prunes(&key))
                    }
                    _ => true,
                });
            });

        let mut builder = Snapshot::builder(&root_path);
        let mut warnings = Vec::new();
        let mut files_scanned: u64 = 0;
        let mut bytes_hashed: u64 = 0;

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    tracing::debug!(path = %path.display(), error = %err, "walk error");
                    let warning = match err.io_error() {
                        Some(io) => ScanWarning::from_io(&path, io),
                        None => ScanWarning::new(&path, err.to_string(), WarningKind::ReadError),
                    };
                    warnings.push(warning);

                    // Dangling links and vanished entries are still part of the tree.
                    // A path already recorded keeps its node.
                    if let Some(key) = relative_key(&root_path, &path) {
                        if matcher.matches(&key) {
                            let _ = builder.insert(Node::null(key));
                        }
                    }
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            let Some(key) = relative_key(&root_path, &path) else {
                continue;
            };
            if !matcher.matches(&key) {
                continue;
            }

            let node = match record(&path, &key, config) {
                Ok((node, hashed)) => {
                    bytes_hashed += hashed;
                    node
                }
                Err(warning) => {
                    tracing::debug!(path = %path.display(), "{}", warning.message);
                    warnings.push(warning);
                    Node::null(key.as_str())
                }
            };

            if let Err(err) = builder.insert(node) {
                warnings.push(ScanWarning::new(&path, err.to_string(), WarningKind::ReadError));
                continue;
            }

            files_scanned += 1;
            if files_scanned % 1000 == 0 {
                let _ = self.progress_tx.send(ScanProgress {
                    files_scanned,
                    bytes_hashed,
                    current_path: path.clone(),
                    warnings_count: warnings.len() as u64,
                    elapsed: start.elapsed(),
                });
            }
        }

        let snapshot = builder.build();
        let duration = start.elapsed();
        tracing::info!(
            root = %root_path.display(),
            entries = snapshot.len(),
            warnings = warnings.len(),
            elapsed_ms = duration.as_millis() as u64,
            "snapshot taken"
        );

        Ok(SnapshotReport {
            snapshot,
            warnings,
            duration,
        })
    }
}

impl Default for Snapshotter {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot `root` with default settings.
pub fn snapshot(root: impl Into<PathBuf>, matcher: &Matcher) -> Result<Snapshot, FilesystemError> {
    let config = SnapshotConfig::new(root);
    Snapshotter::new()
        .snapshot(&config, matcher)
        .map(|report| report.snapshot)
}

/// Stat and hash one entry. Returns the node and the number of bytes hashed.
fn record(path: &Path, key: &str, config: &SnapshotConfig) -> Result<(Node, u64), ScanWarning> {
    let metadata = read_metadata(path, config.follow_symlinks)
        .map_err(|e| ScanWarning::from_io(path, &e))?;
    let kind = NodeType::of(&metadata);
    let meta = NodeMeta::from_metadata(&metadata);

    if kind == NodeType::File && config.compute_signatures {
        let sig = hash_file(path).map_err(|e| ScanWarning::from_io(path, &e))?;
        return Ok((Node::new(key, kind, Some(meta), Some(sig.to_hex())), meta.size));
    }

    Ok((Node::new(key, kind, Some(meta), None), 0))
}

fn read_metadata(path: &Path, follow_symlinks: bool) -> std::io::Result<Metadata> {
    if follow_symlinks {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
}

/// Root-relative, `/`-joined key of `path`.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}
