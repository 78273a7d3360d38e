//! Filter compilation and tree snapshotting for sink.
//!
//! This crate turns glob filters into a [`Matcher`] and walks directory
//! trees with jwalk, recording every admitted non-directory entry into a
//! [`Snapshot`].
//!
//! # Example
//!
//! ```rust,no_run
//! use sink_scan::{FilterCompiler, Snapshotter, SnapshotConfig, FilterSpec};
//!
//! let matcher = FilterCompiler::new("/path/to/tree")
//!     .compile(&FilterSpec::default())
//!     .unwrap();
//! let report = Snapshotter::new()
//!     .snapshot(&SnapshotConfig::new("/path/to/tree"), &matcher)
//!     .unwrap();
//!
//! println!("{} entries", report.snapshot.len());
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,ignore
//! use sink_scan::Snapshotter;
//!
//! let snapshotter = Snapshotter::new();
//! let mut progress_rx = snapshotter.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Recorded {} files", progress.files_scanned);
//!     }
//! });
//! ```

mod filter;
mod progress;
mod scanner;
mod sets;

pub use filter::{compile, FilterCompiler, FilterError, Matcher, PatternSet, RawFilters};
pub use progress::ScanProgress;
pub use scanner::{snapshot, SnapshotReport, Snapshotter};
pub use sets::{find_ignore_file, gitignored, parse_ignore_lines, FilterSet, DEFAULT_REJECTS};

// Re-export core types for convenience
pub use sink_core::{
    FilesystemError, FilterSpec, Node, NodeType, ScanWarning, Snapshot, SnapshotConfig,
    WarningKind,
};
