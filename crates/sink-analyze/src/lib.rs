//! Comparison algorithms over sink snapshots.
//!
//! - **Multi-way diff** - Classify every path of N snapshots against an origin
//! - **Change tracking** - Created, copied, moved, removed and modified paths
//!   between two snapshots of one tree
//!
//! # Diff
//!
//! ```rust,ignore
//! use sink_analyze::DiffEngine;
//! use sink_scan::{snapshot, Matcher};
//!
//! let matcher = Matcher::accept_all();
//! let origin = snapshot("/srv/origin", &matcher).unwrap();
//! let copy = snapshot("/srv/copy", &matcher).unwrap();
//!
//! let report = DiffEngine::new().diff(&origin, &[&copy]);
//! for (path, statuses) in report.changed_rows() {
//!     println!("{path}: {statuses:?}");
//! }
//! ```

mod changes;
mod diff;

pub use changes::{track, ChangeSet, ChangeTracker, Relocation, TrackMethod};
pub use diff::{
    aggregate, classify, diff, path_union, DiffConfig, DiffConfigBuilder, DiffEngine, DiffReport,
};
