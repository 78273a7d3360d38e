//! Core types for sink.
//!
//! This crate provides the data model shared by the snapshot, diff and
//! link crates: nodes, snapshots, statuses, content signatures and
//! configuration records.

mod config;
mod error;
mod node;
mod signature;
mod snapshot;
mod status;

pub use config::{FilterSpec, SnapshotConfig, SnapshotConfigBuilder};
pub use error::{FilesystemError, ScanWarning, SnapshotError, WarningKind};
pub use node::{path_depth, Node, NodeMeta, NodeType};
pub use signature::{compare_times, epoch_seconds, hash_file, ContentHash};
pub use snapshot::{is_normalized, Snapshot, SnapshotBuilder};
pub use status::Status;
