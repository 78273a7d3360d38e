//! Link collections and guarded synchronization for sink.
//!
//! A link pairs a destination file inside a collection root with a source
//! file anywhere on disk. Links are stored in a small tab-separated table
//! next to the root (or inside `.git`/`.hg`) and synchronized in either
//! direction by [`SyncEngine`], which refuses to overwrite the more recent
//! side unless forced.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use sink_link::{Collection, SyncEngine};
//!
//! let engine = SyncEngine::new();
//! let mut collection = Collection::lookup(Path::new(".")).unwrap();
//! engine
//!     .add(&mut collection, "~/.config/app.toml", Path::new("conf/app.toml"), false)
//!     .unwrap();
//! engine.pull(&mut collection, "conf/app.toml", false).unwrap();
//! ```

mod collection;
mod copy;
mod engine;
mod error;
pub mod paths;
mod status;

pub use collection::{parse, Collection, LinkEntry, DB_FILE, DB_FILE_GIT, DB_FILE_HG};
pub use copy::{copy_atomic, write_atomic};
pub use engine::{LinkOutcome, LinkStatus, SyncEngine, SyncOutcome, UpdateReport};
pub use error::LinkError;
pub use status::{plan, ContentStatus, Direction, Plan, Refusal, TimeStatus};
