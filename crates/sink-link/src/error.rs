//! Link error types.

use std::path::PathBuf;

use thiserror::Error;

use sink_core::FilesystemError;

use crate::status::{ContentStatus, TimeStatus};

/// Errors raised by link collections and synchronization.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The resolved source of a link does not exist.
    #[error("Link source for '{destination}' not found: {origin} (resolved to {resolved})")]
    SourceNotFound {
        destination: String,
        origin: String,
        resolved: PathBuf,
    },

    /// A pull would overwrite local modifications.
    #[error("Link is newer, update has to be forced: {path} (content {content}, destination {time})")]
    LocalNewerConflict {
        path: PathBuf,
        content: ContentStatus,
        time: TimeStatus,
    },

    /// A push would overwrite a more recent source.
    #[error("Origin is newer, update has to be forced: {path} (content {content}, destination {time})")]
    OriginNewerConflict {
        path: PathBuf,
        content: ContentStatus,
        time: TimeStatus,
    },

    /// The destination is missing or empty, pushing would lose the source.
    #[error("Nothing to push, link destination is {content}: {path}")]
    NothingToPush { path: PathBuf, content: ContentStatus },

    /// The destination lies outside the collection root.
    #[error("Link destination must be a subpath of {root}: {destination}")]
    DestinationOutsideRoot { destination: PathBuf, root: PathBuf },

    /// A source or destination cannot be stored in the link table.
    #[error("Link path contains a tab or line break: {value:?}")]
    UnstorablePath { value: String },

    /// The destination is not registered.
    #[error("Link does not exist: {destination}")]
    UnknownLink { destination: String },

    /// The collection file cannot be trusted.
    #[error("Corrupt link database {path}, line {line}: {message}")]
    CorruptCollection {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// No collection file was found.
    #[error("No link database found in {start} or its parents")]
    NoCollection { start: PathBuf },

    /// A collection file already exists.
    #[error("Link database already exists: {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

impl LinkError {
    /// Whether retrying with `force` would proceed.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::LocalNewerConflict { .. } | Self::OriginNewerConflict { .. }
        )
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::CorruptCollection {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
