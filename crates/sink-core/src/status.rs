//! Per-path comparison status.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Status of a path in one column of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    /// Present in the compared tree only.
    Added,
    /// Present in the origin only.
    Removed,
    /// Compared copy modified after the origin.
    Newer,
    /// Compared copy modified before the origin.
    Older,
    /// Identical signature and metadata.
    Same,
    /// Same modification time, different content.
    Changed,
    /// Neither side has the path.
    Absent,
    /// Origin column with no change anywhere.
    Origin,
}

impl Status {
    /// Three-character marker used in tabular output.
    pub fn symbol(&self) -> &'static str {
        match self {
            Status::Added => " + ",
            Status::Removed => " - ",
            Status::Newer => " > ",
            Status::Older => " < ",
            Status::Same => " = ",
            Status::Changed => " ~ ",
            Status::Absent => " ! ",
            Status::Origin => " . ",
        }
    }

    /// Whether the status reports a difference from the origin.
    pub fn is_change(&self) -> bool {
        !matches!(self, Status::Same | Status::Origin | Status::Absent)
    }
}
