//! Link states and the push/pull decision table.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Content of the destination compared to the resolved source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    /// Byte-identical.
    #[strum(serialize = "same")]
    Same,
    /// Both exist with different content.
    #[strum(serialize = "different")]
    Different,
    /// The destination exists but has no content.
    #[strum(serialize = "empty")]
    Empty,
    /// The destination does not exist.
    #[strum(serialize = "not there")]
    NotThere,
}

impl ContentStatus {
    /// One-character marker for tabular output.
    pub fn symbol(&self) -> char {
        match self {
            ContentStatus::Same => '=',
            ContentStatus::Different => '+',
            ContentStatus::Empty => '_',
            ContentStatus::NotThere => '!',
        }
    }
}

/// Modification time of the destination relative to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum TimeStatus {
    Same,
    /// The destination was modified after the source.
    Newer,
    /// The destination was modified before the source.
    Older,
}

impl TimeStatus {
    pub fn symbol(&self) -> char {
        match self {
            TimeStatus::Same => '=',
            TimeStatus::Newer => '>',
            TimeStatus::Older => '<',
        }
    }
}

/// Direction of a synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    /// Source to destination.
    Pull,
    /// Destination to source.
    Push,
}

/// What a synchronization should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Copy.
    Apply,
    /// Both sides already hold the same content.
    UpToDate,
}

/// Why a synchronization is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    /// Pulling would overwrite a destination modified after its source.
    LocalNewer,
    /// Pushing would overwrite a source modified after its destination.
    OriginNewer,
    /// The destination is missing or empty.
    NothingToPush,
}

/// Decide a synchronization from the observed link state.
pub fn plan(
    direction: Direction,
    content: ContentStatus,
    time: TimeStatus,
    force: bool,
) -> Result<Plan, Refusal> {
    match (direction, content) {
        (Direction::Pull, ContentStatus::NotThere | ContentStatus::Empty) => Ok(Plan::Apply),
        (Direction::Push, ContentStatus::NotThere | ContentStatus::Empty) => {
            Err(Refusal::NothingToPush)
        }
        (_, ContentStatus::Same) => Ok(Plan::UpToDate),
        (Direction::Pull, ContentStatus::Different) => {
            if time != TimeStatus::Newer || force {
                Ok(Plan::Apply)
            } else {
                Err(Refusal::LocalNewer)
            }
        }
        (Direction::Push, ContentStatus::Different) => {
            if time == TimeStatus::Newer || force {
                Ok(Plan::Apply)
            } else {
                Err(Refusal::OriginNewer)
            }
        }
    }
}
