//! Publish failure taxonomy.

use std::io;
use std::path::PathBuf;

/// Failure to publish a schedule. The previous artifact is left in place.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The schedule has no showings; publishing it would blank the site.
    #[error("refusing to publish a schedule with no showings")]
    EmptySchedule,
    /// The schedule could not be serialized.
    #[error("failed to serialize schedule")]
    Serialize(#[from] serde_json::Error),
    /// The artifact file could not be written or swapped in.
    #[error("failed to write {}", path.display())]
    Write {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}
