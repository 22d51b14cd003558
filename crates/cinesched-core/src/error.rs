//! Error taxonomy of the aggregation pipeline.

use crate::model::CinemaId;

/// Outcome of an extractor that produced no usable listings.
///
/// `Empty` is not a failure: a cinema may legitimately have nothing
/// scheduled. Only `Unavailable` marks a source as failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Network, HTTP, timeout or page-layout failure.
    #[error("{cinema} is unavailable: {reason}")]
    Unavailable {
        /// Affected cinema.
        cinema: CinemaId,
        /// Human-readable cause chain.
        reason: String,
    },
    /// The source was reachable but lists no showings.
    #[error("{cinema} lists no showings")]
    Empty {
        /// Affected cinema.
        cinema: CinemaId,
    },
}

/// Per-listing normalization failure; never fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// The showtime (or its date label) could not be resolved to an instant.
    #[error("unparsable time {raw:?}: {reason}")]
    UnparsableTime {
        /// Offending input.
        raw: String,
        /// What went wrong.
        reason: String,
    },
    /// The title is empty or contains no alphanumeric characters.
    #[error("unparsable title {raw:?}")]
    UnparsableTitle {
        /// Offending input.
        raw: String,
    },
}

impl NormalizeError {
    pub(crate) fn time(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnparsableTime {
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}
