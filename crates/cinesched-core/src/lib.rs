//! Core aggregation pipeline for cinesched.
//!
//! Turns raw per-cinema listings into one canonical, deduplicated and
//! validated schedule. Everything in this crate is pure: fetching lives in
//! `cinesched-sources` and writing the artifact in `cinesched-publish`.

/// Merging of duplicate showings.
pub mod dedup;
mod error;
/// Canonical data model.
pub mod model;
/// Time, date, title and format normalization.
pub mod normalize;
/// Stage wiring from source results to a validated schedule.
pub mod pipeline;
/// Record-level and aggregate validation.
pub mod validate;

pub use error::{NormalizeError, SourceError};
pub use model::{
    CinemaId, Coverage, DayBucket, Extraction, Format, RawListing, Schedule, ShowingKey,
    ShowingRecord, SourceStatus,
};
pub use normalize::{NormalizeConfig, NormalizeContext};
pub use pipeline::{Assembled, SourceRun, assemble};
pub use validate::{
    IssueKind, Severity, SourceCheck, ValidationConfig, ValidationIssue, ValidationMode,
    ValidationReport, validate,
};
