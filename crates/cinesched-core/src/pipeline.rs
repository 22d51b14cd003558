//! Stage wiring: source results through normalize, merge and validate.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone};

use crate::dedup::merge_duplicates;
use crate::error::{NormalizeError, SourceError};
use crate::model::{CinemaId, Coverage, Extraction, Schedule, SourceStatus};
use crate::normalize::{NormalizeConfig, NormalizeContext, normalize_all};
use crate::validate::{
    IssueKind, SourceCheck, ValidationConfig, ValidationIssue, ValidationMode, validate,
};

/// Result of one extractor, tagged with its cinema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRun {
    /// Cinema the extractor serves.
    pub cinema: CinemaId,
    /// What the extractor returned.
    pub result: Result<Extraction, SourceError>,
}

/// A validated schedule plus everything noticed on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    /// Schedule ready to publish.
    pub schedule: Schedule,
    /// Normalizer and validator findings.
    pub issues: Vec<ValidationIssue>,
    /// Duplicates folded by the merger.
    pub merged: usize,
}

#[derive(Debug, Default)]
struct SourceTally {
    check: SourceCheck,
    partial: bool,
    rejected: usize,
}

/// Runs normalize, merge and validate over the extractor results.
///
/// `runs` must be in configured source order; that order (then listing
/// order) fixes the order of the published showings. Cinemas missing from
/// `runs` are reported `failed`.
#[must_use]
pub fn assemble<Tz: TimeZone>(
    runs: Vec<SourceRun>,
    run_at: &DateTime<Tz>,
    normalize: &NormalizeConfig,
    validation: &ValidationConfig,
) -> Assembled {
    let tz = run_at.timezone();
    let ctx = NormalizeContext::for_run(&tz, run_at, normalize);
    let reference_date = ctx.reference_date();

    let mut tallies: BTreeMap<CinemaId, SourceTally> = BTreeMap::new();
    let mut issues = Vec::new();
    let mut records = Vec::new();
    let reported: BTreeSet<CinemaId> = runs.iter().map(|r| r.cinema).collect();

    for run in runs {
        let tally = tallies.entry(run.cinema).or_default();
        match run.result {
            Ok(Extraction { listings, coverage }) => {
                if let Coverage::Partial(reason) = &coverage {
                    tracing::info!(
                        cinema = %run.cinema,
                        reason = %reason,
                        "Source coverage is partial"
                    );
                    tally.partial = true;
                }
                let normalized = normalize_all(&listings, &ctx);
                tally.rejected = normalized.rejections.len();
                issues.extend(normalized.rejections.into_iter().map(|r| {
                    let kind = match r.error {
                        NormalizeError::UnparsableTime { .. } => IssueKind::UnparsableTime,
                        NormalizeError::UnparsableTitle { .. } => IssueKind::UnparsableTitle,
                    };
                    ValidationIssue::warning(kind, Some(r.cinema), r.error.to_string())
                }));
                records.extend(normalized.records);
            }
            Err(SourceError::Empty { .. }) => {
                tracing::info!(cinema = %run.cinema, "Source lists no showings");
                tally.check.empty = true;
            }
            Err(err @ SourceError::Unavailable { .. }) => {
                tracing::warn!(cinema = %run.cinema, error = %err, "Source failed");
                tally.check.failed = true;
            }
        }
    }

    for cinema in CinemaId::ALL {
        if !reported.contains(&cinema) {
            tallies.entry(cinema).or_default().check.failed = true;
        }
    }

    let merge = merge_duplicates(records);
    let checks: BTreeMap<CinemaId, SourceCheck> =
        tallies.iter().map(|(c, t)| (*c, t.check)).collect();
    let validated = validate(
        merge.records,
        reference_date,
        &checks,
        validation,
        ValidationMode::Repair,
    );
    issues.extend(validated.issues);

    let source_status = tallies
        .iter()
        .map(|(cinema, tally)| {
            let rejected = validated.rejected.get(cinema).copied().unwrap_or(0);
            let status = if tally.check.failed {
                SourceStatus::Failed
            } else if tally.partial || tally.rejected > 0 || rejected > 0 {
                SourceStatus::Partial
            } else {
                SourceStatus::Ok
            };
            (*cinema, status)
        })
        .collect();

    Assembled {
        schedule: Schedule {
            run_at: run_at.fixed_offset(),
            reference_date,
            source_status,
            showings: validated.records,
        },
        issues,
        merged: merge.merged,
    }
}
