//! One scheduled run: extract, assemble, publish.
#![allow(clippy::future_not_send)]

use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone};
use cinesched_core::{
    NormalizeConfig, Severity, ValidationConfig, ValidationIssue, ValidationReport, assemble,
};
use cinesched_publish::{ArtifactStore, PublishError, PublishReceipt};
use cinesched_sources::{LocalExtractor, extract_all};
use tracing::instrument;

use crate::config::AppConfig;

/// Per-run settings taken from the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Upper bound on one source's fetch.
    pub source_timeout: Duration,
    /// Normalizer settings.
    pub normalize: NormalizeConfig,
    /// Validator thresholds.
    pub validation: ValidationConfig,
}

impl RunSettings {
    /// Extracts run settings from `config`.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            source_timeout: config.source_timeout(),
            normalize: config.normalize.clone(),
            validation: config.validation.clone(),
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// A new artifact replaced the old one.
    Published(PublishReceipt),
    /// Nothing was published; the previous artifact (if any) stays live.
    Retained {
        /// Why publishing did not happen.
        reason: PublishError,
        /// `generatedAt` of the artifact still being served.
        previous: Option<DateTime<FixedOffset>>,
    },
    /// Dry run: assembled and validated, not written.
    DryRun {
        /// Showings that would have been published.
        showings: usize,
        /// Report that would have been written.
        report: ValidationReport,
    },
}

/// Runs the pipeline once as of `run_at`.
///
/// Source failures never abort the run. Only an empty result or a write
/// failure keeps the previous artifact in place.
#[instrument(skip_all, fields(sources = extractors.len(), dry_run = dry_run))]
pub async fn run_pipeline<E, Tz>(
    extractors: &[E],
    run_at: &DateTime<Tz>,
    settings: &RunSettings,
    store: &ArtifactStore,
    dry_run: bool,
) -> RunOutcome
where
    E: LocalExtractor + Sync,
    Tz: TimeZone,
{
    let now = run_at.fixed_offset();
    let previous = match store.load_current() {
        Ok(Some(artifact)) => {
            tracing::info!(
                generated_at = %artifact.generated_at,
                age_minutes = artifact.age(now).num_minutes(),
                showings = artifact.showings.len(),
                "Current artifact"
            );
            Some(artifact.generated_at)
        }
        Ok(None) => {
            tracing::info!(path = %store.path().display(), "No artifact published yet");
            None
        }
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "Failed to read current artifact");
            None
        }
    };

    let runs = extract_all(extractors, run_at.date_naive(), settings.source_timeout).await;
    let assembled = assemble(runs, run_at, &settings.normalize, &settings.validation);
    log_issues(&assembled.issues);

    let schedule = assembled.schedule;
    let report = ValidationReport::build(&schedule.showings, assembled.issues, schedule.run_at);
    tracing::info!(
        showings = schedule.showings.len(),
        merged = assembled.merged,
        errors = report.summary.errors,
        warnings = report.summary.warnings,
        "Schedule assembled"
    );

    if dry_run {
        return RunOutcome::DryRun {
            showings: schedule.showings.len(),
            report,
        };
    }

    match store.publish(&schedule, &report) {
        Ok(receipt) => RunOutcome::Published(receipt),
        Err(reason) => {
            tracing::error!(error = %reason, "Publish failed; previous artifact kept");
            RunOutcome::Retained { reason, previous }
        }
    }
}

/// Logs each issue at its severity.
pub fn log_issues(issues: &[ValidationIssue]) {
    for issue in issues {
        let cinema = issue.cinema_id.map_or("-", |c| c.as_str());
        match issue.severity {
            Severity::Warning => {
                tracing::warn!(cinema, kind = ?issue.kind, "{}", issue.message);
            }
            Severity::Error => {
                tracing::error!(cinema, kind = ?issue.kind, "{}", issue.message);
            }
        }
    }
}
