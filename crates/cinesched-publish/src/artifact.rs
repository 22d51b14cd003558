//! Artifact document shape, read-back and audit.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, TimeDelta};
use cinesched_core::validate::Validated;
use cinesched_core::{
    CinemaId, DayBucket, Format, IssueKind, Schedule, ShowingRecord, SourceCheck, SourceStatus,
    ValidationConfig, ValidationIssue, ValidationMode, validate,
};
use serde::{Deserialize, Serialize};

/// Published document, borrowing from the schedule it renders.
///
/// Key order is `generatedAt`, `sourceStatus`, `showings`; `sourceStatus`
/// keys follow the fixed cinema order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact<'a> {
    /// Generation timestamp.
    pub generated_at: DateTime<FixedOffset>,
    /// Status of every cinema.
    pub source_status: &'a BTreeMap<CinemaId, SourceStatus>,
    /// Showings in insertion order.
    pub showings: &'a [ShowingRecord],
}

impl<'a> Artifact<'a> {
    /// Renders `schedule`, stamped with its run time.
    #[must_use]
    pub fn new(schedule: &'a Schedule) -> Self {
        Self {
            generated_at: schedule.run_at,
            source_status: &schedule.source_status,
            showings: &schedule.showings,
        }
    }
}

/// Showing as read back from disk; ids and labels are not trusted yet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredShowing {
    /// Raw `cinemaId`.
    pub cinema_id: String,
    /// Raw `filmTitle`.
    pub film_title: String,
    /// Raw `startTime`; parsed during the audit.
    pub start_time: String,
    /// Parsed `format` (unknown labels become `Format::Other`).
    pub format: Format,
    /// Raw `day`.
    pub day: String,
    /// `bookingUrl`, empty when absent.
    #[serde(default)]
    pub booking_url: String,
}

/// A previously published artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedArtifact {
    /// When the artifact was generated.
    pub generated_at: DateTime<FixedOffset>,
    /// Raw `sourceStatus`.
    #[serde(default)]
    pub source_status: BTreeMap<String, SourceStatus>,
    /// Raw showings.
    #[serde(default)]
    pub showings: Vec<StoredShowing>,
}

/// Result of re-validating a loaded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audit {
    /// Showings that survived the audit.
    pub records: Vec<ShowingRecord>,
    /// Every finding; record-level findings are errors.
    pub issues: Vec<ValidationIssue>,
}

impl LoadedArtifact {
    /// Age of the artifact at `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<FixedOffset>) -> TimeDelta {
        now.signed_duration_since(self.generated_at)
    }

    /// Showing count per known cinema.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<CinemaId, usize> {
        let mut counts: BTreeMap<CinemaId, usize> =
            CinemaId::ALL.into_iter().map(|c| (c, 0)).collect();
        for showing in &self.showings {
            if let Ok(cinema) = showing.cinema_id.parse::<CinemaId>()
                && let Some(count) = counts.get_mut(&cinema)
            {
                *count = count.saturating_add(1);
            }
        }
        counts
    }

    /// Re-validates the artifact as of its own generation date.
    ///
    /// Unknown cinema ids and day labels are reported here; everything else
    /// goes through the regular validator in audit mode.
    #[must_use]
    pub fn audit(&self, config: &ValidationConfig) -> Audit {
        let reference_date = self.generated_at.date_naive();
        let mut issues = Vec::new();
        let mut records = Vec::with_capacity(self.showings.len());

        for (key, _) in self
            .source_status
            .iter()
            .filter(|(key, _)| key.parse::<CinemaId>().is_err())
        {
            issues.push(ValidationIssue::error(
                IssueKind::UnknownCinema,
                None,
                format!("sourceStatus lists unknown cinema {key:?}"),
            ));
        }

        for showing in &self.showings {
            let Ok(cinema_id) = showing.cinema_id.parse::<CinemaId>() else {
                issues.push(ValidationIssue::error(
                    IssueKind::UnknownCinema,
                    None,
                    format!(
                        "{:?} at {} has unknown cinema {:?}",
                        showing.film_title, showing.start_time, showing.cinema_id
                    ),
                ));
                continue;
            };
            let Ok(start_time) = DateTime::parse_from_rfc3339(&showing.start_time) else {
                issues.push(ValidationIssue::error(
                    IssueKind::UnparsableTime,
                    Some(cinema_id),
                    format!(
                        "{:?} has unparsable startTime {:?}",
                        showing.film_title, showing.start_time
                    ),
                ));
                continue;
            };
            let computed = DayBucket::from_dates(reference_date, start_time.date_naive());
            let day = showing.day.parse::<DayBucket>().unwrap_or_else(|_| {
                issues.push(ValidationIssue::error(
                    IssueKind::UnknownDay,
                    Some(cinema_id),
                    format!("{:?} has unknown day label {:?}", showing.film_title, showing.day),
                ));
                computed
            });
            records.push(ShowingRecord {
                cinema_id,
                film_title: showing.film_title.clone(),
                start_time,
                format: showing.format.clone(),
                day,
                booking_url: showing.booking_url.clone(),
            });
        }

        let Validated {
            records,
            issues: found,
            ..
        } = validate(
            records,
            reference_date,
            &self.source_checks(),
            config,
            ValidationMode::Audit,
        );
        issues.extend(found);

        Audit { records, issues }
    }

    /// Reconstructs what the validator knew about each source.
    ///
    /// A published `ok` source with no showings was empty; a `partial` one
    /// lost everything to rejection.
    fn source_checks(&self) -> BTreeMap<CinemaId, SourceCheck> {
        self.source_status
            .iter()
            .filter_map(|(key, status)| {
                let cinema = key.parse::<CinemaId>().ok()?;
                let check = SourceCheck {
                    failed: *status == SourceStatus::Failed,
                    empty: *status == SourceStatus::Ok,
                };
                Some((cinema, check))
            })
            .collect()
    }
}
