//! Schedule checks, issue reporting and the validation report.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{CinemaId, DayBucket, Format, ShowingRecord};

/// Validator thresholds (`[validation]` in `config.toml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Showings more than this many days after the reference date are rejected.
    pub window_days: u32,
    /// Showtimes of one film and format on one day above which a warning is raised.
    pub max_showtimes_per_film: usize,
    /// Distinct films per cinema and day above which a warning is raised.
    pub films_per_day_warn: usize,
    /// Distinct films per cinema and day above which an error is raised.
    pub films_per_day_error: usize,
    /// Total showings above which a warning is raised.
    pub max_total_showings: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            window_days: 14,
            max_showtimes_per_film: 8,
            films_per_day_warn: 20,
            films_per_day_error: 30,
            max_total_showings: 5000,
        }
    }
}

/// Issue severity. Any `Error` makes a report invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Recorded, does not invalidate the schedule.
    Warning,
    /// Invalidates the schedule.
    Error,
}

/// What an issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// `cinemaId` is not one of the five cinemas.
    UnknownCinema,
    /// `day` is not one of the eight labels.
    UnknownDay,
    /// `startTime` before the reference date or past the window.
    StartOutOfWindow,
    /// Blank `filmTitle`.
    EmptyTitle,
    /// `format` kept verbatim from the source.
    UnknownFormat,
    /// Second record with an existing key.
    DuplicateShowing,
    /// `day` disagrees with `startTime`.
    DayMismatch,
    /// No records for a cinema whose source did not fail.
    MissingCinema,
    /// Source reachable but listed nothing.
    EmptySource,
    /// Too many showtimes of one film on one day.
    TooManyShowtimes,
    /// Too many distinct films at one cinema on one day.
    TooManyFilms,
    /// Too many showings overall.
    TooManyShowings,
    /// Showtime excluded by the normalizer.
    UnparsableTime,
    /// Listing excluded by the normalizer.
    UnparsableTitle,
}

/// One recorded validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// Severity.
    pub severity: Severity,
    /// Category.
    pub kind: IssueKind,
    /// Cinema concerned, if the issue is per-cinema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cinema_id: Option<CinemaId>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    /// Creates a warning.
    #[must_use]
    pub fn warning(
        kind: IssueKind,
        cinema_id: Option<CinemaId>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            cinema_id,
            message: message.into(),
        }
    }

    /// Creates an error.
    #[must_use]
    pub fn error(kind: IssueKind, cinema_id: Option<CinemaId>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            cinema_id,
            message: message.into(),
        }
    }
}

/// What the validator knows about a source beyond its records.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SourceCheck {
    /// The source was unavailable (or disabled) this run.
    pub failed: bool,
    /// The source was reachable but listed nothing.
    pub empty: bool,
}

/// How record-level violations are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Pipeline run: violating records are dropped or repaired, so the
    /// result is consistent and the findings are warnings.
    Repair,
    /// Audit of an already-published artifact: the same findings are errors.
    Audit,
}

impl ValidationMode {
    const fn record_severity(self) -> Severity {
        match self {
            Self::Repair => Severity::Warning,
            Self::Audit => Severity::Error,
        }
    }
}

/// Output of [`validate`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Validated {
    /// Records that passed (day labels repaired).
    pub records: Vec<ShowingRecord>,
    /// Findings in discovery order.
    pub issues: Vec<ValidationIssue>,
    /// Rejected record count per cinema.
    pub rejected: BTreeMap<CinemaId, usize>,
}

impl Validated {
    fn reject(&mut self, cinema: CinemaId, issue: ValidationIssue) {
        let count = self.rejected.entry(cinema).or_default();
        *count = count.saturating_add(1);
        self.issues.push(issue);
    }
}

/// Validates a merged record set against the run's reference date.
///
/// Never fails: violating records are rejected or repaired and every finding
/// is returned as an issue.
#[must_use]
pub fn validate(
    records: Vec<ShowingRecord>,
    reference_date: NaiveDate,
    checks: &BTreeMap<CinemaId, SourceCheck>,
    config: &ValidationConfig,
    mode: ValidationMode,
) -> Validated {
    let severity = mode.record_severity();
    let issue = |kind, cinema, message: String| ValidationIssue {
        severity,
        kind,
        cinema_id: Some(cinema),
        message,
    };
    let last_date = reference_date
        .checked_add_signed(Duration::days(i64::from(config.window_days)))
        .unwrap_or(NaiveDate::MAX);

    let mut out = Validated {
        records: Vec::with_capacity(records.len()),
        ..Validated::default()
    };
    let mut seen = HashSet::with_capacity(records.len());

    for mut record in records {
        let cinema = record.cinema_id;
        let date = record.start_time.date_naive();

        if record.film_title.trim().is_empty() {
            out.reject(
                cinema,
                issue(
                    IssueKind::EmptyTitle,
                    cinema,
                    format!("showing at {} has an empty title", record.start_time),
                ),
            );
            continue;
        }
        if date < reference_date || date > last_date {
            out.reject(
                cinema,
                issue(
                    IssueKind::StartOutOfWindow,
                    cinema,
                    format!(
                        "{:?} at {} is outside {reference_date}..={last_date}",
                        record.film_title, record.start_time
                    ),
                ),
            );
            continue;
        }
        if !seen.insert(record.key()) {
            out.reject(
                cinema,
                issue(
                    IssueKind::DuplicateShowing,
                    cinema,
                    format!(
                        "duplicate {:?} at {} ({})",
                        record.film_title, record.start_time, record.format
                    ),
                ),
            );
            continue;
        }

        if !record.format.is_known() {
            out.issues.push(ValidationIssue::warning(
                IssueKind::UnknownFormat,
                Some(cinema),
                format!(
                    "{:?} has unrecognized format {:?}",
                    record.film_title,
                    record.format.as_str()
                ),
            ));
        }

        let expected_day = DayBucket::from_dates(reference_date, date);
        if record.day != expected_day {
            out.issues.push(issue(
                IssueKind::DayMismatch,
                cinema,
                format!(
                    "{:?} at {} labelled {} instead of {expected_day}",
                    record.film_title, record.start_time, record.day
                ),
            ));
            record.day = expected_day;
        }

        out.records.push(record);
    }

    check_coverage(&out.records, checks, &mut out.issues);
    check_counts(&out.records, config, &mut out.issues);

    out
}

fn check_coverage(
    records: &[ShowingRecord],
    checks: &BTreeMap<CinemaId, SourceCheck>,
    issues: &mut Vec<ValidationIssue>,
) {
    let present: BTreeSet<CinemaId> = records.iter().map(|r| r.cinema_id).collect();

    for cinema in CinemaId::ALL {
        if present.contains(&cinema) {
            continue;
        }
        let check = checks.get(&cinema).copied().unwrap_or_default();
        if check.failed {
            continue;
        }
        if check.empty {
            issues.push(ValidationIssue::warning(
                IssueKind::EmptySource,
                Some(cinema),
                format!("{} lists no showings", cinema.display_name()),
            ));
        } else {
            issues.push(ValidationIssue::error(
                IssueKind::MissingCinema,
                Some(cinema),
                format!("no valid showings for {}", cinema.display_name()),
            ));
        }
    }
}

fn check_counts(
    records: &[ShowingRecord],
    config: &ValidationConfig,
    issues: &mut Vec<ValidationIssue>,
) {
    // (cinema, local date) -> (title, format) -> showtimes
    let mut per_day: BTreeMap<(CinemaId, NaiveDate), HashMap<(&str, &Format), usize>> =
        BTreeMap::new();
    for record in records {
        let count = per_day
            .entry((record.cinema_id, record.start_time.date_naive()))
            .or_default()
            .entry((record.film_title.as_str(), &record.format))
            .or_default();
        *count = count.saturating_add(1);
    }

    for ((cinema, date), films) in &per_day {
        let mut crowded: Vec<_> = films
            .iter()
            .filter(|&(_, &n)| n > config.max_showtimes_per_film)
            .collect();
        crowded.sort();
        for ((title, format), n) in crowded {
            issues.push(ValidationIssue::warning(
                IssueKind::TooManyShowtimes,
                Some(*cinema),
                format!("{title:?} ({format}) has {n} showtimes on {date}"),
            ));
        }

        let distinct: BTreeSet<&str> = films.keys().map(|(title, _)| *title).collect();
        let n = distinct.len();
        if n > config.films_per_day_error {
            issues.push(ValidationIssue::error(
                IssueKind::TooManyFilms,
                Some(*cinema),
                format!("{n} distinct films on {date}"),
            ));
        } else if n > config.films_per_day_warn {
            issues.push(ValidationIssue::warning(
                IssueKind::TooManyFilms,
                Some(*cinema),
                format!("{n} distinct films on {date}"),
            ));
        }
    }

    if records.len() > config.max_total_showings {
        issues.push(ValidationIssue::warning(
            IssueKind::TooManyShowings,
            None,
            format!("{} showings in total", records.len()),
        ));
    }
}

/// Per-cinema statistics in a [`ValidationReport`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CinemaStats {
    /// Showings published for the cinema.
    pub total_showings: usize,
    /// Distinct film titles.
    pub distinct_films: usize,
    /// Showings per day bucket.
    pub showings_by_day: BTreeMap<DayBucket, usize>,
}

/// Issue counts in a [`ValidationReport`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// All issues.
    pub total_issues: usize,
    /// Error-severity issues.
    pub errors: usize,
    /// Warning-severity issues.
    pub warnings: usize,
    /// Showings across all cinemas.
    pub total_showings: usize,
}

/// Machine-readable validation report written beside the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// No error-severity issues.
    pub valid: bool,
    /// When the report was produced.
    pub timestamp: DateTime<FixedOffset>,
    /// Per-cinema statistics, one entry for every cinema.
    pub stats: BTreeMap<CinemaId, CinemaStats>,
    /// Findings.
    pub issues: Vec<ValidationIssue>,
    /// Counts.
    pub summary: ReportSummary,
}

impl ValidationReport {
    /// Builds a report over the final record set.
    #[must_use]
    pub fn build(
        records: &[ShowingRecord],
        issues: Vec<ValidationIssue>,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        let mut stats: BTreeMap<CinemaId, CinemaStats> = CinemaId::ALL
            .into_iter()
            .map(|c| (c, CinemaStats::default()))
            .collect();
        let mut titles: BTreeMap<CinemaId, BTreeSet<&str>> = BTreeMap::new();

        for record in records {
            let entry = stats.entry(record.cinema_id).or_default();
            entry.total_showings = entry.total_showings.saturating_add(1);
            let day = entry.showings_by_day.entry(record.day).or_default();
            *day = day.saturating_add(1);
            titles
                .entry(record.cinema_id)
                .or_default()
                .insert(record.film_title.as_str());
        }
        for (cinema, set) in titles {
            if let Some(entry) = stats.get_mut(&cinema) {
                entry.distinct_films = set.len();
            }
        }

        let errors = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        let summary = ReportSummary {
            total_issues: issues.len(),
            errors,
            warnings: issues.len().saturating_sub(errors),
            total_showings: records.len(),
        };

        Self {
            valid: errors == 0,
            timestamp,
            stats,
            issues,
            summary,
        }
    }
}
