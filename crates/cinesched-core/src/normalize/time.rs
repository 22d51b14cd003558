//! Source-local date and time resolution.

use std::sync::LazyLock;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone,
};
use regex::Regex;

use super::NormalizeContext;
use crate::error::NormalizeError;

/// Days in the past beyond which a year-less date is assumed to be next year.
const YEARLESS_ROLLOVER_DAYS: i64 = 180;

/// `19:30`, `19.30`, `7.30pm`, `7:30 p.m.`, `7pm`, `25:15`.
#[allow(clippy::expect_used)]
static TIME_OF_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?:[:.](\d{2}))?\s*(a\.?m\.?|p\.?m\.?)?$")
        .expect("failed to compile time-of-day regex")
});

/// `Wed 12 Jun`, `Wednesday 12th June`, `12 June`, `Wed, 12 Jun`.
#[allow(clippy::expect_used)]
static YEARLESS_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z]+,?\s+)?(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]+)$")
        .expect("failed to compile year-less date regex")
});

/// Full-date formats tried before the year-less fallback.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d %B %Y", "%a %d %B %Y"];

/// Naive datetime formats (no offset).
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Resolves one showtime string to an instant in the pipeline timezone.
///
/// Full datetimes are taken as-is. A time of day needs `date_label`; hours
/// below the late-night cutoff and extended hours 24..=29 belong to the
/// calendar day after the label.
pub(super) fn resolve_start<Tz: TimeZone>(
    date_label: Option<&str>,
    showtime: &str,
    ctx: &NormalizeContext<'_, Tz>,
) -> Result<DateTime<FixedOffset>, NormalizeError> {
    let raw = showtime.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(ctx.tz).fixed_offset());
    }

    if let Some(naive) = parse_naive_datetime(raw) {
        return localize(naive, ctx.tz, raw);
    }

    let (hour, minute) = parse_time_of_day(raw)
        .ok_or_else(|| NormalizeError::time(raw, "unrecognized time of day"))?;

    let label = date_label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| NormalizeError::time(raw, "time of day listed without a date"))?;

    let listed_date = parse_date_label(label, ctx.reference_date)
        .ok_or_else(|| NormalizeError::time(label, "unrecognized date label"))?;

    let (date, hour) = if let Some(wrapped) = hour.checked_sub(24) {
        (next_day(listed_date, raw)?, wrapped)
    } else if hour < ctx.late_night_cutoff_hour {
        (next_day(listed_date, raw)?, hour)
    } else {
        (listed_date, hour)
    };

    let naive = date
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| NormalizeError::time(raw, "time of day out of range"))?;

    localize(naive, ctx.tz, raw)
}

fn next_day(date: NaiveDate, raw: &str) -> Result<NaiveDate, NormalizeError> {
    date.succ_opt()
        .ok_or_else(|| NormalizeError::time(raw, "date overflow"))
}

/// Attaches the pipeline timezone to a local datetime.
///
/// An ambiguous local time (clocks going back) takes the earlier instant;
/// a skipped local time (clocks going forward) is rejected.
fn localize<Tz: TimeZone>(
    naive: NaiveDateTime,
    tz: &Tz,
    raw: &str,
) -> Result<DateTime<FixedOffset>, NormalizeError> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| {
            NormalizeError::time(raw, "local time does not exist in the pipeline timezone")
        })
}

fn parse_naive_datetime(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Parses a time of day into `(hour, minute)`.
///
/// Without a meridiem the hour may run up to 29 (`25:15` is 01:15 the
/// next day). A bare number without minutes or meridiem is rejected.
pub(super) fn parse_time_of_day(raw: &str) -> Option<(u32, u32)> {
    let caps = TIME_OF_DAY_RE.captures(raw.trim())?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: Option<u32> = match caps.get(2) {
        Some(m) => Some(m.as_str().parse().ok()?),
        None => None,
    };
    let meridiem = caps
        .get(3)
        .and_then(|m| m.as_str().chars().next())
        .map(|c| c.to_ascii_lowercase());

    let minute_value = minute.unwrap_or(0);
    if minute_value > 59 {
        return None;
    }

    match meridiem {
        Some(m) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            let hour = match (m, hour) {
                ('a', 12) => 0,
                ('p', 12) | ('a', _) => hour,
                _ => hour.checked_add(12)?,
            };
            Some((hour, minute_value))
        }
        None if minute.is_none() => None,
        None => (hour <= 29).then_some((hour, minute_value)),
    }
}

/// Parses a source date label relative to the run's reference date.
pub(super) fn parse_date_label(label: &str, reference: NaiveDate) -> Option<NaiveDate> {
    let trimmed = label.trim();

    match trimmed.to_ascii_lowercase().as_str() {
        "today" => return Some(reference),
        "tomorrow" => return reference.succ_opt(),
        _ => {}
    }

    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
    {
        return Some(date);
    }

    let caps = YEARLESS_DATE_RE.captures(trimmed)?;
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month = month_from_name(caps.get(2)?.as_str())?;
    infer_year(reference, month, day)
}

/// Picks the year for a year-less date: the reference year, unless that
/// lands more than half a year in the past (December run, January listing).
fn infer_year(reference: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let candidate = NaiveDate::from_ymd_opt(reference.year(), month, day)?;
    if reference.signed_duration_since(candidate) > Duration::days(YEARLESS_ROLLOVER_DAYS) {
        NaiveDate::from_ymd_opt(reference.year().checked_add(1)?, month, day)
    } else {
        Some(candidate)
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let prefix = name.get(..3)?.to_ascii_lowercase();
    (1_u32..)
        .zip(MONTHS)
        .find_map(|(n, m)| (m == prefix).then_some(n))
}
