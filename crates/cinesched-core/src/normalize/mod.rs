//! Time/title normalizer: `RawListing` to `ShowingRecord`.

mod time;
mod title;

use chrono::{DateTime, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;
use crate::model::{CinemaId, DayBucket, Format, RawListing, ShowingRecord};

/// Default hour before which a listed time of day belongs to the next day.
const DEFAULT_LATE_NIGHT_CUTOFF_HOUR: u32 = 5;

/// Normalizer settings (`[normalize]` in `config.toml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Times of day listed with an hour below this belong to the calendar
    /// day after the listed date (a 00:15 show on "Wed" is Thursday 00:15).
    pub late_night_cutoff_hour: u32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            late_night_cutoff_hour: DEFAULT_LATE_NIGHT_CUTOFF_HOUR,
        }
    }
}

/// Per-run normalization context.
#[derive(Debug)]
pub struct NormalizeContext<'a, Tz: TimeZone> {
    /// Pipeline timezone every `startTime` is expressed in.
    pub(crate) tz: &'a Tz,
    /// Local date day buckets are computed against.
    pub(crate) reference_date: NaiveDate,
    /// See [`NormalizeConfig::late_night_cutoff_hour`].
    pub(crate) late_night_cutoff_hour: u32,
}

impl<'a, Tz: TimeZone> NormalizeContext<'a, Tz> {
    /// Creates a context for a run whose reference date is `reference_date`.
    #[must_use]
    pub fn new(tz: &'a Tz, reference_date: NaiveDate, config: &NormalizeConfig) -> Self {
        Self {
            tz,
            reference_date,
            late_night_cutoff_hour: config.late_night_cutoff_hour,
        }
    }

    /// Creates a context whose reference date is the local date of `run_at`.
    #[must_use]
    pub fn for_run(tz: &'a Tz, run_at: &DateTime<Tz>, config: &NormalizeConfig) -> Self {
        Self::new(tz, run_at.date_naive(), config)
    }

    /// Reference date of the run.
    #[must_use]
    pub const fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }
}

/// A showtime (or whole listing) excluded by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Source cinema.
    pub cinema: CinemaId,
    /// Title as scraped.
    pub title: String,
    /// Why it was excluded.
    pub error: NormalizeError,
}

/// Output of normalizing a batch of listings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Records in listing order.
    pub records: Vec<ShowingRecord>,
    /// Excluded showtimes.
    pub rejections: Vec<Rejection>,
}

/// Normalizes one listing into zero or more records.
///
/// A bad title rejects the whole listing; a bad showtime rejects only that
/// showtime.
pub fn normalize_listing<Tz: TimeZone>(
    listing: &RawListing,
    ctx: &NormalizeContext<'_, Tz>,
) -> Normalized {
    let mut out = Normalized::default();

    let clean = match title::normalize_title(&listing.title) {
        Ok(clean) => clean,
        Err(error) => {
            out.rejections.push(Rejection {
                cinema: listing.cinema,
                title: listing.title.clone(),
                error,
            });
            return out;
        }
    };

    let format = match Format::from_label(&listing.format) {
        Format::Regular => clean.format_hint.clone().unwrap_or(Format::Regular),
        other => other,
    };

    for showtime in &listing.showtimes {
        match time::resolve_start(listing.date.as_deref(), showtime, ctx) {
            Ok(start_time) => out.records.push(ShowingRecord {
                cinema_id: listing.cinema,
                film_title: clean.title.clone(),
                start_time,
                format: format.clone(),
                day: DayBucket::from_dates(ctx.reference_date, start_time.date_naive()),
                booking_url: String::from(listing.booking_url.trim()),
            }),
            Err(error) => out.rejections.push(Rejection {
                cinema: listing.cinema,
                title: listing.title.clone(),
                error,
            }),
        }
    }

    out
}

/// Normalizes every listing, logging each exclusion.
pub fn normalize_all<Tz: TimeZone>(
    listings: &[RawListing],
    ctx: &NormalizeContext<'_, Tz>,
) -> Normalized {
    let mut all = Normalized::default();

    for listing in listings {
        let Normalized {
            records,
            rejections,
        } = normalize_listing(listing, ctx);
        for rejection in &rejections {
            tracing::warn!(
                cinema = %rejection.cinema,
                title = %rejection.title,
                error = %rejection.error,
                "Showtime excluded"
            );
        }
        all.records.extend(records);
        all.rejections.extend(rejections);
    }

    tracing::debug!(
        listings = listings.len(),
        records = all.records.len(),
        rejected = all.rejections.len(),
        "Normalization completed"
    );

    all
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use chrono::{FixedOffset, Timelike};
    use tracing::subscriber::with_default;
    use tracing_mock::{expect, subscriber};

    use super::*;

    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
    }

    fn bst() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn listing(title: &str, date: Option<&str>, times: &[&str], format: &str) -> RawListing {
        RawListing {
            cinema: CinemaId::CurzonSoho,
            title: String::from(title),
            date: date.map(String::from),
            showtimes: times.iter().map(|t| String::from(*t)).collect(),
            format: String::from(format),
            booking_url: String::from(" https://example.test/book/1 "),
        }
    }

    #[test]
    fn test_normalize_listing_expands_showtimes() {
        // Arrange
        let tz = bst();
        let ctx = NormalizeContext::new(&tz, wednesday(), &NormalizeConfig::default());
        let raw = listing(
            "(12A) Dune:  Part Two",
            Some("Wed 12 Jun"),
            &["14:00", "19:30", "00:15"],
            "Standard",
        );

        // Act
        let out = normalize_listing(&raw, &ctx);

        // Assert
        assert!(out.rejections.is_empty());
        assert_eq!(out.records.len(), 3);
        assert!(out.records.iter().all(|r| r.film_title == "Dune: Part Two"));
        assert!(out.records.iter().all(|r| r.format == Format::Regular));
        assert_eq!(out.records[0].booking_url, "https://example.test/book/1");
        assert_eq!(out.records[1].day, DayBucket::Today);
        assert_eq!(out.records[2].day, DayBucket::Tomorrow);
        assert_eq!(out.records[2].start_time.hour(), 0);
    }

    #[test]
    fn test_normalize_listing_uses_title_format_tag() {
        // Arrange
        let tz = bst();
        let ctx = NormalizeContext::new(&tz, wednesday(), &NormalizeConfig::default());
        let raw = listing("Twisters (IMAX)", Some("2024-06-14"), &["20:00"], "");

        // Act
        let out = normalize_listing(&raw, &ctx);

        // Assert
        assert_eq!(out.records[0].film_title, "Twisters");
        assert_eq!(out.records[0].format, Format::Imax);
        assert_eq!(out.records[0].day, DayBucket::Friday);
    }

    #[test]
    fn test_normalize_listing_explicit_format_beats_title_tag() {
        // Arrange
        let tz = bst();
        let ctx = NormalizeContext::new(&tz, wednesday(), &NormalizeConfig::default());
        let raw = listing("Twisters (IMAX)", Some("2024-06-14"), &["20:00"], "4DX");

        // Act
        let out = normalize_listing(&raw, &ctx);

        // Assert
        assert_eq!(out.records[0].format, Format::FourDx);
    }

    #[test]
    fn test_normalize_listing_excludes_only_bad_showtime() {
        // Arrange
        let tz = bst();
        let ctx = NormalizeContext::new(&tz, wednesday(), &NormalizeConfig::default());
        let raw = listing(
            "Challengers",
            Some("2024-06-12"),
            &["18:00", "doors 25:90"],
            "Standard",
        );

        // Act
        let out = normalize_listing(&raw, &ctx);

        // Assert
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.rejections.len(), 1);
        assert!(matches!(
            out.rejections[0].error,
            NormalizeError::UnparsableTime { .. }
        ));
    }

    #[test]
    fn test_normalize_listing_bad_title_rejects_listing_once() {
        // Arrange
        let tz = bst();
        let ctx = NormalizeContext::new(&tz, wednesday(), &NormalizeConfig::default());
        let raw = listing(" [15] ", Some("2024-06-12"), &["18:00", "20:00"], "");

        // Act
        let out = normalize_listing(&raw, &ctx);

        // Assert
        assert!(out.records.is_empty());
        assert_eq!(out.rejections.len(), 1);
        assert!(matches!(
            out.rejections[0].error,
            NormalizeError::UnparsableTitle { .. }
        ));
    }

    #[test]
    fn test_normalize_all_logs_excluded_showtime() {
        // Arrange
        let tz = bst();
        let ctx = NormalizeContext::new(&tz, wednesday(), &NormalizeConfig::default());
        let listings = vec![listing(
            "Challengers",
            Some("2024-06-12"),
            &["doors 25:90"],
            "",
        )];
        let (subscriber, handle) = subscriber::mock()
            .event(expect::event().at_level(tracing::Level::WARN))
            .event(expect::event().at_level(tracing::Level::DEBUG))
            .only()
            .run_with_handle();

        // Act
        let out = with_default(subscriber, || normalize_all(&listings, &ctx));

        // Assert
        handle.assert_finished();
        assert!(out.records.is_empty());
        assert_eq!(out.rejections.len(), 1);
    }
}
