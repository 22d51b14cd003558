//! Canonical schedule types shared by every pipeline stage.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One of the five configured cinemas.
///
/// Declaration order is the processing order of the pipeline and the key
/// order of `sourceStatus` in the published artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CinemaId {
    /// Picturehouse Central (JSON API).
    PicturehouseCentral,
    /// Curzon Soho (HTML listings page).
    CurzonSoho,
    /// Everyman Islington (JSON API).
    EverymanIslington,
    /// BFI IMAX (XML feed).
    BfiImax,
    /// Odeon Luxe Leicester Square (HTML, one page per day).
    OdeonLeicesterSquare,
}

impl CinemaId {
    /// All cinemas in processing order.
    pub const ALL: [Self; 5] = [
        Self::PicturehouseCentral,
        Self::CurzonSoho,
        Self::EverymanIslington,
        Self::BfiImax,
        Self::OdeonLeicesterSquare,
    ];

    /// Stable identifier used in the artifact and config keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PicturehouseCentral => "picturehouse-central",
            Self::CurzonSoho => "curzon-soho",
            Self::EverymanIslington => "everyman-islington",
            Self::BfiImax => "bfi-imax",
            Self::OdeonLeicesterSquare => "odeon-leicester-square",
        }
    }

    /// Human-readable venue name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::PicturehouseCentral => "Picturehouse Central",
            Self::CurzonSoho => "Curzon Soho",
            Self::EverymanIslington => "Everyman Screen on the Green",
            Self::BfiImax => "BFI IMAX",
            Self::OdeonLeicesterSquare => "Odeon Luxe Leicester Square",
        }
    }
}

impl fmt::Display for CinemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CinemaId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown cinema id: {s}"))
    }
}

/// Screen/presentation format of a showing.
///
/// Part of a showing's identity: the same film at the same time on a
/// Regular and an IMAX screen are two showings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Format {
    /// Standard 2D digital projection.
    Regular,
    /// IMAX (any IMAX variant).
    Imax,
    /// Dolby Cinema.
    DolbyCinema,
    /// Non-IMAX 3D.
    ThreeD,
    /// 4DX motion seats.
    FourDx,
    /// ScreenX side-wall projection.
    ScreenX,
    /// Unrecognized label, kept verbatim.
    Other(String),
}

impl Format {
    /// Maps a source label (e.g. `"IMAX 3D"`, `"Standard"`, `"Screen 4"`) to a format.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        let compact: String = trimmed
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        match compact.as_str() {
            "" | "regular" | "standard" | "2d" | "digital" | "standard2d" => Self::Regular,
            "3d" | "reald3d" | "real3d" => Self::ThreeD,
            "4dx" | "4dx3d" | "4dx2d" => Self::FourDx,
            "screenx" => Self::ScreenX,
            c if c.contains("imax") => Self::Imax,
            c if c.starts_with("dolby") => Self::DolbyCinema,
            c if c
                .strip_prefix("screen")
                .is_some_and(|n| !n.is_empty() && n.chars().all(|ch| ch.is_ascii_digit())) =>
            {
                Self::Regular
            }
            _ => Self::Other(String::from(trimmed)),
        }
    }

    /// Canonical label written to the artifact.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Regular => "Regular",
            Self::Imax => "IMAX",
            Self::DolbyCinema => "Dolby Cinema",
            Self::ThreeD => "3D",
            Self::FourDx => "4DX",
            Self::ScreenX => "ScreenX",
            Self::Other(label) => label,
        }
    }

    /// Whether the format is one of the declared formats.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Format {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Format {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label))
    }
}

/// Navigation bucket derived from a showing's local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayBucket {
    /// The run's reference date (or earlier).
    Today,
    /// The day after the reference date.
    Tomorrow,
    /// Monday within the coming week.
    Monday,
    /// Tuesday within the coming week.
    Tuesday,
    /// Wednesday within the coming week.
    Wednesday,
    /// Thursday within the coming week.
    Thursday,
    /// Friday within the coming week.
    Friday,
    /// Weekends past tomorrow and anything a week or more away.
    Future,
}

impl DayBucket {
    /// All eight labels in navigation order.
    pub const ALL: [Self; 8] = [
        Self::Today,
        Self::Tomorrow,
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Future,
    ];

    /// Buckets `date` relative to `reference`.
    ///
    /// Offsets of 2..=6 days map to their weekday name when that weekday is
    /// Monday to Friday; weekends and anything further out are `Future`.
    #[must_use]
    pub fn from_dates(reference: NaiveDate, date: NaiveDate) -> Self {
        match date.signed_duration_since(reference).num_days() {
            i64::MIN..=0 => Self::Today,
            1 => Self::Tomorrow,
            2..=6 => match date.weekday() {
                Weekday::Mon => Self::Monday,
                Weekday::Tue => Self::Tuesday,
                Weekday::Wed => Self::Wednesday,
                Weekday::Thu => Self::Thursday,
                Weekday::Fri => Self::Friday,
                Weekday::Sat | Weekday::Sun => Self::Future,
            },
            _ => Self::Future,
        }
    }

    /// Label as written to the artifact.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Tomorrow => "Tomorrow",
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Future => "Future",
        }
    }
}

impl fmt::Display for DayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown day label: {s}"))
    }
}

/// Unnormalized listing as scraped from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListing {
    /// Cinema the listing was scraped from.
    pub cinema: CinemaId,
    /// Film title as scraped.
    pub title: String,
    /// Source-local date label the showtimes are listed under, if the
    /// showtimes are times of day rather than full datetimes.
    pub date: Option<String>,
    /// Showtime strings in source-local format.
    pub showtimes: Vec<String>,
    /// Screen/format label (e.g. `"IMAX"`, `"Standard"`).
    pub format: String,
    /// Booking URL (may be empty).
    pub booking_url: String,
}

/// Whether an extractor believes its listing set is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    /// All listings the source offers were retrieved.
    Complete,
    /// Some listings are known or suspected to be missing.
    Partial(String),
}

/// Successful output of one extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Listings in source order.
    pub listings: Vec<RawListing>,
    /// Coverage reported by the extractor.
    pub coverage: Coverage,
}

/// Canonical, normalized showing.
///
/// Field order is the key order in the published artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowingRecord {
    /// Cinema the showing belongs to.
    pub cinema_id: CinemaId,
    /// Normalized film title.
    pub film_title: String,
    /// Start instant, expressed in the pipeline timezone.
    pub start_time: DateTime<FixedOffset>,
    /// Screen format.
    pub format: Format,
    /// Day bucket relative to the run's reference date.
    pub day: DayBucket,
    /// Booking URL (may be empty).
    pub booking_url: String,
}

/// Identity of a showing within one schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShowingKey {
    /// Cinema.
    pub cinema: CinemaId,
    /// Normalized title.
    pub title: String,
    /// Start instant (compared as an instant, not by offset).
    pub start: DateTime<FixedOffset>,
    /// Format.
    pub format: Format,
}

impl ShowingRecord {
    /// Returns the deduplication key `(cinemaId, filmTitle, startTime, format)`.
    #[must_use]
    pub fn key(&self) -> ShowingKey {
        ShowingKey {
            cinema: self.cinema_id,
            title: self.film_title.clone(),
            start: self.start_time,
            format: self.format.clone(),
        }
    }
}

/// Per-source outcome written to `sourceStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Source fetched and every listing normalized.
    Ok,
    /// Source fetched but some data is missing or was rejected.
    Partial,
    /// Source unavailable (network, layout, timeout or disabled).
    Failed,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Partial => "partial",
            Self::Failed => "failed",
        })
    }
}

/// Validated result of one pipeline run.
///
/// Built fresh per run and never mutated once handed to the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Instant the run started, in the pipeline timezone.
    pub run_at: DateTime<FixedOffset>,
    /// Local date the day buckets are relative to.
    pub reference_date: NaiveDate,
    /// Status of every configured cinema.
    pub source_status: BTreeMap<CinemaId, SourceStatus>,
    /// Showings in insertion order.
    pub showings: Vec<ShowingRecord>,
}
