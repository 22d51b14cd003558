//! `Extractor` trait and the production dispatch enum.
#![allow(clippy::future_not_send)]

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use cinesched_core::{CinemaId, Coverage, Extraction, RawListing, SourceError};
use url::Url;

use crate::client::SourceClient;
use crate::sources::{
    BfiImaxExtractor, CurzonExtractor, EverymanExtractor, OdeonExtractor, PicturehouseExtractor,
};

/// Default number of days fetched by day-paged sources.
pub const DEFAULT_DAYS_AHEAD: u32 = 7;

/// One cinema's listing source.
///
/// Abstracts fetching for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[trait_variant::make(Extractor: Send)]
pub trait LocalExtractor {
    /// Cinema served by this extractor.
    fn cinema(&self) -> CinemaId;

    /// Fetches and parses the current listings.
    ///
    /// `today` is the local date of the run; day-paged sources start there.
    /// `budget` is how long the runner waits for this source. Sources making
    /// several requests stop issuing them once it is spent and report what
    /// they have as partial coverage.
    ///
    /// # Errors
    ///
    /// - `SourceError::Unavailable` on network, HTTP or layout failure.
    /// - `SourceError::Empty` when the source lists nothing.
    async fn fetch(&self, today: NaiveDate, budget: Duration) -> Result<Extraction, SourceError>;
}

/// Settings needed to build one extractor.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Listing endpoint or page.
    pub url: Url,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Minimum interval between requests to this source.
    pub min_interval: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Days fetched by day-paged sources.
    pub days_ahead: u32,
}

/// Production extractor for any of the five cinemas.
#[derive(Debug)]
pub enum SourceExtractor {
    /// Picturehouse Central.
    Picturehouse(PicturehouseExtractor),
    /// Curzon Soho.
    Curzon(CurzonExtractor),
    /// Everyman Islington.
    Everyman(EverymanExtractor),
    /// BFI IMAX.
    BfiImax(BfiImaxExtractor),
    /// Odeon Leicester Square.
    Odeon(OdeonExtractor),
}

impl LocalExtractor for SourceExtractor {
    fn cinema(&self) -> CinemaId {
        match self {
            Self::Picturehouse(e) => e.cinema(),
            Self::Curzon(e) => e.cinema(),
            Self::Everyman(e) => e.cinema(),
            Self::BfiImax(e) => e.cinema(),
            Self::Odeon(e) => e.cinema(),
        }
    }

    async fn fetch(&self, today: NaiveDate, budget: Duration) -> Result<Extraction, SourceError> {
        match self {
            Self::Picturehouse(e) => e.fetch(today, budget).await,
            Self::Curzon(e) => e.fetch(today, budget).await,
            Self::Everyman(e) => e.fetch(today, budget).await,
            Self::BfiImax(e) => e.fetch(today, budget).await,
            Self::Odeon(e) => e.fetch(today, budget).await,
        }
    }
}

/// Builds the extractor for `cinema`.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_extractor(cinema: CinemaId, settings: &SourceSettings) -> Result<SourceExtractor> {
    let client = SourceClient::builder()
        .user_agent(settings.user_agent.clone())
        .min_interval(settings.min_interval)
        .request_timeout(settings.request_timeout)
        .build()
        .with_context(|| format!("failed to build HTTP client for {cinema}"))?;
    let url = settings.url.clone();

    Ok(match cinema {
        CinemaId::PicturehouseCentral => {
            SourceExtractor::Picturehouse(PicturehouseExtractor::new(client, url))
        }
        CinemaId::CurzonSoho => SourceExtractor::Curzon(CurzonExtractor::new(client, url)),
        CinemaId::EverymanIslington => {
            SourceExtractor::Everyman(EverymanExtractor::new(client, url))
        }
        CinemaId::BfiImax => SourceExtractor::BfiImax(BfiImaxExtractor::new(client, url)),
        CinemaId::OdeonLeicesterSquare => {
            SourceExtractor::Odeon(OdeonExtractor::new(client, url, settings.days_ahead))
        }
    })
}

/// Listing URL used when the configuration does not override it.
#[must_use]
pub const fn default_url(cinema: CinemaId) -> &'static str {
    match cinema {
        CinemaId::PicturehouseCentral => {
            "https://www.picturehouses.com/api/scheduled-movies-ajax?cinema_id=022"
        }
        CinemaId::CurzonSoho => "https://www.curzon.com/venues/soho/",
        CinemaId::EverymanIslington => {
            "https://www.everymancinema.com/api/venues/screen-on-the-green/showtimes"
        }
        CinemaId::BfiImax => "https://whatson.bfi.org.uk/imax/feeds/schedule.xml",
        CinemaId::OdeonLeicesterSquare => {
            "https://www.odeon.co.uk/cinemas/london-leicester-square/"
        }
    }
}

/// Maps a fetch or parse failure to `SourceError::Unavailable`.
pub(crate) fn unavailable(cinema: CinemaId, err: &anyhow::Error) -> SourceError {
    SourceError::Unavailable {
        cinema,
        reason: format!("{err:#}"),
    }
}

/// Wraps parsed listings, reporting an empty source as `SourceError::Empty`.
pub(crate) fn finish(
    cinema: CinemaId,
    listings: Vec<RawListing>,
    coverage: Coverage,
) -> Result<Extraction, SourceError> {
    if listings.is_empty() {
        tracing::info!(%cinema, "Source lists no showings");
        return Err(SourceError::Empty { cinema });
    }
    tracing::debug!(%cinema, listings = listings.len(), "Listings parsed");
    Ok(Extraction { listings, coverage })
}

/// Resolves a possibly relative booking link against the page URL.
///
/// Links that do not parse are kept verbatim; an empty link stays empty.
pub(crate) fn resolve_link(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    base.join(href)
        .map_or_else(|_| String::from(href), String::from)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_default_urls_parse() {
        // Arrange & Act & Assert
        for cinema in CinemaId::ALL {
            assert!(Url::parse(default_url(cinema)).is_ok(), "{cinema}");
        }
    }

    #[test]
    fn test_build_extractor_serves_requested_cinema() {
        // Arrange
        let settings = SourceSettings {
            url: Url::parse("http://localhost:8080/").unwrap(),
            user_agent: String::from("cinesched-test/0.0.0"),
            min_interval: Duration::ZERO,
            request_timeout: Duration::from_secs(1),
            days_ahead: DEFAULT_DAYS_AHEAD,
        };

        // Act & Assert
        for cinema in CinemaId::ALL {
            let extractor = build_extractor(cinema, &settings).unwrap();
            assert_eq!(extractor.cinema(), cinema);
        }
    }

    #[test]
    fn test_resolve_link() {
        // Arrange
        let base = Url::parse("https://www.curzon.com/venues/soho/").unwrap();

        // Act & Assert
        assert_eq!(
            resolve_link(&base, "/ticketing/seats/SOH1-123"),
            "https://www.curzon.com/ticketing/seats/SOH1-123"
        );
        assert_eq!(
            resolve_link(&base, "https://tickets.example/1"),
            "https://tickets.example/1"
        );
        assert_eq!(resolve_link(&base, "  "), "");
    }

    #[test]
    fn test_finish_reports_empty() {
        // Arrange & Act
        let result = finish(CinemaId::BfiImax, Vec::new(), Coverage::Complete);

        // Assert
        assert_eq!(
            result,
            Err(SourceError::Empty {
                cinema: CinemaId::BfiImax
            })
        );
    }
}
