//! Curzon Soho: HTML "what's on" page grouped into per-day sections.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use cinesched_core::{CinemaId, Coverage, Extraction, RawListing, SourceError};
use scraper::{ElementRef, Html, Selector};
use tracing::instrument;
use url::Url;

use crate::client::SourceClient;
use crate::extractor::{LocalExtractor, finish, resolve_link, unavailable};

const CINEMA: CinemaId = CinemaId::CurzonSoho;

#[allow(clippy::expect_used)]
static WHATS_ON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#whats-on").expect("failed to compile selector"));

#[allow(clippy::expect_used)]
static DAY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("section.listing-day[data-date]").expect("failed to compile selector")
});

#[allow(clippy::expect_used)]
static FILM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article.film").expect("failed to compile selector"));

#[allow(clippy::expect_used)]
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".film-title").expect("failed to compile selector"));

#[allow(clippy::expect_used)]
static SESSION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.session").expect("failed to compile selector"));

/// Extractor for Curzon Soho.
#[derive(Debug)]
pub struct CurzonExtractor {
    client: SourceClient,
    url: Url,
}

impl CurzonExtractor {
    /// Creates an extractor reading the page at `url`.
    #[must_use]
    pub const fn new(client: SourceClient, url: Url) -> Self {
        Self { client, url }
    }
}

impl LocalExtractor for CurzonExtractor {
    fn cinema(&self) -> CinemaId {
        CINEMA
    }

    #[instrument(skip_all, fields(cinema = %CINEMA))]
    async fn fetch(
        &self,
        _today: NaiveDate,
        _budget: Duration,
    ) -> Result<Extraction, SourceError> {
        let body = self
            .client
            .get_text(&self.url, &[])
            .await
            .map_err(|e| unavailable(CINEMA, &e))?;
        let listings = parse_listings(&body, &self.url).map_err(|e| unavailable(CINEMA, &e))?;

        finish(CINEMA, listings, Coverage::Complete)
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

/// Parses the listings page, one listing per session link.
fn parse_listings(body: &str, base: &Url) -> Result<Vec<RawListing>> {
    let document = Html::parse_document(body);
    let Some(root) = document.select(&WHATS_ON).next() else {
        bail!("Curzon page layout changed: #whats-on not found");
    };

    let mut listings = Vec::new();
    for day in root.select(&DAY) {
        let date = day.value().attr("data-date").unwrap_or_default().trim();
        for film in day.select(&FILM) {
            let Some(title) = film.select(&TITLE).next().map(text_of) else {
                tracing::debug!(date, "Film block without a title skipped");
                continue;
            };
            for session in film.select(&SESSION) {
                listings.push(RawListing {
                    cinema: CINEMA,
                    title: title.clone(),
                    date: Some(String::from(date)),
                    showtimes: vec![text_of(session)],
                    format: String::from(session.value().attr("data-format").unwrap_or_default()),
                    booking_url: resolve_link(
                        base,
                        session.value().attr("href").unwrap_or_default(),
                    ),
                });
            }
        }
    }

    Ok(listings)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]
    #![allow(clippy::panic)]

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn extractor(server: &MockServer) -> CurzonExtractor {
        let client = SourceClient::builder()
            .user_agent("cinesched-test/0.0.0")
            .min_interval(Duration::ZERO)
            .retry_delay(Duration::from_millis(10))
            .build()
            .unwrap();
        let url = Url::parse(&format!("{}/venues/soho/", server.uri())).unwrap();
        CurzonExtractor::new(client, url)
    }

    #[test]
    fn test_parse_listings_walks_day_sections() {
        // Arrange
        let body = include_str!("../../../../fixtures/curzon/whats_on.html");
        let base = Url::parse("https://www.curzon.com/venues/soho/").unwrap();

        // Act
        let listings = parse_listings(body, &base).unwrap();

        // Assert
        assert_eq!(listings.len(), 4);
        assert_eq!(listings[0].title, "Past\u{a0}Lives");
        assert_eq!(listings[0].date.as_deref(), Some("2024-06-12"));
        assert_eq!(listings[0].showtimes, ["18:00"]);
        assert_eq!(listings[0].format, "Standard");
        assert_eq!(
            listings[0].booking_url,
            "https://www.curzon.com/ticketing/seats/SOH1-1001/"
        );
        assert_eq!(listings[2].title, "Evil Does Not Exist");
        assert_eq!(listings[2].format, "Subtitled");
        assert_eq!(listings[3].date.as_deref(), Some("2024-06-13"));
    }

    #[test]
    fn test_parse_listings_detects_layout_change() {
        // Arrange
        let body = include_str!("../../../../fixtures/curzon/redesigned.html");
        let base = Url::parse("https://www.curzon.com/venues/soho/").unwrap();

        // Act
        let result = parse_listings(body, &base);

        // Assert
        assert!(result.unwrap_err().to_string().contains("layout changed"));
    }

    #[tokio::test]
    async fn test_fetch_complete_listing() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/venues/soho/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(include_str!(
                "../../../../fixtures/curzon/whats_on.html"
            )))
            .mount(&server)
            .await;

        // Act
        let extraction = extractor(&server)
            .fetch(NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(), Duration::from_secs(30))
            .await
            .unwrap();

        // Assert
        assert_eq!(extraction.coverage, Coverage::Complete);
        assert!(
            extraction.listings[0]
                .booking_url
                .starts_with(&server.uri())
        );
    }

    #[tokio::test]
    async fn test_fetch_server_down_is_unavailable() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        // Act
        let result = extractor(&server)
            .fetch(NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(), Duration::from_secs(30))
            .await;

        // Assert
        match result {
            Err(SourceError::Unavailable { reason, .. }) => assert!(reason.contains("503")),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }
}
