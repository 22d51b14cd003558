//! Odeon Luxe Leicester Square: one HTML page per day (`?date=YYYY-MM-DD`).

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use chrono::{Days, NaiveDate};
use cinesched_core::{CinemaId, Coverage, Extraction, RawListing, SourceError};
use scraper::{ElementRef, Html, Selector};
use tokio::time::Instant;
use tracing::instrument;
use url::Url;

use crate::client::SourceClient;
use crate::extractor::{LocalExtractor, finish, resolve_link, unavailable};

const CINEMA: CinemaId = CinemaId::OdeonLeicesterSquare;

#[allow(clippy::expect_used)]
static SHOWTIMES_ROOT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("main#cinema-showtimes").expect("failed to compile selector")
});

#[allow(clippy::expect_used)]
static DAY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.showtimes[data-day]").expect("failed to compile selector")
});

#[allow(clippy::expect_used)]
static CARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.film-card").expect("failed to compile selector"));

#[allow(clippy::expect_used)]
static TITLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".film-card__title").expect("failed to compile selector")
});

#[allow(clippy::expect_used)]
static FORMAT_BLOCK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.film-card__format").expect("failed to compile selector")
});

#[allow(clippy::expect_used)]
static SHOWTIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.showtime").expect("failed to compile selector"));

/// Extractor for Odeon Leicester Square.
#[derive(Debug)]
pub struct OdeonExtractor {
    client: SourceClient,
    url: Url,
    days_ahead: u32,
}

impl OdeonExtractor {
    /// Creates an extractor reading `days_ahead` day pages from `url`.
    #[must_use]
    pub const fn new(client: SourceClient, url: Url, days_ahead: u32) -> Self {
        Self {
            client,
            url,
            days_ahead,
        }
    }

    /// Fetches and parses one day page, giving up after `remaining`.
    async fn fetch_day(&self, day: NaiveDate, remaining: Duration) -> Result<Vec<RawListing>> {
        let query = [("date", day.format("%Y-%m-%d").to_string())];
        let body = tokio::time::timeout(remaining, self.client.get_text(&self.url, &query))
            .await
            .map_err(|_| anyhow!("day page timed out after {}s", remaining.as_secs_f64()))??;
        parse_day_page(&body, &self.url)
    }
}

impl LocalExtractor for OdeonExtractor {
    fn cinema(&self) -> CinemaId {
        CINEMA
    }

    /// Day pages are fetched one after another, each within what is left of
    /// `budget`. A failed page is skipped and downgrades coverage to partial;
    /// once the budget is spent the remaining days are skipped too.
    #[instrument(skip_all, fields(cinema = %CINEMA, days = self.days_ahead))]
    async fn fetch(&self, today: NaiveDate, budget: Duration) -> Result<Extraction, SourceError> {
        let started = Instant::now();
        let mut listings = Vec::new();
        let mut failed_days = Vec::new();
        let mut last_err = None;

        for offset in 0..self.days_ahead {
            let Some(day) = today.checked_add_days(Days::new(u64::from(offset))) else {
                break;
            };

            let page = match budget.checked_sub(started.elapsed()) {
                Some(remaining) if !remaining.is_zero() => self.fetch_day(day, remaining).await,
                _ => Err(anyhow!("time budget of {}s spent", budget.as_secs_f64())),
            };
            match page {
                Ok(day_listings) => listings.extend(day_listings),
                Err(e) => {
                    tracing::warn!(%day, error = %format!("{e:#}"), "Day page skipped");
                    failed_days.push(day);
                    last_err = Some(e);
                }
            }
        }

        if let Some(err) = last_err {
            if failed_days.len() == usize::try_from(self.days_ahead).unwrap_or(usize::MAX) {
                return Err(unavailable(CINEMA, &err));
            }
            let reason = format!(
                "{} of {} day pages failed ({})",
                failed_days.len(),
                self.days_ahead,
                failed_days
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return finish(CINEMA, listings, Coverage::Partial(reason));
        }

        finish(CINEMA, listings, Coverage::Complete)
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

/// Parses one day page, one listing per film format block.
fn parse_day_page(body: &str, base: &Url) -> Result<Vec<RawListing>> {
    let document = Html::parse_document(body);
    let Some(root) = document.select(&SHOWTIMES_ROOT).next() else {
        bail!("Odeon page layout changed: main#cinema-showtimes not found");
    };

    let mut listings = Vec::new();
    for day in root.select(&DAY) {
        let label = day.value().attr("data-day").unwrap_or_default().trim();
        for card in day.select(&CARD) {
            let Some(title) = card.select(&TITLE).next().map(text_of) else {
                continue;
            };
            for block in card.select(&FORMAT_BLOCK) {
                let showtimes: Vec<String> = block.select(&SHOWTIME).map(text_of).collect();
                if showtimes.is_empty() {
                    continue;
                }
                listings.push(RawListing {
                    cinema: CINEMA,
                    title: title.clone(),
                    date: Some(String::from(label)),
                    showtimes,
                    format: String::from(block.value().attr("data-format").unwrap_or_default()),
                    booking_url: resolve_link(
                        base,
                        block.value().attr("data-booking").unwrap_or_default(),
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

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::runner::extract_all;

    const BUDGET: Duration = Duration::from_secs(30);

    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
    }

    fn extractor(server: &MockServer, days_ahead: u32) -> OdeonExtractor {
        let client = SourceClient::builder()
            .user_agent("cinesched-test/0.0.0")
            .min_interval(Duration::ZERO)
            .retry_delay(Duration::from_millis(10))
            .build()
            .unwrap();
        let url = Url::parse(&format!("{}/cinemas/london-leicester-square/", server.uri())).unwrap();
        OdeonExtractor::new(client, url, days_ahead)
    }

    async fn mount_day(server: &MockServer, date: &str, body: &'static str) {
        Mock::given(method("GET"))
            .and(path("/cinemas/london-leicester-square/"))
            .and(query_param("date", date))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_parse_day_page_groups_by_format() {
        // Arrange
        let body = include_str!("../../../../fixtures/odeon/day_2024-06-12.html");
        let base = Url::parse("https://www.odeon.co.uk/cinemas/london-leicester-square/").unwrap();

        // Act
        let listings = parse_day_page(body, &base).unwrap();

        // Assert
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[0].title, "Furiosa: A Mad Max Saga");
        assert_eq!(listings[0].date.as_deref(), Some("Wed 12 Jun"));
        assert_eq!(listings[0].showtimes, ["17:00", "20:15"]);
        assert_eq!(listings[0].format, "Dolby Cinema");
        assert_eq!(
            listings[0].booking_url,
            "https://www.odeon.co.uk/ticketing/furiosa/?date=2024-06-12"
        );
        assert_eq!(listings[1].showtimes, ["00:30"]);
        assert_eq!(
            listings[1].booking_url,
            "https://www.odeon.co.uk/ticketing/furiosa/?date=2024-06-12&screen=std"
        );
        assert_eq!(listings[2].title, "Inside Out 2 (U)");
    }

    #[tokio::test]
    async fn test_fetch_all_days_complete() {
        // Arrange
        let server = MockServer::start().await;
        mount_day(
            &server,
            "2024-06-12",
            include_str!("../../../../fixtures/odeon/day_2024-06-12.html"),
        )
        .await;
        mount_day(
            &server,
            "2024-06-13",
            include_str!("../../../../fixtures/odeon/day_2024-06-13.html"),
        )
        .await;

        // Act
        let extraction = extractor(&server, 2).fetch(wednesday(), BUDGET).await.unwrap();

        // Assert
        assert_eq!(extraction.coverage, Coverage::Complete);
        assert_eq!(extraction.listings.len(), 4);
        assert_eq!(extraction.listings[3].format, "IMAX");
    }

    #[tokio::test]
    async fn test_fetch_failed_day_is_partial() {
        // Arrange: third day page returns 404
        let server = MockServer::start().await;
        mount_day(
            &server,
            "2024-06-12",
            include_str!("../../../../fixtures/odeon/day_2024-06-12.html"),
        )
        .await;
        mount_day(
            &server,
            "2024-06-13",
            include_str!("../../../../fixtures/odeon/day_2024-06-13.html"),
        )
        .await;
        Mock::given(method("GET"))
            .and(query_param("date", "2024-06-14"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        // Act
        let extraction = extractor(&server, 3).fetch(wednesday(), BUDGET).await.unwrap();

        // Assert
        assert_eq!(extraction.listings.len(), 4);
        assert!(matches!(
            &extraction.coverage,
            Coverage::Partial(reason) if reason.contains("1 of 3") && reason.contains("2024-06-14")
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_days_failed_is_unavailable() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        // Act
        let result = extractor(&server, 2).fetch(wednesday(), BUDGET).await;

        // Assert
        assert!(matches!(result, Err(SourceError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_hung_day_page_keeps_pages_already_fetched() {
        // Arrange: the second day page hangs past the whole source budget
        let server = MockServer::start().await;
        mount_day(
            &server,
            "2024-06-12",
            include_str!("../../../../fixtures/odeon/day_2024-06-12.html"),
        )
        .await;
        Mock::given(method("GET"))
            .and(query_param("date", "2024-06-13"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!(
                        "../../../../fixtures/odeon/day_2024-06-13.html"
                    ))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
        let client = SourceClient::builder()
            .user_agent("cinesched-test/0.0.0")
            .min_interval(Duration::ZERO)
            .request_timeout(Duration::from_millis(200))
            .retry_delay(Duration::from_millis(10))
            .build()
            .unwrap();
        let url = Url::parse(&format!("{}/cinemas/london-leicester-square/", server.uri())).unwrap();
        let extractors = [OdeonExtractor::new(client, url, 3)];

        // Act
        let runs = extract_all(&extractors, wednesday(), Duration::from_millis(300)).await;

        // Assert
        let extraction = runs[0].result.as_ref().unwrap();
        assert_eq!(extraction.listings.len(), 3);
        assert_eq!(
            extraction.coverage,
            Coverage::Partial(String::from(
                "2 of 3 day pages failed (2024-06-13, 2024-06-14)"
            ))
        );
    }
}
