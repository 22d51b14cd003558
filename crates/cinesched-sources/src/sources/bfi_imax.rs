//! BFI IMAX: XML schedule feed with `dd/mm/yyyy` dates and `7.30pm` times.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use cinesched_core::{CinemaId, Coverage, Extraction, RawListing, SourceError};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::client::SourceClient;
use crate::extractor::{LocalExtractor, finish, resolve_link, unavailable};

const CINEMA: CinemaId = CinemaId::BfiImax;

/// `<Schedule>` root element.
#[derive(Debug, Deserialize)]
struct ScheduleFeed {
    #[serde(rename = "Film", default)]
    films: Vec<FeedFilm>,
}

#[derive(Debug, Deserialize)]
struct FeedFilm {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Performance", default)]
    performances: Vec<Performance>,
}

#[derive(Debug, Deserialize)]
struct Performance {
    #[serde(rename = "@date")]
    date: String,
    #[serde(rename = "@time")]
    time: String,
    #[serde(rename = "@format", default)]
    format: String,
    #[serde(rename = "@url", default)]
    url: String,
}

/// Extractor for the BFI IMAX feed.
#[derive(Debug)]
pub struct BfiImaxExtractor {
    client: SourceClient,
    url: Url,
}

impl BfiImaxExtractor {
    /// Creates an extractor reading the feed at `url`.
    #[must_use]
    pub const fn new(client: SourceClient, url: Url) -> Self {
        Self { client, url }
    }
}

impl LocalExtractor for BfiImaxExtractor {
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

fn parse_listings(xml: &str, base: &Url) -> Result<Vec<RawListing>> {
    let raw_result: std::result::Result<ScheduleFeed, _> = quick_xml::de::from_str(xml);
    let feed = raw_result.with_context(|| {
        format!(
            "BFI IMAX XML decoding failed (len={}): {}",
            xml.len(),
            &xml[..xml.floor_char_boundary(200)]
        )
    })?;

    Ok(feed
        .films
        .into_iter()
        .flat_map(|film| {
            let title = film.title;
            film.performances.into_iter().map(move |perf| RawListing {
                cinema: CINEMA,
                title: title.clone(),
                date: Some(perf.date),
                showtimes: vec![perf.time],
                format: perf.format,
                booking_url: resolve_link(base, &perf.url),
            })
        })
        .collect())
}
