//! Picturehouse Central: JSON scheduling API with naive local datetimes.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use cinesched_core::{CinemaId, Coverage, Extraction, RawListing, SourceError};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::client::SourceClient;
use crate::extractor::{LocalExtractor, finish, resolve_link, unavailable};

const CINEMA: CinemaId = CinemaId::PicturehouseCentral;

/// The API only returns sessions already on sale, so later weeks thin out.
const KNOWN_GAP: &str = "future screenings may be incomplete";

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    response: String,
    #[serde(default)]
    movies: Vec<Movie>,
}

#[derive(Debug, Deserialize)]
struct Movie {
    #[serde(rename = "Title")]
    title: String,
    #[serde(default)]
    show_times: Vec<ShowTime>,
}

#[derive(Debug, Deserialize)]
struct ShowTime {
    #[serde(rename = "Showtime")]
    showtime: String,
    #[serde(rename = "SessionFormat", default)]
    session_format: String,
    #[serde(default)]
    booking_url: String,
}

/// Extractor for Picturehouse Central.
#[derive(Debug)]
pub struct PicturehouseExtractor {
    client: SourceClient,
    url: Url,
}

impl PicturehouseExtractor {
    /// Creates an extractor reading `url`.
    #[must_use]
    pub const fn new(client: SourceClient, url: Url) -> Self {
        Self { client, url }
    }
}

impl LocalExtractor for PicturehouseExtractor {
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

        finish(CINEMA, listings, Coverage::Partial(String::from(KNOWN_GAP)))
    }
}

/// Parses the scheduling API response, one listing per session.
fn parse_listings(body: &str, base: &Url) -> Result<Vec<RawListing>> {
    let raw_result: std::result::Result<ScheduleResponse, _> = serde_json::from_str(body);
    let response = raw_result.context("failed to decode Picturehouse schedule JSON")?;
    if response.response != "success" {
        bail!("Picturehouse API error: response={:?}", response.response);
    }

    Ok(response
        .movies
        .into_iter()
        .flat_map(|movie| {
            let title = movie.title;
            movie
                .show_times
                .into_iter()
                .map(move |show| RawListing {
                    cinema: CINEMA,
                    title: title.clone(),
                    date: None,
                    showtimes: vec![show.showtime],
                    format: show.session_format,
                    booking_url: resolve_link(base, &show.booking_url),
                })
        })
        .collect())
}
