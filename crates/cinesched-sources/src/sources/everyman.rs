//! Everyman Islington: JSON showtimes API with RFC 3339 instants.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use cinesched_core::{CinemaId, Coverage, Extraction, RawListing, SourceError};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use crate::client::SourceClient;
use crate::extractor::{LocalExtractor, finish, resolve_link, unavailable};

const CINEMA: CinemaId = CinemaId::EverymanIslington;

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Data,
}

#[derive(Debug, Deserialize)]
struct Data {
    #[serde(default)]
    films: Vec<Film>,
}

#[derive(Debug, Deserialize)]
struct Film {
    name: String,
    #[serde(default)]
    sessions: Vec<Session>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    starts_at: String,
    #[serde(default)]
    screen_type: String,
    #[serde(default)]
    booking_link: String,
}

/// Extractor for Everyman Islington.
#[derive(Debug)]
pub struct EverymanExtractor {
    client: SourceClient,
    url: Url,
}

impl EverymanExtractor {
    /// Creates an extractor reading `url`.
    #[must_use]
    pub const fn new(client: SourceClient, url: Url) -> Self {
        Self { client, url }
    }
}

impl LocalExtractor for EverymanExtractor {
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

fn parse_listings(body: &str, base: &Url) -> Result<Vec<RawListing>> {
    let raw_result: std::result::Result<Envelope, _> = serde_json::from_str(body);
    let envelope = raw_result.context("failed to decode Everyman showtimes JSON")?;

    let mut listings = Vec::new();
    for film in envelope.data.films {
        for session in film.sessions {
            listings.push(RawListing {
                cinema: CINEMA,
                title: film.name.clone(),
                date: None,
                showtimes: vec![session.starts_at],
                format: session.screen_type,
                booking_url: resolve_link(base, &session.booking_link),
            });
        }
    }
    Ok(listings)
}
