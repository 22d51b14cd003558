//! Concurrent extraction with per-source timeouts.
#![allow(clippy::future_not_send)]

use std::time::Duration;

use chrono::NaiveDate;
use cinesched_core::{CinemaId, Extraction, SourceError, SourceRun};
use futures::future::join_all;
use tracing::instrument;

use crate::extractor::LocalExtractor;

/// Extra time a source gets past its budget to hand back partial results.
const OVERRUN_GRACE: Duration = Duration::from_millis(500);

/// Runs every extractor concurrently, each within a budget of `timeout`.
///
/// Results come back in the order of `extractors`, whatever order the
/// fetches complete in. A source still running `OVERRUN_GRACE` after its
/// budget is reported unavailable and does not hold up the others.
#[instrument(skip_all, fields(sources = extractors.len()))]
pub async fn extract_all<E>(extractors: &[E], today: NaiveDate, timeout: Duration) -> Vec<SourceRun>
where
    E: LocalExtractor + Sync,
{
    let fetches = extractors.iter().map(|extractor| async move {
        let cinema = extractor.cinema();
        let hard_limit = timeout.saturating_add(OVERRUN_GRACE);
        let result = match tokio::time::timeout(hard_limit, extractor.fetch(today, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Unavailable {
                cinema,
                reason: format!("timed out after {}s", timeout.as_secs_f64()),
            }),
        };
        log_result(cinema, &result);
        SourceRun { cinema, result }
    });

    join_all(fetches).await
}

/// Failures at `warn`, everything else at `info`.
fn log_result(cinema: CinemaId, result: &Result<Extraction, SourceError>) {
    match result {
        Ok(extraction) => tracing::info!(
            %cinema,
            listings = extraction.listings.len(),
            "Source fetched"
        ),
        Err(SourceError::Empty { .. }) => {
            tracing::info!(%cinema, "Source returned no listings");
        }
        Err(err @ SourceError::Unavailable { .. }) => {
            tracing::warn!(%cinema, error = %err, "Source fetch failed");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use cinesched_core::{Coverage, RawListing};
    use tracing::subscriber::with_default;
    use tracing_mock::{expect, subscriber};

    use super::*;

    /// Mock extractor that answers after a delay.
    struct MockExtractor {
        cinema: CinemaId,
        delay: Duration,
        outcome: Result<usize, SourceError>,
    }

    impl LocalExtractor for MockExtractor {
        fn cinema(&self) -> CinemaId {
            self.cinema
        }

        async fn fetch(
            &self,
            _today: NaiveDate,
            _budget: Duration,
        ) -> Result<Extraction, SourceError> {
            tokio::time::sleep(self.delay).await;
            let count = self.outcome.clone()?;
            Ok(Extraction {
                listings: (0..count)
                    .map(|n| RawListing {
                        cinema: self.cinema,
                        title: format!("Film {n}"),
                        date: Some(String::from("Today")),
                        showtimes: vec![String::from("20:00")],
                        format: String::new(),
                        booking_url: String::new(),
                    })
                    .collect(),
                coverage: Coverage::Complete,
            })
        }
    }

    fn mock(cinema: CinemaId, delay_ms: u64, outcome: Result<usize, SourceError>) -> MockExtractor {
        MockExtractor {
            cinema,
            delay: Duration::from_millis(delay_ms),
            outcome,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
    }

    #[tokio::test]
    async fn test_extract_all_keeps_source_order() {
        // Arrange: first source finishes last
        let extractors = vec![
            mock(CinemaId::PicturehouseCentral, 40, Ok(1)),
            mock(CinemaId::CurzonSoho, 0, Ok(2)),
            mock(CinemaId::EverymanIslington, 20, Ok(3)),
        ];

        // Act
        let runs = extract_all(&extractors, today(), Duration::from_secs(5)).await;

        // Assert
        let order: Vec<_> = runs.iter().map(|r| r.cinema).collect();
        assert_eq!(
            order,
            [
                CinemaId::PicturehouseCentral,
                CinemaId::CurzonSoho,
                CinemaId::EverymanIslington
            ]
        );
        assert_eq!(runs[2].result.as_ref().unwrap().listings.len(), 3);
    }

    #[tokio::test]
    async fn test_extract_all_timeout_does_not_block_others() {
        // Arrange
        let extractors = vec![
            mock(CinemaId::BfiImax, 10_000, Ok(1)),
            mock(CinemaId::OdeonLeicesterSquare, 0, Ok(1)),
        ];
        let started = std::time::Instant::now();

        // Act
        let runs = extract_all(&extractors, today(), Duration::from_millis(50)).await;

        // Assert
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(
            &runs[0].result,
            Err(SourceError::Unavailable { reason, .. }) if reason.contains("timed out")
        ));
        assert!(runs[1].result.is_ok());
    }

    #[tokio::test]
    async fn test_extract_all_passes_errors_through() {
        // Arrange
        let extractors = vec![mock(
            CinemaId::CurzonSoho,
            0,
            Err(SourceError::Empty {
                cinema: CinemaId::CurzonSoho,
            }),
        )];

        // Act
        let runs = extract_all(&extractors, today(), Duration::from_secs(1)).await;

        // Assert
        assert_eq!(
            runs[0].result,
            Err(SourceError::Empty {
                cinema: CinemaId::CurzonSoho
            })
        );
    }

    #[test]
    fn test_log_result_failure_is_warning() {
        // Arrange
        let result = Err(SourceError::Unavailable {
            cinema: CinemaId::CurzonSoho,
            reason: String::from("HTTP 503"),
        });
        let (subscriber, handle) = subscriber::mock()
            .event(
                expect::event()
                    .at_level(tracing::Level::WARN)
                    .with_fields(expect::msg("Source fetch failed")),
            )
            .only()
            .run_with_handle();

        // Act
        with_default(subscriber, || log_result(CinemaId::CurzonSoho, &result));

        // Assert
        handle.assert_finished();
    }

    #[test]
    fn test_log_result_empty_is_info() {
        // Arrange
        let result = Err(SourceError::Empty {
            cinema: CinemaId::EverymanIslington,
        });
        let (subscriber, handle) = subscriber::mock()
            .event(expect::event().at_level(tracing::Level::INFO))
            .only()
            .run_with_handle();

        // Act
        with_default(subscriber, || {
            log_result(CinemaId::EverymanIslington, &result);
        });

        // Assert
        handle.assert_finished();
    }
}
