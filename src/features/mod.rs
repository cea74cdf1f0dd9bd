//! Feature extraction from historical results
//!
//! - `circuit`: circuit character from one race's classification
//! - `driver`: driver form over a trailing window of rounds
//! - `constructor`: constructor dominance over the same window
//!
//! Extractors read the data source and never the round being predicted
//! (except the circuit profiler, which describes that round's circuit).

pub mod circuit;
pub mod constructor;
pub mod driver;
pub mod stats;

use std::ops::Range;
use tracing::debug;

use crate::data::RaceDataSource;
use crate::error::PredictError;
use crate::models::RaceResult;

pub use circuit::CircuitProfiler;
pub use constructor::ConstructorDominanceExtractor;
pub use driver::{DriverFormExtractor, RaceCountMode};

/// Default lookback window in rounds
pub const DEFAULT_WINDOW: u32 = 5;

/// Rounds `[max(1, round - window), round - 1]`
pub fn window_rounds(round: u32, window: u32) -> Range<u32> {
    let start = round.saturating_sub(window).max(1);
    start..round.max(start)
}

/// Fetch every round of the window, oldest first
///
/// Rounds with no results yet stay in the window as empty lists so they
/// still count towards the window length.
pub(crate) async fn fetch_window<S: RaceDataSource>(
    source: &S,
    season: u32,
    round: u32,
    window: u32,
) -> Result<Vec<Vec<RaceResult>>, PredictError> {
    let rounds = window_rounds(round, window);
    let mut results = Vec::with_capacity(rounds.len());

    for r in rounds {
        let entries = source
            .results(season, r)
            .await
            .map_err(|e| PredictError::unavailable(season, r, e))?;
        if entries.is_empty() {
            debug!("Season {} round {} has no results", season, r);
        }
        results.push(entries);
    }

    Ok(results)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::models::RaceInfo;
    use std::sync::Mutex;

    /// Shorthand result row: (driver, constructor, grid, position, finished, points)
    pub(crate) fn entry(
        driver: &str,
        constructor: &str,
        grid: Option<u32>,
        position: Option<u32>,
        finished: bool,
        points: Option<f64>,
    ) -> RaceResult {
        RaceResult {
            driver_id: driver.to_string(),
            constructor_id: constructor.to_string(),
            grid,
            position,
            finished,
            points,
            laps: None,
        }
    }

    /// Source that answers every round and records which ones were read
    #[derive(Default)]
    pub(crate) struct RecordingSource {
        pub reads: Mutex<Vec<u32>>,
    }

    impl RaceDataSource for RecordingSource {
        async fn races(&self, season: u32) -> Result<Vec<RaceInfo>, SourceError> {
            Err(SourceError::UnknownSeason(season))
        }

        async fn results(&self, _season: u32, round: u32) -> Result<Vec<RaceResult>, SourceError> {
            self.reads.lock().unwrap().push(round);
            Ok(vec![
                entry("alpha", "team_a", Some(1), Some(1), true, Some(25.0)),
                entry("bravo", "team_b", Some(2), Some(2), true, Some(18.0)),
            ])
        }
    }

    #[test]
    fn test_window_rounds() {
        assert_eq!(window_rounds(6, 5), 1..6);
        assert_eq!(window_rounds(10, 5), 5..10);
        assert_eq!(window_rounds(3, 5), 1..3);
        assert!(window_rounds(1, 5).is_empty());
        assert!(window_rounds(0, 5).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_window_reads_only_prior_rounds() {
        let source = RecordingSource::default();

        let rounds = fetch_window(&source, 2024, 8, 5).await.unwrap();
        assert_eq!(rounds.len(), 5);
        assert_eq!(*source.reads.lock().unwrap(), vec![3, 4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn test_fetch_window_first_round_reads_nothing() {
        let source = RecordingSource::default();

        let rounds = fetch_window(&source, 2024, 1, 5).await.unwrap();
        assert!(rounds.is_empty());
        assert!(source.reads.lock().unwrap().is_empty());
    }
}
