//! Driver Form Extractor
//!
//! Aggregates each driver's results over the trailing window of rounds into a
//! [`DriverStat`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::stats::{mean, round3, sample_std};
use super::{fetch_window, DEFAULT_WINDOW};
use crate::data::RaceDataSource;
use crate::error::{validate_window, PredictError};
use crate::models::{DriverStat, RaceResult};

/// How `race_count` is accumulated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceCountMode {
    /// Every window round in which the driver has an entry
    #[default]
    Entered,
    /// Legacy behaviour: only rounds the driver did not finish are counted,
    /// so a driver who never retires has a race count of 0
    DnfOnly,
}

/// Per-driver accumulator for one extraction
#[derive(Debug, Default)]
struct FormAccumulator {
    pairs: Vec<(f64, f64)>, // (grid, finish), only when both are known
    dnfs: u32,
    races: u32,
}

impl FormAccumulator {
    fn record(&mut self, result: &RaceResult, mode: RaceCountMode) {
        if let (Some(grid), Some(finish)) = (result.grid, result.position) {
            self.pairs.push((grid as f64, finish as f64));
        }

        if !result.finished {
            self.dnfs += 1;
        }

        match mode {
            RaceCountMode::Entered => self.races += 1,
            RaceCountMode::DnfOnly if !result.finished => self.races += 1,
            RaceCountMode::DnfOnly => {}
        }
    }

    fn finish(self, window_len: usize) -> Option<DriverStat> {
        let finishes: Vec<f64> = self.pairs.iter().map(|&(_, f)| f).collect();
        let avg_finish = mean(&finishes)?;

        let deltas: Vec<f64> = self.pairs.iter().map(|&(g, f)| g - f).collect();
        let qualifying_delta = mean(&deltas).unwrap_or(0.0);

        Some(DriverStat {
            avg_finish: round3(avg_finish),
            consistency: round3(1.0 / (1.0 + sample_std(&finishes))),
            dnf_risk: round3(self.dnfs as f64 / window_len.max(1) as f64),
            qualifying_delta: round3(qualifying_delta),
            form_score: round3(1.0 / (1.0 + avg_finish)),
            race_count: self.races,
        })
    }
}

/// Driver form over a trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverFormExtractor {
    pub window: u32,
    pub race_count_mode: RaceCountMode,
}

impl Default for DriverFormExtractor {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            race_count_mode: RaceCountMode::default(),
        }
    }
}

impl DriverFormExtractor {
    pub fn new(window: u32, race_count_mode: RaceCountMode) -> Result<Self, PredictError> {
        validate_window(window)?;
        Ok(Self {
            window,
            race_count_mode,
        })
    }

    /// Driver stats for the window preceding `(season, round)`
    pub async fn run<S: RaceDataSource>(
        &self,
        source: &S,
        season: u32,
        round: u32,
    ) -> Result<BTreeMap<String, DriverStat>, PredictError> {
        let window = fetch_window(source, season, round, self.window).await?;
        let stats = self.from_window(&window);
        info!(
            "Driver form: {} drivers over {} rounds before round {}",
            stats.len(),
            window.len(),
            round
        );
        Ok(stats)
    }

    /// Aggregate already-fetched window rounds
    ///
    /// Drivers without a single recorded finish are left out.
    pub fn from_window(&self, window: &[Vec<RaceResult>]) -> BTreeMap<String, DriverStat> {
        let mut accumulators: BTreeMap<&str, FormAccumulator> = BTreeMap::new();

        for result in window.iter().flatten() {
            accumulators
                .entry(result.driver_id.as_str())
                .or_default()
                .record(result, self.race_count_mode);
        }

        accumulators
            .into_iter()
            .filter_map(|(driver, acc)| Some((driver.to_string(), acc.finish(window.len())?)))
            .collect()
    }
}
