//! Circuit Profiler
//!
//! Derives how much a circuit rewards qualifying, how hard it is to pass, and
//! how chaotic races tend to be, from one race's classification.

use tracing::{debug, info};

use super::stats::{mean, pearson, round3};
use crate::data::{find_round, RaceDataSource};
use crate::error::PredictError;
use crate::models::{CircuitProfile, RaceInfo, RaceResult};

/// Fewer aligned grid/finish pairs than this and the correlation is not trusted
const MIN_CORRELATION_SAMPLE: usize = 6;
/// Qualifying importance when the sample is too small or degenerate
const DEFAULT_QUALIFYING_IMPORTANCE: f64 = 0.5;

pub struct CircuitProfiler;

impl CircuitProfiler {
    /// Profile the circuit of `(season, round)`
    ///
    /// Fails with `RoundNotFound` when the round is not on the season calendar.
    pub async fn run<S: RaceDataSource>(
        source: &S,
        season: u32,
        round: u32,
    ) -> Result<CircuitProfile, PredictError> {
        let races = source
            .races(season)
            .await
            .map_err(|e| PredictError::unavailable(season, round, e))?;
        let race = find_round(&races, round)
            .ok_or(PredictError::RoundNotFound { season, round })?;

        let results = source
            .results(season, round)
            .await
            .map_err(|e| PredictError::unavailable(season, round, e))?;

        let profile = Self::profile(race, &results);
        info!(
            "Circuit {}: qi={} od={} scr={}",
            profile.circuit_name,
            profile.qualifying_importance,
            profile.overtaking_difficulty,
            profile.safety_car_risk
        );
        Ok(profile)
    }

    /// Build a profile from race metadata and its results
    pub fn profile(race: &RaceInfo, results: &[RaceResult]) -> CircuitProfile {
        let (grids, finishes): (Vec<f64>, Vec<f64>) = results
            .iter()
            .filter_map(|r| Some((r.grid? as f64, r.position? as f64)))
            .unzip();

        CircuitProfile {
            circuit_name: race.circuit_name.clone(),
            location: race.location(),
            qualifying_importance: round3(Self::qualifying_importance(&grids, &finishes)),
            overtaking_difficulty: round3(Self::overtaking_difficulty(&grids, &finishes)),
            safety_car_risk: round3(Self::safety_car_risk(results)),
            lap_count: Self::lap_count(race, results),
        }
    }

    /// |corr(grid, finish)|, or the default on small or flat samples
    fn qualifying_importance(grids: &[f64], finishes: &[f64]) -> f64 {
        if grids.len() < MIN_CORRELATION_SAMPLE {
            debug!(
                "Only {} grid/finish pairs, using default qualifying importance",
                grids.len()
            );
            return DEFAULT_QUALIFYING_IMPORTANCE;
        }
        match pearson(grids, finishes) {
            Some(corr) => corr.abs().min(1.0),
            None => DEFAULT_QUALIFYING_IMPORTANCE,
        }
    }

    /// 1 / (1 + mean |grid - finish|); 1.0 with no pairs
    fn overtaking_difficulty(grids: &[f64], finishes: &[f64]) -> f64 {
        let changes: Vec<f64> = grids
            .iter()
            .zip(finishes)
            .map(|(g, f)| (g - f).abs())
            .collect();
        let avg_change = mean(&changes).unwrap_or(0.0);
        1.0 / (1.0 + avg_change)
    }

    /// Share of the field not classified as finished
    fn safety_car_risk(results: &[RaceResult]) -> f64 {
        if results.is_empty() {
            return 0.0;
        }
        let dnfs = results.iter().filter(|r| !r.finished).count();
        (dnfs as f64 / results.len() as f64).min(1.0)
    }

    /// Race-level laps, else the winner's completed laps
    fn lap_count(race: &RaceInfo, results: &[RaceResult]) -> Option<u32> {
        if race.laps.is_some() {
            return race.laps;
        }
        results
            .iter()
            .find(|r| r.position == Some(1))
            .or_else(|| results.first())
            .and_then(|winner| winner.laps)
    }
}
