//! Constructor Dominance Extractor

use std::collections::BTreeMap;
use tracing::info;

use super::stats::{mean, round3};
use super::{fetch_window, DEFAULT_WINDOW};
use crate::data::RaceDataSource;
use crate::error::{validate_window, PredictError};
use crate::models::{ConstructorStat, RaceResult};

/// Cars entered per constructor in a round
const CARS_PER_TEAM: usize = 2;
/// Points for a win, used to scale points per race
const WIN_POINTS: f64 = 25.0;

#[derive(Debug, Default)]
struct TeamAccumulator {
    finishes: Vec<f64>,
    points: Vec<f64>,
    dnfs: u32,
}

impl TeamAccumulator {
    fn record(&mut self, result: &RaceResult) {
        if let Some(position) = result.position {
            self.finishes.push(position as f64);
        }
        if let Some(points) = result.points {
            self.points.push(points);
        }
        if !result.finished {
            self.dnfs += 1;
        }
    }

    fn finish(self, window_len: usize) -> Option<ConstructorStat> {
        let avg_finish = mean(&self.finishes)?;
        let points_per_race = mean(&self.points).unwrap_or(0.0);
        let slots = (window_len * CARS_PER_TEAM).max(1);

        Some(ConstructorStat {
            avg_finish: round3(avg_finish),
            points_per_race: round3(points_per_race),
            dnf_rate: round3(self.dnfs as f64 / slots as f64),
            dominance_score: round3(
                (1.0 / (1.0 + avg_finish)) * (1.0 + points_per_race / WIN_POINTS),
            ),
        })
    }
}

/// Constructor strength over a trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstructorDominanceExtractor {
    pub window: u32,
}

impl Default for ConstructorDominanceExtractor {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl ConstructorDominanceExtractor {
    pub fn new(window: u32) -> Result<Self, PredictError> {
        validate_window(window)?;
        Ok(Self { window })
    }

    pub async fn run<S: RaceDataSource>(
        &self,
        source: &S,
        season: u32,
        round: u32,
    ) -> Result<BTreeMap<String, ConstructorStat>, PredictError> {
        let window = fetch_window(source, season, round, self.window).await?;
        let stats = self.from_window(&window);
        info!(
            "Constructor dominance: {} teams over {} rounds before round {}",
            stats.len(),
            window.len(),
            round
        );
        Ok(stats)
    }

    /// Aggregate already-fetched window rounds; teams with no finish are left out
    pub fn from_window(&self, window: &[Vec<RaceResult>]) -> BTreeMap<String, ConstructorStat> {
        let mut accumulators: BTreeMap<&str, TeamAccumulator> = BTreeMap::new();

        for result in window.iter().flatten() {
            accumulators
                .entry(result.constructor_id.as_str())
                .or_default()
                .record(result);
        }

        accumulators
            .into_iter()
            .filter_map(|(team, acc)| Some((team.to_string(), acc.finish(window.len())?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::{entry, RecordingSource};

    fn window() -> Vec<Vec<RaceResult>> {
        vec![
            vec![
                entry("verstappen", "red_bull", Some(1), Some(1), true, Some(25.0)),
                entry("perez", "red_bull", Some(4), Some(3), true, Some(15.0)),
                entry("bottas", "sauber", Some(15), Some(14), true, Some(0.0)),
                entry("zhou", "sauber", Some(16), None, false, Some(0.0)),
            ],
            vec![
                entry("verstappen", "red_bull", Some(1), Some(1), true, Some(25.0)),
                entry("perez", "red_bull", Some(2), Some(3), true, Some(15.0)),
                entry("bottas", "sauber", Some(18), None, false, None),
                entry("zhou", "sauber", Some(17), None, false, None),
            ],
        ]
    }

    #[test]
    fn test_constructor_dominance() {
        let stats = ConstructorDominanceExtractor::default().from_window(&window());
        let red_bull = &stats["red_bull"];

        assert_eq!(red_bull.avg_finish, 2.0);
        assert_eq!(red_bull.points_per_race, 20.0);
        assert_eq!(red_bull.dnf_rate, 0.0);
        assert_eq!(red_bull.dominance_score, round3((1.0 / 3.0) * 1.8));
    }

    #[test]
    fn test_dnf_rate_counts_two_cars_per_round() {
        let stats = ConstructorDominanceExtractor::default().from_window(&window());
        let sauber = &stats["sauber"];

        assert_eq!(sauber.avg_finish, 14.0);
        assert_eq!(sauber.points_per_race, 0.0);
        assert_eq!(sauber.dnf_rate, 0.75);
        assert_eq!(sauber.dominance_score, round3(1.0 / 15.0));
    }

    #[test]
    fn test_team_without_finishes_is_omitted() {
        let window = vec![vec![
            entry("sargeant", "williams", Some(20), None, false, None),
            entry("albon", "williams", Some(14), None, false, Some(0.0)),
            entry("norris", "mclaren", Some(3), Some(2), true, Some(18.0)),
        ]];
        let stats = ConstructorDominanceExtractor::default().from_window(&window);

        assert!(!stats.contains_key("williams"));
        assert_eq!(stats["mclaren"].avg_finish, 2.0);
    }

    #[test]
    fn test_points_default_to_zero_when_unrecorded() {
        let window = vec![vec![entry("norris", "mclaren", Some(3), Some(2), true, None)]];
        let stats = ConstructorDominanceExtractor::default().from_window(&window);

        assert_eq!(stats["mclaren"].points_per_race, 0.0);
        assert_eq!(stats["mclaren"].dominance_score, round3(1.0 / 3.0));
    }

    #[tokio::test]
    async fn test_first_round_has_no_constructors() {
        let source = RecordingSource::default();
        let stats = ConstructorDominanceExtractor::default()
            .run(&source, 2024, 1)
            .await
            .unwrap();
        assert!(stats.is_empty());
    }

    #[tokio::test]
    async fn test_run_reads_window() {
        let source = RecordingSource::default();
        let stats = ConstructorDominanceExtractor::new(2)
            .unwrap()
            .run(&source, 2024, 4)
            .await
            .unwrap();

        assert_eq!(*source.reads.lock().unwrap(), vec![2, 3]);
        assert_eq!(stats["team_a"].points_per_race, 25.0);
        assert_eq!(stats["team_b"].avg_finish, 2.0);
    }
}
