//! End-to-end race prediction
//!
//! Circuit profile, driver form and constructor dominance are extracted
//! concurrently, joined through the driver -> constructor assignment, fused,
//! and explained.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::FusionConfig;
use crate::data::RaceDataSource;
use crate::error::{validate_round, validate_window, PredictError};
use crate::explain::ExplanationRenderer;
use crate::features::{
    window_rounds, CircuitProfiler, ConstructorDominanceExtractor, DriverFormExtractor,
    RaceCountMode, DEFAULT_WINDOW,
};
use crate::fusion::FusionScorer;
use crate::models::{Prediction, RaceResult};

/// Tunables of one predictor
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorSettings {
    pub window: u32,
    pub race_count_mode: RaceCountMode,
    pub fusion: FusionConfig,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            race_count_mode: RaceCountMode::default(),
            fusion: FusionConfig::default(),
        }
    }
}

/// Race winner predictor over a data source
pub struct RacePredictor<S> {
    source: S,
    drivers: DriverFormExtractor,
    constructors: ConstructorDominanceExtractor,
    scorer: FusionScorer,
}

impl<S: RaceDataSource> RacePredictor<S> {
    pub fn new(source: S, settings: PredictorSettings) -> Result<Self, PredictError> {
        validate_window(settings.window)?;
        Ok(Self {
            source,
            drivers: DriverFormExtractor::new(settings.window, settings.race_count_mode)?,
            constructors: ConstructorDominanceExtractor::new(settings.window)?,
            scorer: FusionScorer::new(settings.fusion),
        })
    }

    /// Predict the winner of `(season, round)` from the rounds before it
    pub async fn predict(&self, season: u32, round: u32) -> Result<Prediction, PredictError> {
        validate_round(round)?;
        info!("Predicting season {} round {}", season, round);

        let (circuit, drivers, constructors) = tokio::try_join!(
            CircuitProfiler::run(&self.source, season, round),
            self.drivers.run(&self.source, season, round),
            self.constructors.run(&self.source, season, round),
        )?;

        let entries = self.results(season, round).await?;
        let circuit_observed = !entries.is_empty();
        let assignment = if circuit_observed {
            assignment_from(&entries)
        } else {
            debug!("Round {} not run yet, using default circuit factors", round);
            self.fallback_assignment(season, round).await?
        };

        // A round without results says nothing about its circuit
        let observed = circuit_observed.then_some(&circuit);
        let result = self
            .scorer
            .score(observed, &drivers, &constructors, &assignment);
        if result.is_empty() {
            warn!("No prediction for season {} round {}", season, round);
        }

        let explanations = ExplanationRenderer::render(observed, &drivers, &result);
        info!(
            "Predicted {:?} for {} ({} drivers scored)",
            result.winner,
            circuit.circuit_name,
            result.probabilities.len()
        );

        Ok(Prediction {
            season,
            round,
            circuit,
            circuit_observed,
            drivers,
            constructors,
            assignment,
            result,
            explanations,
        })
    }

    /// Driver -> constructor for `(season, round)`
    ///
    /// Uses the round's own entry list; before the round has been run, the
    /// latest window round with results stands in.
    pub async fn build_assignment(
        &self,
        season: u32,
        round: u32,
    ) -> Result<BTreeMap<String, String>, PredictError> {
        let entries = self.results(season, round).await?;
        if !entries.is_empty() {
            return Ok(assignment_from(&entries));
        }
        self.fallback_assignment(season, round).await
    }

    /// Entry list of the latest window round with results
    async fn fallback_assignment(
        &self,
        season: u32,
        round: u32,
    ) -> Result<BTreeMap<String, String>, PredictError> {
        for r in window_rounds(round, self.drivers.window).rev() {
            let entries = self.results(season, r).await?;
            if !entries.is_empty() {
                debug!("Round {} has no entries yet, using round {}", round, r);
                return Ok(assignment_from(&entries));
            }
        }

        warn!("No entry list for season {} up to round {}", season, round);
        Ok(BTreeMap::new())
    }

    async fn results(&self, season: u32, round: u32) -> Result<Vec<RaceResult>, PredictError> {
        self.source
            .results(season, round)
            .await
            .map_err(|e| PredictError::unavailable(season, round, e))
    }
}

fn assignment_from(entries: &[RaceResult]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|r| (r.driver_id.clone(), r.constructor_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemorySource;
    use crate::features::tests::entry;
    use crate::models::RaceInfo;

    fn race(round: u32) -> RaceInfo {
        RaceInfo {
            season: 2024,
            round,
            race_name: format!("Round {} Grand Prix", round),
            circuit_id: format!("circuit_{}", round),
            circuit_name: format!("Circuit {}", round),
            locality: "Town".to_string(),
            country: "Country".to_string(),
            laps: None,
        }
    }

    /// Same classification every round: a dominant car, a midfield car, a backmarker
    fn round_results() -> Vec<RaceResult> {
        vec![
            entry("max_verstappen", "red_bull", Some(1), Some(1), true, Some(25.0)),
            entry("lando_norris", "mclaren", Some(3), Some(2), true, Some(18.0)),
            entry("oscar_piastri", "mclaren", Some(2), Some(3), true, Some(15.0)),
            entry("sergio_perez", "red_bull", Some(5), Some(4), true, Some(12.0)),
            entry("logan_sargeant", "williams", Some(20), Some(18), true, Some(0.0)),
            entry("alex_albon", "williams", Some(18), None, false, Some(0.0)),
        ]
    }

    fn season(played: u32, calendar: u32) -> MemorySource {
        let mut source = MemorySource::new();
        for r in 1..=calendar {
            source = source.with_race(race(r));
        }
        for r in 1..=played {
            source = source.with_results(2024, r, round_results());
        }
        source
    }

    #[tokio::test]
    async fn test_predict_played_round() {
        let predictor = RacePredictor::new(season(6, 6), PredictorSettings::default()).unwrap();
        let prediction = predictor.predict(2024, 6).await.unwrap();

        assert_eq!(prediction.circuit.circuit_name, "Circuit 6");
        assert!(prediction.circuit_observed);
        assert_eq!(prediction.drivers.len(), 5);
        assert_eq!(prediction.assignment["lando_norris"], "mclaren");
        assert_eq!(prediction.result.winner.as_deref(), Some("max_verstappen"));
        assert_eq!(prediction.result.podium.len(), 3);
        assert!(!prediction.explanations.is_empty());

        let total: f64 = prediction.result.probabilities.values().sum();
        assert!((total - 1.0).abs() <= 1e-2);
    }

    #[tokio::test]
    async fn test_assignment_falls_back_to_latest_round() {
        let mut source = season(4, 6);
        source = source.with_results(
            2024,
            3,
            vec![entry("max_verstappen", "ferrari", Some(1), Some(1), true, Some(25.0))],
        );
        let predictor = RacePredictor::new(source, PredictorSettings::default()).unwrap();

        // Round 6 unplayed, round 5 empty, round 4 supplies the entry list
        let assignment = predictor.build_assignment(2024, 6).await.unwrap();
        assert_eq!(assignment["max_verstappen"], "red_bull");
        assert_eq!(assignment.len(), 6);
    }

    #[tokio::test]
    async fn test_predict_upcoming_round() {
        let predictor = RacePredictor::new(season(5, 6), PredictorSettings::default()).unwrap();
        let prediction = predictor.predict(2024, 6).await.unwrap();

        assert!(!prediction.circuit_observed);
        assert_eq!(prediction.circuit.circuit_name, "Circuit 6");
        assert_eq!(prediction.assignment.len(), 6);
        assert_eq!(prediction.result.winner.as_deref(), Some("max_verstappen"));
    }

    #[tokio::test]
    async fn test_upcoming_round_fuses_with_default_circuit() {
        // steady always P3, mid alternates P1/P5, second swaps P2/P3
        let mut source = MemorySource::new();
        for r in 1..=6 {
            source = source.with_race(race(r));
        }
        for r in 1..=5u32 {
            let (mid, second) = if r % 2 == 1 { (1, 2) } else { (5, 3) };
            source = source.with_results(
                2024,
                r,
                vec![
                    entry("steady", "team_a", Some(3), Some(3), true, Some(15.0)),
                    entry("mid", "team_b", Some(3), Some(mid), true, Some(10.0)),
                    entry("second", "team_c", Some(2), Some(second), true, Some(18.0)),
                ],
            );
        }
        let predictor = RacePredictor::new(source, PredictorSettings::default()).unwrap();
        let prediction = predictor.predict(2024, 6).await.unwrap();

        let expected = FusionScorer::default().score(
            None,
            &prediction.drivers,
            &prediction.constructors,
            &prediction.assignment,
        );
        assert!(!prediction.circuit_observed);
        assert_eq!(prediction.result, expected);
        // No circuit sentences for a race nobody has driven
        assert!(!prediction
            .explanations
            .iter()
            .any(|line| line.contains("circuit places") || line.starts_with("Overtaking")));
    }

    #[tokio::test]
    async fn test_first_round_is_empty() {
        let predictor = RacePredictor::new(season(1, 3), PredictorSettings::default()).unwrap();
        let prediction = predictor.predict(2024, 1).await.unwrap();

        assert!(prediction.drivers.is_empty());
        assert!(prediction.constructors.is_empty());
        assert!(prediction.result.is_empty());
        assert!(prediction.explanations.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_round() {
        let predictor = RacePredictor::new(season(3, 3), PredictorSettings::default()).unwrap();

        let err = predictor.predict(2024, 9).await.unwrap_err();
        assert!(matches!(err, PredictError::RoundNotFound { round: 9, .. }));
        assert!(err.is_data_unavailable());

        let err = predictor.predict(2024, 0).await.unwrap_err();
        assert!(matches!(err, PredictError::InvalidRound(0)));
    }

    #[tokio::test]
    async fn test_borrowed_source() {
        let source = season(4, 4);
        let predictor = RacePredictor::new(&source, PredictorSettings::default()).unwrap();

        let prediction = predictor.predict(2024, 4).await.unwrap();
        assert_eq!(prediction.result.winner.as_deref(), Some("max_verstappen"));
    }

    #[tokio::test]
    async fn test_unknown_season() {
        let predictor = RacePredictor::new(season(3, 3), PredictorSettings::default()).unwrap();
        let err = predictor.predict(1949, 2).await.unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[test]
    fn test_zero_window_rejected() {
        let settings = PredictorSettings {
            window: 0,
            ..PredictorSettings::default()
        };
        assert!(matches!(
            RacePredictor::new(MemorySource::new(), settings),
            Err(PredictError::InvalidWindow(0))
        ));
    }
}
