//! Fusion Scorer
//!
//! Combines circuit character, driver form and constructor strength into a
//! winner probability for every driver:
//!
//! 1. weighted raw score per driver, scaled by experience and a weak-car penalty
//! 2. z-score standardization across the field
//! 3. additive constructor priors from [`FusionConfig`]
//! 4. temperature-scaled softmax
//!
//! Scoring is pure: the same inputs always give the same result.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::FusionConfig;
use crate::features::stats::{mean, population_std, round3};
use crate::models::{CircuitFactors, CircuitProfile, ConstructorStat, DriverStat, FusionResult};

/// Dominance assumed for a driver without a known constructor
const DEFAULT_CONSTRUCTOR_STRENGTH: f64 = 0.1;
/// Races after which a driver gets full weight
const FULL_EXPERIENCE_RACES: f64 = 5.0;
const PODIUM_SIZE: usize = 3;
const STD_EPSILON: f64 = 1e-9;

pub struct FusionScorer {
    config: FusionConfig,
}

impl Default for FusionScorer {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}

impl FusionScorer {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Score a field of drivers
    ///
    /// Drivers missing from `assignment` are scored with the default
    /// constructor strength and no prior.
    pub fn score(
        &self,
        circuit: Option<&CircuitProfile>,
        drivers: &BTreeMap<String, DriverStat>,
        constructors: &BTreeMap<String, ConstructorStat>,
        assignment: &BTreeMap<String, String>,
    ) -> FusionResult {
        if drivers.is_empty() {
            return FusionResult::empty();
        }
        let factors = circuit.map(CircuitProfile::factors).unwrap_or_default();

        let scored: Vec<(&str, f64)> = drivers
            .iter()
            .filter_map(|(driver, stat)| {
                let team = assignment.get(driver).map(String::as_str);
                let strength = team
                    .and_then(|t| constructors.get(t))
                    .map(|c| c.dominance_score)
                    .unwrap_or(DEFAULT_CONSTRUCTOR_STRENGTH);

                let raw = Self::raw_score(stat, strength, &factors);
                if raw.is_finite() {
                    Some((driver.as_str(), raw))
                } else {
                    debug!("Dropping {}: non-finite raw score", driver);
                    None
                }
            })
            .collect();

        if scored.is_empty() {
            warn!("No driver has a finite score");
            return FusionResult::empty();
        }

        let raws: Vec<f64> = scored.iter().map(|&(_, raw)| raw).collect();
        let mu = mean(&raws).unwrap_or(0.0);
        let sigma = population_std(&raws) + STD_EPSILON;

        let adjusted: Vec<f64> = scored
            .iter()
            .map(|&(driver, raw)| {
                let team = assignment.get(driver).map(String::as_str);
                (raw - mu) / sigma + self.config.prior_for(team)
            })
            .collect();

        let Some(probs) = self.softmax(&adjusted) else {
            warn!("Degenerate softmax over {} drivers", adjusted.len());
            return FusionResult::empty();
        };

        let probabilities: BTreeMap<String, f64> = scored
            .iter()
            .zip(probs)
            .map(|(&(driver, _), p)| (driver.to_string(), round3(p)))
            .collect();

        let mut result = FusionResult {
            winner: None,
            podium: Vec::new(),
            probabilities,
        };
        result.podium = result
            .ranking()
            .into_iter()
            .take(PODIUM_SIZE)
            .map(|(driver, _)| driver.to_string())
            .collect();
        result.winner = result.podium.first().cloned();

        debug!("Fusion winner: {:?}", result.winner);
        result
    }

    /// Weighted raw score of one driver
    pub fn raw_score(stat: &DriverStat, constructor_strength: f64, factors: &CircuitFactors) -> f64 {
        let penalty = if constructor_strength < 0.20 {
            0.85
        } else if constructor_strength < 0.28 {
            0.94
        } else {
            1.0
        };
        let experience = (stat.race_count as f64 / FULL_EXPERIENCE_RACES).min(1.0);

        let mut raw = 0.0;
        raw += stat.form_score * 0.30;
        raw += stat.consistency * (0.18 + factors.overtaking_difficulty);
        raw += constructor_strength * 0.30;
        raw -= stat.dnf_risk * (0.20 + factors.safety_car_risk);
        raw -= stat.qualifying_delta.abs() * factors.qualifying_importance * 0.04;

        raw * experience * penalty
    }

    /// exp((x - max) * T) normalized; None when the mass is not usable
    fn softmax(&self, scores: &[f64]) -> Option<Vec<f64>> {
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores
            .iter()
            .map(|s| ((s - max) * self.config.temperature).exp())
            .collect();
        let sum: f64 = exps.iter().sum();

        if !sum.is_finite() || sum <= 0.0 {
            return None;
        }
        Some(exps.into_iter().map(|e| e / sum).collect())
    }
}
