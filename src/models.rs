use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One competitor's outcome in one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub driver_id: String,
    pub constructor_id: String,
    pub grid: Option<u32>,     // Starting slot, None for pit-lane starts
    pub position: Option<u32>, // Classified finishing rank
    pub finished: bool,
    pub points: Option<f64>,
    pub laps: Option<u32>, // Completed laps
}

/// Race descriptor from a season's calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceInfo {
    pub season: u32,
    pub round: u32,
    pub race_name: String,
    pub circuit_id: String,
    pub circuit_name: String,
    pub locality: String,
    pub country: String,
    pub laps: Option<u32>,
}

impl RaceInfo {
    /// "Locality, Country"
    pub fn location(&self) -> String {
        format!("{}, {}", self.locality, self.country)
    }
}

/// Predictive characteristics of a circuit, derived from one race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitProfile {
    pub circuit_name: String,
    pub location: String,
    pub qualifying_importance: f64, // |corr(grid, finish)|, 0..=1
    pub overtaking_difficulty: f64, // 1 / (1 + mean position change), (0, 1]
    pub safety_car_risk: f64,       // Share of non-finishers, 0..=1
    pub lap_count: Option<u32>,
}

impl CircuitProfile {
    pub fn factors(&self) -> CircuitFactors {
        CircuitFactors {
            qualifying_importance: self.qualifying_importance,
            overtaking_difficulty: self.overtaking_difficulty,
            safety_car_risk: self.safety_car_risk,
        }
    }
}

/// The numeric part of a circuit profile consumed by fusion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitFactors {
    pub qualifying_importance: f64,
    pub overtaking_difficulty: f64,
    pub safety_car_risk: f64,
}

impl Default for CircuitFactors {
    /// Used when no circuit profile is available
    fn default() -> Self {
        Self {
            qualifying_importance: 0.5,
            overtaking_difficulty: 0.3,
            safety_car_risk: 0.2,
        }
    }
}

/// Driver form over a trailing window of rounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStat {
    pub avg_finish: f64,
    pub consistency: f64,
    pub dnf_risk: f64,
    pub qualifying_delta: f64, // Positive = gains places on race day
    pub form_score: f64,
    pub race_count: u32,
}

/// Constructor strength over a trailing window of rounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorStat {
    pub avg_finish: f64,
    pub points_per_race: f64,
    pub dnf_rate: f64,
    pub dominance_score: f64,
}

/// Winner probability distribution over the scored drivers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub winner: Option<String>,
    pub podium: Vec<String>,
    pub probabilities: BTreeMap<String, f64>,
}

impl FusionResult {
    /// The result returned when there is nothing to score
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.winner.is_none() && self.podium.is_empty() && self.probabilities.is_empty()
    }

    /// Drivers sorted by descending probability, ties by identifier
    pub fn ranking(&self) -> Vec<(&str, f64)> {
        let mut ranking: Vec<(&str, f64)> = self
            .probabilities
            .iter()
            .map(|(driver, &p)| (driver.as_str(), p))
            .collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranking
    }
}

/// Everything produced for one (season, round) prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub season: u32,
    pub round: u32,
    pub circuit: CircuitProfile,
    /// False when the round has no results yet; fusion then uses default factors
    pub circuit_observed: bool,
    pub drivers: BTreeMap<String, DriverStat>,
    pub constructors: BTreeMap<String, ConstructorStat>,
    pub assignment: BTreeMap<String, String>,
    pub result: FusionResult,
    pub explanations: Vec<String>,
}
