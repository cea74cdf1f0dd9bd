//! Race data sources
//!
//! Everything the extractors read goes through [`RaceDataSource`]:
//! - `JolpicaClient`: remote Ergast-compatible API with retry and disk cache
//! - `CsvSource`: offline `races.csv` / `results.csv` directory
//! - `MemorySource`: in-memory fixtures

pub mod cache;
pub mod csv_loader;
#[cfg(feature = "jolpica")]
pub mod jolpica;
pub mod memory;

use crate::error::SourceError;
use crate::models::{RaceInfo, RaceResult};

pub use cache::ResponseCache;
pub use csv_loader::CsvSource;
#[cfg(feature = "jolpica")]
pub use jolpica::{ClientConfig, JolpicaClient};
pub use memory::MemorySource;

/// Read access to historical race data
///
/// Implementations take `&self` and may be queried by several extractors at
/// once. Both calls are idempotent.
#[allow(async_fn_in_trait)]
pub trait RaceDataSource {
    /// Calendar of a season
    async fn races(&self, season: u32) -> Result<Vec<RaceInfo>, SourceError>;

    /// Results of one round, in classification order; empty if not yet run
    async fn results(&self, season: u32, round: u32) -> Result<Vec<RaceResult>, SourceError>;
}

impl<T: RaceDataSource + ?Sized> RaceDataSource for &T {
    async fn races(&self, season: u32) -> Result<Vec<RaceInfo>, SourceError> {
        (**self).races(season).await
    }

    async fn results(&self, season: u32, round: u32) -> Result<Vec<RaceResult>, SourceError> {
        (**self).results(season, round).await
    }
}

/// Find a round in a season calendar
pub fn find_round(races: &[RaceInfo], round: u32) -> Option<&RaceInfo> {
    races.iter().find(|r| r.round == round)
}

/// Status strings that count as a classified finish
///
/// Lapped cars ("+1 Lap", "+3 Laps", "Lapped") are classified finishers.
pub fn is_finished_status(status: &str) -> bool {
    let status = status.trim();
    status == "Finished" || status == "Lapped" || (status.starts_with('+') && status.contains("Lap"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_status() {
        assert!(is_finished_status("Finished"));
        assert!(is_finished_status("+1 Lap"));
        assert!(is_finished_status("+2 Laps"));
        assert!(is_finished_status("Lapped"));
        assert!(!is_finished_status("Engine"));
        assert!(!is_finished_status("Collision"));
        assert!(!is_finished_status("Retired"));
        assert!(!is_finished_status("Did not start"));
    }

    #[test]
    fn test_find_round() {
        let races = vec![RaceInfo {
            season: 2024,
            round: 5,
            race_name: "Chinese Grand Prix".to_string(),
            circuit_id: "shanghai".to_string(),
            circuit_name: "Shanghai International Circuit".to_string(),
            locality: "Shanghai".to_string(),
            country: "China".to_string(),
            laps: None,
        }];

        assert_eq!(find_round(&races, 5).unwrap().circuit_id, "shanghai");
        assert!(find_round(&races, 6).is_none());
    }
}
