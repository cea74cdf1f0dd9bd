//! In-memory race data

use std::collections::HashMap;

use super::RaceDataSource;
use crate::error::SourceError;
use crate::models::{RaceInfo, RaceResult};

/// Race data held in memory, keyed by season and (season, round)
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    calendars: HashMap<u32, Vec<RaceInfo>>,
    results: HashMap<(u32, u32), Vec<RaceResult>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a race to its season calendar, keeping rounds ordered
    pub fn with_race(mut self, race: RaceInfo) -> Self {
        let calendar = self.calendars.entry(race.season).or_default();
        calendar.retain(|r| r.round != race.round);
        calendar.push(race);
        calendar.sort_by_key(|r| r.round);
        self
    }

    pub fn with_results(mut self, season: u32, round: u32, results: Vec<RaceResult>) -> Self {
        self.results.insert((season, round), results);
        self
    }
}

impl RaceDataSource for MemorySource {
    async fn races(&self, season: u32) -> Result<Vec<RaceInfo>, SourceError> {
        self.calendars
            .get(&season)
            .cloned()
            .ok_or(SourceError::UnknownSeason(season))
    }

    async fn results(&self, season: u32, round: u32) -> Result<Vec<RaceResult>, SourceError> {
        Ok(self
            .results
            .get(&(season, round))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race(round: u32) -> RaceInfo {
        RaceInfo {
            season: 2024,
            round,
            race_name: format!("Round {}", round),
            circuit_id: format!("circuit_{}", round),
            circuit_name: format!("Circuit {}", round),
            locality: "Town".to_string(),
            country: "Country".to_string(),
            laps: None,
        }
    }

    #[tokio::test]
    async fn test_calendar_is_ordered_and_deduplicated() {
        let source = MemorySource::new()
            .with_race(race(3))
            .with_race(race(1))
            .with_race(race(3));

        let races = source.races(2024).await.unwrap();
        let rounds: Vec<u32> = races.iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_unknown_season_and_missing_round() {
        let source = MemorySource::new().with_race(race(1));

        assert!(matches!(
            source.races(1999).await,
            Err(SourceError::UnknownSeason(1999))
        ));
        assert!(source.results(2024, 7).await.unwrap().is_empty());
    }
}
