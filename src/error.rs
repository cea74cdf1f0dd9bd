use thiserror::Error;

/// Failures of a race data source
#[derive(Debug, Error)]
pub enum SourceError {
    #[cfg(feature = "jolpica")]
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Request to {url} failed after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Cache I/O failed: {0}")]
    Cache(#[from] std::io::Error),

    #[error("Failed to load CSV: {0}")]
    Csv(#[from] polars::prelude::PolarsError),

    #[error("No race calendar for season {0}")]
    UnknownSeason(u32),
}

/// Failures surfaced to callers of the prediction core
///
/// Missing statistics are not errors: extractors return empty mappings and
/// fusion returns an empty result instead.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Invalid round {0}: rounds start at 1")]
    InvalidRound(u32),

    #[error("Invalid lookback window {0}: must be at least 1")]
    InvalidWindow(u32),

    #[error("Season {season} has no round {round}")]
    RoundNotFound { season: u32, round: u32 },

    #[error("Race data unavailable for season {season} round {round}: {source}")]
    DataUnavailable {
        season: u32,
        round: u32,
        #[source]
        source: SourceError,
    },
}

impl PredictError {
    pub(crate) fn unavailable(season: u32, round: u32, source: SourceError) -> Self {
        PredictError::DataUnavailable {
            season,
            round,
            source,
        }
    }

    /// True for both flavours of missing data (unknown round, failed fetch)
    pub fn is_data_unavailable(&self) -> bool {
        matches!(
            self,
            PredictError::RoundNotFound { .. } | PredictError::DataUnavailable { .. }
        )
    }
}

/// Validation functions
pub fn validate_round(round: u32) -> Result<(), PredictError> {
    if round == 0 {
        return Err(PredictError::InvalidRound(round));
    }
    Ok(())
}

pub fn validate_window(window: u32) -> Result<(), PredictError> {
    if window == 0 {
        return Err(PredictError::InvalidWindow(window));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_round() {
        assert!(validate_round(1).is_ok());
        assert!(validate_round(24).is_ok());
        assert!(validate_round(0).is_err());
    }

    #[test]
    fn test_validate_window() {
        assert!(validate_window(5).is_ok());
        assert!(validate_window(0).is_err());
    }

    #[test]
    fn test_data_unavailable_classification() {
        let err = PredictError::RoundNotFound {
            season: 2024,
            round: 30,
        };
        assert!(err.is_data_unavailable());
        assert!(err.to_string().contains("round 30"));

        let err = PredictError::unavailable(2024, 3, SourceError::UnknownSeason(2024));
        assert!(err.is_data_unavailable());
        assert!(err.to_string().contains("season 2024 round 3"));

        assert!(!PredictError::InvalidRound(0).is_data_unavailable());
    }
}
