//! Offline race data loaded from CSV
//!
//! Expects two files in one directory:
//! - `races.csv`: season, round, race_name, circuit_id, circuit_name, locality, country[, laps]
//! - `results.csv`: season, round, driver_id, constructor_id, grid, position, status, points[, laps]
//!
//! Rows keep their file order within a round. Empty or non-numeric cells in
//! nullable columns become `None`; rows without identifiers are skipped.

use polars::prelude::*;
use std::path::Path;
use tracing::{debug, info};

use super::{is_finished_status, MemorySource, RaceDataSource};
use crate::error::SourceError;
use crate::models::{RaceInfo, RaceResult};

/// Race data indexed from a CSV directory
#[derive(Debug, Clone)]
pub struct CsvSource {
    inner: MemorySource,
}

impl CsvSource {
    /// Load and index `races.csv` and `results.csv` from `dir`
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let races = load_races(&dir.join("races.csv"))?;
        let results = load_results(&dir.join("results.csv"))?;

        let race_count = races.len();
        let result_count: usize = results.iter().map(|(_, _, r)| r.len()).sum();

        let mut inner = MemorySource::new();
        for race in races {
            inner = inner.with_race(race);
        }
        for (season, round, entries) in results {
            inner = inner.with_results(season, round, entries);
        }

        info!(
            "Loaded {} races and {} result rows from {:?}",
            race_count, result_count, dir
        );

        Ok(Self { inner })
    }
}

impl RaceDataSource for CsvSource {
    async fn races(&self, season: u32) -> Result<Vec<RaceInfo>, SourceError> {
        self.inner.races(season).await
    }

    async fn results(&self, season: u32, round: u32) -> Result<Vec<RaceResult>, SourceError> {
        self.inner.results(season, round).await
    }
}

fn read_csv(path: &Path) -> Result<DataFrame, PolarsError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

fn cast_column(df: &DataFrame, name: &str, dtype: &DataType) -> Result<Column, PolarsError> {
    df.column(name)?.cast(dtype)
}

/// Cast a column that may be absent from the file
fn cast_optional_column(
    df: &DataFrame,
    name: &str,
    dtype: &DataType,
) -> Result<Option<Column>, PolarsError> {
    match df.column(name) {
        Ok(column) => Ok(Some(column.cast(dtype)?)),
        Err(_) => Ok(None),
    }
}

fn positive(value: Option<i64>) -> Option<u32> {
    value.filter(|&v| v >= 1).and_then(|v| u32::try_from(v).ok())
}

fn load_races(path: &Path) -> Result<Vec<RaceInfo>, SourceError> {
    let df = read_csv(path)?;

    let season = cast_column(&df, "season", &DataType::Int64)?;
    let round = cast_column(&df, "round", &DataType::Int64)?;
    let race_name = cast_column(&df, "race_name", &DataType::String)?;
    let circuit_id = cast_column(&df, "circuit_id", &DataType::String)?;
    let circuit_name = cast_column(&df, "circuit_name", &DataType::String)?;
    let locality = cast_column(&df, "locality", &DataType::String)?;
    let country = cast_column(&df, "country", &DataType::String)?;
    let laps = cast_optional_column(&df, "laps", &DataType::Int64)?;

    let season_col = season.i64()?;
    let round_col = round.i64()?;
    let race_name_col = race_name.str()?;
    let circuit_id_col = circuit_id.str()?;
    let circuit_name_col = circuit_name.str()?;
    let locality_col = locality.str()?;
    let country_col = country.str()?;
    let laps_col = laps.as_ref().map(|c| c.i64()).transpose()?;

    let mut races = Vec::with_capacity(df.height());

    for i in 0..df.height() {
        let (Some(season), Some(round)) = (positive(season_col.get(i)), positive(round_col.get(i)))
        else {
            debug!("Skipping race row {} without season/round", i);
            continue;
        };

        races.push(RaceInfo {
            season,
            round,
            race_name: race_name_col.get(i).unwrap_or_default().to_string(),
            circuit_id: circuit_id_col.get(i).unwrap_or_default().to_string(),
            circuit_name: circuit_name_col.get(i).unwrap_or_default().to_string(),
            locality: locality_col.get(i).unwrap_or_default().to_string(),
            country: country_col.get(i).unwrap_or_default().to_string(),
            laps: positive(laps_col.and_then(|c| c.get(i))),
        });
    }

    Ok(races)
}

/// Results grouped by (season, round) in first-seen order
fn load_results(path: &Path) -> Result<Vec<(u32, u32, Vec<RaceResult>)>, SourceError> {
    let df = read_csv(path)?;

    let season = cast_column(&df, "season", &DataType::Int64)?;
    let round = cast_column(&df, "round", &DataType::Int64)?;
    let driver_id = cast_column(&df, "driver_id", &DataType::String)?;
    let constructor_id = cast_column(&df, "constructor_id", &DataType::String)?;
    let grid = cast_column(&df, "grid", &DataType::Int64)?;
    let position = cast_column(&df, "position", &DataType::Int64)?;
    let status = cast_column(&df, "status", &DataType::String)?;
    let points = cast_column(&df, "points", &DataType::Float64)?;
    let laps = cast_optional_column(&df, "laps", &DataType::Int64)?;

    let season_col = season.i64()?;
    let round_col = round.i64()?;
    let driver_col = driver_id.str()?;
    let constructor_col = constructor_id.str()?;
    let grid_col = grid.i64()?;
    let position_col = position.i64()?;
    let status_col = status.str()?;
    let points_col = points.f64()?;
    let laps_col = laps.as_ref().map(|c| c.i64()).transpose()?;

    let mut grouped: Vec<(u32, u32, Vec<RaceResult>)> = Vec::new();

    for i in 0..df.height() {
        let (Some(season), Some(round), Some(driver), Some(constructor)) = (
            positive(season_col.get(i)),
            positive(round_col.get(i)),
            driver_col.get(i).filter(|s| !s.is_empty()),
            constructor_col.get(i).filter(|s| !s.is_empty()),
        ) else {
            debug!("Skipping result row {} without identifiers", i);
            continue;
        };

        let result = RaceResult {
            driver_id: driver.to_string(),
            constructor_id: constructor.to_string(),
            grid: positive(grid_col.get(i)),
            position: positive(position_col.get(i)),
            finished: status_col.get(i).is_some_and(is_finished_status),
            points: points_col.get(i).filter(|p| p.is_finite() && *p >= 0.0),
            laps: positive(laps_col.and_then(|c| c.get(i))),
        };

        match grouped
            .iter_mut()
            .find(|(s, r, _)| *s == season && *r == round)
        {
            Some((_, _, entries)) => entries.push(result),
            None => grouped.push((season, round, vec![result])),
        }
    }

    Ok(grouped)
}
