//! Pitwall - Formula 1 race winner prediction
//!
//! This library provides:
//! - Circuit profiling, driver form and constructor dominance extraction
//! - Fusion of those signals into a calibrated winner probability distribution
//! - Template explanations of a prediction
//! - Race data sources: Jolpica (Ergast-compatible) API with disk cache, CSV, in-memory
//!
//! # Example
//!
//! ```no_run
//! use pitwall::data::CsvSource;
//! use pitwall::pipeline::{PredictorSettings, RacePredictor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = CsvSource::load("data/2024")?;
//! let predictor = RacePredictor::new(source, PredictorSettings::default())?;
//!
//! let prediction = predictor.predict(2024, 5).await?;
//! println!("Winner: {:?}", prediction.result.winner);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod explain;
pub mod features;
pub mod fusion;
pub mod models;
pub mod pipeline;

// Re-export commonly used types
pub use config::{FusionConfig, Settings};
pub use error::{PredictError, SourceError};
pub use fusion::FusionScorer;
pub use models::{
    CircuitProfile, ConstructorStat, DriverStat, FusionResult, Prediction, RaceInfo, RaceResult,
};
pub use pipeline::{PredictorSettings, RacePredictor};
