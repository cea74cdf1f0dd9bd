//! Runtime configuration
//!
//! - `Settings`: environment-driven service settings (API base, cache location, TTL tiers)
//! - `FusionConfig`: softmax temperature and the constructor priors table, loaded from JSON

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

const DEFAULT_JOLPICA_BASE: &str = "https://api.jolpi.ca/ergast/f1";
const DEFAULT_CACHE_DIR: &str = "data/cache";
const DEFAULT_TEMPERATURE: f64 = 5.0;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Temperature must be finite and positive, got {0}")]
    InvalidTemperature(f64),
}

/// Cache lifetimes in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlTiers {
    pub short: u64,
    pub medium: u64,
    pub long: u64,
}

impl Default for TtlTiers {
    fn default() -> Self {
        Self {
            short: 3_600,   // 1 hour
            medium: 21_600, // 6 hours
            long: 604_800,  // 7 days
        }
    }
}

/// Service settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub jolpica_base: String,
    pub cache_dir: PathBuf,
    pub ttl: TtlTiers,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jolpica_base: DEFAULT_JOLPICA_BASE.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            ttl: TtlTiers::default(),
        }
    }
}

impl Settings {
    /// Read settings from the process environment
    ///
    /// Recognized variables: `JOLPICA_BASE`, `PITWALL_CACHE_DIR`, `TTL_SHORT`,
    /// `TTL_MED`, `TTL_LONG`. Missing or unparseable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let ttl = TtlTiers {
            short: parse_or(&lookup, "TTL_SHORT", defaults.ttl.short),
            medium: parse_or(&lookup, "TTL_MED", defaults.ttl.medium),
            long: parse_or(&lookup, "TTL_LONG", defaults.ttl.long),
        };

        Self {
            jolpica_base: lookup("JOLPICA_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.jolpica_base),
            cache_dir: lookup("PITWALL_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            ttl,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

/// Fusion calibration settings
///
/// ```json
/// { "temperature": 5.0, "priors": { "red_bull": 0.6, "ferrari": 0.25 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Softmax sharpness; standardized score gaps are multiplied by it
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Constructor identifier -> additive boost on the standardized score
    #[serde(default)]
    pub priors: BTreeMap<String, f64>,
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            priors: BTreeMap::new(),
        }
    }
}

impl FusionConfig {
    /// Load from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validated()
    }

    pub fn with_temperature(mut self, temperature: f64) -> Result<Self, ConfigError> {
        self.temperature = temperature;
        self.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        Ok(self)
    }

    /// Boost for a constructor, 0 when unassigned or not in the table
    pub fn prior_for(&self, constructor_id: Option<&str>) -> f64 {
        constructor_id
            .and_then(|id| self.priors.get(id))
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.ttl.long, 604_800);
    }

    #[test]
    fn test_settings_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("JOLPICA_BASE", "http://localhost:8000/ergast/f1/"),
            ("PITWALL_CACHE_DIR", "/tmp/pitwall"),
            ("TTL_SHORT", "60"),
            ("TTL_LONG", "not-a-number"),
        ]);
        let settings = Settings::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.jolpica_base, "http://localhost:8000/ergast/f1");
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/pitwall"));
        assert_eq!(settings.ttl.short, 60);
        assert_eq!(settings.ttl.medium, 21_600);
        assert_eq!(settings.ttl.long, 604_800);
    }

    #[test]
    fn test_fusion_config_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"priors": {{"red_bull": 0.6, "mercedes": 0.1}}}}"#).unwrap();

        let config = FusionConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.temperature, 5.0);
        assert_eq!(config.prior_for(Some("red_bull")), 0.6);
        assert_eq!(config.prior_for(Some("haas")), 0.0);
        assert_eq!(config.prior_for(None), 0.0);
    }

    #[test]
    fn test_fusion_config_rejects_bad_temperature() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"temperature": 0.0}}"#).unwrap();
        assert!(matches!(
            FusionConfig::load_from_file(file.path()),
            Err(ConfigError::InvalidTemperature(_))
        ));

        assert!(FusionConfig::default().with_temperature(-1.0).is_err());
        assert!(FusionConfig::default().with_temperature(2.5).is_ok());
    }

    #[test]
    fn test_bundled_priors() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/priors.json");
        let config = FusionConfig::load_from_file(path).unwrap();
        assert_eq!(config.prior_for(Some("red_bull")), 0.6);
        assert_eq!(config.priors.len(), 4);
    }

    #[test]
    fn test_fusion_config_missing_file() {
        let err = FusionConfig::load_from_file("/nonexistent/priors.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
