use std::env;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_INPUT: &str = "shellhist";
pub const DEFAULT_OUTPUT: &str = "shellhist_pandas_stacked_bars.svg";
pub const DEFAULT_INTERVAL_SECONDS: u32 = 3600;
pub const DEFAULT_TOP_N: usize = 10;

const CONFIG_FILE: &str = ".shellhistrc";

/// What to do with a record whose timestamp cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampPolicy {
    /// Drop the record, like any other malformed line.
    #[default]
    Skip,
    /// Abort the run and name the offending line.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub interval_seconds: u32,
    pub top_n: usize,
    pub on_bad_timestamp: TimestampPolicy,
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            top_n: DEFAULT_TOP_N,
            on_bad_timestamp: TimestampPolicy::Skip,
        }
    }
}

impl ChartConfig {
    /// `~/.shellhistrc`, when `HOME` is set.
    pub fn default_path() -> Option<PathBuf> {
        let home = env::var("HOME").ok()?;
        Some(PathBuf::from(home).join(CONFIG_FILE))
    }

    /// Loads the configuration file. An explicit path must exist; the
    /// default `~/.shellhistrc` is optional and falls back to built-in
    /// defaults when absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(ChartConfig::default()),
            },
        };

        let config_str = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let config = Self::from_toml(&config_str)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses only; ranges are checked by `validate` once flags are merged.
    pub fn from_toml(config_str: &str) -> Result<Self> {
        toml::from_str(config_str).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.interval()?;
        if self.top_n == 0 {
            return Err(Error::Config("top_n must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Result<NonZeroU32> {
        NonZeroU32::new(self.interval_seconds)
            .ok_or_else(|| Error::Config("interval_seconds must be greater than 0".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_hourly_top_ten_chart() {
        let config = ChartConfig::default();
        assert_eq!(config.input, PathBuf::from("shellhist"));
        assert_eq!(config.output, PathBuf::from("shellhist_pandas_stacked_bars.svg"));
        assert_eq!(config.interval_seconds, 3600);
        assert_eq!(config.top_n, 10);
        assert_eq!(config.on_bad_timestamp, TimestampPolicy::Skip);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config = ChartConfig::from_toml("top_n = 3\non_bad_timestamp = \"fail\"\n").unwrap();
        assert_eq!(config.top_n, 3);
        assert_eq!(config.on_bad_timestamp, TimestampPolicy::Fail);
        assert_eq!(config.interval_seconds, 3600);
        assert_eq!(config.input, PathBuf::from("shellhist"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = ChartConfig::from_toml("interval_seconds = 0").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(config.interval().is_err());
    }

    #[test]
    fn zero_top_n_is_rejected() {
        let config = ChartConfig::from_toml("top_n = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_values_still_parse() {
        let config = ChartConfig::from_toml("interval_seconds = 0\ntop_n = 0\n").unwrap();
        assert_eq!(config.interval_seconds, 0);
        assert_eq!(config.top_n, 0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ChartConfig::from_toml("colour = \"red\"").is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_io_error() {
        let err = ChartConfig::load(Some(Path::new("/nonexistent/shellhistrc"))).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
