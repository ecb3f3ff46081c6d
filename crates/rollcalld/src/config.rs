use std::path::{Path, PathBuf};
use std::str::FromStr;

use rollcall_core::{DayBoundary, Policy, PolicyError};
use serde::Deserialize;
use thiserror::Error;

const CONFIG_PATH_VAR: &str = "ROLLCALL_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    Env { key: &'static str, value: String },
    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),
}

/// Which D-Bus bus the daemon registers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    Session,
    System,
}

impl FromStr for BusKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "system" => Ok(Self::System),
            _ => Err(()),
        }
    }
}

/// Optional TOML file; every field falls back to the built-in default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    similarity_threshold: Option<f64>,
    present_confidence: Option<f64>,
    confidence_cap: Option<f64>,
    day_offset_minutes: Option<i32>,
    bus: Option<BusKind>,
}

/// Daemon configuration: `$ROLLCALL_CONFIG` file, then `ROLLCALL_*` overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub policy: Policy,
    /// Fixed offset used to cut timestamps into calendar days.
    pub days: DayBoundary,
    pub bus: BusKind,
    /// Config file that was read, if any.
    pub source: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn load_with(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let source = lookup(CONFIG_PATH_VAR).map(PathBuf::from);
        let file = match &source {
            Some(path) => read_file(path)?,
            None => FileConfig::default(),
        };

        let defaults = Policy::default();
        let policy = Policy {
            similarity_threshold: env_parse(lookup, "ROLLCALL_SIMILARITY_THRESHOLD")?
                .or(file.similarity_threshold)
                .unwrap_or(defaults.similarity_threshold),
            present_confidence: env_parse(lookup, "ROLLCALL_PRESENT_CONFIDENCE")?
                .or(file.present_confidence)
                .unwrap_or(defaults.present_confidence),
            confidence_cap: env_parse(lookup, "ROLLCALL_CONFIDENCE_CAP")?
                .or(file.confidence_cap)
                .unwrap_or(defaults.confidence_cap),
        };
        policy.validate()?;

        let offset = env_parse(lookup, "ROLLCALL_DAY_OFFSET_MINUTES")?
            .or(file.day_offset_minutes)
            .unwrap_or(0);
        let days = DayBoundary::from_offset_minutes(offset)?;

        let bus = env_parse(lookup, "ROLLCALL_BUS")?
            .or(file.bus)
            .unwrap_or_default();

        Ok(Self {
            policy,
            days,
            bus,
            source,
        })
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn env_parse<T: FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let config = Config::load_with(&lookup_from(&[])).unwrap();
        assert_eq!(config.policy, Policy::default());
        assert_eq!(config.days, DayBoundary::utc());
        assert_eq!(config.bus, BusKind::Session);
        assert!(config.source.is_none());
    }

    #[test]
    fn test_file_then_env_override() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rollcall.toml");
        std::fs::write(
            &path,
            "similarity_threshold = 0.55\nday_offset_minutes = 330\nbus = \"system\"\n",
        )
        .unwrap();
        let path_str = path.display().to_string();

        let config = Config::load_with(&lookup_from(&[
            ("ROLLCALL_CONFIG", path_str.as_str()),
            ("ROLLCALL_SIMILARITY_THRESHOLD", "0.6"),
        ]))
        .unwrap();

        assert_eq!(config.policy.similarity_threshold, 0.6);
        assert_eq!(config.days.offset_minutes(), 330);
        assert_eq!(config.bus, BusKind::System);
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_unparseable_env_fails() {
        let err = Config::load_with(&lookup_from(&[("ROLLCALL_CONFIDENCE_CAP", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "ROLLCALL_CONFIDENCE_CAP", .. }));
    }

    #[test]
    fn test_invalid_policy_fails() {
        let err = Config::load_with(&lookup_from(&[("ROLLCALL_PRESENT_CONFIDENCE", "99")])).unwrap_err();
        assert!(matches!(err, ConfigError::Policy(PolicyError::PresentAboveCap { .. })));
    }

    #[test]
    fn test_unknown_file_key_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rollcall.toml");
        std::fs::write(&path, "treshold = 0.5\n").unwrap();
        let path_str = path.display().to_string();
        let err = Config::load_with(&lookup_from(&[("ROLLCALL_CONFIG", path_str.as_str())])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_fails() {
        let err = Config::load_with(&lookup_from(&[("ROLLCALL_CONFIG", "/nonexistent/rollcall.toml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
