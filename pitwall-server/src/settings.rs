//! Server settings
//!
//! Loaded from an optional JSON file, then overridden from the environment.
//! The file is `$PITWALL_CONFIG` if set, else `<config dir>/pitwall/config.json`.

use anyhow::{Context, Result};
use pitwall_core::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Events buffered per subscriber before a slow one starts losing them
    pub event_capacity: usize,
    pub engine: EngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9100,
            event_capacity: 256,
            engine: EngineConfig::default(),
        }
    }
}

impl Settings {
    /// Settings file location, if one can be determined
    pub fn config_path() -> Option<PathBuf> {
        match std::env::var_os("PITWALL_CONFIG") {
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::config_dir().map(|dir| dir.join("pitwall").join("config.json")),
        }
    }

    /// File (when present) plus process environment
    pub fn load() -> Result<Self> {
        let mut settings = match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        settings
            .engine
            .validate()
            .context("invalid engine configuration")?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let settings = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Apply `PITWALL_*` overrides from `lookup`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(val) = lookup("PITWALL_HOST") {
            self.host = val;
        }
        if let Some(val) = lookup("PITWALL_PORT") {
            self.port = val.parse().context("PITWALL_PORT must be a port number")?;
        }
        if let Some(val) = lookup("PITWALL_TOTAL_LAPS") {
            self.engine.session.total_laps = val.parse().context("PITWALL_TOTAL_LAPS must be a number")?;
        }
        if let Some(val) = lookup("PITWALL_NUM_CARS") {
            self.engine.session.num_cars = val.parse().context("PITWALL_NUM_CARS must be a number")?;
        }
        if let Some(val) = lookup("PITWALL_SEED") {
            self.engine.seed = val.parse().context("PITWALL_SEED must be an unsigned integer")?;
        }
        Ok(())
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.engine.session.total_laps, 50);
        assert_eq!(settings.addr().unwrap().port(), 9100);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"port": 8080, "engine": {"session": {"total_laps": 12}}}"#).unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.engine.session.total_laps, 12);
        assert_eq!(settings.engine.session.num_cars, 20);
        assert_eq!(settings.engine.detection.max_cars_in_pit, 3);
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env_overrides(env(&[
                ("PITWALL_HOST", "127.0.0.1"),
                ("PITWALL_PORT", "7000"),
                ("PITWALL_TOTAL_LAPS", "3"),
                ("PITWALL_NUM_CARS", "6"),
                ("PITWALL_SEED", "42"),
            ]))
            .unwrap();
        assert_eq!(settings.addr().unwrap(), "127.0.0.1:7000".parse().unwrap());
        assert_eq!(settings.engine.session.total_laps, 3);
        assert_eq!(settings.engine.session.num_cars, 6);
        assert_eq!(settings.engine.seed, 42);
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut settings = Settings::default();
        assert!(settings.apply_env_overrides(env(&[("PITWALL_PORT", "lots")])).is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("pitwall-settings-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"event_capacity": 16}"#).unwrap();
        let settings = Settings::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(settings.event_capacity, 16);
        assert!(Settings::from_file(&path).is_err());
    }
}
