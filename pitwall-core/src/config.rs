//! Engine configuration
//!
//! Every field has a default so a partial JSON document (or none at all)
//! yields a runnable configuration.

use crate::error::ConfigError;
use crate::model::SessionType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for every deterministic noise source
    pub seed: u64,
    pub session: SessionConfig,
    pub simulation: SimulationConfig,
    pub weather: WeatherConfig,
    pub detection: DetectionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED_2024,
            session: SessionConfig::default(),
            simulation: SimulationConfig::default(),
            weather: WeatherConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.tick_interval_ms == 0 {
            return Err(ConfigError::NotPositive("session.tick_interval_ms"));
        }
        if self.session.weather_interval_ms == 0 {
            return Err(ConfigError::NotPositive("session.weather_interval_ms"));
        }
        if self.session.total_laps == 0 {
            return Err(ConfigError::NotPositive("session.total_laps"));
        }
        if self.simulation.grip_threshold <= 0.0 {
            return Err(ConfigError::NotPositive("simulation.grip_threshold"));
        }
        if self.weather.drying_period_s <= 0.0 {
            return Err(ConfigError::NotPositive("weather.drying_period_s"));
        }
        let pct = self.detection.speed_threshold_pct;
        if !(0.0..=1.0).contains(&pct) {
            return Err(ConfigError::OutOfRange {
                field: "detection.speed_threshold_pct",
                min: 0.0,
                max: 1.0,
                value: pct,
            });
        }
        if self.detection.warning_threshold > self.detection.max_cars_in_pit {
            return Err(ConfigError::PitThresholds {
                warning: self.detection.warning_threshold,
                max: self.detection.max_cars_in_pit,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub session_type: SessionType,
    pub total_laps: u32,
    pub num_cars: usize,
    /// Simulated time per tick, independent of wall-clock jitter
    pub tick_interval_ms: u64,
    pub weather_interval_ms: u64,
    /// How long a sector yellow stays out after an incident
    pub yellow_flag_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_type: SessionType::Race,
            total_laps: 50,
            num_cars: 20,
            tick_interval_ms: 50,
            weather_interval_ms: 10_000,
            yellow_flag_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub grid_speed_kph: f64,
    /// Gap between consecutive grid slots, in track points
    pub grid_spacing_points: f64,
    pub accel_kph_per_s: f64,
    pub brake_kph_per_s: f64,
    /// Amplitude of per-car target speed noise
    pub speed_noise_kph: f64,
    /// Grip below this scales the sector ceiling down proportionally
    pub grip_threshold: f64,
    /// Fractional ceiling increase while DRS is enabled
    pub drs_boost_pct: f64,
    pub drs_min_speed_kph: f64,
    pub drs_corner_lookahead_points: f64,
    pub limp_speed_kph: f64,
    pub fuel_burn_pct_per_km: f64,
    pub fuel_reserve_pct: f64,
    pub pit_lane_speed_kph: f64,
    pub pit_stop_duration_ms: u64,
    /// Schedule stops automatically on worn tires or low fuel
    pub auto_pit: bool,
    /// Chance of a spontaneous fault per car per tick
    pub fault_probability: f64,
    pub fault_duration_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_speed_kph: 90.0,
            grid_spacing_points: 1.0,
            accel_kph_per_s: 60.0,
            brake_kph_per_s: 180.0,
            speed_noise_kph: 6.0,
            grip_threshold: 80.0,
            drs_boost_pct: 0.06,
            drs_min_speed_kph: 200.0,
            drs_corner_lookahead_points: 3.0,
            limp_speed_kph: 60.0,
            fuel_burn_pct_per_km: 0.6,
            fuel_reserve_pct: 8.0,
            pit_lane_speed_kph: 80.0,
            pit_stop_duration_ms: 22_000,
            auto_pit: true,
            fault_probability: 0.00002,
            fault_duration_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub initial_rain: f64,
    /// Maximum change of the shared rain front per evolution step
    pub rain_step: f64,
    /// Drift added to every rain front step; negative favours drying
    pub rain_bias: f64,
    /// Maximum per-sector deviation from the shared front
    pub sector_spread: f64,
    pub temp_step: f64,
    pub ambient_temp: f64,
    pub track_temp_offset: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    /// Dry running time after which a wet track has fully recovered
    pub drying_period_s: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            initial_rain: 0.0,
            rain_step: 6.0,
            rain_bias: -0.5,
            sector_spread: 5.0,
            temp_step: 0.3,
            ambient_temp: 24.0,
            track_temp_offset: 12.0,
            humidity: 50.0,
            wind_speed: 10.0,
            wind_direction: 180.0,
            drying_period_s: 120.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Rolling window for the per-car baseline speed
    pub slowdown_window_ms: u64,
    /// Fraction below the baseline that counts as a slowdown
    pub speed_threshold_pct: f64,
    /// Absolute floor a slowed car must also be under
    pub minimum_speed_kph: f64,
    /// Continuous slowdown time before an incident is raised
    pub escalation_after_ms: u64,
    pub warning_threshold: usize,
    pub max_cars_in_pit: usize,
    pub grip_alert_threshold: f64,
    pub fuel_warning_pct: f64,
    pub alert_history_limit: usize,
    pub incident_history_limit: usize,
    pub cooldown_prune_interval_ms: u64,
    pub cooldowns: CooldownConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            slowdown_window_ms: 10_000,
            speed_threshold_pct: 0.3,
            minimum_speed_kph: 150.0,
            escalation_after_ms: 3_000,
            warning_threshold: 2,
            max_cars_in_pit: 3,
            grip_alert_threshold: 60.0,
            fuel_warning_pct: 12.0,
            alert_history_limit: 100,
            incident_history_limit: 50,
            cooldown_prune_interval_ms: 30_000,
            cooldowns: CooldownConfig::default(),
        }
    }
}

/// Minimum time between repeats of one alert kind for the same subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    pub slowdown_ms: u64,
    pub weather_ms: u64,
    pub pit_congestion_ms: u64,
    pub incident_ms: u64,
    pub strategy_ms: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            slowdown_ms: 5_000,
            weather_ms: 10_000,
            pit_congestion_ms: 5_000,
            incident_ms: 5_000,
            strategy_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "seed": 7, "session": { "total_laps": 5 }, "detection": { "cooldowns": { "slowdown_ms": 1000 } } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.session.total_laps, 5);
        assert_eq!(config.session.tick_interval_ms, 50);
        assert_eq!(config.detection.cooldowns.slowdown_ms, 1000);
        assert_eq!(config.detection.cooldowns.weather_ms, 10_000);
        assert_eq!(config.simulation, SimulationConfig::default());
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_tick() {
        let mut config = EngineConfig::default();
        config.session.tick_interval_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive("session.tick_interval_ms"))
        );
    }

    #[test]
    fn test_validate_rejects_inverted_pit_thresholds() {
        let mut config = EngineConfig::default();
        config.detection.warning_threshold = 4;
        assert_eq!(
            config.validate(),
            Err(ConfigError::PitThresholds { warning: 4, max: 3 })
        );
    }
}
