//! Weather engine
//!
//! One zone per sector. A shared rain front drifts as a bounded random walk,
//! each sector sitting a little above or below it. Grip follows the worse of
//! current rain and residual track wetness, which fades as the sector runs dry.

use crate::noise::{self, channel};
use pitwall_core::config::WeatherConfig;
use pitwall_core::model::{TrackModel, WeatherCondition, WeatherZone};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Grip lost per point of effective wetness
const GRIP_LOSS_PER_RAIN: f64 = 0.75;

/// Band the ambient temperature may wander within, around the configured base
const AMBIENT_BAND: f64 = 6.0;

const MAX_WIND_KPH: f64 = 60.0;

/// Zone plus the surface state that is not published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneState {
    pub zone: WeatherZone,
    /// Highest rain intensity since the surface last dried
    pub wetness: f64,
    /// Seconds without rain
    pub dry_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherState {
    pub step: u64,
    pub rain_front: f64,
    pub zones: Vec<ZoneState>,
}

pub struct WeatherEngine {
    config: WeatherConfig,
    seed: u64,
    state: WeatherState,
}

/// Grip for a given rain intensity and drying progress
pub fn grip_level(rain: f64, wetness: f64, dry_secs: f64, drying_period_s: f64) -> f64 {
    let residual = wetness * (1.0 - dry_secs / drying_period_s).clamp(0.0, 1.0);
    (100.0 - GRIP_LOSS_PER_RAIN * rain.max(residual)).clamp(0.0, 100.0)
}

fn finite_or(value: f64, fallback: f64, field: &str, sector_id: u8) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!(sector = sector_id, field, "non-finite weather value, resetting");
        fallback
    }
}

impl WeatherEngine {
    pub fn new(track: &TrackModel, config: WeatherConfig, seed: u64) -> Self {
        let rain = config.initial_rain.clamp(0.0, 100.0);
        let zones = track
            .sectors
            .iter()
            .map(|sector| ZoneState {
                zone: WeatherZone {
                    sector_id: sector.id,
                    condition: WeatherCondition::from_rain_intensity(rain),
                    temperature: config.ambient_temp,
                    track_temp: config.ambient_temp + config.track_temp_offset,
                    humidity: config.humidity,
                    wind_speed: config.wind_speed,
                    wind_direction: config.wind_direction,
                    rain_intensity: rain,
                    grip_level: grip_level(rain, rain, 0.0, config.drying_period_s),
                },
                wetness: rain,
                dry_secs: 0.0,
            })
            .collect();

        Self {
            state: WeatherState {
                step: 0,
                rain_front: rain,
                zones,
            },
            config,
            seed,
        }
    }

    /// Resume from a previously captured state
    pub fn from_state(config: WeatherConfig, seed: u64, state: WeatherState) -> Self {
        Self { config, seed, state }
    }

    pub fn state(&self) -> &WeatherState {
        &self.state
    }

    pub fn zones(&self) -> Vec<WeatherZone> {
        self.state.zones.iter().map(|z| z.zone.clone()).collect()
    }

    pub fn zone_for_sector(&self, sector_id: u8) -> Option<&WeatherZone> {
        self.state
            .zones
            .iter()
            .map(|z| &z.zone)
            .find(|z| z.sector_id == sector_id)
    }

    /// Grip for a sector; unknown sectors are treated as fully dry
    pub fn grip_for_sector(&self, sector_id: u8) -> f64 {
        self.zone_for_sector(sector_id)
            .map(|z| z.grip_level)
            .unwrap_or(100.0)
    }

    /// Advance every zone by `dt_secs` and return the full recomputed list
    pub fn evolve(&mut self, dt_secs: f64) -> Vec<WeatherZone> {
        let cfg = &self.config;
        let seed = self.seed;
        self.state.step += 1;
        let step = self.state.step;

        let front_move = noise::jitter(seed, step, noise::salt(channel::RAIN_FRONT, 0), cfg.rain_step);
        let front = finite_or(self.state.rain_front + front_move + cfg.rain_bias, 0.0, "rain_front", 0);
        self.state.rain_front = front.clamp(0.0, 100.0);
        let front = self.state.rain_front;

        for zs in &mut self.state.zones {
            let id = zs.zone.sector_id;
            let subject = id as u64;
            let zone = &mut zs.zone;

            let rain = if front > 0.0 {
                let offset = noise::jitter(seed, step, noise::salt(channel::RAIN_SECTOR, subject), cfg.sector_spread);
                (front + offset).clamp(0.0, 100.0)
            } else {
                0.0
            };
            zone.rain_intensity = rain;

            if rain > 0.0 {
                zs.wetness = zs.wetness.max(rain);
                zs.dry_secs = 0.0;
            } else {
                zs.dry_secs += dt_secs.max(0.0);
                if zs.dry_secs >= cfg.drying_period_s {
                    zs.wetness = 0.0;
                }
            }
            zone.grip_level = finite_or(
                grip_level(rain, zs.wetness, zs.dry_secs, cfg.drying_period_s),
                100.0,
                "grip_level",
                id,
            );
            zone.condition = WeatherCondition::from_rain_intensity(rain);

            let ambient = zone.temperature
                + noise::jitter(seed, step, noise::salt(channel::AMBIENT, subject), cfg.temp_step)
                - rain * 0.002;
            zone.temperature = finite_or(ambient, cfg.ambient_temp, "temperature", id).clamp(
                cfg.ambient_temp - AMBIENT_BAND,
                cfg.ambient_temp + AMBIENT_BAND,
            );
            zone.track_temp = zone.temperature + cfg.track_temp_offset * (1.0 - 0.6 * rain / 100.0);

            let humidity = zone.humidity + noise::jitter(seed, step, noise::salt(channel::HUMIDITY, subject), 1.5);
            zone.humidity = finite_or(humidity, cfg.humidity, "humidity", id)
                .max(40.0 + rain * 0.6)
                .clamp(0.0, 100.0);

            let wind = zone.wind_speed + noise::jitter(seed, step, noise::salt(channel::WIND_SPEED, subject), 1.0);
            zone.wind_speed = finite_or(wind, cfg.wind_speed, "wind_speed", id).clamp(0.0, MAX_WIND_KPH);

            let direction = zone.wind_direction
                + noise::jitter(seed, step, noise::salt(channel::WIND_DIRECTION, subject), 5.0);
            let direction = finite_or(direction, cfg.wind_direction, "wind_direction", id).rem_euclid(360.0);
            zone.wind_direction = if direction >= 360.0 { 0.0 } else { direction };
        }

        debug!(step, rain_front = front, "weather evolved");
        self.zones()
    }

    /// Force a sector's rain intensity, recomputing grip and condition
    pub fn set_rain(&mut self, sector_id: u8, rain: f64) -> bool {
        let drying = self.config.drying_period_s;
        let Some(zs) = self
            .state
            .zones
            .iter_mut()
            .find(|z| z.zone.sector_id == sector_id)
        else {
            return false;
        };
        let rain = rain.clamp(0.0, 100.0);
        if rain > 0.0 {
            zs.wetness = zs.wetness.max(rain);
            zs.dry_secs = 0.0;
        }
        zs.zone.rain_intensity = rain;
        zs.zone.grip_level = grip_level(rain, zs.wetness, zs.dry_secs, drying);
        zs.zone.condition = WeatherCondition::from_rain_intensity(rain);
        true
    }
}
