//! Simulation engine
//!
//! Owns the car store and advances every car by one fixed tick. Cars never
//! read each other's state during a step, so the update order does not
//! matter; the telemetry snapshot is taken only after all cars have moved.

use crate::clock::TickContext;
use crate::noise::{self, channel, smoothstep};
use crate::weather::WeatherEngine;
use chrono::{DateTime, Utc};
use pitwall_core::config::SimulationConfig;
use pitwall_core::error::SessionError;
use pitwall_core::model::{
    CarId, CarTelemetry, PitStop, Position, Roster, Sector, SectorProfile, TireCompound,
    TrackModel, HEAVY_RAIN_THRESHOLD, WET_RAIN_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Car state
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Mechanical,
    Spin,
}

/// Temporary problem limiting a car to limp speed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub remaining_ms: u64,
    /// Already reported in a step outcome
    pub announced: bool,
}

/// Car currently stopped in the pit lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitVisit {
    pub elapsed_ms: u64,
    pub lap: u32,
    pub tire_from: TireCompound,
}

/// Full mutable state of one car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarState {
    pub id: CarId,
    pub driver_name: String,
    pub team_id: String,
    /// Fractional index into the track points, `0 <= progress < points.len()`
    pub progress: f64,
    pub position: Position,
    pub speed: f64,
    pub tire: TireCompound,
    pub tire_laps: u32,
    pub fuel: f64,
    pub lap_time_ms: u64,
    pub last_lap_ms: Option<u64>,
    pub best_lap_ms: Option<u64>,
    pub laps: u32,
    pub sector: u8,
    pub drs_available: bool,
    pub drs_enabled: bool,
    pub pit_requested: bool,
    pub pit: Option<PitVisit>,
    pub fault: Option<Fault>,
    pub timestamp: DateTime<Utc>,
}

impl CarState {
    pub fn in_pit(&self) -> bool {
        self.pit.is_some()
    }

    pub fn telemetry(&self) -> CarTelemetry {
        CarTelemetry {
            id: self.id,
            driver_name: self.driver_name.clone(),
            team_id: self.team_id.clone(),
            position: self.position,
            speed: self.speed,
            tire: self.tire,
            tire_laps: self.tire_laps,
            fuel: self.fuel,
            lap_time: self.lap_time_ms,
            last_lap_time: self.last_lap_ms,
            best_lap_time: self.best_lap_ms,
            current_lap: self.laps,
            sector: self.sector,
            in_pit: self.in_pit(),
            drs_enabled: self.drs_enabled,
            drs_available: self.drs_available,
            timestamp: self.timestamp,
        }
    }
}

/// Car store plus pit stop history, everything needed to resume a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub cars: BTreeMap<CarId, CarState>,
    pub pit_stops: Vec<PitStop>,
}

/// Things that happened during a step that other components react to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub pit_stops: Vec<PitStop>,
    pub pit_entries: Vec<CarId>,
    pub faults: Vec<(CarId, FaultKind)>,
    pub laps_completed: Vec<(CarId, u32)>,
}

// =============================================================================
// Speed model
// =============================================================================

/// Target speed as a fraction of the sector ceiling, `t` being sector progress
fn profile_fraction(profile: SectorProfile, t: f64) -> f64 {
    match profile {
        // flat out, then braking for the corner at the end
        SectorProfile::Straight => {
            if t < 0.6 {
                1.0
            } else {
                1.0 - 0.4 * smoothstep((t - 0.6) / 0.4)
            }
        }
        SectorProfile::Mixed => 0.85 + 0.15 * (t * PI * 4.0).sin(),
        SectorProfile::Technical => 0.65 + 0.35 * smoothstep(t),
    }
}

/// Ceiling multiplier for the local grip
pub fn grip_scale(grip: f64, threshold: f64) -> f64 {
    if grip < threshold {
        (grip / threshold).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Highest speed a car may report in `sector` at `grip`
pub fn speed_cap(sector: &Sector, grip: f64, drs_enabled: bool, config: &SimulationConfig) -> f64 {
    let boost = if drs_enabled { 1.0 + config.drs_boost_pct } else { 1.0 };
    sector.speed_ceiling_kph * grip_scale(grip, config.grip_threshold) * boost
}

/// Compound fitted at a stop
fn next_compound(from: TireCompound, max_rain: f64) -> TireCompound {
    if max_rain > HEAVY_RAIN_THRESHOLD {
        return TireCompound::Wet;
    }
    if max_rain > WET_RAIN_THRESHOLD {
        return TireCompound::Intermediate;
    }
    match from {
        TireCompound::Soft => TireCompound::Medium,
        TireCompound::Medium => TireCompound::Hard,
        TireCompound::Hard => TireCompound::Medium,
        TireCompound::Intermediate | TireCompound::Wet => TireCompound::Medium,
    }
}

// =============================================================================
// Simulation
// =============================================================================

/// Read-only inputs shared by every car in a step
struct StepEnv<'a> {
    track: &'a TrackModel,
    config: &'a SimulationConfig,
    weather: &'a WeatherEngine,
    max_rain: f64,
    ctx: &'a TickContext,
}

pub struct Simulation {
    track: Arc<TrackModel>,
    config: SimulationConfig,
    state: SimulationState,
}

impl Simulation {
    /// Place the roster on the grid, pole furthest ahead of the line
    pub fn new(
        track: Arc<TrackModel>,
        roster: &Roster,
        config: SimulationConfig,
        start: DateTime<Utc>,
    ) -> Self {
        let n = track.point_count().max(1) as f64;
        let grid_len = roster.drivers.len();

        let cars = roster
            .drivers
            .iter()
            .enumerate()
            .map(|(slot, driver)| {
                let id = CarId(driver.number);
                let progress = ((grid_len - 1 - slot) as f64 * config.grid_spacing_points).rem_euclid(n);
                let car = CarState {
                    id,
                    driver_name: driver.name.clone(),
                    team_id: driver.team_id.clone(),
                    progress,
                    position: track.position_at(progress),
                    speed: config.grid_speed_kph,
                    tire: TireCompound::Soft,
                    tire_laps: 0,
                    fuel: 100.0,
                    lap_time_ms: 0,
                    last_lap_ms: None,
                    best_lap_ms: None,
                    laps: 0,
                    sector: track.sector_for_progress(progress).map(|s| s.id).unwrap_or(1),
                    drs_available: false,
                    drs_enabled: false,
                    pit_requested: false,
                    pit: None,
                    fault: None,
                    timestamp: start,
                };
                (id, car)
            })
            .collect();

        Self {
            track,
            config,
            state: SimulationState {
                cars,
                pit_stops: Vec::new(),
            },
        }
    }

    pub fn from_state(track: Arc<TrackModel>, config: SimulationConfig, state: SimulationState) -> Self {
        Self { track, config, state }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn car(&self, id: CarId) -> Option<&CarState> {
        self.state.cars.get(&id)
    }

    /// Post-tick telemetry of every car, ordered by car id
    pub fn telemetry(&self) -> Vec<CarTelemetry> {
        self.state.cars.values().map(CarState::telemetry).collect()
    }

    pub fn pit_stops(&self) -> &[PitStop] {
        &self.state.pit_stops
    }

    pub fn cars_in_pit(&self) -> usize {
        self.state.cars.values().filter(|c| c.in_pit()).count()
    }

    /// Completed laps of the leading car
    pub fn leader_laps(&self) -> u32 {
        self.state.cars.values().map(|c| c.laps).max().unwrap_or(0)
    }

    /// Bring the car in the next time it crosses the line
    pub fn schedule_pit_stop(&mut self, id: CarId) -> Result<(), SessionError> {
        let car = self.state.cars.get_mut(&id).ok_or(SessionError::UnknownCar(id))?;
        car.pit_requested = true;
        info!(car = %id, "pit stop scheduled");
        Ok(())
    }

    pub fn inject_fault(&mut self, id: CarId, kind: FaultKind, duration_ms: u64) -> Result<(), SessionError> {
        let car = self.state.cars.get_mut(&id).ok_or(SessionError::UnknownCar(id))?;
        car.fault = Some(Fault {
            kind,
            remaining_ms: duration_ms,
            announced: false,
        });
        info!(car = %id, ?kind, duration_ms, "fault injected");
        Ok(())
    }

    /// Advance every car by one tick
    pub fn step(&mut self, ctx: &TickContext, weather: &WeatherEngine) -> StepOutcome {
        let max_rain = weather
            .zones()
            .iter()
            .map(|z| z.rain_intensity)
            .fold(0.0, f64::max);
        let env = StepEnv {
            track: &self.track,
            config: &self.config,
            weather,
            max_rain,
            ctx,
        };

        let mut outcome = StepOutcome::default();
        for car in self.state.cars.values_mut() {
            advance_car(car, &env, &mut outcome);
        }
        self.state.pit_stops.extend(outcome.pit_stops.iter().cloned());
        outcome
    }
}

/// Pull a car back into valid ranges, returning whether anything changed
fn sanitize(car: &mut CarState, track: &TrackModel) -> bool {
    let n = track.point_count() as f64;
    let mut fixed = false;

    if !car.progress.is_finite() {
        warn!(car = %car.id, progress = car.progress, "invalid progress, moving to start line");
        car.progress = 0.0;
        fixed = true;
    } else if car.progress < 0.0 || car.progress >= n {
        warn!(car = %car.id, progress = car.progress, "progress outside lap, wrapping");
        car.progress = car.progress.rem_euclid(n);
        if car.progress >= n {
            car.progress = 0.0;
        }
        fixed = true;
    }
    if !car.speed.is_finite() || car.speed < 0.0 {
        warn!(car = %car.id, speed = car.speed, "invalid speed, resetting");
        car.speed = 0.0;
        fixed = true;
    }
    if !car.fuel.is_finite() || !(0.0..=100.0).contains(&car.fuel) {
        warn!(car = %car.id, fuel = car.fuel, "fuel outside range, clamping");
        car.fuel = if car.fuel.is_finite() { car.fuel.clamp(0.0, 100.0) } else { 0.0 };
        fixed = true;
    }
    if !(1..=3).contains(&car.sector) {
        warn!(car = %car.id, sector = car.sector, "unknown sector, recomputing");
        car.sector = track.sector_for_progress(car.progress).map(|s| s.id).unwrap_or(1);
        fixed = true;
    }
    fixed
}

fn advance_car(car: &mut CarState, env: &StepEnv<'_>, outcome: &mut StepOutcome) {
    let ctx = env.ctx;
    let cfg = env.config;
    let track = env.track;
    let dt = ctx.dt_secs();
    let subject = car.id.0 as u64;

    sanitize(car, track);
    car.timestamp = ctx.timestamp;
    car.lap_time_ms += ctx.dt_ms;

    // --- Faults ---
    if let Some(fault) = car.fault.as_mut() {
        fault.remaining_ms = fault.remaining_ms.saturating_sub(ctx.dt_ms);
        if fault.remaining_ms == 0 {
            debug!(car = %car.id, "fault cleared");
            car.fault = None;
        }
    } else if !car.in_pit()
        && cfg.fault_probability > 0.0
        && noise::unit(ctx.seed, ctx.tick, noise::salt(channel::FAULT, subject)) < cfg.fault_probability
    {
        let kind = if noise::unit(ctx.seed, ctx.tick, noise::salt(channel::FAULT_KIND, subject)) < 0.5 {
            FaultKind::Spin
        } else {
            FaultKind::Mechanical
        };
        car.fault = Some(Fault {
            kind,
            remaining_ms: cfg.fault_duration_ms,
            announced: false,
        });
    }
    if let Some(fault) = car.fault.as_mut() {
        if !fault.announced {
            fault.announced = true;
            warn!(car = %car.id, kind = ?fault.kind, "car fault");
            outcome.faults.push((car.id, fault.kind));
        }
    }

    // --- Pit lane ---
    if let Some(visit) = car.pit.as_mut() {
        visit.elapsed_ms += ctx.dt_ms;
        car.speed = cfg.pit_lane_speed_kph;
        car.drs_available = false;
        car.drs_enabled = false;

        if visit.elapsed_ms < cfg.pit_stop_duration_ms {
            let t = visit.elapsed_ms as f64 / cfg.pit_stop_duration_ms as f64;
            car.position = track.pit_entry.lerp(track.pit_exit, smoothstep(t));
            return;
        }

        let tire_to = next_compound(visit.tire_from, env.max_rain);
        let stop = PitStop {
            car_id: car.id,
            lap_number: visit.lap,
            duration_ms: visit.elapsed_ms,
            tire_from: visit.tire_from,
            tire_to,
            timestamp: ctx.timestamp,
        };
        info!(car = %car.id, lap = stop.lap_number, from = ?stop.tire_from, to = ?tire_to, "pit stop complete");
        outcome.pit_stops.push(stop);

        car.pit = None;
        car.tire = tire_to;
        car.tire_laps = 0;
        car.fuel = 100.0;
        car.position = track.position_at(car.progress);
        return;
    }

    // --- Speed ---
    let n = track.point_count() as f64;
    let Some(sector) = track.sector_for_progress(car.progress) else {
        warn!(car = %car.id, progress = car.progress, "no sector for progress, skipping car");
        return;
    };
    let grip = env.weather.grip_for_sector(sector.id);
    let sector_t = (car.progress - sector.start_index as f64) / sector.point_count().max(1) as f64;
    let mut target = sector.speed_ceiling_kph
        * grip_scale(grip, cfg.grip_threshold)
        * profile_fraction(sector.profile, sector_t.clamp(0.0, 1.0))
        + noise::jitter(ctx.seed, ctx.tick, noise::salt(channel::SPEED, subject), cfg.speed_noise_kph);
    if car.drs_enabled {
        target *= 1.0 + cfg.drs_boost_pct;
    }
    let mut cap = speed_cap(sector, grip, car.drs_enabled, cfg);
    if car.fault.is_some() || car.fuel <= 0.0 {
        target = target.min(cfg.limp_speed_kph);
        cap = cap.min(cfg.limp_speed_kph);
    }
    let delta = (target - car.speed).clamp(-cfg.brake_kph_per_s * dt, cfg.accel_kph_per_s * dt);
    car.speed = (car.speed + delta).clamp(0.0, cap.max(0.0));

    // --- Progress & laps ---
    let distance_m = car.speed / 3.6 * dt;
    car.progress += distance_m / track.meters_per_point();
    let mut crossed = false;
    while car.progress >= n {
        car.progress -= n;
        car.laps += 1;
        car.tire_laps += 1;
        car.last_lap_ms = Some(car.lap_time_ms);
        car.best_lap_ms = Some(car.best_lap_ms.map_or(car.lap_time_ms, |b| b.min(car.lap_time_ms)));
        car.lap_time_ms = 0;
        crossed = true;
        outcome.laps_completed.push((car.id, car.laps));
    }

    // --- Fuel ---
    car.fuel = (car.fuel - distance_m / 1000.0 * cfg.fuel_burn_pct_per_km).clamp(0.0, 100.0);

    // --- Strategy ---
    if cfg.auto_pit && !car.pit_requested {
        let worn = car.tire_laps >= car.tire.stint_laps();
        let low_fuel = car.fuel < cfg.fuel_reserve_pct;
        let wrong_tires = (env.max_rain > WET_RAIN_THRESHOLD) != car.tire.is_wet_weather();
        if worn || low_fuel || wrong_tires {
            debug!(car = %car.id, worn, low_fuel, wrong_tires, "requesting pit stop");
            car.pit_requested = true;
        }
    }
    if crossed && car.pit_requested {
        car.pit_requested = false;
        car.pit = Some(PitVisit {
            elapsed_ms: 0,
            lap: car.laps,
            tire_from: car.tire,
        });
        car.speed = cfg.pit_lane_speed_kph;
        car.drs_available = false;
        car.drs_enabled = false;
        car.position = track.pit_entry;
        car.sector = track.sector_for_progress(car.progress).map(|s| s.id).unwrap_or(1);
        info!(car = %car.id, lap = car.laps, "entering pit lane");
        outcome.pit_entries.push(car.id);
        return;
    }

    // --- Sector, DRS & final clamp ---
    let Some(sector) = track.sector_for_progress(car.progress) else {
        warn!(car = %car.id, progress = car.progress, "no sector after move");
        return;
    };
    car.sector = sector.id;
    car.position = track.position_at(car.progress);

    let grip = env.weather.grip_for_sector(sector.id);
    let window = track.drs_window(car.progress, cfg.drs_corner_lookahead_points);
    let may_open = window.available && window.past_activation && car.fault.is_none();
    let mut limit = speed_cap(sector, grip, may_open && car.speed >= cfg.drs_min_speed_kph, cfg);
    if car.fault.is_some() || car.fuel <= 0.0 {
        limit = limit.min(cfg.limp_speed_kph);
    }
    car.speed = car.speed.min(limit);
    car.drs_available = window.available;
    car.drs_enabled = may_open && car.speed >= cfg.drs_min_speed_kph;
    if !car.drs_enabled {
        car.speed = car.speed.min(speed_cap(sector, grip, false, cfg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{default_roster, default_track, oval};
    use crate::clock::SessionClock;
    use pitwall_core::config::WeatherConfig;

    fn calm_weather(track: &TrackModel) -> WeatherEngine {
        WeatherEngine::new(track, WeatherConfig::default(), 1)
    }

    fn quiet_config() -> SimulationConfig {
        SimulationConfig {
            fault_probability: 0.0,
            ..SimulationConfig::default()
        }
    }

    fn run(sim: &mut Simulation, weather: &WeatherEngine, clock: &mut SessionClock, ticks: usize) -> StepOutcome {
        let mut all = StepOutcome::default();
        for _ in 0..ticks {
            let ctx = clock.advance(50, 99);
            let o = sim.step(&ctx, weather);
            all.pit_stops.extend(o.pit_stops);
            all.pit_entries.extend(o.pit_entries);
            all.faults.extend(o.faults);
            all.laps_completed.extend(o.laps_completed);
        }
        all
    }

    #[test]
    fn test_grid_places_pole_furthest_ahead() {
        let track = Arc::new(default_track());
        let sim = Simulation::new(track, &default_roster(4), quiet_config(), Utc::now());
        let cars = sim.telemetry();
        assert_eq!(cars.len(), 4);
        assert!(sim.car(CarId(1)).unwrap().progress > sim.car(CarId(2)).unwrap().progress);
        assert_eq!(sim.car(CarId(4)).unwrap().progress, 0.0);
        for car in cars {
            assert_eq!(car.current_lap, 0);
            assert_eq!(car.fuel, 100.0);
            assert_eq!(car.tire, TireCompound::Soft);
            assert!(!car.in_pit);
        }
    }

    #[test]
    fn test_profile_fractions_stay_positive() {
        for profile in [SectorProfile::Straight, SectorProfile::Mixed, SectorProfile::Technical] {
            for i in 0..=100 {
                let f = profile_fraction(profile, i as f64 / 100.0);
                assert!((0.55..=1.0).contains(&f), "{:?} at {} gave {}", profile, i, f);
            }
        }
    }

    #[test]
    fn test_grip_scale_below_threshold() {
        assert_eq!(grip_scale(100.0, 80.0), 1.0);
        assert_eq!(grip_scale(80.0, 80.0), 1.0);
        assert_eq!(grip_scale(40.0, 80.0), 0.5);
    }

    #[test]
    fn test_next_compound_rotation_and_rain() {
        assert_eq!(next_compound(TireCompound::Soft, 0.0), TireCompound::Medium);
        assert_eq!(next_compound(TireCompound::Medium, 0.0), TireCompound::Hard);
        assert_eq!(next_compound(TireCompound::Hard, 0.0), TireCompound::Medium);
        assert_eq!(next_compound(TireCompound::Soft, 50.0), TireCompound::Intermediate);
        assert_eq!(next_compound(TireCompound::Soft, 90.0), TireCompound::Wet);
        assert_eq!(next_compound(TireCompound::Wet, 0.0), TireCompound::Medium);
    }

    #[test]
    fn test_fuel_decreases_and_stays_in_range() {
        let track = Arc::new(default_track());
        let weather = calm_weather(&track);
        let mut sim = Simulation::new(track, &default_roster(3), quiet_config(), Utc::now());
        let mut clock = SessionClock::new(Utc::now());

        let mut previous: Vec<f64> = sim.telemetry().iter().map(|c| c.fuel).collect();
        for _ in 0..400 {
            run(&mut sim, &weather, &mut clock, 1);
            let fuel: Vec<f64> = sim.telemetry().iter().map(|c| c.fuel).collect();
            for (now, before) in fuel.iter().zip(&previous) {
                assert!(*now <= *before);
                assert!((0.0..=100.0).contains(now));
            }
            previous = fuel;
        }
        assert!(previous.iter().all(|&f| f < 100.0));
    }

    #[test]
    fn test_empty_tank_limps_without_error() {
        let track = Arc::new(default_track());
        let weather = calm_weather(&track);
        let config = SimulationConfig {
            fuel_burn_pct_per_km: 1000.0,
            auto_pit: false,
            ..quiet_config()
        };
        let mut sim = Simulation::new(track, &default_roster(1), config.clone(), Utc::now());
        let mut clock = SessionClock::new(Utc::now());
        run(&mut sim, &weather, &mut clock, 200);

        let car = sim.car(CarId(1)).unwrap();
        assert_eq!(car.fuel, 0.0);
        assert!(car.speed <= config.limp_speed_kph);
    }

    #[test]
    fn test_injected_fault_limits_speed_and_is_reported_once() {
        let track = Arc::new(default_track());
        let weather = calm_weather(&track);
        let config = quiet_config();
        let mut sim = Simulation::new(track, &default_roster(2), config.clone(), Utc::now());
        let mut clock = SessionClock::new(Utc::now());
        run(&mut sim, &weather, &mut clock, 100);

        sim.inject_fault(CarId(2), FaultKind::Spin, 1_000).unwrap();
        let outcome = run(&mut sim, &weather, &mut clock, 10);
        assert_eq!(outcome.faults, vec![(CarId(2), FaultKind::Spin)]);
        assert!(sim.car(CarId(2)).unwrap().speed <= config.limp_speed_kph);

        run(&mut sim, &weather, &mut clock, 15);
        assert!(sim.car(CarId(2)).unwrap().fault.is_none());
    }

    #[test]
    fn test_unknown_car_is_rejected() {
        let track = Arc::new(default_track());
        let mut sim = Simulation::new(track, &default_roster(2), quiet_config(), Utc::now());
        assert_eq!(sim.schedule_pit_stop(CarId(9)), Err(SessionError::UnknownCar(CarId(9))));
        assert_eq!(
            sim.inject_fault(CarId(9), FaultKind::Mechanical, 10),
            Err(SessionError::UnknownCar(CarId(9)))
        );
    }

    #[test]
    fn test_scheduled_pit_stop_is_served_at_the_line() {
        // 100 points over 1000 m at a steady 360 km/h: one lap every 10 s
        let track = Arc::new(oval(100, 1000.0, 360.0));
        let weather = calm_weather(&track);
        let config = SimulationConfig {
            grid_speed_kph: 360.0,
            accel_kph_per_s: 0.0,
            brake_kph_per_s: 0.0,
            speed_noise_kph: 0.0,
            pit_stop_duration_ms: 2_000,
            auto_pit: false,
            ..quiet_config()
        };
        let mut sim = Simulation::new(track, &default_roster(1), config, Utc::now());
        let mut clock = SessionClock::new(Utc::now());

        sim.schedule_pit_stop(CarId(1)).unwrap();
        let outcome = run(&mut sim, &weather, &mut clock, 201);
        assert_eq!(outcome.pit_entries, vec![CarId(1)]);
        assert!(sim.car(CarId(1)).unwrap().in_pit());

        let outcome = run(&mut sim, &weather, &mut clock, 40);
        assert_eq!(outcome.pit_stops.len(), 1);
        let stop = &outcome.pit_stops[0];
        assert_eq!(stop.lap_number, 1);
        assert_eq!(stop.duration_ms, 2_000);
        assert_eq!(stop.tire_from, TireCompound::Soft);
        assert_eq!(stop.tire_to, TireCompound::Medium);
        assert_eq!(sim.pit_stops().len(), 1);

        let car = sim.car(CarId(1)).unwrap();
        assert!(!car.in_pit());
        assert!(car.fuel > 99.0);
        assert_eq!(car.tire, TireCompound::Medium);
        assert_eq!(car.tire_laps, 0);
    }

    #[test]
    fn test_wet_track_lowers_ceiling() {
        let track = Arc::new(default_track());
        let mut weather = calm_weather(&track);
        for id in 1..=3 {
            weather.set_rain(id, 90.0);
        }
        let config = SimulationConfig {
            auto_pit: false,
            ..quiet_config()
        };
        let mut sim = Simulation::new(track.clone(), &default_roster(5), config.clone(), Utc::now());
        let mut clock = SessionClock::new(Utc::now());
        for _ in 0..600 {
            run(&mut sim, &weather, &mut clock, 1);
            for car in sim.telemetry() {
                let sector = track.sector(car.sector).unwrap();
                let cap = speed_cap(sector, weather.grip_for_sector(car.sector), car.drs_enabled, &config);
                assert!(car.speed <= cap + 1e-9, "{} at {} over cap {}", car.id, car.speed, cap);
            }
        }
    }

    #[test]
    fn test_sanitize_repairs_corrupt_car() {
        let track = Arc::new(default_track());
        let mut sim = Simulation::new(track.clone(), &default_roster(1), quiet_config(), Utc::now());
        let car = sim.state.cars.get_mut(&CarId(1)).unwrap();
        car.progress = f64::NAN;
        car.speed = -5.0;
        car.fuel = 140.0;
        car.sector = 9;

        assert!(sanitize(car, &track));
        assert_eq!(car.progress, 0.0);
        assert_eq!(car.speed, 0.0);
        assert_eq!(car.fuel, 100.0);
        assert_eq!(car.sector, 1);
        assert!(!sanitize(car, &track));
    }
}
