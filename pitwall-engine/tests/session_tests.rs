//! Integration tests for the RaceEngine

use pitwall_core::config::EngineConfig;
use pitwall_core::error::SessionError;
use pitwall_core::model::{AlertKind, AlertSeverity, CarId, SessionStatus, TireCompound};
use pitwall_core::publish::MemoryPublisher;
use pitwall_engine::circuit::oval;
use pitwall_engine::session::SessionSnapshot;
use pitwall_engine::{default_roster, default_track, FaultKind, RaceEngine};

const OVAL_CEILING: f64 = 727.2;

/// Two cars side by side on a 1 km oval, covering 1.01 points per tick
fn constant_speed_engine() -> RaceEngine {
    let mut config = EngineConfig::default();
    config.session.total_laps = 5;
    let sim = &mut config.simulation;
    sim.grid_speed_kph = OVAL_CEILING;
    sim.grid_spacing_points = 0.0;
    sim.accel_kph_per_s = 0.0;
    sim.brake_kph_per_s = 0.0;
    sim.speed_noise_kph = 0.0;
    sim.fault_probability = 0.0;
    sim.auto_pit = false;
    RaceEngine::new(oval(100, 1000.0, OVAL_CEILING), default_roster(2), config).unwrap()
}

fn quiet_oval(cars: usize) -> RaceEngine {
    let mut config = EngineConfig::default();
    let sim = &mut config.simulation;
    sim.grid_spacing_points = 0.0;
    sim.speed_noise_kph = 0.0;
    sim.fault_probability = 0.0;
    sim.auto_pit = false;
    RaceEngine::new(oval(100, 1000.0, 300.0), default_roster(cars), config).unwrap()
}

#[test]
fn test_constant_speed_lap_on_oval() {
    let mut engine = constant_speed_engine();
    engine.start().unwrap();

    let mut sectors = vec![1u8];
    for tick in 1..=100 {
        let out = engine.tick().expect("session is running");
        let sector = out.telemetry[0].sector;
        if sectors.last() != Some(&sector) {
            sectors.push(sector);
        }
        if tick == 99 {
            assert_eq!(engine.session().current_lap, 0);
        }
    }

    assert_eq!(sectors, vec![1, 2, 3, 1]);
    assert_eq!(engine.session().current_lap, 1);
    for car in engine.telemetry() {
        assert_eq!(car.current_lap, 1);
        assert_eq!(car.speed, OVAL_CEILING);
        assert_eq!(car.last_lap_time, Some(5_000));
    }
    assert!(engine.alerts().is_empty());
}

#[test]
fn test_state_stays_in_range_with_faults() {
    let mut config = EngineConfig::default();
    config.simulation.fault_probability = 0.002;
    config.weather.initial_rain = 35.0;
    config.weather.rain_step = 20.0;
    let mut engine = RaceEngine::new(default_track(), default_roster(20), config).unwrap();
    engine.start().unwrap();

    let ceilings: Vec<f64> = engine.track().sectors.iter().map(|s| s.speed_ceiling_kph).collect();
    let boost = 1.0 + engine.config().simulation.drs_boost_pct;
    let mut laps = vec![0u32; 21];

    for tick in 0..3_000 {
        if tick % 200 == 0 {
            engine.evolve_weather();
        }
        let Some(out) = engine.tick() else { break };
        for car in &out.telemetry {
            assert!((1..=3).contains(&car.sector));
            assert!((0.0..=100.0).contains(&car.fuel));
            assert!(car.speed >= 0.0);
            assert!(car.speed <= ceilings[car.sector as usize - 1] * boost + 1e-9);
            let slot = car.id.0 as usize;
            assert!(car.current_lap >= laps[slot]);
            laps[slot] = car.current_lap;
        }
        let leader = out.telemetry.iter().map(|c| c.current_lap).max().unwrap_or(0);
        assert_eq!(engine.session().current_lap, leader);
        for zone in engine.weather() {
            assert!((0.0..=100.0).contains(&zone.rain_intensity));
            assert!((0.0..=100.0).contains(&zone.grip_level));
        }
    }
    assert!(engine.alerts().len() <= engine.config().detection.alert_history_limit);
    assert!(engine.incidents().len() <= engine.config().detection.incident_history_limit);
}

#[test]
fn test_reset_twice_equals_reset_once() {
    let mut engine = quiet_oval(4);
    engine.start().unwrap();
    for _ in 0..300 {
        engine.tick();
    }

    engine.reset();
    let once = engine.snapshot();
    engine.reset();
    assert_eq!(engine.snapshot(), once);
    assert_eq!(once.meta.status, SessionStatus::NotStarted);
    assert_eq!(once.clock.elapsed_ms, 0);
}

#[test]
fn test_snapshot_restores_identical_session() {
    let mut config = EngineConfig::default();
    config.simulation.fault_probability = 0.001;
    config.weather.initial_rain = 25.0;
    let mut engine = RaceEngine::new(default_track(), default_roster(8), config.clone()).unwrap();
    engine.start().unwrap();
    for tick in 0..600 {
        if tick % 200 == 0 {
            engine.evolve_weather();
        }
        engine.tick();
    }

    let json = serde_json::to_string(&engine.snapshot()).unwrap();
    let snapshot: SessionSnapshot = serde_json::from_str(&json).unwrap();
    let mut restored = RaceEngine::restore(default_track(), default_roster(8), config, snapshot).unwrap();
    assert_eq!(restored.snapshot(), engine.snapshot());

    for tick in 0..600 {
        if tick % 200 == 0 {
            assert_eq!(engine.evolve_weather(), restored.evolve_weather());
        }
        let a = engine.tick().map(|o| o.telemetry);
        let b = restored.tick().map(|o| o.telemetry);
        assert_eq!(a, b);
    }
    assert_eq!(engine.alerts(), restored.alerts());
    assert_eq!(engine.incidents(), restored.incidents());
}

#[test]
fn test_persisting_slowdown_respects_cooldown() {
    let mut engine = quiet_oval(3);
    engine.start().unwrap();
    for _ in 0..400 {
        engine.tick();
    }

    let car = CarId(2);
    engine.inject_fault(car, FaultKind::Mechanical, 20_000).unwrap();
    for _ in 0..400 {
        engine.tick();
    }

    let mut times: Vec<_> = engine
        .alerts()
        .iter()
        .filter(|a| a.kind == AlertKind::Slowdown && a.car_id == Some(car))
        .map(|a| a.timestamp)
        .collect();
    times.sort();

    let cooldown = engine.config().detection.cooldowns.slowdown_ms as i64;
    assert!(!times.is_empty());
    assert!(times.len() <= 4);
    for pair in times.windows(2) {
        assert!((pair[1] - pair[0]).num_milliseconds() >= cooldown);
    }

    // the stricken car ends up with an escalated slowdown incident
    assert!(engine
        .incidents()
        .iter()
        .any(|i| i.car_id == car && i.kind == pitwall_core::model::IncidentKind::Slowdown));
}

#[test]
fn test_pit_congestion_reports_only_critical() {
    let mut engine = quiet_oval(4);
    for id in 1..=3 {
        engine.schedule_pit_stop(CarId(id)).unwrap();
    }
    engine.start().unwrap();

    let mut entered = None;
    for tick in 0..3_000 {
        let out = engine.tick().unwrap();
        if entered.is_none() && out.telemetry.iter().filter(|c| c.in_pit).count() == 3 {
            entered = Some(tick);
            let congestion: Vec<_> = out.alerts.iter().filter(|a| a.kind == AlertKind::PitCongestion).collect();
            assert_eq!(congestion.len(), 1);
            assert_eq!(congestion[0].severity, AlertSeverity::Critical);
        }
        if engine.pit_stops().len() == 3 {
            break;
        }
    }
    assert!(entered.is_some());

    let congestion: Vec<_> = engine
        .alerts()
        .iter()
        .filter(|a| a.kind == AlertKind::PitCongestion)
        .collect();
    assert_eq!(congestion.len(), 5);
    assert!(congestion.iter().all(|a| a.severity == AlertSeverity::Critical));

    for stop in engine.pit_stops() {
        assert_eq!(stop.tire_from, TireCompound::Soft);
        assert_eq!(stop.tire_to, TireCompound::Medium);
        assert_eq!(stop.lap_number, 1);
    }
}

#[test]
fn test_routine_pit_stop_raises_no_slowdown() {
    let mut engine = quiet_oval(1);
    engine.start().unwrap();
    for _ in 0..400 {
        engine.tick();
    }

    engine.schedule_pit_stop(CarId(1)).unwrap();
    let mut visited_pit = false;
    for _ in 0..2_000 {
        let out = engine.tick().unwrap();
        visited_pit |= out.telemetry[0].in_pit;
    }

    assert!(visited_pit);
    assert_eq!(engine.pit_stops().len(), 1);
    let slowdowns = engine.alerts().iter().filter(|a| a.kind == AlertKind::Slowdown).count();
    assert_eq!(slowdowns, 0);
}

#[test]
fn test_rain_raises_weather_alert_once() {
    let mut engine = quiet_oval(2);
    engine.start().unwrap();
    engine.tick();
    assert!(engine.set_rain(2, 85.0));

    let out = engine.tick().unwrap();
    let weather: Vec<_> = out.alerts.iter().filter(|a| a.kind == AlertKind::Weather).collect();
    assert!(!weather.is_empty());
    assert!(weather.iter().all(|a| a.sector == Some(2)));

    let out = engine.tick().unwrap();
    assert!(out.alerts.iter().all(|a| a.kind != AlertKind::Weather));
}

#[test]
fn test_commands_on_unknown_car() {
    let mut engine = quiet_oval(2);
    assert_eq!(engine.schedule_pit_stop(CarId(42)), Err(SessionError::UnknownCar(CarId(42))));
    assert_eq!(
        engine.inject_fault(CarId(42), FaultKind::Spin, 1_000),
        Err(SessionError::UnknownCar(CarId(42)))
    );
}

#[test]
fn test_published_events_are_tagged() {
    let mut engine = quiet_oval(2);
    engine.start().unwrap();
    let publisher = MemoryPublisher::new();
    for _ in 0..10 {
        if let Some(out) = engine.tick() {
            engine.publish_tick(&out, &publisher);
        }
    }
    let events = publisher.events();
    assert_eq!(events.len(), 10);

    let json = serde_json::to_value(&events[0]).unwrap();
    assert_eq!(json["type"], "telemetry_update");
    assert!(json["timestamp"].is_string());
    assert_eq!(json["data"][0]["id"], "CAR_1");
    assert_eq!(json["data"][0]["driverName"], "M. Verstappen");
}
