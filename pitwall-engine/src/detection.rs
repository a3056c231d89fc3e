//! Detection engine
//!
//! Reads the post-tick telemetry snapshot (plus current weather) and raises
//! alerts and incidents. The only state kept between ticks is a short speed
//! history per car, the last seen weather per sector, the cooldown map and
//! the bounded alert / incident histories.
//!
//! Rules:
//! - `slowdown`: speed under the rolling baseline by `speed_threshold_pct`
//!   and under `minimum_speed_kph`, outside the pit lane
//! - `pit_congestion`: number of cars in the pit lane
//! - `weather`: a sector's condition worsening, or grip falling below the
//!   alert threshold
//! - `incident`: a slowdown lasting past `escalation_after_ms`, and car faults
//! - `strategy`: low fuel or tires past their stint

use crate::clock::TickContext;
use pitwall_core::config::DetectionConfig;
use pitwall_core::model::{
    Alert, AlertKind, AlertSeverity, CarId, CarTelemetry, Incident, IncidentKind,
    IncidentSeverity, WeatherCondition, WeatherZone,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

/// Alerts and incidents raised by one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detections {
    pub alerts: Vec<Alert>,
    pub incidents: Vec<Incident>,
}

impl Detections {
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty() && self.incidents.is_empty()
    }

    pub fn extend(&mut self, other: Detections) {
        self.alerts.extend(other.alerts);
        self.incidents.extend(other.incidents);
    }
}

// ---------------------------------------------------------------------------
// Cooldowns
// ---------------------------------------------------------------------------

/// Last emission time per (alert kind, subject)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cooldowns {
    last: BTreeMap<AlertKind, BTreeMap<String, u64>>,
}

impl Cooldowns {
    pub fn last_emitted(&self, kind: AlertKind, key: &str) -> Option<u64> {
        self.last.get(&kind).and_then(|m| m.get(key)).copied()
    }

    pub fn is_ready(&self, kind: AlertKind, key: &str, now_ms: u64, cooldown_ms: u64) -> bool {
        self.last_emitted(kind, key)
            .map_or(true, |last| now_ms.saturating_sub(last) >= cooldown_ms)
    }

    pub fn record(&mut self, kind: AlertKind, key: &str, now_ms: u64) {
        self.last.entry(kind).or_default().insert(key.to_string(), now_ms);
    }

    /// Record and return true if the key is out of cooldown
    pub fn try_acquire(&mut self, kind: AlertKind, key: &str, now_ms: u64, cooldown_ms: u64) -> bool {
        if !self.is_ready(kind, key, now_ms, cooldown_ms) {
            return false;
        }
        self.record(kind, key, now_ms);
        true
    }

    /// Drop entries whose cooldown has expired, returning how many went
    pub fn prune(&mut self, now_ms: u64, cooldown_for: impl Fn(AlertKind) -> u64) -> usize {
        let mut removed = 0;
        for (kind, entries) in self.last.iter_mut() {
            let cooldown = cooldown_for(*kind);
            let before = entries.len();
            entries.retain(|_, last| now_ms.saturating_sub(*last) < cooldown);
            removed += before - entries.len();
        }
        self.last.retain(|_, entries| !entries.is_empty());
        removed
    }

    pub fn len(&self) -> usize {
        self.last.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Detector state
// ---------------------------------------------------------------------------

/// Rolling speed history for one car
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedHistory {
    /// (session time ms, speed) samples taken while running normally
    pub samples: VecDeque<(u64, f64)>,
    /// Start of the current uninterrupted slowdown
    pub slowed_since_ms: Option<u64>,
    /// Highest incident severity raised for the current slowdown
    pub escalated: Option<IncidentSeverity>,
}

impl SpeedHistory {
    pub fn baseline(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|(_, s)| s).sum();
        Some(sum / self.samples.len() as f64)
    }

    fn push(&mut self, now_ms: u64, speed: f64, window_ms: u64) {
        self.samples.push_back((now_ms, speed));
        while let Some(&(t, _)) = self.samples.front() {
            if now_ms.saturating_sub(t) >= window_ms {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn clear_slowdown(&mut self) {
        self.slowed_since_ms = None;
        self.escalated = None;
    }

    /// Pit lane speeds say nothing about race pace, so the baseline restarts on exit
    fn enter_pit(&mut self) {
        self.samples.clear();
        self.clear_slowdown();
    }
}

/// Everything the detector remembers between ticks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorState {
    pub histories: BTreeMap<CarId, SpeedHistory>,
    pub cooldowns: Cooldowns,
    pub conditions: BTreeMap<u8, WeatherCondition>,
    pub grip: BTreeMap<u8, f64>,
    /// Newest first
    pub alerts: Vec<Alert>,
    /// Newest first
    pub incidents: Vec<Incident>,
    pub next_alert: u64,
    pub next_incident: u64,
    pub last_prune_ms: u64,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Severity of an escalated slowdown from its depth under the floor and its length
pub fn slowdown_severity(speed: f64, floor: f64, duration_ms: u64, escalation_ms: u64) -> IncidentSeverity {
    let depth = if floor > 0.0 { ((floor - speed) / floor).max(0.0) } else { 0.0 };
    if depth > 0.5 || duration_ms >= escalation_ms.saturating_mul(3) {
        IncidentSeverity::High
    } else if depth > 0.25 || duration_ms >= escalation_ms.saturating_mul(2) {
        IncidentSeverity::Medium
    } else {
        IncidentSeverity::Low
    }
}

fn weather_severity(condition: WeatherCondition) -> AlertSeverity {
    match condition {
        WeatherCondition::Dry | WeatherCondition::Damp => AlertSeverity::Info,
        WeatherCondition::Wet => AlertSeverity::Warning,
        WeatherCondition::HeavyRain => AlertSeverity::Critical,
    }
}

pub struct Detector {
    config: DetectionConfig,
    state: DetectorState,
}

impl Detector {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            config,
            state: DetectorState::default(),
        }
    }

    pub fn from_state(config: DetectionConfig, state: DetectorState) -> Self {
        Self { config, state }
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.state.alerts
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.state.incidents
    }

    pub fn cooldowns(&self) -> &Cooldowns {
        &self.state.cooldowns
    }

    /// Mark an alert as seen; the only mutation an emitted alert ever gets
    pub fn acknowledge(&mut self, id: &str) -> bool {
        match self.state.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Run every rule against one post-tick snapshot
    pub fn process(&mut self, ctx: &TickContext, cars: &[CarTelemetry], weather: &[WeatherZone]) -> Detections {
        let mut out = Detections::default();

        self.check_slowdowns(ctx, cars, &mut out);
        self.check_pit_lane(ctx, cars, &mut out);
        self.check_weather(ctx, weather, &mut out);
        self.check_strategy(ctx, cars, &mut out);
        self.maybe_prune(ctx.now_ms);

        if !out.is_empty() {
            debug!(
                tick = ctx.tick,
                alerts = out.alerts.len(),
                incidents = out.incidents.len(),
                "detections"
            );
        }
        out
    }

    /// Raise an incident for a car fault reported by the simulation
    pub fn report_fault(&mut self, ctx: &TickContext, car: &CarTelemetry, kind: IncidentKind) -> Detections {
        let mut out = Detections::default();
        let key = car.id.to_string();
        if !self
            .state
            .cooldowns
            .try_acquire(AlertKind::Incident, &key, ctx.now_ms, self.config.cooldowns.incident_ms)
        {
            return out;
        }
        let (severity, what) = match kind {
            IncidentKind::Spin => (IncidentSeverity::High, "spun"),
            IncidentKind::Mechanical => (IncidentSeverity::Medium, "reports a mechanical problem"),
            IncidentKind::Collision => (IncidentSeverity::High, "was involved in a collision"),
            IncidentKind::Debris => (IncidentSeverity::Medium, "hit debris"),
            IncidentKind::Slowdown => (IncidentSeverity::Low, "slowed"),
        };
        let description = format!("{} ({}) {} in sector {}", car.id, car.driver_name, what, car.sector);
        self.raise_incident(ctx, car, kind, severity, description, &mut out);
        out
    }

    fn check_slowdowns(&mut self, ctx: &TickContext, cars: &[CarTelemetry], out: &mut Detections) {
        let cfg = &self.config;
        let mut pending = Vec::new();
        let mut escalations = Vec::new();

        for car in cars {
            let history = self.state.histories.entry(car.id).or_default();
            if car.in_pit {
                history.enter_pit();
                continue;
            }

            let slowed_from = history.baseline().filter(|avg| {
                car.speed < avg * (1.0 - cfg.speed_threshold_pct) && car.speed < cfg.minimum_speed_kph
            });
            let Some(avg) = slowed_from else {
                history.clear_slowdown();
                history.push(ctx.now_ms, car.speed, cfg.slowdown_window_ms);
                continue;
            };

            let since = *history.slowed_since_ms.get_or_insert(ctx.now_ms);
            let key = car.id.to_string();
            if self
                .state
                .cooldowns
                .try_acquire(AlertKind::Slowdown, &key, ctx.now_ms, cfg.cooldowns.slowdown_ms)
            {
                let alert = Alert {
                    id: String::new(),
                    kind: AlertKind::Slowdown,
                    severity: AlertSeverity::Warning,
                    message: format!(
                        "{} ({}) slowing in sector {}: {:.0} km/h against {:.0} km/h average",
                        car.id, car.driver_name, car.sector, car.speed, avg
                    ),
                    car_id: Some(car.id),
                    sector: Some(car.sector),
                    timestamp: ctx.timestamp,
                    acknowledged: false,
                };
                pending.push(alert);
            }

            let duration = ctx.now_ms.saturating_sub(since);
            if duration >= cfg.escalation_after_ms {
                let severity = slowdown_severity(car.speed, cfg.minimum_speed_kph, duration, cfg.escalation_after_ms);
                if history.escalated.map_or(true, |prev| severity > prev) {
                    history.escalated = Some(severity);
                    escalations.push((car, severity, duration));
                }
            }
        }

        for alert in pending {
            self.commit_alert(alert, out);
        }
        for (car, severity, duration) in escalations {
            let description = format!(
                "{} ({}) running at {:.0} km/h for {:.1}s in sector {}",
                car.id,
                car.driver_name,
                car.speed,
                duration as f64 / 1000.0,
                car.sector
            );
            self.raise_incident(ctx, car, IncidentKind::Slowdown, severity, description, out);
        }
    }

    fn check_pit_lane(&mut self, ctx: &TickContext, cars: &[CarTelemetry], out: &mut Detections) {
        let in_pit = cars.iter().filter(|c| c.in_pit).count();
        let (severity, key) = if in_pit >= self.config.max_cars_in_pit {
            (AlertSeverity::Critical, "critical")
        } else if in_pit >= self.config.warning_threshold {
            (AlertSeverity::Warning, "warning")
        } else {
            return;
        };

        if !self.state.cooldowns.try_acquire(
            AlertKind::PitCongestion,
            key,
            ctx.now_ms,
            self.config.cooldowns.pit_congestion_ms,
        ) {
            return;
        }
        let alert = Alert {
            id: String::new(),
            kind: AlertKind::PitCongestion,
            severity,
            message: format!("Pit lane congestion: {} cars in the pit lane", in_pit),
            car_id: None,
            sector: None,
            timestamp: ctx.timestamp,
            acknowledged: false,
        };
        self.commit_alert(alert, out);
    }

    fn check_weather(&mut self, ctx: &TickContext, zones: &[WeatherZone], out: &mut Detections) {
        let cooldown = self.config.cooldowns.weather_ms;

        for zone in zones {
            let id = zone.sector_id;

            // A worsening held back by the cooldown stays pending until it is reported
            let previous = self.state.conditions.get(&id).copied().unwrap_or(WeatherCondition::Dry);
            if zone.condition <= previous {
                self.state.conditions.insert(id, zone.condition);
            } else if self
                .state
                .cooldowns
                .try_acquire(AlertKind::Weather, &format!("sector-{}", id), ctx.now_ms, cooldown)
            {
                self.state.conditions.insert(id, zone.condition);
                let alert = Alert {
                    id: String::new(),
                    kind: AlertKind::Weather,
                    severity: weather_severity(zone.condition),
                    message: format!(
                        "Sector {} now {} ({:.0}% rain, grip {:.0}%)",
                        id,
                        zone.condition.label(),
                        zone.rain_intensity,
                        zone.grip_level
                    ),
                    car_id: None,
                    sector: Some(id),
                    timestamp: ctx.timestamp,
                    acknowledged: false,
                };
                self.commit_alert(alert, out);
            }

            let threshold = self.config.grip_alert_threshold;
            let previous_grip = self.state.grip.get(&id).copied().unwrap_or(100.0);
            let crossed = zone.grip_level < threshold && previous_grip >= threshold;
            if !crossed {
                self.state.grip.insert(id, zone.grip_level);
            } else if self
                .state
                .cooldowns
                .try_acquire(AlertKind::Weather, &format!("grip-{}", id), ctx.now_ms, cooldown)
            {
                self.state.grip.insert(id, zone.grip_level);
                let alert = Alert {
                    id: String::new(),
                    kind: AlertKind::Weather,
                    severity: AlertSeverity::Warning,
                    message: format!("Low grip in sector {}: {:.0}%", id, zone.grip_level),
                    car_id: None,
                    sector: Some(id),
                    timestamp: ctx.timestamp,
                    acknowledged: false,
                };
                self.commit_alert(alert, out);
            }
        }
    }

    fn check_strategy(&mut self, ctx: &TickContext, cars: &[CarTelemetry], out: &mut Detections) {
        let cooldown = self.config.cooldowns.strategy_ms;

        for car in cars.iter().filter(|c| !c.in_pit) {
            if car.fuel < self.config.fuel_warning_pct
                && self
                    .state
                    .cooldowns
                    .try_acquire(AlertKind::Strategy, &format!("fuel-{}", car.id), ctx.now_ms, cooldown)
            {
                let alert = Alert {
                    id: String::new(),
                    kind: AlertKind::Strategy,
                    severity: AlertSeverity::Warning,
                    message: format!("{} ({}) low on fuel: {:.1}%", car.id, car.driver_name, car.fuel),
                    car_id: Some(car.id),
                    sector: Some(car.sector),
                    timestamp: ctx.timestamp,
                    acknowledged: false,
                };
                self.commit_alert(alert, out);
            }

            let stint = car.tire.stint_laps();
            if car.tire_laps > stint
                && self
                    .state
                    .cooldowns
                    .try_acquire(AlertKind::Strategy, &format!("tires-{}", car.id), ctx.now_ms, cooldown)
            {
                let alert = Alert {
                    id: String::new(),
                    kind: AlertKind::Strategy,
                    severity: AlertSeverity::Info,
                    message: format!(
                        "{} ({}) {} laps on a {}-lap tire, pit window open",
                        car.id, car.driver_name, car.tire_laps, stint
                    ),
                    car_id: Some(car.id),
                    sector: Some(car.sector),
                    timestamp: ctx.timestamp,
                    acknowledged: false,
                };
                self.commit_alert(alert, out);
            }
        }
    }

    fn raise_incident(
        &mut self,
        ctx: &TickContext,
        car: &CarTelemetry,
        kind: IncidentKind,
        severity: IncidentSeverity,
        description: String,
        out: &mut Detections,
    ) {
        self.state.next_incident += 1;
        let incident = Incident {
            id: format!("incident-{}", self.state.next_incident),
            kind,
            car_id: car.id,
            position: car.position,
            sector: car.sector,
            severity,
            timestamp: ctx.timestamp,
            description,
        };
        info!(id = %incident.id, car = %car.id, ?kind, ?severity, "incident");

        let mirror = Alert {
            id: String::new(),
            kind: AlertKind::Incident,
            severity: severity.into(),
            message: incident.description.clone(),
            car_id: Some(car.id),
            sector: Some(car.sector),
            timestamp: ctx.timestamp,
            acknowledged: false,
        };

        self.state.incidents.insert(0, incident.clone());
        self.state.incidents.truncate(self.config.incident_history_limit);
        out.incidents.push(incident);
        self.commit_alert(mirror, out);
    }

    /// Assign an id, prepend to history and hand the alert out
    fn commit_alert(&mut self, mut alert: Alert, out: &mut Detections) {
        self.state.next_alert += 1;
        alert.id = format!("alert-{}", self.state.next_alert);
        debug!(id = %alert.id, kind = alert.kind.as_str(), severity = ?alert.severity, "{}", alert.message);

        self.state.alerts.insert(0, alert.clone());
        self.state.alerts.truncate(self.config.alert_history_limit);
        out.alerts.push(alert);
    }

    fn maybe_prune(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.state.last_prune_ms) < self.config.cooldown_prune_interval_ms {
            return;
        }
        self.state.last_prune_ms = now_ms;
        let c = self.config.cooldowns.clone();
        let removed = self.state.cooldowns.prune(now_ms, |kind| match kind {
            AlertKind::Slowdown => c.slowdown_ms,
            AlertKind::Weather => c.weather_ms,
            AlertKind::PitCongestion => c.pit_congestion_ms,
            AlertKind::Incident => c.incident_ms,
            AlertKind::Strategy => c.strategy_ms,
        });
        if removed > 0 {
            debug!(removed, "pruned cooldowns");
        }
    }
}
