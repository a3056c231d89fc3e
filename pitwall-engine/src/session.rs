//! Session controller
//!
//! `RaceEngine` is the one explicitly owned session context. It holds the
//! session metadata and the three engines, applies start / stop / reset, and
//! turns each tick into the list of events to publish.

use crate::clock::SessionClock;
use crate::detection::{Cooldowns, Detections, Detector, DetectorState};
use crate::simulation::{FaultKind, Simulation, SimulationState};
use crate::weather::{WeatherEngine, WeatherState};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pitwall_core::config::EngineConfig;
use pitwall_core::error::{Command, SessionError};
use pitwall_core::model::{
    Alert, CarId, CarTelemetry, EventPayload, FlagKind, Incident, IncidentKind, IncidentSeverity,
    PitStop, RaceEvent, RaceFlag, RaceSession, Roster, SessionStatus, SessionType, TrackModel,
    WeatherZone,
};
use pitwall_core::publish::Publisher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a session command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed { from: SessionStatus, to: SessionStatus },
    /// Command accepted but the session was already in the requested state
    Unchanged(SessionStatus),
}

impl Transition {
    pub fn changed(&self) -> bool {
        matches!(self, Transition::Changed { .. })
    }

    pub fn status(&self) -> SessionStatus {
        match *self {
            Transition::Changed { to, .. } => to,
            Transition::Unchanged(status) => status,
        }
    }
}

/// Everything one tick produced, in publish order
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub timestamp: DateTime<Utc>,
    pub telemetry: Vec<CarTelemetry>,
    pub alerts: Vec<Alert>,
    pub incidents: Vec<Incident>,
    pub pit_stops: Vec<PitStop>,
    pub flags: Vec<RaceFlag>,
    /// Present when the lap count or status changed
    pub session: Option<RaceSession>,
}

impl TickOutput {
    pub fn events(&self) -> Vec<RaceEvent> {
        let ts = self.timestamp;
        let mut events = Vec::with_capacity(1 + self.alerts.len() + self.incidents.len());
        events.push(RaceEvent::new(ts, EventPayload::TelemetryUpdate(self.telemetry.clone())));
        events.extend(self.incidents.iter().cloned().map(|i| RaceEvent::new(ts, EventPayload::Incident(i))));
        events.extend(self.alerts.iter().cloned().map(|a| RaceEvent::new(ts, EventPayload::Alert(a))));
        events.extend(self.pit_stops.iter().cloned().map(|p| RaceEvent::new(ts, EventPayload::PitStop(p))));
        events.extend(self.flags.iter().cloned().map(|f| RaceEvent::new(ts, EventPayload::FlagChange(f))));
        if let Some(session) = &self.session {
            events.push(RaceEvent::new(ts, EventPayload::SessionUpdate(session.clone())));
        }
        events
    }
}

/// Hand events to a publisher, ignoring delivery failures
pub fn publish_events(events: Vec<RaceEvent>, publisher: &dyn Publisher) {
    for event in events {
        if let Err(e) = publisher.publish(event) {
            debug!(publisher = publisher.name(), "publish failed: {e:#}");
        }
    }
}

/// Session metadata owned by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: String,
    pub session_type: SessionType,
    pub total_laps: u32,
    pub current_lap: u32,
    pub status: SessionStatus,
    pub flags: Vec<RaceFlag>,
    /// Sector yellow flags and the session time they expire at
    pub yellow_until: BTreeMap<u8, u64>,
}

/// Complete, serializable session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub meta: SessionMeta,
    pub clock: SessionClock,
    pub simulation: SimulationState,
    pub weather: WeatherState,
    pub detector: DetectorState,
}

fn session_id(epoch: DateTime<Utc>) -> String {
    format!("session_{}", epoch.timestamp_millis())
}

impl FaultKind {
    pub fn incident_kind(self) -> IncidentKind {
        match self {
            FaultKind::Mechanical => IncidentKind::Mechanical,
            FaultKind::Spin => IncidentKind::Spin,
        }
    }
}

pub struct RaceEngine {
    track: Arc<TrackModel>,
    roster: Roster,
    config: EngineConfig,
    meta: SessionMeta,
    clock: SessionClock,
    simulation: Simulation,
    weather: WeatherEngine,
    detector: Detector,
}

impl RaceEngine {
    pub fn new(track: TrackModel, roster: Roster, config: EngineConfig) -> Result<Self> {
        track.validate().context("invalid track model")?;
        config.validate().context("invalid engine configuration")?;
        if roster.drivers.is_empty() {
            anyhow::bail!("roster has no drivers");
        }

        let track = Arc::new(track);
        let clock = SessionClock::new(Utc::now());
        let (meta, simulation, weather, detector) = Self::fresh(&track, &roster, &config, clock.epoch);
        info!(
            track = %track.name,
            cars = roster.drivers.len(),
            total_laps = config.session.total_laps,
            "race engine ready"
        );

        Ok(Self {
            track,
            roster,
            config,
            meta,
            clock,
            simulation,
            weather,
            detector,
        })
    }

    /// Resume a session from a snapshot
    pub fn restore(track: TrackModel, roster: Roster, config: EngineConfig, snapshot: SessionSnapshot) -> Result<Self> {
        track.validate().context("invalid track model")?;
        config.validate().context("invalid engine configuration")?;
        let track = Arc::new(track);

        Ok(Self {
            simulation: Simulation::from_state(track.clone(), config.simulation.clone(), snapshot.simulation),
            weather: WeatherEngine::from_state(config.weather.clone(), config.seed, snapshot.weather),
            detector: Detector::from_state(config.detection.clone(), snapshot.detector),
            meta: snapshot.meta,
            clock: snapshot.clock,
            track,
            roster,
            config,
        })
    }

    fn fresh(
        track: &Arc<TrackModel>,
        roster: &Roster,
        config: &EngineConfig,
        epoch: DateTime<Utc>,
    ) -> (SessionMeta, Simulation, WeatherEngine, Detector) {
        let meta = SessionMeta {
            session_id: session_id(epoch),
            session_type: config.session.session_type,
            total_laps: config.session.total_laps,
            current_lap: 0,
            status: SessionStatus::NotStarted,
            flags: Vec::new(),
            yellow_until: BTreeMap::new(),
        };
        let simulation = Simulation::new(track.clone(), roster, config.simulation.clone(), epoch);
        let weather = WeatherEngine::new(track, config.weather.clone(), config.seed);
        let detector = Detector::new(config.detection.clone());
        (meta, simulation, weather, detector)
    }

    // --- Commands ---

    pub fn start(&mut self) -> Result<Transition, SessionError> {
        let from = self.meta.status;
        match from {
            SessionStatus::InProgress => return Ok(Transition::Unchanged(from)),
            SessionStatus::Finished => {
                return Err(SessionError::InvalidTransition {
                    command: Command::Start,
                    status: from,
                })
            }
            SessionStatus::NotStarted => {
                // The session timeline begins when the lights go out
                let epoch = Utc::now();
                self.clock = SessionClock::new(epoch);
                self.meta.session_id = session_id(epoch);
                self.meta.flags = vec![RaceFlag {
                    kind: FlagKind::Green,
                    sector: None,
                    timestamp: epoch,
                    active: true,
                }];
            }
            SessionStatus::Paused => {}
        }
        self.meta.status = SessionStatus::InProgress;
        info!(session = %self.meta.session_id, %from, "session started");
        Ok(Transition::Changed {
            from,
            to: SessionStatus::InProgress,
        })
    }

    pub fn stop(&mut self) -> Result<Transition, SessionError> {
        let from = self.meta.status;
        match from {
            SessionStatus::InProgress => {
                self.meta.status = SessionStatus::Paused;
                info!(session = %self.meta.session_id, elapsed_ms = self.clock.elapsed_ms, "session paused");
                Ok(Transition::Changed {
                    from,
                    to: SessionStatus::Paused,
                })
            }
            SessionStatus::Paused => Ok(Transition::Unchanged(from)),
            SessionStatus::NotStarted | SessionStatus::Finished => Err(SessionError::InvalidTransition {
                command: Command::Stop,
                status: from,
            }),
        }
    }

    /// Back to a fresh grid, from any state
    pub fn reset(&mut self) -> Transition {
        let from = self.meta.status;
        let epoch = self.clock.epoch;
        let (meta, simulation, weather, detector) = Self::fresh(&self.track, &self.roster, &self.config, epoch);
        self.meta = meta;
        self.clock = SessionClock::new(epoch);
        self.simulation = simulation;
        self.weather = weather;
        self.detector = detector;
        info!(%from, "session reset");
        Transition::Changed {
            from,
            to: SessionStatus::NotStarted,
        }
    }

    pub fn schedule_pit_stop(&mut self, car: CarId) -> Result<(), SessionError> {
        if self.meta.status == SessionStatus::Finished {
            return Err(SessionError::Finished(Command::SchedulePit));
        }
        self.simulation.schedule_pit_stop(car)
    }

    pub fn inject_fault(&mut self, car: CarId, kind: FaultKind, duration_ms: u64) -> Result<(), SessionError> {
        if self.meta.status == SessionStatus::Finished {
            return Err(SessionError::Finished(Command::InjectFault));
        }
        self.simulation.inject_fault(car, kind, duration_ms)
    }

    pub fn acknowledge_alert(&mut self, id: &str) -> bool {
        self.detector.acknowledge(id)
    }

    // --- Time ---

    /// Advance one fixed tick; `None` unless the session is running
    pub fn tick(&mut self) -> Option<TickOutput> {
        if self.meta.status != SessionStatus::InProgress {
            return None;
        }

        let ctx = self.clock.advance(self.config.session.tick_interval_ms, self.config.seed);
        let step = self.simulation.step(&ctx, &self.weather);
        let telemetry = self.simulation.telemetry();
        let zones = self.weather.zones();

        let mut detections = self.detector.process(&ctx, &telemetry, &zones);
        for (car_id, kind) in &step.faults {
            if let Some(car) = telemetry.iter().find(|c| c.id == *car_id) {
                detections.extend(self.detector.report_fault(&ctx, car, kind.incident_kind()));
            }
        }

        let mut flags = self.update_flags(ctx.now_ms, ctx.timestamp, &detections);

        let leader = self.simulation.leader_laps();
        let mut session_changed = false;
        if leader > self.meta.current_lap {
            self.meta.current_lap = leader;
            session_changed = true;
            debug!(lap = leader, "leader started a new lap");
        }

        if self.meta.current_lap >= self.meta.total_laps {
            self.meta.status = SessionStatus::Finished;
            self.meta.yellow_until.clear();
            let chequered = RaceFlag {
                kind: FlagKind::Chequered,
                sector: None,
                timestamp: ctx.timestamp,
                active: true,
            };
            self.meta.flags = vec![chequered.clone()];
            flags.push(chequered);
            session_changed = true;
            info!(session = %self.meta.session_id, laps = self.meta.current_lap, "session finished");
        }

        Some(TickOutput {
            timestamp: ctx.timestamp,
            telemetry,
            alerts: detections.alerts,
            incidents: detections.incidents,
            pit_stops: step.pit_stops,
            flags,
            session: session_changed.then(|| self.session()),
        })
    }

    /// Raise yellows for new incidents and lower expired ones
    fn update_flags(&mut self, now_ms: u64, timestamp: DateTime<Utc>, detections: &Detections) -> Vec<RaceFlag> {
        let mut changed = Vec::new();

        for incident in &detections.incidents {
            let kind = if incident.severity == IncidentSeverity::High {
                FlagKind::DoubleYellow
            } else {
                FlagKind::Yellow
            };
            let until = now_ms + self.config.session.yellow_flag_ms;
            self.meta.yellow_until.insert(incident.sector, until);

            let existing = self
                .meta
                .flags
                .iter_mut()
                .find(|f| f.sector == Some(incident.sector));
            match existing {
                Some(flag) if flag.kind == FlagKind::DoubleYellow || flag.kind == kind => continue,
                Some(flag) => {
                    flag.kind = kind;
                    flag.timestamp = timestamp;
                    changed.push(flag.clone());
                }
                None => {
                    let flag = RaceFlag {
                        kind,
                        sector: Some(incident.sector),
                        timestamp,
                        active: true,
                    };
                    self.meta.flags.push(flag.clone());
                    changed.push(flag);
                }
            }
        }

        let expired: Vec<u8> = self
            .meta
            .yellow_until
            .iter()
            .filter(|&(_, &until)| now_ms >= until)
            .map(|(&sector, _)| sector)
            .collect();
        for sector in expired {
            self.meta.yellow_until.remove(&sector);
            if let Some(idx) = self.meta.flags.iter().position(|f| f.sector == Some(sector)) {
                let mut flag = self.meta.flags.remove(idx);
                flag.active = false;
                flag.timestamp = timestamp;
                changed.push(flag);
            }
        }
        changed
    }

    /// Evolve weather by one step; `None` unless the session is running
    pub fn evolve_weather(&mut self) -> Option<Vec<WeatherZone>> {
        if self.meta.status != SessionStatus::InProgress {
            return None;
        }
        let dt = self.config.session.weather_interval_ms as f64 / 1000.0;
        Some(self.weather.evolve(dt))
    }

    /// Force rain on a sector, for scenarios and operators
    pub fn set_rain(&mut self, sector_id: u8, rain: f64) -> bool {
        let ok = self.weather.set_rain(sector_id, rain);
        if !ok {
            warn!(sector = sector_id, "no weather zone for sector");
        }
        ok
    }

    pub fn publish_tick(&self, output: &TickOutput, publisher: &dyn Publisher) {
        publish_events(output.events(), publisher);
    }

    // --- Queries ---

    pub fn session(&self) -> RaceSession {
        RaceSession {
            session_id: self.meta.session_id.clone(),
            session_type: self.meta.session_type,
            track_name: self.track.name.clone(),
            total_laps: self.meta.total_laps,
            current_lap: self.meta.current_lap,
            session_time_ms: self.clock.elapsed_ms,
            status: self.meta.status,
            weather: self.weather.zones(),
            flags: self.meta.flags.clone(),
        }
    }

    pub fn session_event(&self) -> RaceEvent {
        RaceEvent::new(self.clock.now(), EventPayload::SessionUpdate(self.session()))
    }

    pub fn status(&self) -> SessionStatus {
        self.meta.status
    }

    pub fn track(&self) -> &TrackModel {
        &self.track
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn telemetry(&self) -> Vec<CarTelemetry> {
        self.simulation.telemetry()
    }

    pub fn weather(&self) -> Vec<WeatherZone> {
        self.weather.zones()
    }

    pub fn alerts(&self) -> &[Alert] {
        self.detector.alerts()
    }

    pub fn incidents(&self) -> &[Incident] {
        self.detector.incidents()
    }

    pub fn pit_stops(&self) -> &[PitStop] {
        self.simulation.pit_stops()
    }

    pub fn cooldowns(&self) -> &Cooldowns {
        self.detector.cooldowns()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            meta: self.meta.clone(),
            clock: self.clock,
            simulation: self.simulation.state().clone(),
            weather: self.weather.state().clone(),
            detector: self.detector.state().clone(),
        }
    }
}
