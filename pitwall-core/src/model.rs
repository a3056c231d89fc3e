//! Race session data model
//!
//! Defines the records the engines produce and observers consume: track
//! geometry, car telemetry, weather zones, alerts, incidents and the session
//! itself. Wire names are camelCase to match the dashboard protocol.
//!
//! Coordinate system: 2-D canvas space, X right, Y down.

use crate::error::ParseCarIdError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// === Geometry ===

/// 2-D position in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `other`, `t` clamped to [0, 1]
    pub fn lerp(self, other: Position, t: f64) -> Position {
        let t = t.clamp(0.0, 1.0);
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

/// Point on the racing line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub x: f64,
    pub y: f64,
    pub sector: u8,
}

impl TrackPoint {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Shape of the speed trace through a sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorProfile {
    /// Long straight ending in a heavy braking zone
    Straight,
    /// Medium-speed sweepers
    Mixed,
    /// Slow corners and chicanes, accelerating towards the exit
    Technical,
}

/// Track sector, covering the half-open point range `start_index..end_index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sector {
    pub id: u8,
    pub name: String,
    pub start_index: usize,
    pub end_index: usize,
    pub length_m: f64,
    pub profile: SectorProfile,
    /// Hard speed ceiling in km/h before grip and DRS adjustment
    pub speed_ceiling_kph: f64,
}

impl Sector {
    pub fn contains(&self, index: usize) -> bool {
        (self.start_index..self.end_index).contains(&index)
    }

    pub fn point_count(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }
}

/// DRS zone, expressed as fractions of a lap (may wrap past the line)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrsZone {
    pub id: String,
    pub detection_pct: f64,
    pub activation_pct: f64,
    pub end_pct: f64,
}

/// Complete, immutable track description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackModel {
    pub name: String,
    pub country: String,
    pub total_length_m: f64,
    pub sectors: Vec<Sector>,
    pub drs_zones: Vec<DrsZone>,
    pub pit_entry: Position,
    pub pit_exit: Position,
    pub start_line: Position,
    pub points: Vec<TrackPoint>,
}

// === Roster ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub name: String,
    pub team_id: String,
    pub number: u16,
}

/// Teams and drivers taking part in the session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Roster {
    pub teams: Vec<Team>,
    pub drivers: Vec<Driver>,
}

// === Cars ===

/// Stable car identifier, rendered as `CAR_<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CarId(pub u16);

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CAR_{}", self.0)
    }
}

impl FromStr for CarId {
    type Err = ParseCarIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("CAR_")
            .and_then(|n| n.parse::<u16>().ok())
            .map(CarId)
            .ok_or_else(|| ParseCarIdError(s.to_string()))
    }
}

impl Serialize for CarId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CarId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Tyre compounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TireCompound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
}

impl TireCompound {
    /// Nominal stint length before the car should pit
    pub fn stint_laps(self) -> u32 {
        match self {
            TireCompound::Soft => 15,
            TireCompound::Medium => 25,
            TireCompound::Hard => 35,
            TireCompound::Intermediate => 20,
            TireCompound::Wet => 15,
        }
    }

    pub fn is_wet_weather(self) -> bool {
        matches!(self, TireCompound::Intermediate | TireCompound::Wet)
    }
}

/// Real-time telemetry for one car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarTelemetry {
    pub id: CarId,
    pub driver_name: String,
    pub team_id: String,
    pub position: Position,
    /// km/h
    pub speed: f64,
    pub tire: TireCompound,
    pub tire_laps: u32,
    /// Percentage, 0-100
    pub fuel: f64,
    /// Current lap time in milliseconds
    pub lap_time: u64,
    pub last_lap_time: Option<u64>,
    pub best_lap_time: Option<u64>,
    /// Laps completed since the start
    pub current_lap: u32,
    /// 1-3
    pub sector: u8,
    pub in_pit: bool,
    pub drs_enabled: bool,
    pub drs_available: bool,
    pub timestamp: DateTime<Utc>,
}

// === Weather ===

/// Rain intensity above which a zone is considered wet
pub const WET_RAIN_THRESHOLD: f64 = 30.0;

/// Rain intensity above which a zone is considered heavy rain
pub const HEAVY_RAIN_THRESHOLD: f64 = 70.0;

/// Track surface condition, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Dry,
    Damp,
    Wet,
    HeavyRain,
}

impl WeatherCondition {
    pub fn from_rain_intensity(rain: f64) -> Self {
        if rain > HEAVY_RAIN_THRESHOLD {
            WeatherCondition::HeavyRain
        } else if rain > WET_RAIN_THRESHOLD {
            WeatherCondition::Wet
        } else if rain > 0.0 {
            WeatherCondition::Damp
        } else {
            WeatherCondition::Dry
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WeatherCondition::Dry => "DRY",
            WeatherCondition::Damp => "DAMP",
            WeatherCondition::Wet => "WET",
            WeatherCondition::HeavyRain => "HEAVY RAIN",
        }
    }
}

/// Weather conditions for a single sector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherZone {
    pub sector_id: u8,
    pub condition: WeatherCondition,
    /// Ambient temperature, Celsius
    pub temperature: f64,
    /// Celsius
    pub track_temp: f64,
    /// Percentage
    pub humidity: f64,
    /// km/h
    pub wind_speed: f64,
    /// Degrees
    pub wind_direction: f64,
    /// 0-100
    pub rain_intensity: f64,
    /// 0-100
    pub grip_level: f64,
}

// === Alerts & incidents ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Slowdown,
    Weather,
    PitCongestion,
    Incident,
    Strategy,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Slowdown => "slowdown",
            AlertKind::Weather => "weather",
            AlertKind::PitCongestion => "pit_congestion",
            AlertKind::Incident => "incident",
            AlertKind::Strategy => "strategy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Alert raised by the detection engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub car_id: Option<CarId>,
    pub sector: Option<u8>,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    Collision,
    Spin,
    Debris,
    Mechanical,
    Slowdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
}

impl From<IncidentSeverity> for AlertSeverity {
    fn from(severity: IncidentSeverity) -> Self {
        match severity {
            IncidentSeverity::Low => AlertSeverity::Info,
            IncidentSeverity::Medium => AlertSeverity::Warning,
            IncidentSeverity::High => AlertSeverity::Critical,
        }
    }
}

/// Confirmed track incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: IncidentKind,
    pub car_id: CarId,
    pub position: Position,
    pub sector: u8,
    pub severity: IncidentSeverity,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// Completed pit stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitStop {
    pub car_id: CarId,
    pub lap_number: u32,
    pub duration_ms: u64,
    pub tire_from: TireCompound,
    pub tire_to: TireCompound,
    pub timestamp: DateTime<Utc>,
}

// === Session ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    Green,
    Yellow,
    DoubleYellow,
    Red,
    Blue,
    White,
    Chequered,
}

/// Race flag status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceFlag {
    #[serde(rename = "type")]
    pub kind: FlagKind,
    pub sector: Option<u8>,
    pub timestamp: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Practice,
    Qualifying,
    Sprint,
    #[default]
    Race,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Paused,
    Finished,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Paused => "paused",
            SessionStatus::Finished => "finished",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of the race session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceSession {
    pub session_id: String,
    pub session_type: SessionType,
    pub track_name: String,
    pub total_laps: u32,
    /// Leader's completed laps
    pub current_lap: u32,
    pub session_time_ms: u64,
    pub status: SessionStatus,
    pub weather: Vec<WeatherZone>,
    pub flags: Vec<RaceFlag>,
}

// === Published events ===

/// Payload of a published event, tagged by its type
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    TelemetryUpdate(Vec<CarTelemetry>),
    WeatherUpdate(Vec<WeatherZone>),
    Alert(Alert),
    Incident(Incident),
    PitStop(PitStop),
    FlagChange(RaceFlag),
    SessionUpdate(RaceSession),
}

impl EventPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventPayload::TelemetryUpdate(_) => "telemetry_update",
            EventPayload::WeatherUpdate(_) => "weather_update",
            EventPayload::Alert(_) => "alert",
            EventPayload::Incident(_) => "incident",
            EventPayload::PitStop(_) => "pit_stop",
            EventPayload::FlagChange(_) => "flag_change",
            EventPayload::SessionUpdate(_) => "session_update",
        }
    }
}

/// Event handed to the publish boundary
#[derive(Debug, Clone, Serialize)]
pub struct RaceEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl RaceEvent {
    pub fn new(timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self { timestamp, payload }
    }

    pub fn type_name(&self) -> &'static str {
        self.payload.type_name()
    }
}
