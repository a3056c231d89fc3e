//! Error types shared across the workspace

use crate::model::{CarId, SessionStatus};
use thiserror::Error;

/// Commands accepted by the session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    SchedulePit,
    InjectFault,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::SchedulePit => "schedule pit stop",
            Command::InjectFault => "inject fault",
        };
        f.write_str(s)
    }
}

/// Rejections reported by the session controller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {command} while session is {status}")]
    InvalidTransition {
        command: Command,
        status: SessionStatus,
    },

    #[error("unknown car {0}")]
    UnknownCar(CarId),

    #[error("session is finished; reset before issuing {0}")]
    Finished(Command),
}

/// Track integrity violations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("track has no points")]
    NoPoints,

    #[error("track has no sectors")]
    NoSectors,

    #[error("track length must be positive, got {0}")]
    InvalidLength(f64),

    #[error("sector {id} starts at {found}, expected {expected}")]
    SectorGap { id: u8, expected: usize, found: usize },

    #[error("sector {id} is empty or inverted ({start}..{end})")]
    EmptySector { id: u8, start: usize, end: usize },

    #[error("sector ids must run 1..={expected}, found {found}")]
    SectorId { expected: u8, found: u8 },

    #[error("sectors end at {end} but the track has {points} points")]
    SectorCoverage { end: usize, points: usize },

    #[error("track has no DRS zones")]
    NoDrsZones,

    #[error("DRS zone {0} has a boundary outside [0, 1)")]
    DrsOutOfRange(String),
}

/// Engine configuration problems
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("warning threshold ({warning}) exceeds max cars in pit ({max})")]
    PitThresholds { warning: usize, max: usize },
}

/// Car identifier that does not follow the `CAR_<n>` form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid car id: {0}")]
pub struct ParseCarIdError(pub String);
