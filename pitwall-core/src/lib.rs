//! Pitwall Core Library
//!
//! This crate provides the race session data model, track geometry helpers,
//! engine configuration and the publish boundary shared by the simulation
//! engine and the server.

pub mod config;
pub mod error;
pub mod model;
pub mod publish;
pub mod track;

pub use config::EngineConfig;
pub use error::{Command, ConfigError, SessionError, TrackError};
pub use model::{CarId, CarTelemetry, EventPayload, RaceEvent, RaceSession, TrackModel};
pub use publish::{MemoryPublisher, Publisher};
