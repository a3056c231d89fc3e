//! Race session engine for Pitwall
//!
//! Car simulation, weather, alert and incident detection, and the session
//! controller that ties them together on a fixed tick.

pub mod circuit;
pub mod clock;
pub mod detection;
pub mod noise;
pub mod session;
pub mod simulation;
pub mod weather;

pub use circuit::{default_roster, default_track};
pub use clock::{SessionClock, TickContext};
pub use detection::{Detections, Detector};
pub use session::{publish_events, RaceEngine, SessionSnapshot, TickOutput, Transition};
pub use simulation::{FaultKind, Simulation};
pub use weather::WeatherEngine;
