//! Pitwall Server Library
//!
//! Exposes server components for integration testing.

pub mod api;
pub mod error;
pub mod manager;
pub mod settings;
pub mod state;
