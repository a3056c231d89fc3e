//! Application state management

use crate::settings::Settings;
use anyhow::Result;
use pitwall_core::model::RaceEvent;
use pitwall_engine::{default_roster, default_track, RaceEngine};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The one session; commands, ticks and weather steps all go through this lock
    pub engine: Arc<Mutex<RaceEngine>>,

    /// Broadcast channel for published events
    /// Slow subscribers lose the oldest events rather than holding up the engine
    pub events_tx: broadcast::Sender<RaceEvent>,

    pub settings: Arc<Settings>,

    /// Cancellation token of the running tick and weather drivers
    pub drivers: Arc<Mutex<Option<CancellationToken>>>,
}

impl AppState {
    pub fn new(engine: RaceEngine, settings: Settings) -> Self {
        let (events_tx, _) = broadcast::channel(settings.event_capacity.max(1));

        Self {
            engine: Arc::new(Mutex::new(engine)),
            events_tx,
            settings: Arc::new(settings),
            drivers: Arc::new(Mutex::new(None)),
        }
    }

    /// State for the built-in circuit with the configured grid size
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let roster = default_roster(settings.engine.session.num_cars);
        let engine = RaceEngine::new(default_track(), roster, settings.engine.clone())?;
        Ok(Self::new(engine, settings))
    }

    /// Subscribe to published events
    pub fn subscribe(&self) -> broadcast::Receiver<RaceEvent> {
        self.events_tx.subscribe()
    }

    pub async fn drivers_running(&self) -> bool {
        self.drivers
            .lock()
            .await
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}
