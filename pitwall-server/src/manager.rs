//! Session lifecycle manager
//!
//! This module handles:
//! - Applying start / stop / reset to the engine
//! - Running the tick and weather drivers while a session is live
//! - Broadcasting engine events to subscribers

use crate::state::AppState;
use anyhow::Result;
use pitwall_core::error::SessionError;
use pitwall_core::model::{EventPayload, RaceEvent, SessionStatus};
use pitwall_core::publish::Publisher;
use pitwall_engine::{publish_events, RaceEngine, Transition};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Publisher backed by the broadcast channel
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<RaceEvent>,
}

impl BroadcastPublisher {
    pub fn new(tx: broadcast::Sender<RaceEvent>) -> Self {
        Self { tx }
    }
}

impl Publisher for BroadcastPublisher {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn publish(&self, event: RaceEvent) -> Result<()> {
        // Ignore error if no receivers (they'll get the next event)
        let _ = self.tx.send(event);
        Ok(())
    }
}

// Drivers only change while the engine lock is held

pub async fn start_session(state: &AppState) -> Result<Transition, SessionError> {
    let mut engine = state.engine.lock().await;
    let transition = engine.start()?;
    if transition.changed() {
        publish_events(vec![engine.session_event()], &publisher(state));
    }
    ensure_drivers(state, &engine).await;
    Ok(transition)
}

pub async fn stop_session(state: &AppState) -> Result<Transition, SessionError> {
    let mut engine = state.engine.lock().await;
    let transition = engine.stop()?;
    if transition.changed() {
        publish_events(vec![engine.session_event()], &publisher(state));
    }
    cancel_drivers(state).await;
    Ok(transition)
}

pub async fn reset_session(state: &AppState) -> Transition {
    let mut engine = state.engine.lock().await;
    cancel_drivers(state).await;
    let transition = engine.reset();
    publish_events(vec![engine.session_event()], &publisher(state));
    transition
}

/// Stop the drivers, leaving the session as it is
pub async fn shutdown(state: &AppState) {
    cancel_drivers(state).await;
}

fn publisher(state: &AppState) -> BroadcastPublisher {
    BroadcastPublisher::new(state.events_tx.clone())
}

async fn ensure_drivers(state: &AppState, engine: &RaceEngine) {
    if engine.status() != SessionStatus::InProgress {
        return;
    }
    let mut slot = state.drivers.lock().await;
    if slot.as_ref().is_some_and(|token| !token.is_cancelled()) {
        return;
    }

    let session = &engine.config().session;
    let (tick_ms, weather_ms) = (session.tick_interval_ms, session.weather_interval_ms);

    let token = CancellationToken::new();
    tokio::spawn(tick_loop(state.clone(), token.clone(), Duration::from_millis(tick_ms)));
    tokio::spawn(weather_loop(state.clone(), token.clone(), Duration::from_millis(weather_ms)));
    *slot = Some(token);
    info!(tick_ms, weather_ms, "session drivers started");
}

async fn cancel_drivers(state: &AppState) {
    if let Some(token) = state.drivers.lock().await.take() {
        token.cancel();
        info!("session drivers stopped");
    }
}

/// Fixed-period telemetry driver
async fn tick_loop(state: AppState, token: CancellationToken, period: Duration) {
    let publisher = publisher(&state);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let mut engine = state.engine.lock().await;
        match engine.tick() {
            Some(output) => engine.publish_tick(&output, &publisher),
            None if engine.status() == SessionStatus::Finished => {
                info!("session finished, stopping drivers");
                token.cancel();
                break;
            }
            None => {}
        }
    }
    debug!("tick driver ended");
}

/// Slower weather driver; the first step comes one period after start
async fn weather_loop(state: AppState, token: CancellationToken, period: Duration) {
    let publisher = publisher(&state);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let mut engine = state.engine.lock().await;
        if let Some(zones) = engine.evolve_weather() {
            let event = RaceEvent::new(engine.now(), EventPayload::WeatherUpdate(zones));
            publish_events(vec![event], &publisher);
        }
    }
    debug!("weather driver ended");
}
