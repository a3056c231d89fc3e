//! REST API and SSE routes

use crate::error::ApiError;
use crate::manager;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt as FuturesStreamExt};
use pitwall_core::model::{
    Alert, CarId, CarTelemetry, Incident, PitStop, RaceSession, Roster, TrackModel, WeatherZone,
};
use pitwall_engine::{FaultKind, SessionSnapshot, Transition};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/track", get(track))
        .route("/api/teams", get(teams))
        .route("/api/session", get(session))
        .route("/api/session/start", post(start_session))
        .route("/api/session/stop", post(stop_session))
        .route("/api/session/reset", post(reset_session))
        .route("/api/cars", get(list_cars))
        .route("/api/cars/:id", get(get_car))
        .route("/api/cars/:id/pit", post(schedule_pit))
        .route("/api/cars/:id/fault", post(inject_fault))
        .route("/api/weather", get(weather))
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/:id/acknowledge", post(acknowledge_alert))
        .route("/api/incidents", get(list_incidents))
        .route("/api/pit-stops", get(list_pit_stops))
        .route("/api/snapshot", get(snapshot))
        .route("/api/events/stream", get(event_stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Accepts `CAR_7` or a bare `7`
fn parse_car_id(raw: &str) -> Result<CarId, ApiError> {
    match raw.parse::<CarId>() {
        Ok(id) => Ok(id),
        Err(e) => raw.parse::<u16>().map(CarId).map_err(|_| ApiError::from(e)),
    }
}

// === Read Endpoints ===

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    session_status: String,
    subscribers: usize,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let status = state.engine.lock().await.status();
    Json(Health {
        status: "ok",
        session_status: status.to_string(),
        subscribers: state.events_tx.receiver_count(),
    })
}

async fn track(State(state): State<AppState>) -> Json<TrackModel> {
    let engine = state.engine.lock().await;
    Json(engine.track().clone())
}

async fn teams(State(state): State<AppState>) -> Json<Roster> {
    let engine = state.engine.lock().await;
    Json(engine.roster().clone())
}

async fn session(State(state): State<AppState>) -> Json<RaceSession> {
    let session = state.engine.lock().await.session();
    Json(session)
}

async fn list_cars(State(state): State<AppState>) -> Json<Vec<CarTelemetry>> {
    let cars = state.engine.lock().await.telemetry();
    Json(cars)
}

async fn get_car(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<CarTelemetry>, ApiError> {
    let id = parse_car_id(&id)?;
    let cars = state.engine.lock().await.telemetry();
    cars.into_iter()
        .find(|car| car.id == id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("car {id}")))
}

async fn weather(State(state): State<AppState>) -> Json<Vec<WeatherZone>> {
    let zones = state.engine.lock().await.weather();
    Json(zones)
}

#[derive(Deserialize)]
struct AlertQuery {
    #[serde(default)]
    unacknowledged: bool,
    limit: Option<usize>,
}

async fn list_alerts(State(state): State<AppState>, Query(query): Query<AlertQuery>) -> Json<Vec<Alert>> {
    let engine = state.engine.lock().await;
    let alerts = engine
        .alerts()
        .iter()
        .filter(|a| !query.unacknowledged || !a.acknowledged)
        .take(query.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    Json(alerts)
}

async fn list_incidents(State(state): State<AppState>) -> Json<Vec<Incident>> {
    let engine = state.engine.lock().await;
    Json(engine.incidents().to_vec())
}

async fn list_pit_stops(State(state): State<AppState>) -> Json<Vec<PitStop>> {
    let engine = state.engine.lock().await;
    Json(engine.pit_stops().to_vec())
}

async fn snapshot(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let snapshot = state.engine.lock().await.snapshot();
    Json(snapshot)
}

// === Command Endpoints ===

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

fn describe(transition: Transition, verb: &str) -> String {
    match transition {
        Transition::Changed { from, to } => format!("Session {verb} ({from} -> {to})"),
        Transition::Unchanged(status) => format!("Session already {status}"),
    }
}

async fn start_session(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    let transition = manager::start_session(&state).await?;
    Ok(ActionResponse::ok(describe(transition, "started")))
}

async fn stop_session(State(state): State<AppState>) -> Result<Json<ActionResponse>, ApiError> {
    let transition = manager::stop_session(&state).await?;
    Ok(ActionResponse::ok(describe(transition, "stopped")))
}

async fn reset_session(State(state): State<AppState>) -> Json<ActionResponse> {
    let transition = manager::reset_session(&state).await;
    ActionResponse::ok(describe(transition, "reset"))
}

async fn schedule_pit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    let id = parse_car_id(&id)?;
    state.engine.lock().await.schedule_pit_stop(id)?;
    Ok(ActionResponse::ok(format!("Pit stop scheduled for {id}")))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaultRequest {
    kind: FaultKind,
    duration_ms: Option<u64>,
}

async fn inject_fault(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FaultRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let id = parse_car_id(&id)?;
    let mut engine = state.engine.lock().await;
    let duration = request
        .duration_ms
        .unwrap_or(engine.config().simulation.fault_duration_ms);
    engine.inject_fault(id, request.kind, duration)?;
    Ok(ActionResponse::ok(format!("{:?} fault injected for {id}", request.kind)))
}

async fn acknowledge_alert(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    if state.engine.lock().await.acknowledge_alert(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("alert {id}")))
    }
}

// === Event Stream Endpoint ===

#[derive(Deserialize)]
struct StreamQuery {
    types: Option<String>,
}

async fn event_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();
    let types: Option<HashSet<String>> = query.types.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    });

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let wanted = match (&result, &types) {
            (Ok(event), Some(types)) => types.contains(event.type_name()),
            _ => true,
        };
        async move {
            match result {
                Ok(event) if wanted => match serde_json::to_string(&event) {
                    Ok(json) => Some(Ok(Event::default().event(event.type_name()).data(json))),
                    Err(e) => {
                        tracing::error!("Failed to serialize event: {}", e);
                        None
                    }
                },
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Event stream lagging: {}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
