//! HTTP API handlers

use crate::adapters::foobar::FoobarAdapter;
use crate::adapters::snapshot::Feature;
use crate::adapters::{MediaPlayer, PlayerCommand};
use crate::bus::{PlaybackState, SharedBus};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub player: Arc<FoobarAdapter>,
    pub bus: SharedBus,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(player: Arc<FoobarAdapter>, bus: SharedBus) -> Self {
        Self {
            player,
            bus,
            started_at: Instant::now(),
        }
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/status", get(status_handler))
        // Player routes
        .route("/player", get(player_handler))
        .route("/player/control", post(control_handler))
        .route("/player/refresh", post(refresh_handler))
        // Event stream (SSE)
        .route("/events", get(events_handler))
        .with_state(state)
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// General status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub git_sha: &'static str,
    pub uptime_secs: u64,
    pub player: String,
    pub base_url: String,
    pub state: PlaybackState,
    pub polling: bool,
    pub bus_subscribers: usize,
}

/// GET /status - Service health check
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.player.snapshot().await;

    Json(StatusResponse {
        service: "foobar-bridge",
        version: env!("FBB_VERSION"),
        git_sha: env!("FBB_GIT_SHA"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        player: state.player.name().to_string(),
        base_url: state.player.base_url().to_string(),
        state: snapshot.playback_state,
        polling: state.player.is_running(),
        bus_subscribers: state.bus.subscriber_count(),
    })
}

// =============================================================================
// Player handlers
// =============================================================================

/// Host-facing view of the player
#[derive(Debug, Serialize)]
pub struct PlayerView {
    pub name: String,
    pub entity_id: String,
    pub state: PlaybackState,
    pub media_title: String,
    pub media_artist: String,
    pub media_album_name: String,
    pub media_content_type: &'static str,
    pub media_duration: u64,
    pub media_position: Option<u64>,
    pub media_position_updated_at: Option<DateTime<Utc>>,
    pub media_image_url: Option<String>,
    pub volume_level: f64,
    pub is_volume_muted: bool,
    pub shuffle: bool,
    pub source: String,
    pub source_list: Vec<String>,
    pub supported_features: Vec<Feature>,
}

/// GET /player - Snapshot plus derived attributes
pub async fn player_handler(State(state): State<AppState>) -> Json<PlayerView> {
    let player = &state.player;
    let snapshot = player.snapshot().await;

    Json(PlayerView {
        name: player.name().to_string(),
        entity_id: player.entity_id().to_string(),
        state: snapshot.playback_state,
        media_content_type: snapshot.media_content_type(),
        media_position: snapshot.media_position(),
        media_image_url: snapshot.media_image_url().map(str::to_string),
        is_volume_muted: snapshot.is_volume_muted(),
        media_title: snapshot.track_title,
        media_artist: snapshot.track_artist,
        media_album_name: snapshot.track_album,
        media_duration: snapshot.track_duration_seconds,
        media_position_updated_at: snapshot.position_captured_at,
        volume_level: snapshot.volume_fraction,
        shuffle: snapshot.shuffle_enabled,
        source: snapshot.active_playlist_name,
        source_list: snapshot.playlist_names,
        supported_features: player.supported_features(),
    })
}

/// POST /player/control - Run a player command
pub async fn control_handler(
    State(state): State<AppState>,
    Json(command): Json<PlayerCommand>,
) -> impl IntoResponse {
    match state.player.handle_command(command.clone()).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))).into_response(),
        Err(e) => {
            warn!("Command {:?} failed: {}", command, e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub state: PlaybackState,
}

/// POST /player/refresh - Poll the player now
pub async fn refresh_handler(State(state): State<AppState>) -> Json<RefreshResponse> {
    Json(RefreshResponse {
        state: state.player.refresh().await,
    })
}

// =============================================================================
// SSE Events
// =============================================================================

/// GET /events - Server-Sent Events stream of player changes
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.bus.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| {
        match result {
            Ok(event) if event.is_player_event() => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                Err(_) => None,
            },
            Ok(_) => None,
            Err(_) => None, // Skip lagged messages
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
