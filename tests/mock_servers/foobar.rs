//! Mock foo_httpcontrol server for testing
//!
//! Simulates the template endpoint at /foobar2000controller/ with the
//! `js/state.json` and `js/playlists.json` responses, and applies the
//! commands the adapter sends.

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// A command as received on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedCommand {
    pub cmd: String,
    pub param1: Option<String>,
    pub param3: Option<String>,
}

/// Mock player state
struct MockFoobarState {
    /// `None` makes the status endpoint answer with an empty body
    status: Option<Value>,
    playlists: Option<Value>,
    /// Answer every request with this status code instead
    fail_with: Option<StatusCode>,
    /// Serve this raw body for status requests
    raw_status: Option<String>,
    delay: Option<Duration>,
    /// Expected `Authorization` header value
    auth: Option<String>,
    commands: Vec<ReceivedCommand>,
}

/// Mock foobar2000 with foo_httpcontrol
pub struct MockFoobarServer {
    addr: SocketAddr,
    state: Arc<RwLock<MockFoobarState>>,
    handle: JoinHandle<()>,
}

impl MockFoobarServer {
    /// Start a mock server on a random port, idle with three playlists
    pub async fn start() -> Self {
        let state = Arc::new(RwLock::new(MockFoobarState {
            status: Some(idle_status()),
            playlists: Some(json!({
                "playlistActive": "1",
                "playlists": [{ "name": "Queue" }, { "name": "Jazz" }, { "name": "Rock" }],
            })),
            fail_with: None,
            raw_status: None,
            delay: None,
            auth: None,
            commands: Vec::new(),
        }));

        let app = Router::new()
            .route("/foobar2000controller/", get(handle_request))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Get the server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start playing a track
    pub async fn play_track(&self, title: &str, artist: &str, album: &str) {
        let mut state = self.state.write().await;
        let status = state.status.get_or_insert_with(idle_status);
        status["isPlaying"] = json!("1");
        status["isPaused"] = json!("0");
        status["title"] = json!(title);
        status["artist"] = json!(artist);
        status["album"] = json!(album);
        status["itemPlayingLen"] = json!("200");
        status["itemPlayingPos"] = json!("10");
        status["albumArt"] = json!("foobar2000controller/img/cover.jpg");
    }

    /// Set a raw status field
    pub async fn set_field(&self, key: &str, value: Value) {
        let mut state = self.state.write().await;
        let status = state.status.get_or_insert_with(idle_status);
        status[key] = value;
    }

    /// Player not running: status answers with an empty body
    pub async fn set_absent(&self) {
        self.state.write().await.status = None;
    }

    pub async fn set_playlists(&self, playlists: Option<Value>) {
        self.state.write().await.playlists = playlists;
    }

    pub async fn fail_with(&self, status: StatusCode) {
        self.state.write().await.fail_with = Some(status);
    }

    pub async fn set_raw_status(&self, body: &str) {
        self.state.write().await.raw_status = Some(body.to_string());
    }

    pub async fn set_delay(&self, delay: Duration) {
        self.state.write().await.delay = Some(delay);
    }

    /// Require HTTP basic auth with this pre-encoded `user:pass`
    pub async fn require_basic_auth(&self, encoded: &str) {
        self.state.write().await.auth = Some(format!("Basic {}", encoded));
    }

    /// Commands received so far
    pub async fn commands(&self) -> Vec<ReceivedCommand> {
        self.state.read().await.commands.clone()
    }

    /// Stop the mock server
    pub async fn stop(self) {
        self.handle.abort();
    }
}

fn idle_status() -> Value {
    json!({
        "isPlaying": "0",
        "isPaused": "0",
        "title": "",
        "artist": "",
        "album": "",
        "volume": "50",
        "playbackorder": "0",
        "itemPlayingLen": "0",
        "itemPlayingPos": "0",
        "albumArt": "foobar2000controller/img/cover_not_available.png",
    })
}

async fn handle_request(
    State(state): State<Arc<RwLock<MockFoobarState>>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let delay = state.read().await.delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut state = state.write().await;

    if let Some(ref expected) = state.auth {
        let given = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if given != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    if let Some(status) = state.fail_with {
        return status.into_response();
    }

    if let Some(cmd) = query.get("cmd") {
        let received = ReceivedCommand {
            cmd: cmd.clone(),
            param1: query.get("param1").cloned(),
            param3: query.get("param3").cloned(),
        };
        apply_command(&mut state, &received);
        state.commands.push(received);
        return StatusCode::OK.into_response();
    }

    match query.get("param3").map(String::as_str) {
        Some("js/state.json") => {
            if let Some(ref raw) = state.raw_status {
                return (StatusCode::OK, raw.clone()).into_response();
            }
            match state.status {
                Some(ref status) => (StatusCode::OK, status.to_string()).into_response(),
                None => (StatusCode::OK, String::new()).into_response(),
            }
        }
        Some("js/playlists.json") => match state.playlists {
            Some(ref playlists) => (StatusCode::OK, playlists.to_string()).into_response(),
            None => (StatusCode::OK, String::new()).into_response(),
        },
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Apply the subset of commands whose effect shows up in the next status
fn apply_command(state: &mut MockFoobarState, command: &ReceivedCommand) {
    let arg = command.param1.clone().unwrap_or_default();

    if command.cmd == "SwitchPlaylist" {
        if let Some(ref mut playlists) = state.playlists {
            playlists["playlistActive"] = json!(arg);
        }
        return;
    }

    let Some(ref mut status) = state.status else {
        return;
    };
    match command.cmd.as_str() {
        "Volume" => status["volume"] = json!(arg),
        "PlaybackOrder" => status["playbackorder"] = json!(arg),
        "Start" => status["isPlaying"] = json!("1"),
        "Stop" => {
            status["isPlaying"] = json!("0");
            status["isPaused"] = json!("0");
        }
        "PlayOrPause" => {
            let playing = status["isPlaying"] == json!("1");
            status["isPlaying"] = json!(if playing { "0" } else { "1" });
            status["isPaused"] = json!(if playing { "1" } else { "0" });
        }
        _ => {}
    }
}
