//! foobar2000 remote client (foo_httpcontrol)
//!
//! foo_httpcontrol serves a template directory over HTTP. Everything goes through
//! a single endpoint, `http://HOST:PORT/<template>/`, with query parameters:
//!
//! - `cmd=<Name>&param1=<arg>` runs a player command
//! - `param3=<file>` selects the response file rendered by the template
//!   (`NoResponse` for commands, `js/state.json` for status, `js/playlists.json`
//!   for the playlist listing)
//!
//! The plugin is loose about types: booleans arrive as `"1"`/`"0"` strings and
//! numbers arrive either as JSON numbers or as numeric strings, so fields are
//! read through lenient accessors rather than a strict serde model.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_TEMPLATE: &str = "foobar2000controller";
const STATE_RESOURCE: &str = "js/state.json";
const PLAYLISTS_RESOURCE: &str = "js/playlists.json";
const NO_RESPONSE: &str = "NoResponse";

/// Errors raised by the remote client
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("foobar2000 returned HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid remote configuration: {0}")]
    Config(String),
}

/// Commands understood by foo_httpcontrol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCommand {
    PlayOrPause,
    Stop,
    Start,
    StartPrevious,
    StartNext,
    Volume,
    VolumeDelta,
    VolumeMuteToggle,
    SeekSecond,
    SwitchPlaylist,
    PlaybackOrder,
}

impl RemoteCommand {
    /// Wire name sent as the `cmd` query parameter
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlayOrPause => "PlayOrPause",
            Self::Stop => "Stop",
            Self::Start => "Start",
            Self::StartPrevious => "StartPrevious",
            Self::StartNext => "StartNext",
            Self::Volume => "Volume",
            Self::VolumeDelta => "VolumeDelta",
            Self::VolumeMuteToggle => "VolumeMuteToggle",
            Self::SeekSecond => "SeekSecond",
            Self::SwitchPlaylist => "SwitchPlaylist",
            Self::PlaybackOrder => "PlaybackOrder",
        }
    }
}

impl std::fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Response payloads
// =============================================================================

/// Raw status object from `js/state.json`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStatus {
    fields: Map<String, Value>,
}

impl PlayerStatus {
    pub fn from_value(value: Value) -> Result<Self, RemoteError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(RemoteError::Malformed(format!(
                "status is not an object: {}",
                other
            ))),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.flag("isPlaying")
    }

    pub fn is_paused(&self) -> bool {
        self.flag("isPaused")
    }

    /// Boolean-like flag: `"1"` (or 1/true) is set, anything else is not
    pub fn flag(&self, key: &str) -> bool {
        match self.fields.get(key) {
            Some(Value::String(s)) => s.trim() == "1",
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }

    /// Text field; missing or null reads as empty
    pub fn text(&self, key: &str) -> String {
        match self.fields.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    /// Integer field; missing or non-numeric is a data-shape error
    pub fn integer(&self, key: &str) -> Result<i64, RemoteError> {
        let value = self
            .fields
            .get(key)
            .ok_or_else(|| RemoteError::Malformed(format!("missing field '{}'", key)))?;
        parse_integer(value).ok_or_else(|| {
            RemoteError::Malformed(format!("field '{}' is not an integer: {}", key, value))
        })
    }
}

/// Playlist listing from `js/playlists.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaylistListing {
    /// Index of the active playlist, `None` when the reported index is out of range
    pub active: Option<usize>,
    /// Playlist names in server order
    pub names: Vec<String>,
}

impl PlaylistListing {
    pub fn from_value(value: &Value) -> Result<Self, RemoteError> {
        let playlists = value
            .get("playlists")
            .and_then(Value::as_array)
            .ok_or_else(|| RemoteError::Malformed("missing 'playlists' array".to_string()))?;

        let names = playlists
            .iter()
            .map(|item| {
                item.get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        RemoteError::Malformed(format!("playlist entry without name: {}", item))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let raw_active = value
            .get("playlistActive")
            .ok_or_else(|| RemoteError::Malformed("missing 'playlistActive'".to_string()))?;
        let active = parse_integer(raw_active).ok_or_else(|| {
            RemoteError::Malformed(format!("'playlistActive' is not an integer: {}", raw_active))
        })?;
        let active = usize::try_from(active).ok().filter(|&i| i < names.len());

        Ok(Self { active, names })
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }
}

/// Parse a JSON number or numeric string
fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            })
        }
        _ => None,
    }
}

// =============================================================================
// Remote contract
// =============================================================================

/// Operations the player adapter needs from the player's control server.
///
/// `state()` and `playlist()` return `Ok(None)` when the server answers with an
/// empty body (foobar2000 not running). Every other failure, including a
/// refused connection, is an error.
#[async_trait]
pub trait FoobarRemote: Send + Sync {
    /// Base URL of the control server (`http://host:port`)
    fn url(&self) -> &str;

    async fn state(&self) -> Result<Option<PlayerStatus>, RemoteError>;

    async fn playlist(&self) -> Result<Option<PlaylistListing>, RemoteError>;

    /// Fire a command; the response body is not inspected
    async fn cmd(&self, command: RemoteCommand, arg: Option<i64>) -> Result<(), RemoteError>;
}

/// Connection settings for [`HttpRemote`]
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    pub template: String,
}

/// foo_httpcontrol client over HTTP
pub struct HttpRemote {
    client: Client,
    url: String,
    endpoint: Url,
    username: Option<String>,
    password: Option<String>,
}

impl HttpRemote {
    pub fn new(settings: RemoteSettings) -> Result<Self, RemoteError> {
        let url = format!("http://{}:{}", settings.host, settings.port);
        let template = format!("{}/", settings.template.trim_matches('/'));
        let endpoint = Url::parse(&url)
            .and_then(|base| base.join(&template))
            .map_err(|e| RemoteError::Config(format!("{}: {}", url, e)))?;

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| RemoteError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url,
            endpoint,
            username: settings.username,
            password: settings.password,
        })
    }

    /// Full endpoint URL requests are sent to
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn get(&self, query: &[(&str, String)]) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self.client.get(self.endpoint.clone()).query(query);
        if let Some(ref username) = self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }
        request.send().await
    }

    /// Fetch a template resource as JSON; an empty 2xx body is `None`
    async fn fetch_json(&self, resource: &str) -> Result<Option<Value>, RemoteError> {
        let response = self
            .get(&[("param3", resource.to_string())])
            .await
            .map_err(|e| self.classify(e))?;

        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        if body.trim().is_empty() {
            debug!(url = %self.url, resource, "empty response, foobar2000 not running");
            return Ok(None);
        }

        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| RemoteError::Malformed(format!("{}: {}", resource, e)))
    }

    fn classify(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout(self.url.clone())
        } else if e.is_connect() {
            RemoteError::Transport(format!("{} not reachable: {}", self.url, e))
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl FoobarRemote for HttpRemote {
    fn url(&self) -> &str {
        &self.url
    }

    async fn state(&self) -> Result<Option<PlayerStatus>, RemoteError> {
        match self.fetch_json(STATE_RESOURCE).await? {
            Some(value) => PlayerStatus::from_value(value).map(Some),
            None => Ok(None),
        }
    }

    async fn playlist(&self) -> Result<Option<PlaylistListing>, RemoteError> {
        match self.fetch_json(PLAYLISTS_RESOURCE).await? {
            Some(value) => PlaylistListing::from_value(&value).map(Some),
            None => Ok(None),
        }
    }

    async fn cmd(&self, command: RemoteCommand, arg: Option<i64>) -> Result<(), RemoteError> {
        let mut query = vec![("cmd", command.as_str().to_string())];
        if let Some(arg) = arg {
            query.push(("param1", arg.to_string()));
        }
        query.push(("param3", NO_RESPONSE.to_string()));

        debug!(url = %self.url, %command, ?arg, "foobar2000 command");

        let response = self.get(&query).await.map_err(|e| self.classify(e))?;
        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(host: &str, port: u16) -> RemoteSettings {
        RemoteSettings {
            host: host.to_string(),
            port,
            username: None,
            password: None,
            timeout: Duration::from_secs(3),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    #[test]
    fn status_flags_accept_string_and_numeric_forms() {
        let status = PlayerStatus::from_value(json!({
            "isPlaying": "1",
            "isPaused": 0,
        }))
        .unwrap();
        assert!(status.is_playing());
        assert!(!status.is_paused());

        let status = PlayerStatus::from_value(json!({ "isPlaying": "0", "isPaused": 1 })).unwrap();
        assert!(!status.is_playing());
        assert!(status.is_paused());

        let status = PlayerStatus::from_value(json!({})).unwrap();
        assert!(!status.is_playing());
        assert!(!status.is_paused());
    }

    #[test]
    fn status_integers_accept_strings() {
        let status = PlayerStatus::from_value(json!({
            "volume": "73",
            "playbackorder": 4,
            "itemPlayingLen": " 200 ",
        }))
        .unwrap();
        assert_eq!(status.integer("volume").unwrap(), 73);
        assert_eq!(status.integer("playbackorder").unwrap(), 4);
        assert_eq!(status.integer("itemPlayingLen").unwrap(), 200);
    }

    #[test]
    fn status_integer_errors_on_missing_or_garbage() {
        let status = PlayerStatus::from_value(json!({ "volume": "loud" })).unwrap();
        assert!(matches!(
            status.integer("volume"),
            Err(RemoteError::Malformed(_))
        ));
        assert!(matches!(
            status.integer("itemPlayingPos"),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn status_text_reads_missing_as_empty() {
        let status = PlayerStatus::from_value(json!({ "title": "X", "album": null })).unwrap();
        assert_eq!(status.text("title"), "X");
        assert_eq!(status.text("album"), "");
        assert_eq!(status.text("artist"), "");
    }

    #[test]
    fn status_must_be_an_object() {
        assert!(matches!(
            PlayerStatus::from_value(json!(["isPlaying"])),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn playlist_listing_resolves_active_name() {
        let listing = PlaylistListing::from_value(&json!({
            "playlistActive": "1",
            "playlists": [{ "name": "Queue" }, { "name": "Jazz" }, { "name": "Rock" }],
        }))
        .unwrap();
        assert_eq!(listing.names, vec!["Queue", "Jazz", "Rock"]);
        assert_eq!(listing.active, Some(1));
        assert_eq!(listing.active_name(), Some("Jazz"));
    }

    #[test]
    fn playlist_listing_out_of_range_active_is_none() {
        let listing = PlaylistListing::from_value(&json!({
            "playlistActive": -1,
            "playlists": [{ "name": "Queue" }],
        }))
        .unwrap();
        assert_eq!(listing.active, None);
        assert_eq!(listing.active_name(), None);

        let listing = PlaylistListing::from_value(&json!({
            "playlistActive": 5,
            "playlists": [{ "name": "Queue" }],
        }))
        .unwrap();
        assert_eq!(listing.active, None);
    }

    #[test]
    fn playlist_listing_rejects_bad_shapes() {
        assert!(PlaylistListing::from_value(&json!({ "playlistActive": 0 })).is_err());
        assert!(PlaylistListing::from_value(&json!({
            "playlistActive": "first",
            "playlists": [{ "name": "Queue" }],
        }))
        .is_err());
        assert!(PlaylistListing::from_value(&json!({
            "playlistActive": 0,
            "playlists": [{ "title": "Queue" }],
        }))
        .is_err());
    }

    #[test]
    fn command_wire_names() {
        assert_eq!(RemoteCommand::PlayOrPause.as_str(), "PlayOrPause");
        assert_eq!(RemoteCommand::VolumeMuteToggle.to_string(), "VolumeMuteToggle");
        assert_eq!(RemoteCommand::SeekSecond.as_str(), "SeekSecond");
    }

    #[test]
    fn http_remote_builds_base_url_and_endpoint() {
        let remote = HttpRemote::new(settings("h", 8888)).unwrap();
        assert_eq!(remote.url(), "http://h:8888");
        assert_eq!(remote.endpoint(), "http://h:8888/foobar2000controller/");

        let mut custom = settings("10.0.0.5", 8080);
        custom.template = "/default/".to_string();
        let remote = HttpRemote::new(custom).unwrap();
        assert_eq!(remote.endpoint(), "http://10.0.0.5:8080/default/");
    }

    #[test]
    fn http_remote_rejects_invalid_host() {
        assert!(matches!(
            HttpRemote::new(settings("bad host", 8888)),
            Err(RemoteError::Config(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        // Nothing listens on port 1; the connection is refused
        let remote = HttpRemote::new(settings("127.0.0.1", 1)).unwrap();
        assert!(matches!(
            remote.state().await,
            Err(RemoteError::Transport(_))
        ));
        assert!(matches!(
            remote.playlist().await,
            Err(RemoteError::Transport(_))
        ));
        assert!(remote.cmd(RemoteCommand::Stop, None).await.is_err());
    }
}
