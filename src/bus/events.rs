//! Bus event and shared player model types
//!
//! `PlaybackState` is the five-valued state exposed to the host. `BusEvent` is
//! what the adapter publishes after each refresh, and what the SSE endpoint
//! streams to clients.

use serde::{Deserialize, Serialize};

// =============================================================================
// Playback state
// =============================================================================

/// Playback state of the player, recomputed from scratch on every poll.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// The status endpoint answered without a status object (player not running)
    Off,
    Playing,
    Paused,
    /// Player is up but neither playing nor paused
    Idle,
    /// Last status query failed, or no poll has completed yet
    #[default]
    Unknown,
}

impl PlaybackState {
    /// Whether track fields (title, position, volume, ...) are refreshed in this state
    pub fn has_track(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }

    /// Whether the playlist listing is refreshed in this state
    pub fn has_playlists(self) -> bool {
        matches!(self, Self::Playing | Self::Paused | Self::Idle)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Idle => write!(f, "idle"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Events published on the bus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum BusEvent {
    /// Playback state changed (including transitions to off/unknown)
    PlayerStateChanged {
        entity_id: String,
        state: PlaybackState,
    },

    /// Track metadata or album art changed
    NowPlayingChanged {
        entity_id: String,
        title: Option<String>,
        artist: Option<String>,
        album: Option<String>,
        image_url: Option<String>,
    },

    /// Volume level changed (0.0 - 1.0)
    VolumeChanged {
        entity_id: String,
        value: f64,
        is_muted: bool,
    },

    /// Active playlist or playlist listing changed
    SourceChanged {
        entity_id: String,
        source: String,
        sources: Vec<String>,
    },

    /// Shuffle mode changed
    ShuffleChanged { entity_id: String, enabled: bool },

    /// Adapter finished running (ACK for shutdown)
    AdapterStopped { adapter: String },

    /// Process is shutting down; adapters should stop
    ShuttingDown { reason: Option<String> },
}

impl BusEvent {
    /// Short event name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PlayerStateChanged { .. } => "player_state_changed",
            Self::NowPlayingChanged { .. } => "now_playing_changed",
            Self::VolumeChanged { .. } => "volume_changed",
            Self::SourceChanged { .. } => "source_changed",
            Self::ShuffleChanged { .. } => "shuffle_changed",
            Self::AdapterStopped { .. } => "adapter_stopped",
            Self::ShuttingDown { .. } => "shutting_down",
        }
    }

    /// Whether this event describes a change in a player's snapshot
    pub fn is_player_event(&self) -> bool {
        !matches!(
            self,
            Self::AdapterStopped { .. } | Self::ShuttingDown { .. }
        )
    }
}
