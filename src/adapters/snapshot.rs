//! Player snapshot: the adapter's cached view of the player

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bus::PlaybackState;

/// Substring foo_httpcontrol puts in the album art path when a track has no cover
pub const NO_ART_SENTINEL: &str = "cover_not_available";

/// Playback order codes from foobar2000's own API
pub const ORDER_SEQUENTIAL: i64 = 0;
pub const ORDER_SHUFFLE: i64 = 4;

/// Last known state of the player.
///
/// Track fields are only refreshed while playing or paused, playlist fields
/// while playing, paused or idle; otherwise they keep their previous values.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PlayerSnapshot {
    pub playback_state: PlaybackState,
    pub track_title: String,
    pub track_artist: String,
    pub track_album: String,
    pub track_duration_seconds: u64,
    pub track_position_seconds: u64,
    pub position_captured_at: Option<DateTime<Utc>>,
    /// 0.0 - 1.0
    pub volume_fraction: f64,
    pub shuffle_enabled: bool,
    /// Raw art path as reported by the player
    pub album_art_path: String,
    /// Last absolute art URL built from a path with a cover
    pub album_art_url: String,
    pub active_playlist_name: String,
    pub playlist_names: Vec<String>,
}

impl PlayerSnapshot {
    /// Position is only meaningful while a track is loaded
    pub fn media_position(&self) -> Option<u64> {
        self.playback_state
            .has_track()
            .then_some(self.track_position_seconds)
    }

    /// foobar2000 has no readable mute flag; zero volume counts as muted
    pub fn is_volume_muted(&self) -> bool {
        self.volume_fraction == 0.0
    }

    pub fn media_image_url(&self) -> Option<&str> {
        (!self.album_art_url.is_empty()).then_some(self.album_art_url.as_str())
    }

    pub fn media_content_type(&self) -> &'static str {
        "music"
    }

    pub fn playlist_index(&self, name: &str) -> Option<usize> {
        self.playlist_names.iter().position(|n| n == name)
    }
}

pub fn shuffle_from_order(code: i64) -> bool {
    code == ORDER_SHUFFLE
}

pub fn order_for_shuffle(enabled: bool) -> i64 {
    if enabled {
        ORDER_SHUFFLE
    } else {
        ORDER_SEQUENTIAL
    }
}

/// Absolute art URL for a raw path, or `None` when the player reports no cover
pub fn album_art_url(base_url: &str, path: &str) -> Option<String> {
    if path.contains(NO_ART_SENTINEL) {
        None
    } else {
        Some(format!("{}/{}", base_url, path))
    }
}

/// Capabilities advertised to the host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Pause,
    VolumeSet,
    VolumeMute,
    Play,
    NextTrack,
    PreviousTrack,
    Stop,
    Seek,
    ShuffleSet,
    VolumeStep,
    SelectSource,
    TurnOn,
    TurnOff,
}

/// Features every foobar2000 player supports
pub const BASE_FEATURES: &[Feature] = &[
    Feature::Pause,
    Feature::VolumeSet,
    Feature::VolumeMute,
    Feature::Play,
    Feature::NextTrack,
    Feature::PreviousTrack,
    Feature::Stop,
    Feature::Seek,
    Feature::ShuffleSet,
    Feature::VolumeStep,
    Feature::SelectSource,
];
