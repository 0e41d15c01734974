//! foobar2000 player adapter
//!
//! Polls the foo_httpcontrol remote on a fixed interval, folds each status
//! response into a [`PlayerSnapshot`], and maps host commands onto remote
//! commands.
//!
//! ## Refresh
//!
//! ```text
//! state() ──► absent      → Off
//!         ──► isPlaying=1 → Playing ─┐ copy track fields
//!         ──► isPaused=1  → Paused  ─┘
//!         ──► otherwise   → Idle
//!         ──► error       → Unknown (nothing else touched)
//!
//! Playing | Paused | Idle ──► playlist() ──► absent → warn, keep previous
//! ```
//!
//! Every value is read and validated before the snapshot is written, so a
//! failing tick never leaves half-updated fields behind. There is no retry:
//! the next tick is the retry. Refreshes are serialized, so a slow poll can
//! never land after a newer one.
//!
//! ## Playlist selection
//!
//! The first playlist foobar2000 reports is reserved and never selectable.
//! Selecting any other playlist switches to it, starts it from the top, and
//! updates the active playlist name locally without waiting for a poll. A poll
//! already in flight may still overwrite that name with the server's older view.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::handle::AdapterHandle;
use crate::adapters::remote::{
    FoobarRemote, PlayerStatus, PlaylistListing, RemoteCommand, RemoteError,
};
use crate::adapters::snapshot::{
    album_art_url, order_for_shuffle, shuffle_from_order, Feature, PlayerSnapshot, BASE_FEATURES,
};
use crate::adapters::traits::{AdapterContext, AdapterLogic, MediaPlayer, PowerAction};
use crate::bus::{BusEvent, PlaybackState, SharedBus};

pub const DEFAULT_NAME: &str = "Foobar2000";
pub const DEFAULT_VOLUME_STEP: i64 = 5;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Per-device settings
#[derive(Clone)]
pub struct PlayerSettings {
    pub name: String,
    /// Volume change per step, in percent
    pub volume_step: i64,
    pub poll_interval: Duration,
    pub turn_on_action: Option<Arc<dyn PowerAction>>,
    pub turn_off_action: Option<Arc<dyn PowerAction>>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            volume_step: DEFAULT_VOLUME_STEP,
            poll_interval: DEFAULT_POLL_INTERVAL,
            turn_on_action: None,
            turn_off_action: None,
        }
    }
}

/// Derive a host entity id from a display name (`"Living Room"` → `media_player.living_room`)
pub fn entity_id_for(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "media_player.foobar2000".to_string()
    } else {
        format!("media_player.{}", slug)
    }
}

/// Map the two raw flags of a status response onto a playback state
pub fn resolve_playback_state(status: Option<&PlayerStatus>) -> PlaybackState {
    match status {
        None => PlaybackState::Off,
        Some(status) if status.is_playing() => PlaybackState::Playing,
        Some(status) if status.is_paused() => PlaybackState::Paused,
        Some(_) => PlaybackState::Idle,
    }
}

// =============================================================================
// Poll outcome
// =============================================================================

/// Track fields read from one status response
struct TrackUpdate {
    title: String,
    artist: String,
    album: String,
    volume_fraction: f64,
    shuffle_enabled: bool,
    duration_seconds: u64,
    position_seconds: u64,
    captured_at: DateTime<Utc>,
    art_path: String,
    art_url: Option<String>,
}

impl TrackUpdate {
    fn from_status(status: &PlayerStatus, base_url: &str) -> Result<Self, RemoteError> {
        let volume = status.integer("volume")?.clamp(0, 100);
        let order = status.integer("playbackorder")?;
        let duration_seconds = seconds(status, "itemPlayingLen")?;
        let position_seconds = seconds(status, "itemPlayingPos")?;
        let art_path = status.text("albumArt");
        let art_url = album_art_url(base_url, &art_path);

        Ok(Self {
            title: status.text("title"),
            artist: status.text("artist"),
            album: status.text("album"),
            volume_fraction: volume as f64 / 100.0,
            shuffle_enabled: shuffle_from_order(order),
            duration_seconds,
            position_seconds,
            captured_at: Utc::now(),
            art_path,
            art_url,
        })
    }
}

fn seconds(status: &PlayerStatus, key: &str) -> Result<u64, RemoteError> {
    let value = status.integer(key)?;
    u64::try_from(value)
        .map_err(|_| RemoteError::Malformed(format!("field '{}' is negative: {}", key, value)))
}

/// Everything one successful tick learned, applied in a single write
struct PollOutcome {
    state: PlaybackState,
    track: Option<TrackUpdate>,
    playlists: Option<PlaylistListing>,
}

impl PollOutcome {
    fn apply(self, snapshot: &mut PlayerSnapshot) {
        snapshot.playback_state = self.state;

        if let Some(track) = self.track {
            snapshot.track_title = track.title;
            snapshot.track_artist = track.artist;
            snapshot.track_album = track.album;
            snapshot.volume_fraction = track.volume_fraction;
            snapshot.shuffle_enabled = track.shuffle_enabled;
            snapshot.track_duration_seconds = track.duration_seconds;
            snapshot.track_position_seconds = track.position_seconds;
            snapshot.position_captured_at = Some(track.captured_at);
            snapshot.album_art_path = track.art_path;
            if let Some(url) = track.art_url {
                snapshot.album_art_url = url;
            }
        }

        if let Some(listing) = self.playlists {
            if let Some(name) = listing.active_name() {
                snapshot.active_playlist_name = name.to_string();
            }
            snapshot.playlist_names = listing.names;
        }
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// foobar2000 media player adapter
#[derive(Clone)]
pub struct FoobarAdapter {
    remote: Arc<dyn FoobarRemote>,
    snapshot: Arc<RwLock<PlayerSnapshot>>,
    settings: Arc<PlayerSettings>,
    entity_id: String,
    bus: SharedBus,
    running: Arc<AtomicBool>,
    /// Held across poll and apply so refreshes never interleave
    refresh_lock: Arc<Mutex<()>>,
    /// Wrapped in RwLock to allow creating fresh token on restart
    shutdown: Arc<RwLock<CancellationToken>>,
}

impl FoobarAdapter {
    pub fn new(remote: Arc<dyn FoobarRemote>, settings: PlayerSettings, bus: SharedBus) -> Self {
        let entity_id = entity_id_for(&settings.name);
        Self {
            remote,
            snapshot: Arc::new(RwLock::new(PlayerSnapshot::default())),
            settings: Arc::new(settings),
            entity_id,
            bus,
            running: Arc::new(AtomicBool::new(false)),
            refresh_lock: Arc::new(Mutex::new(())),
            shutdown: Arc::new(RwLock::new(CancellationToken::new())),
        }
    }

    /// Base URL of the remote control server
    pub fn base_url(&self) -> &str {
        self.remote.url()
    }

    pub fn poll_interval(&self) -> Duration {
        self.settings.poll_interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Poll the remote once and fold the result into the snapshot.
    ///
    /// Concurrent callers queue behind each other.
    pub async fn update(&self) -> PlaybackState {
        let _refresh = self.refresh_lock.lock().await;
        match self.poll().await {
            Ok(outcome) => {
                let state = outcome.state;
                let (before, after) = {
                    let mut snapshot = self.snapshot.write().await;
                    let before = snapshot.clone();
                    outcome.apply(&mut snapshot);
                    (before, snapshot.clone())
                };
                self.publish_changes(&before, &after);
                state
            }
            Err(e) => {
                error!("Updating {} state failed: {}", self.settings.name, e);
                let previous = {
                    let mut snapshot = self.snapshot.write().await;
                    std::mem::replace(&mut snapshot.playback_state, PlaybackState::Unknown)
                };
                if previous != PlaybackState::Unknown {
                    self.bus.publish(BusEvent::PlayerStateChanged {
                        entity_id: self.entity_id.clone(),
                        state: PlaybackState::Unknown,
                    });
                }
                PlaybackState::Unknown
            }
        }
    }

    async fn poll(&self) -> Result<PollOutcome, RemoteError> {
        let status = self.remote.state().await?;
        let state = resolve_playback_state(status.as_ref());

        let track = match status {
            Some(ref status) if state.has_track() => {
                Some(TrackUpdate::from_status(status, self.remote.url())?)
            }
            _ => None,
        };

        let playlists = if state.has_playlists() {
            let listing = self.remote.playlist().await?;
            if listing.is_none() {
                warn!("Updating {} sources failed: no playlist data", self.settings.name);
            }
            listing
        } else {
            None
        };

        Ok(PollOutcome {
            state,
            track,
            playlists,
        })
    }

    fn publish_changes(&self, before: &PlayerSnapshot, after: &PlayerSnapshot) {
        let entity_id = &self.entity_id;
        let to_option = |s: &str| {
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        };

        if before.playback_state != after.playback_state {
            debug!("{}: state {} -> {}", entity_id, before.playback_state, after.playback_state);
            self.bus.publish(BusEvent::PlayerStateChanged {
                entity_id: entity_id.clone(),
                state: after.playback_state,
            });
        }

        if before.track_title != after.track_title
            || before.track_artist != after.track_artist
            || before.track_album != after.track_album
            || before.album_art_url != after.album_art_url
        {
            self.bus.publish(BusEvent::NowPlayingChanged {
                entity_id: entity_id.clone(),
                title: to_option(&after.track_title),
                artist: to_option(&after.track_artist),
                album: to_option(&after.track_album),
                image_url: to_option(&after.album_art_url),
            });
        }

        if before.volume_fraction != after.volume_fraction {
            self.bus.publish(BusEvent::VolumeChanged {
                entity_id: entity_id.clone(),
                value: after.volume_fraction,
                is_muted: after.is_volume_muted(),
            });
        }

        if before.active_playlist_name != after.active_playlist_name
            || before.playlist_names != after.playlist_names
        {
            self.bus.publish(BusEvent::SourceChanged {
                entity_id: entity_id.clone(),
                source: after.active_playlist_name.clone(),
                sources: after.playlist_names.clone(),
            });
        }

        if before.shuffle_enabled != after.shuffle_enabled {
            self.bus.publish(BusEvent::ShuffleChanged {
                entity_id: entity_id.clone(),
                enabled: after.shuffle_enabled,
            });
        }
    }

    async fn send(&self, command: RemoteCommand, arg: Option<i64>) -> Result<()> {
        debug!(player = %self.settings.name, %command, ?arg, "sending command");
        self.remote.cmd(command, arg).await?;
        Ok(())
    }

    async fn run_power_action(
        &self,
        action: Option<&Arc<dyn PowerAction>>,
        label: &str,
    ) -> Result<()> {
        match action {
            Some(action) => {
                info!("{}: running {} ({})", self.entity_id, label, action.describe());
                action.run(&self.entity_id).await
            }
            None => {
                warn!("Action {} requested but {}_action is none", label, label);
                Ok(())
            }
        }
    }

    /// Start polling (internal - use Startable trait)
    async fn start_internal(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Previous token may be cancelled
        let shutdown = {
            let mut token = self.shutdown.write().await;
            *token = CancellationToken::new();
            token.clone()
        };

        let handle = AdapterHandle::new(self.clone(), self.bus.clone(), shutdown);
        tokio::spawn(async move {
            if let Err(e) = handle.run().await {
                warn!("foobar adapter exited with error: {}", e);
            }
        });

        Ok(())
    }

    /// Stop polling (internal - use Startable trait)
    async fn stop_internal(&self) {
        self.shutdown.read().await.cancel();
        self.running.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaPlayer for FoobarAdapter {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn supported_features(&self) -> Vec<Feature> {
        let mut features = BASE_FEATURES.to_vec();
        if self.settings.turn_on_action.is_some() {
            features.push(Feature::TurnOn);
        }
        if self.settings.turn_off_action.is_some() {
            features.push(Feature::TurnOff);
        }
        features
    }

    async fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.read().await.clone()
    }

    async fn refresh(&self) -> PlaybackState {
        self.update().await
    }

    async fn media_play_pause(&self) -> Result<()> {
        self.send(RemoteCommand::PlayOrPause, None).await
    }

    async fn media_pause(&self) -> Result<()> {
        let state = self.snapshot.read().await.playback_state;
        if state == PlaybackState::Playing {
            self.send(RemoteCommand::PlayOrPause, None).await
        } else {
            debug!("{}: pause ignored while {}", self.entity_id, state);
            Ok(())
        }
    }

    async fn media_stop(&self) -> Result<()> {
        self.send(RemoteCommand::Stop, None).await
    }

    async fn media_play(&self) -> Result<()> {
        self.send(RemoteCommand::Start, None).await
    }

    async fn media_previous_track(&self) -> Result<()> {
        self.send(RemoteCommand::StartPrevious, None).await
    }

    async fn media_next_track(&self) -> Result<()> {
        self.send(RemoteCommand::StartNext, None).await
    }

    async fn set_volume_level(&self, volume: f64) -> Result<()> {
        if !volume.is_finite() {
            return Err(anyhow!("Invalid volume level: {}", volume));
        }
        // foobar2000 takes an integer percentage
        let percent = (volume.clamp(0.0, 1.0) * 100.0).round() as i64;
        self.send(RemoteCommand::Volume, Some(percent)).await
    }

    async fn volume_up(&self) -> Result<()> {
        self.send(RemoteCommand::VolumeDelta, Some(self.settings.volume_step))
            .await
    }

    async fn volume_down(&self) -> Result<()> {
        self.send(RemoteCommand::VolumeDelta, Some(-self.settings.volume_step))
            .await
    }

    async fn mute_volume(&self, _mute: bool) -> Result<()> {
        self.send(RemoteCommand::VolumeMuteToggle, None).await
    }

    async fn media_seek(&self, position: f64) -> Result<()> {
        let seconds = position.max(0.0).trunc() as i64;
        self.send(RemoteCommand::SeekSecond, Some(seconds)).await
    }

    async fn select_source(&self, source: &str) -> Result<()> {
        let index = self
            .snapshot
            .read()
            .await
            .playlist_index(source)
            .ok_or_else(|| anyhow!("Unknown source '{}' for {}", source, self.settings.name))?;

        // Index 0 is the reserved playlist
        if index == 0 {
            debug!("{}: ignoring selection of reserved playlist '{}'", self.entity_id, source);
            return Ok(());
        }

        self.send(RemoteCommand::SwitchPlaylist, Some(index as i64))
            .await?;
        self.send(RemoteCommand::Start, Some(0)).await?;

        let sources = {
            let mut snapshot = self.snapshot.write().await;
            snapshot.active_playlist_name = source.to_string();
            snapshot.playlist_names.clone()
        };
        self.bus.publish(BusEvent::SourceChanged {
            entity_id: self.entity_id.clone(),
            source: source.to_string(),
            sources,
        });
        Ok(())
    }

    async fn set_shuffle(&self, shuffle: bool) -> Result<()> {
        self.send(RemoteCommand::PlaybackOrder, Some(order_for_shuffle(shuffle)))
            .await
    }

    async fn turn_on(&self) -> Result<()> {
        self.run_power_action(self.settings.turn_on_action.as_ref(), "turn_on")
            .await
    }

    async fn turn_off(&self) -> Result<()> {
        self.run_power_action(self.settings.turn_off_action.as_ref(), "turn_off")
            .await
    }
}

// =============================================================================
// AdapterLogic Implementation
// =============================================================================

#[async_trait]
impl AdapterLogic for FoobarAdapter {
    fn prefix(&self) -> &'static str {
        "foobar"
    }

    async fn run(&self, ctx: AdapterContext) -> Result<()> {
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Polling {} at {} every {:?}",
            self.settings.name,
            self.remote.url(),
            self.settings.poll_interval
        );

        loop {
            tokio::select! {
                _ = ctx.shutdown.cancelled() => {
                    info!("{} polling shutting down", self.settings.name);
                    break;
                }
                _ = ticker.tick() => {
                    let state = self.update().await;
                    debug!("{} polled: {}", self.entity_id, state);
                }
            }
        }

        Ok(())
    }
}

crate::impl_startable!(FoobarAdapter, "foobar");

// =============================================================================
// Tests
// =============================================================================
