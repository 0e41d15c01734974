use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::adapters::snapshot::{Feature, PlayerSnapshot};
use crate::bus::PlaybackState;

// =============================================================================
// Startable - Uniform adapter lifecycle trait
// =============================================================================

/// Trait for adapters that can be started/stopped uniformly.
#[async_trait]
pub trait Startable: Send + Sync {
    /// Adapter name/prefix (e.g., "foobar")
    fn name(&self) -> &'static str;

    /// Start the adapter. No-op if already running.
    async fn start(&self) -> Result<()>;

    /// Stop the adapter gracefully.
    async fn stop(&self);
}

/// Macro to implement Startable trait with minimal boilerplate.
///
/// Adapters must implement:
/// - `async fn start_internal(&self) -> Result<()>`
/// - `async fn stop_internal(&self)`
///
/// Usage:
/// ```ignore
/// impl_startable!(FoobarAdapter, "foobar");
/// ```
#[macro_export]
macro_rules! impl_startable {
    ($adapter:ty, $name:literal) => {
        #[async_trait::async_trait]
        impl $crate::adapters::Startable for $adapter {
            fn name(&self) -> &'static str {
                $name
            }

            async fn start(&self) -> anyhow::Result<()> {
                self.start_internal().await
            }

            async fn stop(&self) {
                self.stop_internal().await
            }
        }
    };
}

/// Context passed to adapter logic during execution
pub struct AdapterContext {
    /// Cancellation token for shutdown coordination
    pub shutdown: CancellationToken,
}

/// Adapter-specific logic trait
///
/// Lifecycle (shutdown watching, AdapterStopped ACK) is handled by AdapterHandle.
#[async_trait]
pub trait AdapterLogic: Send + Sync + 'static {
    /// Short adapter prefix used in logs and events
    fn prefix(&self) -> &'static str;

    /// Run the adapter's main loop (polling). Returns when ctx.shutdown fires.
    async fn run(&self, ctx: AdapterContext) -> Result<()>;

    /// Optional: called before run() for one-time setup
    async fn init(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Host contract
// =============================================================================

/// Playback commands a host can send to a media player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum PlayerCommand {
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Previous,
    /// Absolute volume, 0.0 - 1.0
    VolumeSet { level: f64 },
    VolumeUp,
    VolumeDown,
    /// Mute is a stateless toggle on foobar2000; `muted` is accepted but not honored
    Mute {
        #[serde(default)]
        muted: bool,
    },
    Seek { position: f64 },
    SelectSource { source: String },
    Shuffle { enabled: bool },
    TurnOn,
    TurnOff,
}

/// Read and command surface a host binds against.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Display name
    fn name(&self) -> &str;

    /// Host-facing identifier, handed to power actions
    fn entity_id(&self) -> &str;

    fn supported_features(&self) -> Vec<Feature>;

    /// Copy of the current snapshot
    async fn snapshot(&self) -> PlayerSnapshot;

    /// Poll the player once and return the resolved state
    async fn refresh(&self) -> PlaybackState;

    async fn media_play_pause(&self) -> Result<()>;
    async fn media_pause(&self) -> Result<()>;
    async fn media_stop(&self) -> Result<()>;
    async fn media_play(&self) -> Result<()>;
    async fn media_previous_track(&self) -> Result<()>;
    async fn media_next_track(&self) -> Result<()>;
    async fn set_volume_level(&self, volume: f64) -> Result<()>;
    async fn volume_up(&self) -> Result<()>;
    async fn volume_down(&self) -> Result<()>;
    async fn mute_volume(&self, mute: bool) -> Result<()>;
    async fn media_seek(&self, position: f64) -> Result<()>;
    async fn select_source(&self, source: &str) -> Result<()>;
    async fn set_shuffle(&self, shuffle: bool) -> Result<()>;
    async fn turn_on(&self) -> Result<()>;
    async fn turn_off(&self) -> Result<()>;

    /// Dispatch a serialized command to the matching operation
    async fn handle_command(&self, command: PlayerCommand) -> Result<()> {
        match command {
            PlayerCommand::Play => self.media_play().await,
            PlayerCommand::Pause => self.media_pause().await,
            PlayerCommand::PlayPause => self.media_play_pause().await,
            PlayerCommand::Stop => self.media_stop().await,
            PlayerCommand::Next => self.media_next_track().await,
            PlayerCommand::Previous => self.media_previous_track().await,
            PlayerCommand::VolumeSet { level } => self.set_volume_level(level).await,
            PlayerCommand::VolumeUp => self.volume_up().await,
            PlayerCommand::VolumeDown => self.volume_down().await,
            PlayerCommand::Mute { muted } => self.mute_volume(muted).await,
            PlayerCommand::Seek { position } => self.media_seek(position).await,
            PlayerCommand::SelectSource { source } => self.select_source(&source).await,
            PlayerCommand::Shuffle { enabled } => self.set_shuffle(enabled).await,
            PlayerCommand::TurnOn => self.turn_on().await,
            PlayerCommand::TurnOff => self.turn_off().await,
        }
    }
}

/// Externally configured turn-on / turn-off handler.
///
/// Invoked with the player's entity id as its only context.
#[async_trait]
pub trait PowerAction: Send + Sync {
    /// Human-readable description for logs
    fn describe(&self) -> String;

    async fn run(&self, entity_id: &str) -> Result<()>;
}
