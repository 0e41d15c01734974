//! foobar2000 player adapter and its supporting pieces

pub mod actions;
pub mod foobar;
pub mod handle;
pub mod remote;
pub mod snapshot;
pub mod traits;

pub use foobar::{FoobarAdapter, PlayerSettings};
pub use handle::AdapterHandle;
pub use remote::{FoobarRemote, HttpRemote, RemoteCommand, RemoteError};
pub use snapshot::{Feature, PlayerSnapshot};
pub use traits::{
    AdapterContext, AdapterLogic, MediaPlayer, PlayerCommand, PowerAction, Startable,
};
