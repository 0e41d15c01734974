//! Mock servers for adapter integration testing
//!
//! These mock servers simulate the player's control plugin, allowing full
//! integration testing without a running foobar2000.

pub mod foobar;

pub use foobar::{MockFoobarServer, ReceivedCommand};
