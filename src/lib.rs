//! foobar2000 bridge
//!
//! Exposes a foobar2000 player running the foo_httpcontrol plugin as a
//! media player entity.
//!
//! This library provides:
//! - A polling adapter that keeps a snapshot of the player's state
//! - Command mapping from host operations to foo_httpcontrol commands
//! - Optional turn-on / turn-off actions
//! - An HTTP API with Server-Sent Events for real-time updates

pub mod adapters;
pub mod api;
pub mod bus;
pub mod config;
