//! Yoriai session relay.
//!
//! The relay owns the transport-level concerns of a session topic:
//! presence resolution (one record per connection key, sync snapshots on
//! every membership change, join/leave deltas), at-most-once event
//! fan-out, targeted video-signal routing, and liveness detection for
//! clients that disappear without a leave. It never interprets event
//! payloads beyond routing.

mod domain;
mod handler;
mod runner;
mod signal;
mod state;
mod sweep;

pub use runner::run_server;
