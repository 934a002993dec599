//! Yoriai CLI client library.
//!
//! Bridges the session engine onto a WebSocket connection to the relay:
//! slash commands become engine intents, inbound frames drive the
//! replica, and a prompt thread keeps the terminal usable while frames
//! arrive.

pub mod bus;
pub mod commands;
pub mod error;
pub mod formatter;
pub mod policy;
pub mod session;
