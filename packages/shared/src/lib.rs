//! Shared library for Yoriai, the estimation session application.
//!
//! This crate carries everything both the relay server and the session
//! clients must agree on: the broadcast event catalogue, the relay frame
//! envelope, presence records, time utilities and logging setup.

pub mod logger;
pub mod presence;
pub mod protocol;
pub mod time;
