//! Yoriai session synchronization engine.
//!
//! Each connected client runs one [`session::SessionEngine`]: a single
//! logical actor that validates local intents, applies them optimistically,
//! persists through the [`port::store::EstimationStore`] collaborator,
//! publishes events over the [`port::bus::EventBus`], and merges inbound
//! events into its [`domain::replica::SessionReplica`] with rules that are
//! idempotent and commutative under unordered, at-most-once delivery.

// layers
pub mod domain;
pub mod port;
pub mod sync;

// engine wiring
pub mod session;
