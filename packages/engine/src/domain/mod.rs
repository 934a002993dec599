//! Domain layer: value objects, entities, consensus rules and the
//! per-client session replica.

pub mod consensus;
pub mod entity;
pub mod error;
pub mod replica;
pub mod value_object;

pub use consensus::compute_consensus;
pub use entity::{ChatEntry, Item, ItemStatus, Session, SessionLifecycle, TimerPhase, TimerState, Vote};
pub use error::DomainError;
pub use replica::{Applied, SessionReplica};
pub use value_object::{DisplayName, ItemId, MessageId, MessageText, SessionId, UserId};
