//! Ports: the collaborator interfaces the engine depends on.
//!
//! The engine never talks to a concrete transport or data store; it
//! depends on these traits and the composition root injects the
//! implementations (dependency inversion, as in the repository /
//! message-pusher seams of the relay).

pub mod bus;
pub mod store;

pub use bus::{BusError, EventBus, LocalEventBus, LocalHub};
pub use store::{EstimationStore, InMemoryEstimationStore, StoreError};
