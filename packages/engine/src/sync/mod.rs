//! Synchronization components.
//!
//! One component per concern of the session: presence, votes, timer,
//! navigation, peer video and chat, plus the reconciliation backstop.
//! Each validates local intents, persists where applicable, applies the
//! resulting event to the local replica with the same merge rules every
//! remote replica uses, and publishes it fire-and-forget.

pub mod chat;
pub mod error;
pub mod navigator;
pub mod presence;
pub mod reconcile;
pub mod timer;
pub mod video;
pub mod vote;

use std::sync::Arc;

use yoriai_shared::presence::{PresenceRecord, Role};
use yoriai_shared::protocol::SessionEvent;
use yoriai_shared::time::Clock;

use crate::domain::value_object::{DisplayName, UserId};
use crate::port::bus::EventBus;

/// The local participant's identity, fixed for the session's lifetime
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: DisplayName,
    pub role: Role,
}

impl Identity {
    pub fn is_moderator(&self) -> bool {
        self.role.is_moderator()
    }

    /// Build this participant's initial presence record
    pub fn presence_record(&self, clock: &dyn Clock) -> PresenceRecord {
        PresenceRecord::new(
            self.user_id.as_str().to_string(),
            self.display_name.as_str().to_string(),
            self.role,
            clock.now_jst_millis(),
        )
    }
}

/// Publish an event, tolerating transport failure.
///
/// Broadcast sends are fire-and-forget: a lost event is corrected by the
/// periodic reconciliation pull, so failures are logged, never surfaced.
pub(crate) async fn publish_lossy(bus: &Arc<dyn EventBus>, event: SessionEvent) {
    let name = event.name();
    if let Err(e) = bus.publish(event).await {
        tracing::warn!("Failed to publish '{}' event: {}", name, e);
    }
}
