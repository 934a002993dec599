//! Presence tracker.
//!
//! Maintains the live participant roster from the transport's sync
//! snapshots and join/leave deltas. The roster is a deduplicated,
//! order-irrelevant set keyed by user id; a reconnecting client can
//! never appear twice.
//!
//! A client that disappears without a leave is a ghost until the
//! transport's liveness detection fires. Dependent components tolerate
//! ghosts: the video mesh reclaims dead peers through negotiation state,
//! not through presence alone.

use std::sync::Arc;

use tokio::sync::Mutex;

use yoriai_shared::presence::PresenceRecord;
use yoriai_shared::time::Clock;

use crate::domain::replica::SessionReplica;
use crate::port::bus::{BusError, EventBus};

use super::Identity;

/// Listener invoked with the full roster after every membership change
pub type RosterListener = Box<dyn Fn(&[PresenceRecord]) + Send + Sync>;

pub struct PresenceTracker {
    replica: Arc<Mutex<SessionReplica>>,
    bus: Arc<dyn EventBus>,
    identity: Arc<Identity>,
    clock: Arc<dyn Clock>,
    listener: Mutex<Option<RosterListener>>,
}

impl PresenceTracker {
    pub fn new(
        replica: Arc<Mutex<SessionReplica>>,
        bus: Arc<dyn EventBus>,
        identity: Arc<Identity>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            replica,
            bus,
            identity,
            clock,
            listener: Mutex::new(None),
        }
    }

    /// Register a callback fired after every roster change
    pub async fn on_roster_changed(&self, listener: RosterListener) {
        *self.listener.lock().await = Some(listener);
    }

    /// Publish this client's own presence record.
    ///
    /// The record is complete at join time — display name included — so
    /// nobody ever resolves a name from a secondary source.
    pub async fn join(&self) -> Result<(), BusError> {
        let record = self.identity.presence_record(self.clock.as_ref());
        {
            let mut replica = self.replica.lock().await;
            replica.apply_presence_joined(record.clone());
        }
        self.bus.update_presence(record).await?;
        self.notify().await;
        Ok(())
    }

    /// Untrack presence. Safe to call multiple times.
    pub async fn leave(&self) -> Result<(), BusError> {
        {
            let mut replica = self.replica.lock().await;
            replica.apply_presence_left(self.identity.user_id.as_str());
        }
        self.bus.leave().await
    }

    /// Apply a transport sync snapshot (authoritative)
    pub async fn handle_sync(&self, roster: Vec<PresenceRecord>) {
        {
            let mut replica = self.replica.lock().await;
            replica.apply_presence_sync(roster);
        }
        self.notify().await;
    }

    /// Apply a discrete join delta
    pub async fn handle_joined(&self, record: PresenceRecord) {
        {
            let mut replica = self.replica.lock().await;
            replica.apply_presence_joined(record);
        }
        self.notify().await;
    }

    /// Apply a discrete leave delta
    pub async fn handle_left(&self, user_id: &str) {
        {
            let mut replica = self.replica.lock().await;
            replica.apply_presence_left(user_id);
        }
        self.notify().await;
    }

    /// Current roster, sorted by user id
    pub async fn roster(&self) -> Vec<PresenceRecord> {
        let replica = self.replica.lock().await;
        replica.roster.values().cloned().collect()
    }

    async fn notify(&self) {
        let roster = self.roster().await;
        if let Some(listener) = self.listener.lock().await.as_ref() {
            listener(&roster);
        }
    }
}
