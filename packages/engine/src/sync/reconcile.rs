//! Reconciliation backstop.
//!
//! Broadcast optimizes latency; reconciliation guarantees eventual
//! correctness. Because delivery is unordered and at-most-once, each
//! client periodically re-reads authoritative state from the store and
//! merges it into the replica: item statuses and final estimates, votes
//! for the active item (healing a missed reveal through the stored
//! revealed flags), and the chat history tail (resolving mutations that
//! referenced unknown message ids).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::domain::replica::SessionReplica;
use crate::domain::value_object::SessionId;
use crate::port::store::{EstimationStore, StoreError};

use super::chat::HISTORY_LIMIT;

/// Default cadence of the periodic pull
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(15);

pub struct Reconciler {
    replica: Arc<Mutex<SessionReplica>>,
    store: Arc<dyn EstimationStore>,
    session_id: SessionId,
}

impl Reconciler {
    pub fn new(
        replica: Arc<Mutex<SessionReplica>>,
        store: Arc<dyn EstimationStore>,
        session_id: SessionId,
    ) -> Self {
        Self {
            replica,
            store,
            session_id,
        }
    }

    /// One reconciliation pass. Transient desync self-heals here without
    /// user action; a store outage just defers to the next pass.
    pub async fn reconcile(&self) -> Result<(), StoreError> {
        let items = self.store.list_session_items(&self.session_id).await?;
        let active_item_id = {
            let mut replica = self.replica.lock().await;
            replica.merge_store_items(items);
            replica.active_item().map(|i| i.id.clone())
        };

        if let Some(item_id) = active_item_id {
            let votes = self.store.list_votes_for_item(&item_id).await?;
            let mut replica = self.replica.lock().await;
            replica.merge_store_votes(&item_id, votes);
        }

        let needs_backfill = {
            let replica = self.replica.lock().await;
            !replica.pending_chat_ids().is_empty() || replica.chat.is_empty()
        };
        if needs_backfill {
            let entries = self.store.list_chat_messages(HISTORY_LIMIT).await?;
            let mut replica = self.replica.lock().await;
            replica.merge_chat_history(entries);
        }

        Ok(())
    }
}
