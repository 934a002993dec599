//! Session navigator.
//!
//! The top-level state machine: which item is active, revealed or
//! concealed, accepted or skipped. The item index is Moderator-owned and
//! published as `item-changed`; followers apply it unconditionally (last
//! message wins — only the Moderator may move the index). Moving resets
//! the transient timer state and re-fetches the new item's known state
//! from the store instead of replaying history, which bounds recovery
//! cost after being offline.
//!
//! Accept is a one-way snapshot: it persists the consensus (or override)
//! at that moment, and later vote edits never retroactively alter an
//! already-accepted item.

use std::sync::Arc;

use tokio::sync::Mutex;

use yoriai_shared::protocol::{Scale, SessionEvent};

use crate::domain::entity::ItemStatus;
use crate::domain::replica::SessionReplica;
use crate::domain::value_object::ItemId;
use crate::port::bus::EventBus;
use crate::port::store::EstimationStore;

use super::error::NavigateError;
use super::{publish_lossy, Identity};

pub struct SessionNavigator {
    replica: Arc<Mutex<SessionReplica>>,
    store: Arc<dyn EstimationStore>,
    bus: Arc<dyn EventBus>,
    identity: Arc<Identity>,
}

impl SessionNavigator {
    pub fn new(
        replica: Arc<Mutex<SessionReplica>>,
        store: Arc<dyn EstimationStore>,
        bus: Arc<dyn EventBus>,
        identity: Arc<Identity>,
    ) -> Self {
        Self {
            replica,
            store,
            bus,
            identity,
        }
    }

    /// Move the active item pointer. Moderator only.
    pub async fn go_to(&self, index: usize) -> Result<(), NavigateError> {
        self.require_moderator()?;
        {
            let replica = self.replica.lock().await;
            if index >= replica.items.len() {
                return Err(NavigateError::IndexOutOfRange {
                    index,
                    len: replica.items.len(),
                });
            }
        }
        self.move_index(index).await;
        Ok(())
    }

    /// Accept the active item: persist the agreed estimate, mark the item
    /// `Estimated`, and advance to the next pending item.
    pub async fn accept(&self) -> Result<String, NavigateError> {
        self.require_moderator()?;
        let (item_id, label) = {
            let replica = self.replica.lock().await;
            let item = replica.active_item().ok_or(NavigateError::NoActiveItem)?;
            if !replica.is_revealed(&item.id) {
                return Err(NavigateError::NotRevealed);
            }
            let consensus = replica.consensus_for(&item.id);
            let value = consensus.value.ok_or(NavigateError::NoAgreedValue)?;
            (item.id.clone(), value.label())
        };

        self.store
            .update_item(&item_id, ItemStatus::Estimated, Some(label.clone()))
            .await?;
        {
            let mut replica = self.replica.lock().await;
            if let Some(item) = replica.items.iter_mut().find(|i| i.id == item_id) {
                item.status = ItemStatus::Estimated;
                item.final_estimate = Some(label.clone());
            }
        }

        self.advance().await;
        Ok(label)
    }

    /// Skip the active item. It stays revisitable.
    pub async fn skip(&self) -> Result<(), NavigateError> {
        self.require_moderator()?;
        let item_id = {
            let replica = self.replica.lock().await;
            let item = replica.active_item().ok_or(NavigateError::NoActiveItem)?;
            item.id.clone()
        };

        self.store
            .update_item(&item_id, ItemStatus::Skipped, None)
            .await?;
        {
            let mut replica = self.replica.lock().await;
            if let Some(item) = replica.items.iter_mut().find(|i| i.id == item_id) {
                item.status = ItemStatus::Skipped;
                item.final_estimate = None;
            }
        }

        self.advance().await;
        Ok(())
    }

    /// Switch the estimation scale for the active item. Existing votes
    /// are discarded — they were cast on a different scale.
    pub async fn change_scale(&self, new_scale: Scale) -> Result<(), NavigateError> {
        self.require_moderator()?;
        let event = {
            let mut replica = self.replica.lock().await;
            let item = replica.active_item().ok_or(NavigateError::NoActiveItem)?;
            let had_votes = !replica.votes_for(&item.id).is_empty();
            let event = SessionEvent::EstimationTypeChanged {
                new_scale,
                actor_id: self.identity.user_id.as_str().to_string(),
                had_votes,
            };
            replica
                .apply(&event, self.identity.user_id.as_str())
                .expect("estimation-type-changed application is infallible");
            event
        };
        publish_lossy(&self.bus, event).await;
        Ok(())
    }

    /// Re-fetch the active item's vote state from the store. Called after
    /// a remote `item-changed` was applied; the new state is pulled, not
    /// replayed from event history.
    pub async fn refresh_active_item(&self) {
        let item_id = {
            let replica = self.replica.lock().await;
            match replica.active_item() {
                Some(item) => item.id.clone(),
                None => return,
            }
        };
        self.pull_votes(&item_id).await;
    }

    async fn advance(&self) {
        let next = {
            let replica = self.replica.lock().await;
            let current = replica.session.active_index;
            replica
                .items
                .iter()
                .enumerate()
                .skip(current + 1)
                .find(|(_, item)| item.status == ItemStatus::Pending)
                .map(|(index, _)| index)
        };
        if let Some(index) = next {
            self.move_index(index).await;
        }
    }

    async fn move_index(&self, index: usize) {
        let (event, item_id) = {
            let mut replica = self.replica.lock().await;
            let event = SessionEvent::ItemChanged {
                new_index: index,
                actor_id: self.identity.user_id.as_str().to_string(),
            };
            replica
                .apply(&event, self.identity.user_id.as_str())
                .expect("item-changed application is infallible");
            (event, replica.active_item().map(|i| i.id.clone()))
        };
        publish_lossy(&self.bus, event).await;
        if let Some(item_id) = item_id {
            self.pull_votes(&item_id).await;
        }
    }

    async fn pull_votes(&self, item_id: &ItemId) {
        match self.store.list_votes_for_item(item_id).await {
            Ok(votes) => {
                let mut replica = self.replica.lock().await;
                replica.merge_store_votes(item_id, votes);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to re-fetch votes for item '{}': {}",
                    item_id.as_str(),
                    e
                );
            }
        }
    }

    fn require_moderator(&self) -> Result<(), NavigateError> {
        if self.identity.is_moderator() {
            Ok(())
        } else {
            Err(NavigateError::Unauthorized)
        }
    }
}
