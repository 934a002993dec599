//! Vote aggregator.
//!
//! Owns per-item vote state and consensus computation. Submissions are
//! persisted first — the value must survive a crash immediately after
//! publish — then applied locally and published. Receivers upsert by
//! `(item, voter)`, last writer wins by arrival order at each receiver:
//! clocks are not trusted, and a single user never votes concurrently
//! with themselves from two clients.

use std::sync::Arc;

use tokio::sync::Mutex;

use yoriai_shared::protocol::{ConsensusResult, EstimateValue, Scale, SessionEvent, VoteRecord};
use yoriai_shared::time::Clock;

use crate::domain::entity::{ItemStatus, Vote};
use crate::domain::replica::SessionReplica;
use crate::domain::value_object::ItemId;
use crate::port::bus::EventBus;
use crate::port::store::EstimationStore;

use super::error::VoteError;
use super::{publish_lossy, Identity};

pub struct VoteAggregator {
    replica: Arc<Mutex<SessionReplica>>,
    store: Arc<dyn EstimationStore>,
    bus: Arc<dyn EventBus>,
    identity: Arc<Identity>,
    clock: Arc<dyn Clock>,
}

impl VoteAggregator {
    pub fn new(
        replica: Arc<Mutex<SessionReplica>>,
        store: Arc<dyn EstimationStore>,
        bus: Arc<dyn EventBus>,
        identity: Arc<Identity>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            replica,
            store,
            bus,
            identity,
            clock,
        }
    }

    /// Submit (or change) this participant's vote for an item.
    ///
    /// Permitted before and after reveal; a post-reveal edit re-publishes
    /// the revealed snapshot so late receivers converge.
    pub async fn submit_vote(
        &self,
        item_id: ItemId,
        value: EstimateValue,
    ) -> Result<(), VoteError> {
        let (vote, is_change, was_revealed) = {
            let replica = self.replica.lock().await;
            let item = replica
                .item_by_id(&item_id)
                .ok_or_else(|| VoteError::UnknownItem(item_id.as_str().to_string()))?;
            if !Self::value_fits_scale(item.scale, value) {
                return Err(VoteError::ScaleMismatch);
            }
            let key = (item_id.clone(), self.identity.user_id.clone());
            let is_change = replica.votes.contains_key(&key);
            let was_revealed = replica.is_revealed(&item_id);
            let vote = Vote {
                item_id: item_id.clone(),
                voter_id: self.identity.user_id.clone(),
                voter_name: self.identity.display_name.as_str().to_string(),
                value,
                submitted_at: self.clock.now_jst_millis(),
                revealed: was_revealed,
            };
            (vote, is_change, was_revealed)
        };

        // Persist first so the vote survives a crash right after publish.
        self.store.create_vote(vote.clone()).await?;

        let record = VoteRecord::from(vote);
        let event = if is_change {
            SessionEvent::VoteChanged { vote: record }
        } else {
            SessionEvent::VoteSubmitted { vote: record }
        };

        {
            let mut replica = self.replica.lock().await;
            replica.apply(&event, self.identity.user_id.as_str())?;
        }
        publish_lossy(&self.bus, event).await;

        // Editing after reveal must refresh the published snapshot.
        if was_revealed {
            let snapshot = self.reveal_event(&item_id).await?;
            publish_lossy(&self.bus, snapshot).await;
        }

        Ok(())
    }

    /// Current votes for an item
    pub async fn get_votes(&self, item_id: &ItemId) -> Vec<Vote> {
        let replica = self.replica.lock().await;
        replica.votes_for(item_id)
    }

    /// Reveal an item's votes: a one-way transition per item.
    ///
    /// Publishes the full vote snapshot with the derived consensus so a
    /// client joining after the reveal can sync without replaying
    /// history. Calling it twice leaves identical state.
    pub async fn reveal(&self, item_id: &ItemId) -> Result<(), VoteError> {
        let event = self.reveal_event(item_id).await?;
        {
            let mut replica = self.replica.lock().await;
            replica.apply(&event, self.identity.user_id.as_str())?;
        }

        // Re-persist the revealed flag so a reconciliation pull heals a
        // receiver that missed this broadcast. Best effort: the snapshot
        // below is the primary propagation path.
        let votes = {
            let replica = self.replica.lock().await;
            replica.votes_for(item_id)
        };
        for vote in votes {
            if let Err(e) = self.store.create_vote(vote).await {
                tracing::warn!(
                    "Failed to persist revealed flag for item '{}': {}",
                    item_id.as_str(),
                    e
                );
            }
        }

        publish_lossy(&self.bus, event).await;
        Ok(())
    }

    /// Derived consensus for an item, override included
    pub async fn consensus(&self, item_id: &ItemId) -> ConsensusResult {
        let replica = self.replica.lock().await;
        replica.consensus_for(item_id)
    }

    /// Replace the derived consensus with an explicit value.
    ///
    /// Moderator only. If the item is already estimated, the stored final
    /// estimate is updated immediately.
    pub async fn override_consensus(
        &self,
        item_id: &ItemId,
        value: EstimateValue,
    ) -> Result<(), VoteError> {
        if !self.identity.is_moderator() {
            return Err(VoteError::Unauthorized);
        }

        let is_estimated_item = {
            let replica = self.replica.lock().await;
            let item = replica
                .item_by_id(item_id)
                .ok_or_else(|| VoteError::UnknownItem(item_id.as_str().to_string()))?;
            item.status == ItemStatus::Estimated
        };

        if is_estimated_item {
            self.store
                .update_item(item_id, ItemStatus::Estimated, Some(value.label()))
                .await?;
        }

        let event = SessionEvent::ConsensusChanged {
            item_id: item_id.as_str().to_string(),
            new_value: value,
            actor_id: self.identity.user_id.as_str().to_string(),
            is_estimated_item,
        };
        {
            let mut replica = self.replica.lock().await;
            replica.apply(&event, self.identity.user_id.as_str())?;
        }
        publish_lossy(&self.bus, event).await;
        Ok(())
    }

    async fn reveal_event(&self, item_id: &ItemId) -> Result<SessionEvent, VoteError> {
        let replica = self.replica.lock().await;
        let scale = match replica.item_by_id(item_id) {
            Some(item) => item.scale,
            None => return Err(VoteError::UnknownItem(item_id.as_str().to_string())),
        };
        let votes: Vec<VoteRecord> = replica
            .votes_for(item_id)
            .into_iter()
            .map(|mut v| {
                v.revealed = true;
                VoteRecord::from(v)
            })
            .collect();
        let consensus = replica.consensus_for(item_id);
        Ok(SessionEvent::VotesRevealed {
            item_id: item_id.as_str().to_string(),
            votes,
            consensus,
            scale,
        })
    }

    fn value_fits_scale(scale: Scale, value: EstimateValue) -> bool {
        value.is_sentinel()
            || matches!(
                (scale, value),
                (Scale::Fibonacci, EstimateValue::Points { .. })
                    | (Scale::TShirt, EstimateValue::Shirt { .. })
            )
    }
}
