//! The per-client session replica.
//!
//! Every client holds exactly one [`SessionReplica`] and mutates it only
//! through the application functions below. Inbound broadcast events go
//! through [`SessionReplica::apply`] — a single exhaustive match over the
//! event catalogue — so a new event variant cannot be silently ignored.
//!
//! All application functions are idempotent and commutative with respect
//! to re-delivery and loss: applying the same event twice leaves the same
//! state, and a missed event is corrected by the next snapshot-carrying
//! event or by reconciliation against the store.

use std::collections::{BTreeMap, HashMap, HashSet};

use yoriai_shared::presence::PresenceRecord;
use yoriai_shared::protocol::{
    ChatMessageRecord, ConsensusResult, EstimateValue, Scale, SessionEvent, SignalPayload,
};

use super::consensus::compute_consensus;
use super::entity::{ChatEntry, Item, ItemStatus, Session, TimerPhase, TimerState, Vote};
use super::error::DomainError;
use super::value_object::{ItemId, MessageId, SessionId, UserId};

/// Result of applying one inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Replica state changed
    Changed,
    /// Event was irrelevant here (e.g. a signal addressed to another peer)
    Ignored,
    /// A video signal addressed to this client; the caller hands it to
    /// the peer mesh
    Signal(SignalPayload),
}

/// A chat mutation that arrived before the message it refers to
#[derive(Debug, Clone, PartialEq)]
struct PendingChatMutation {
    record: ChatMessageRecord,
    is_delete: bool,
}

/// One client's replicated view of a session
#[derive(Debug, Clone)]
pub struct SessionReplica {
    pub session: Session,
    /// Scale applied to items that do not carry their own
    pub default_scale: Scale,
    /// Live participant set keyed by user id; order-irrelevant
    pub roster: BTreeMap<String, PresenceRecord>,
    pub items: Vec<Item>,
    /// Upsert map keyed by `(item, voter)` — at most one vote per pair
    pub votes: HashMap<(ItemId, UserId), Vote>,
    /// Items whose votes have been revealed; a one-way set
    pub revealed: HashSet<ItemId>,
    /// Moderator overrides of the derived consensus
    pub overrides: HashMap<ItemId, EstimateValue>,
    pub timer: TimerState,
    pub chat: Vec<ChatEntry>,
    /// Mutations for messages this replica has not seen yet; applied on
    /// arrival or resolved by store backfill
    pending_chat: HashMap<MessageId, PendingChatMutation>,
}

impl SessionReplica {
    pub fn new(session_id: SessionId, default_scale: Scale) -> Self {
        Self {
            session: Session::new(session_id),
            default_scale,
            roster: BTreeMap::new(),
            items: Vec::new(),
            votes: HashMap::new(),
            revealed: HashSet::new(),
            overrides: HashMap::new(),
            timer: TimerState::idle(),
            chat: Vec::new(),
            pending_chat: HashMap::new(),
        }
    }

    // ========================================
    // Read model
    // ========================================

    pub fn active_item(&self) -> Option<&Item> {
        self.items.get(self.session.active_index)
    }

    pub fn item_by_id(&self, item_id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|i| &i.id == item_id)
    }

    /// Scale in effect for an item (its own, or the session default)
    pub fn scale_for(&self, item_id: &ItemId) -> Scale {
        self.item_by_id(item_id)
            .map(|i| i.scale)
            .unwrap_or(self.default_scale)
    }

    /// Current votes for an item, sorted by voter id for stable display
    pub fn votes_for(&self, item_id: &ItemId) -> Vec<Vote> {
        let mut votes: Vec<Vote> = self
            .votes
            .values()
            .filter(|v| &v.item_id == item_id)
            .cloned()
            .collect();
        votes.sort_by(|a, b| a.voter_id.cmp(&b.voter_id));
        votes
    }

    pub fn is_revealed(&self, item_id: &ItemId) -> bool {
        self.revealed.contains(item_id)
    }

    /// Derived consensus for an item, with the moderator override (if any)
    /// replacing the derived value
    pub fn consensus_for(&self, item_id: &ItemId) -> ConsensusResult {
        let votes = self.votes_for(item_id);
        let mut result = compute_consensus(self.scale_for(item_id), &votes);
        if let Some(value) = self.overrides.get(item_id) {
            result.value = Some(*value);
        }
        result
    }

    pub fn chat_entry(&self, id: &MessageId) -> Option<&ChatEntry> {
        self.chat.iter().find(|m| &m.id == id)
    }

    /// Participants currently flagged as in the video call
    pub fn call_members(&self) -> Vec<&PresenceRecord> {
        self.roster.values().filter(|p| p.in_call).collect()
    }

    /// Message ids referenced by mutations this replica has not seen;
    /// the reconciler backfills them from the store
    pub fn pending_chat_ids(&self) -> Vec<MessageId> {
        self.pending_chat.keys().cloned().collect()
    }

    // ========================================
    // Presence application (transport-resolved)
    // ========================================

    /// Replace the roster with a transport snapshot. The snapshot is
    /// authoritative: it wins over any delta applied before it.
    pub fn apply_presence_sync(&mut self, roster: Vec<PresenceRecord>) {
        self.roster = roster
            .into_iter()
            .map(|record| (record.user_id.clone(), record))
            .collect();
    }

    /// Apply a join delta. Reconnects replace the previous record, so a
    /// participant can never appear twice.
    pub fn apply_presence_joined(&mut self, record: PresenceRecord) {
        self.roster.insert(record.user_id.clone(), record);
    }

    /// Apply a leave delta. Unknown ids are tolerated (the sync snapshot
    /// may already have removed the entry).
    pub fn apply_presence_left(&mut self, user_id: &str) {
        self.roster.remove(user_id);
    }

    // ========================================
    // Event application
    // ========================================

    /// Apply one inbound broadcast event.
    ///
    /// `self_id` identifies the local participant; peer-addressed events
    /// not meant for this client are ignored here.
    pub fn apply(&mut self, event: &SessionEvent, self_id: &str) -> Result<Applied, DomainError> {
        match event {
            SessionEvent::TimerStart {
                duration_seconds, ..
            } => {
                self.timer.phase = TimerPhase::Running;
                self.timer.total_seconds = *duration_seconds;
                self.timer.remaining_seconds = *duration_seconds;
                self.timer.item_id = self.active_item().map(|i| i.id.clone());
                Ok(Applied::Changed)
            }
            SessionEvent::TimerPause {
                remaining_seconds, ..
            } => {
                self.timer.phase = TimerPhase::Paused;
                self.timer.remaining_seconds = *remaining_seconds;
                Ok(Applied::Changed)
            }
            SessionEvent::TimerResume {
                remaining_seconds, ..
            } => {
                self.timer.phase = TimerPhase::Running;
                self.timer.remaining_seconds = *remaining_seconds;
                Ok(Applied::Changed)
            }
            SessionEvent::TimerReset { .. } => {
                self.timer.reset();
                Ok(Applied::Changed)
            }
            SessionEvent::TimerTick {
                remaining_seconds,
                running,
                ..
            } => {
                // Followers overwrite, never decrement: missing a tick can
                // desynchronize the display by at most one second.
                self.timer.remaining_seconds = *remaining_seconds;
                if *remaining_seconds == 0 {
                    self.timer.phase = TimerPhase::Expired;
                } else if *running {
                    self.timer.phase = TimerPhase::Running;
                }
                Ok(Applied::Changed)
            }
            SessionEvent::TimerConfigChanged {
                new_limit_seconds, ..
            } => {
                self.timer.limit_seconds = *new_limit_seconds;
                if self.timer.phase == TimerPhase::Idle {
                    self.timer.remaining_seconds = *new_limit_seconds;
                    self.timer.total_seconds = *new_limit_seconds;
                }
                Ok(Applied::Changed)
            }
            SessionEvent::VoteSubmitted { vote } | SessionEvent::VoteChanged { vote } => {
                let vote = Vote::try_from(vote.clone())?;
                self.upsert_vote(vote);
                Ok(Applied::Changed)
            }
            SessionEvent::VotesRevealed { item_id, votes, .. } => {
                let item_id = ItemId::new(item_id.clone())?;
                self.revealed.insert(item_id);
                // Merge the snapshot by upsert: a newer vote that arrived
                // before an older snapshot must survive it.
                for record in votes {
                    let mut vote = Vote::try_from(record.clone())?;
                    vote.revealed = true;
                    self.upsert_vote(vote);
                }
                Ok(Applied::Changed)
            }
            SessionEvent::ConsensusChanged {
                item_id,
                new_value,
                is_estimated_item,
                ..
            } => {
                let item_id = ItemId::new(item_id.clone())?;
                self.overrides.insert(item_id.clone(), *new_value);
                if *is_estimated_item {
                    if let Some(item) = self.items.iter_mut().find(|i| i.id == item_id) {
                        item.status = ItemStatus::Estimated;
                        item.final_estimate = Some(new_value.label());
                    }
                }
                Ok(Applied::Changed)
            }
            SessionEvent::ItemChanged { new_index, .. } => {
                // Only the Moderator moves the index, so the last message
                // wins unconditionally. Per-item vote and reveal state is
                // keyed by item id and needs no clearing; the transient
                // timer is reset and the new item's state is re-fetched by
                // the caller, not replayed.
                self.session.active_index = *new_index;
                self.timer.reset();
                Ok(Applied::Changed)
            }
            SessionEvent::EstimationTypeChanged {
                new_scale,
                had_votes,
                ..
            } => {
                self.default_scale = *new_scale;
                let active_id = {
                    let index = self.session.active_index;
                    match self.items.get_mut(index) {
                        Some(item) => {
                            item.scale = *new_scale;
                            Some(item.id.clone())
                        }
                        None => None,
                    }
                };
                if *had_votes {
                    if let Some(item_id) = active_id {
                        self.votes.retain(|(iid, _), _| iid != &item_id);
                    }
                }
                Ok(Applied::Changed)
            }
            SessionEvent::ChatMessage { message } => {
                self.apply_chat_created(message.clone())?;
                Ok(Applied::Changed)
            }
            SessionEvent::ChatMessageUpdated { message } => {
                self.apply_chat_mutation(message.clone(), false)?;
                Ok(Applied::Changed)
            }
            SessionEvent::ChatMessageDeleted { message } => {
                self.apply_chat_mutation(message.clone(), true)?;
                Ok(Applied::Changed)
            }
            SessionEvent::VideoSignal { payload } => {
                if payload.to == self_id {
                    Ok(Applied::Signal(payload.clone()))
                } else {
                    Ok(Applied::Ignored)
                }
            }
        }
    }

    /// Upsert a vote by `(item, voter)` key, last writer wins by arrival
    /// order. A vote for an already-revealed item is marked revealed, and
    /// a vote whose value no longer fits the item's scale (stale after an
    /// estimation-type change) is dropped.
    pub fn upsert_vote(&mut self, mut vote: Vote) {
        if let Some(item) = self.item_by_id(&vote.item_id) {
            let compatible = vote.value.is_sentinel()
                || matches!(
                    (item.scale, vote.value),
                    (Scale::Fibonacci, EstimateValue::Points { .. })
                        | (Scale::TShirt, EstimateValue::Shirt { .. })
                );
            if !compatible {
                tracing::warn!(
                    "Dropping vote from '{}' for item '{}': value does not fit scale",
                    vote.voter_id.as_str(),
                    vote.item_id.as_str()
                );
                return;
            }
        }
        if self.revealed.contains(&vote.item_id) {
            vote.revealed = true;
        }
        self.votes
            .insert((vote.item_id.clone(), vote.voter_id.clone()), vote);
    }

    /// Merge authoritative items from the store. Store status and final
    /// estimate win; local-only fields are replaced wholesale.
    pub fn replace_items(&mut self, items: Vec<Item>) {
        self.items = items;
    }

    /// Merge items re-read from the store, keeping the locally-known
    /// scale. Scale changes travel by event only — the store does not
    /// record them — so the local value is the newer one.
    pub fn merge_store_items(&mut self, items: Vec<Item>) {
        let local_scales: HashMap<ItemId, Scale> = self
            .items
            .iter()
            .map(|i| (i.id.clone(), i.scale))
            .collect();
        self.items = items
            .into_iter()
            .map(|mut item| {
                if let Some(scale) = local_scales.get(&item.id) {
                    item.scale = *scale;
                }
                item
            })
            .collect();
    }

    /// Merge votes re-read from the store for one item.
    ///
    /// A stored vote carrying `revealed = true` heals a missed
    /// votes-revealed broadcast.
    pub fn merge_store_votes(&mut self, item_id: &ItemId, votes: Vec<Vote>) {
        for vote in votes {
            if vote.revealed {
                self.revealed.insert(item_id.clone());
            }
            self.upsert_vote(vote);
        }
    }

    /// Merge an authoritative chat history slice from the store.
    /// Tombstones stay tombstones; unknown messages are inserted.
    pub fn merge_chat_history(&mut self, entries: Vec<ChatEntry>) {
        for entry in entries {
            self.pending_chat.remove(&entry.id);
            match self.chat.iter_mut().find(|m| m.id == entry.id) {
                Some(existing) => {
                    if existing.is_deleted {
                        continue;
                    }
                    *existing = entry;
                }
                None => self.chat.push(entry),
            }
        }
        self.sort_chat();
    }

    fn apply_chat_created(&mut self, record: ChatMessageRecord) -> Result<(), DomainError> {
        let entry = ChatEntry::try_from(record)?;
        if self.chat.iter().any(|m| m.id == entry.id) {
            // Re-delivery; the first copy already holds any later mutations.
            return Ok(());
        }
        let pending = self.pending_chat.remove(&entry.id);
        let mut entry = entry;
        if let Some(mutation) = pending {
            if mutation.is_delete {
                entry.merge_delete(&mutation.record);
            } else {
                entry.merge_update(&mutation.record);
            }
        }
        self.chat.push(entry);
        self.sort_chat();
        Ok(())
    }

    fn apply_chat_mutation(
        &mut self,
        record: ChatMessageRecord,
        is_delete: bool,
    ) -> Result<(), DomainError> {
        let id = MessageId::new(record.id.clone())?;
        match self.chat.iter_mut().find(|m| m.id == id) {
            Some(entry) => {
                if is_delete {
                    entry.merge_delete(&record);
                } else {
                    entry.merge_update(&record);
                }
            }
            None => {
                // The message predates our join or its create was lost.
                // Remember the mutation (delete wins over update) and let
                // reconciliation backfill the authoritative record.
                let replace = match self.pending_chat.get(&id) {
                    Some(existing) => is_delete || !existing.is_delete,
                    None => true,
                };
                if replace {
                    self.pending_chat
                        .insert(id, PendingChatMutation { record, is_delete });
                }
            }
        }
        Ok(())
    }

    fn sort_chat(&mut self) {
        self.chat
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }
}
