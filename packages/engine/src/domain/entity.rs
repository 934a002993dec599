//! Domain entities: backlog items, votes, the timer, chat entries and
//! the session itself.

use serde::{Deserialize, Serialize};

use yoriai_shared::presence::Role;
use yoriai_shared::protocol::{ChatMessageRecord, EstimateValue, Scale, VoteRecord, TOMBSTONE_TEXT};

use super::error::DomainError;
use super::value_object::{ItemId, MessageId, SessionId, UserId};

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionLifecycle {
    Active,
    Ended,
}

/// An estimation session.
///
/// Owned by the client that created it; replicated read-only by others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Index into the ordered item list; mutated only by the Moderator
    pub active_index: usize,
    pub lifecycle: SessionLifecycle,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            active_index: 0,
            lifecycle: SessionLifecycle::Active,
        }
    }
}

/// Status of a backlog item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Pending,
    Estimated,
    Skipped,
}

/// A backlog item under estimation.
///
/// Status and final estimate are mutated only through the navigator's
/// accept/skip transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Vec<String>,
    pub priority: u32,
    pub status: ItemStatus,
    pub scale: Scale,
    /// Stored final estimate label, set when the item is accepted
    pub final_estimate: Option<String>,
}

impl Item {
    pub fn new(id: ItemId, title: String, scale: Scale) -> Self {
        Self {
            id,
            title,
            description: String::new(),
            acceptance_criteria: Vec::new(),
            priority: 0,
            status: ItemStatus::Pending,
            scale,
            final_estimate: None,
        }
    }
}

/// A participant's vote for one item.
///
/// At most one vote exists per `(item, voter)`; a later vote for the same
/// pair replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub item_id: ItemId,
    pub voter_id: UserId,
    pub voter_name: String,
    pub value: EstimateValue,
    pub submitted_at: i64,
    pub revealed: bool,
}

impl TryFrom<VoteRecord> for Vote {
    type Error = DomainError;

    fn try_from(record: VoteRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            item_id: ItemId::new(record.item_id)?,
            voter_id: UserId::new(record.voter_id)?,
            voter_name: record.voter_name,
            value: record.value,
            submitted_at: record.submitted_at,
            revealed: record.revealed,
        })
    }
}

impl From<Vote> for VoteRecord {
    fn from(vote: Vote) -> Self {
        Self {
            item_id: vote.item_id.into_string(),
            voter_id: vote.voter_id.into_string(),
            voter_name: vote.voter_name,
            value: vote.value,
            submitted_at: vote.submitted_at,
            revealed: vote.revealed,
        }
    }
}

/// Timer phases.
///
/// Exactly one authority (the Moderator's client) drives transitions;
/// everybody else mirrors published ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Expired,
}

/// Replicated countdown state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerState {
    pub phase: TimerPhase,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    /// Default duration applied by the next start
    pub limit_seconds: u32,
    pub item_id: Option<ItemId>,
}

impl TimerState {
    pub const DEFAULT_LIMIT_SECONDS: u32 = 60;

    pub fn idle() -> Self {
        Self {
            phase: TimerPhase::Idle,
            remaining_seconds: Self::DEFAULT_LIMIT_SECONDS,
            total_seconds: Self::DEFAULT_LIMIT_SECONDS,
            limit_seconds: Self::DEFAULT_LIMIT_SECONDS,
            item_id: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    /// Drop back to idle, keeping the configured limit
    pub fn reset(&mut self) {
        self.phase = TimerPhase::Idle;
        self.remaining_seconds = self.limit_seconds;
        self.total_seconds = self.limit_seconds;
        self.item_id = None;
    }
}

/// A chat message as held in each client's replica.
///
/// Mutable only by its author; deletion is a tombstone so that
/// out-of-order delivery of a delete can never resurrect stale content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: MessageId,
    pub session_id: SessionId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_role: Role,
    pub text: String,
    pub created_at: i64,
    pub item_id: Option<ItemId>,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub edited_at: Option<i64>,
    pub deleted_at: Option<i64>,
    /// Snapshot of the text before the first mutation. Audit only,
    /// never displayed.
    pub original_text: Option<String>,
}

impl ChatEntry {
    /// Replace the text in place. The pre-mutation text is snapshotted
    /// into `original_text` the first time.
    pub fn edit(&mut self, new_text: String, at: i64) {
        if self.original_text.is_none() {
            self.original_text = Some(self.text.clone());
        }
        self.text = new_text;
        self.is_edited = true;
        self.edited_at = Some(at);
    }

    /// Turn the entry into a tombstone. Idempotent.
    pub fn delete(&mut self, at: i64) {
        if self.is_deleted {
            return;
        }
        if self.original_text.is_none() {
            self.original_text = Some(self.text.clone());
        }
        self.text = TOMBSTONE_TEXT.to_string();
        self.is_deleted = true;
        self.deleted_at = Some(at);
    }

    /// Merge a remote update record into this entry.
    ///
    /// A tombstone is sticky: once deleted, an update arriving late (the
    /// edit was issued before the delete but delivered after) may update
    /// the edit flags and audit fields, but the displayed text stays the
    /// tombstone marker.
    pub fn merge_update(&mut self, record: &ChatMessageRecord) {
        if self.is_deleted {
            self.is_edited = self.is_edited || record.is_edited;
            if self.edited_at.is_none() {
                self.edited_at = record.edited_at;
            }
            if self.original_text.is_none() {
                self.original_text = record.original_text.clone();
            }
            return;
        }
        self.text = record.text.clone();
        self.is_edited = record.is_edited;
        self.edited_at = record.edited_at;
        if self.original_text.is_none() {
            self.original_text = record.original_text.clone();
        }
    }

    /// Merge a remote delete record into this entry. Idempotent.
    pub fn merge_delete(&mut self, record: &ChatMessageRecord) {
        self.text = TOMBSTONE_TEXT.to_string();
        self.is_deleted = true;
        if self.deleted_at.is_none() {
            self.deleted_at = record.deleted_at;
        }
        if let Some(original) = &record.original_text {
            self.original_text.get_or_insert_with(|| original.clone());
        }
        self.is_edited = self.is_edited || record.is_edited;
    }
}

impl TryFrom<ChatMessageRecord> for ChatEntry {
    type Error = DomainError;

    fn try_from(record: ChatMessageRecord) -> Result<Self, Self::Error> {
        let item_id = record.item_id.map(ItemId::new).transpose()?;
        Ok(Self {
            id: MessageId::new(record.id)?,
            session_id: SessionId::new(record.session_id)?,
            author_id: UserId::new(record.author_id)?,
            author_name: record.author_name,
            author_role: record.author_role,
            text: record.text,
            created_at: record.created_at,
            item_id,
            is_edited: record.is_edited,
            is_deleted: record.is_deleted,
            edited_at: record.edited_at,
            deleted_at: record.deleted_at,
            original_text: record.original_text,
        })
    }
}

impl From<ChatEntry> for ChatMessageRecord {
    fn from(entry: ChatEntry) -> Self {
        Self {
            id: entry.id.into_string(),
            session_id: entry.session_id.into_string(),
            author_id: entry.author_id.into_string(),
            author_name: entry.author_name,
            author_role: entry.author_role,
            text: entry.text,
            created_at: entry.created_at,
            item_id: entry.item_id.map(ItemId::into_string),
            is_edited: entry.is_edited,
            is_deleted: entry.is_deleted,
            edited_at: entry.edited_at,
            deleted_at: entry.deleted_at,
            original_text: entry.original_text,
        }
    }
}
