//! The broadcast event catalogue.
//!
//! Every message replicated over a session topic is one variant of
//! [`SessionEvent`]. Receivers dispatch through a single exhaustive
//! `match`, so a new event type can never be silently ignored.
//!
//! Delivery is unordered and at-most-once, therefore every payload is
//! designed so that applying it is idempotent and commutative: votes
//! carry their full upsert key, reveal carries a complete snapshot,
//! chat mutations carry the full message record.

use serde::{Deserialize, Serialize};

use crate::presence::Role;

/// Display text shown in place of a deleted chat message
pub const TOMBSTONE_TEXT: &str = "(message deleted)";

/// Estimation scale used for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Fibonacci,
    TShirt,
}

/// Ordinal T-shirt sizes, smallest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShirtSize {
    XS,
    S,
    M,
    L,
    XL,
}

/// A single estimation value.
///
/// `NeedInfo` and `TooBig` are sentinel votes: they are valid on either
/// scale, never contribute to a numeric average, and force a
/// non-unanimous consensus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EstimateValue {
    Points { points: u32 },
    Shirt { size: ShirtSize },
    NeedInfo,
    TooBig,
}

impl EstimateValue {
    /// True for the `NeedInfo` / `TooBig` sentinels
    pub fn is_sentinel(&self) -> bool {
        matches!(self, EstimateValue::NeedInfo | EstimateValue::TooBig)
    }

    /// Label used for display and for an item's stored final estimate
    pub fn label(&self) -> String {
        match self {
            EstimateValue::Points { points } => points.to_string(),
            EstimateValue::Shirt { size } => format!("{size:?}"),
            EstimateValue::NeedInfo => "need-info".to_string(),
            EstimateValue::TooBig => "too-big".to_string(),
        }
    }
}

/// A vote as it travels on the wire and rests in the store.
///
/// The upsert key is `(item_id, voter_id)`; re-delivery of the same
/// record must not duplicate a vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub item_id: String,
    pub voter_id: String,
    pub voter_name: String,
    pub value: EstimateValue,
    /// Unix timestamp of submission (JST, milliseconds)
    pub submitted_at: i64,
    #[serde(default)]
    pub revealed: bool,
}

/// Consensus derived from the current vote set of an item.
///
/// Never stored independently; recomputed from votes, or replaced by an
/// explicit moderator override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Agreed value when unanimous, or the moderator override
    pub value: Option<EstimateValue>,
    pub is_unanimous: bool,
    /// Arithmetic mean of numeric votes (Fibonacci scale only)
    pub average: Option<f64>,
}

/// A chat message record, complete enough that receivers can apply
/// create/edit/delete by id match alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: String,
    pub session_id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_role: Role,
    pub text: String,
    /// Unix timestamp of creation (JST, milliseconds)
    pub created_at: i64,
    /// Item the message was bound to, if written during its estimation
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub edited_at: Option<i64>,
    #[serde(default)]
    pub deleted_at: Option<i64>,
    /// Snapshot of the text before the first edit or the deletion.
    /// Kept for audit, never displayed.
    #[serde(default)]
    pub original_text: Option<String>,
}

/// WebRTC signaling data relayed between exactly two peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "kebab-case")]
pub enum SignalKind {
    Offer {
        sdp: String,
        handshake_id: String,
    },
    Answer {
        sdp: String,
        handshake_id: String,
    },
    IceCandidate {
        candidate: String,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u32>,
        handshake_id: String,
    },
}

/// Envelope for a signal: addressed peer-to-peer, scoped to one session,
/// so irrelevant peers can ignore it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPayload {
    pub from: String,
    pub to: String,
    pub session_id: String,
    #[serde(flatten)]
    pub kind: SignalKind,
}

/// The closed set of events broadcast over a session topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    TimerStart {
        duration_seconds: u32,
        actor_id: String,
    },
    TimerPause {
        remaining_seconds: u32,
        actor_id: String,
    },
    TimerResume {
        remaining_seconds: u32,
        actor_id: String,
    },
    TimerReset {
        actor_id: String,
    },
    TimerTick {
        remaining_seconds: u32,
        running: bool,
        actor_id: String,
    },
    TimerConfigChanged {
        new_limit_seconds: u32,
        actor_id: String,
    },
    VoteSubmitted {
        vote: VoteRecord,
    },
    VoteChanged {
        vote: VoteRecord,
    },
    VotesRevealed {
        item_id: String,
        votes: Vec<VoteRecord>,
        consensus: ConsensusResult,
        scale: Scale,
    },
    ConsensusChanged {
        item_id: String,
        new_value: EstimateValue,
        actor_id: String,
        is_estimated_item: bool,
    },
    ItemChanged {
        new_index: usize,
        actor_id: String,
    },
    EstimationTypeChanged {
        new_scale: Scale,
        actor_id: String,
        had_votes: bool,
    },
    ChatMessage {
        message: ChatMessageRecord,
    },
    ChatMessageUpdated {
        message: ChatMessageRecord,
    },
    ChatMessageDeleted {
        message: ChatMessageRecord,
    },
    VideoSignal {
        payload: SignalPayload,
    },
}

impl SessionEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::TimerStart { .. } => "timer-start",
            SessionEvent::TimerPause { .. } => "timer-pause",
            SessionEvent::TimerResume { .. } => "timer-resume",
            SessionEvent::TimerReset { .. } => "timer-reset",
            SessionEvent::TimerTick { .. } => "timer-tick",
            SessionEvent::TimerConfigChanged { .. } => "timer-config-changed",
            SessionEvent::VoteSubmitted { .. } => "vote-submitted",
            SessionEvent::VoteChanged { .. } => "vote-changed",
            SessionEvent::VotesRevealed { .. } => "votes-revealed",
            SessionEvent::ConsensusChanged { .. } => "consensus-changed",
            SessionEvent::ItemChanged { .. } => "item-changed",
            SessionEvent::EstimationTypeChanged { .. } => "estimation-type-changed",
            SessionEvent::ChatMessage { .. } => "chat-message",
            SessionEvent::ChatMessageUpdated { .. } => "chat-message-updated",
            SessionEvent::ChatMessageDeleted { .. } => "chat-message-deleted",
            SessionEvent::VideoSignal { .. } => "video-signal",
        }
    }

    /// For peer-addressed events, the single user id this event is meant for.
    ///
    /// The relay uses this to route instead of fanning out; receivers use it
    /// to ignore signals addressed to somebody else.
    pub fn target(&self) -> Option<&str> {
        match self {
            SessionEvent::VideoSignal { payload } => Some(payload.to.as_str()),
            _ => None,
        }
    }
}
