//! Wire protocol shared between the relay server and session clients.
//!
//! The protocol is organized in two layers:
//! - `event`: the broadcast event catalogue replicated to every session member
//! - `frame`: the relay envelope wrapping events, presence and liveness

pub mod event;
pub mod frame;

pub use event::{
    ChatMessageRecord, ConsensusResult, EstimateValue, Scale, SessionEvent, ShirtSize,
    SignalKind, SignalPayload, VoteRecord, TOMBSTONE_TEXT,
};
pub use frame::{ClientFrame, ServerFrame};
