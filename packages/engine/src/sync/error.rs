//! Errors raised by the synchronization components.
//!
//! Authorization failures are rejected here, locally, before any
//! publish — an invalid attempt is never transmitted as an event.
//! Persistence failures mean the optimistic local mutation has been
//! rolled back and the intent can be retried by re-issuing it.

use thiserror::Error;

use crate::domain::error::DomainError;
use crate::port::store::StoreError;

/// Vote aggregator errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VoteError {
    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("vote value does not match the item's estimation scale")]
    ScaleMismatch,

    #[error("only the moderator may override the consensus")]
    Unauthorized,

    #[error("vote was not persisted: {0}")]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Timer coordinator errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimerError {
    #[error("only the moderator controls the timer")]
    Unauthorized,

    #[error("cannot {action} while the timer is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },
}

/// Session navigator errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavigateError {
    #[error("only the moderator controls the item navigator")]
    Unauthorized,

    #[error("item index {index} out of range (items: {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no active item")]
    NoActiveItem,

    #[error("votes must be revealed before the item can be accepted")]
    NotRevealed,

    #[error("no agreed value: the consensus is split and no override is set")]
    NoAgreedValue,

    #[error("item update was not persisted: {0}")]
    Persistence(#[from] StoreError),
}

/// Media device errors (camera / microphone)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediaError {
    #[error("media permission denied")]
    PermissionDenied,

    #[error("media device busy")]
    DeviceBusy,

    #[error("no media device found")]
    NotFound,

    #[error("media failure: {0}")]
    Failed(String),
}

/// Peer video mesh errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("not in the call")]
    NotInCall,

    #[error("peer negotiation with '{peer}' failed: {reason}")]
    Negotiation { peer: String, reason: String },

    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Chat synchronizer errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChatError {
    #[error("only the author may modify a message")]
    NotAuthor,

    #[error("unknown message: {0}")]
    UnknownMessage(String),

    #[error("message has been deleted")]
    MessageDeleted,

    #[error("message was not persisted; the local copy was rolled back")]
    RolledBack {
        /// Composed text handed back so the user can retry
        restored_text: String,
        source: StoreError,
    },

    #[error("message update was not persisted: {0}")]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}
