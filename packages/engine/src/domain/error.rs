//! Domain-level errors.

use thiserror::Error;

/// Errors raised by value object construction and replica application
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("identifier must not be empty")]
    EmptyId,

    #[error("display name must not be empty")]
    EmptyDisplayName,

    #[error("display name exceeds {max} characters: {len}")]
    DisplayNameTooLong { len: usize, max: usize },

    #[error("message text must not be empty")]
    EmptyMessageText,

    #[error("message text exceeds {max} characters: {len}")]
    MessageTextTooLong { len: usize, max: usize },

    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("item index {index} out of range (items: {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("vote value does not match the item's estimation scale")]
    ScaleMismatch,
}
