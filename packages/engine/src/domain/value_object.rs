//! Value objects with validating constructors.
//!
//! Identifiers and user-entered text are wrapped in newtypes so that an
//! empty or oversized value can never enter the domain layer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::DomainError;

const MAX_DISPLAY_NAME_LEN: usize = 64;
const MAX_MESSAGE_TEXT_LEN: usize = 2000;

macro_rules! id_value_object {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a raw identifier
            pub fn new(value: String) -> Result<Self, DomainError> {
                if value.trim().is_empty() {
                    return Err(DomainError::EmptyId);
                }
                Ok(Self(value))
            }

            /// Generate a fresh random identifier
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_value_object!(
    /// Identifier of an estimation session
    SessionId
);
id_value_object!(
    /// Identifier of a participant
    UserId
);
id_value_object!(
    /// Identifier of a backlog item
    ItemId
);
id_value_object!(
    /// Identifier of a chat message
    MessageId
);

/// Participant display name (non-empty, bounded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(value: String) -> Result<Self, DomainError> {
        let len = value.chars().count();
        if value.trim().is_empty() {
            return Err(DomainError::EmptyDisplayName);
        }
        if len > MAX_DISPLAY_NAME_LEN {
            return Err(DomainError::DisplayNameTooLong {
                len,
                max: MAX_DISPLAY_NAME_LEN,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Chat message text (non-empty, bounded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageText(String);

impl MessageText {
    pub fn new(value: String) -> Result<Self, DomainError> {
        let len = value.chars().count();
        if value.trim().is_empty() {
            return Err(DomainError::EmptyMessageText);
        }
        if len > MAX_MESSAGE_TEXT_LEN {
            return Err(DomainError::MessageTextTooLong {
                len,
                max: MAX_MESSAGE_TEXT_LEN,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
