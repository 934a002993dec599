//! Presence records shared between the relay and the clients.
//!
//! A presence record is complete at join time: it always carries the
//! display name and role, so no client ever needs to resolve a name
//! from a secondary source.

use serde::{Deserialize, Serialize};

/// Role of a participant within an estimation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Moderator,
    TeamMember,
}

impl Role {
    pub fn is_moderator(&self) -> bool {
        matches!(self, Role::Moderator)
    }
}

/// Self-describing presence record published by each participant's own client.
///
/// Exactly one authoritative source exists per record: the participant's own
/// connection. Other clients only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
    /// Unix timestamp when the participant came online (JST, milliseconds)
    pub online_at: i64,
    #[serde(default)]
    pub in_call: bool,
    #[serde(default)]
    pub video_enabled: bool,
    #[serde(default)]
    pub audio_enabled: bool,
}

impl PresenceRecord {
    /// Create a record for a participant that is not yet in the video call
    pub fn new(user_id: String, display_name: String, role: Role, online_at: i64) -> Self {
        Self {
            user_id,
            display_name,
            role,
            online_at,
            in_call: false,
            video_enabled: false,
            audio_enabled: false,
        }
    }
}
