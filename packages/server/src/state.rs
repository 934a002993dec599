//! Relay state and connection management.

use std::collections::HashMap;

use serde::Deserialize;
use tokio::sync::{mpsc, Mutex};

use yoriai_shared::presence::{PresenceRecord, Role};

/// Query parameters for a WebSocket connection.
///
/// The presence record is complete at join time: user id, display name
/// and role all arrive with the connection, so no client ever needs to
/// resolve a name from a secondary source.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub session_id: String,
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
}

/// One connected session member
pub struct MemberHandle {
    /// Frame sender channel (JSON text)
    pub sender: mpsc::UnboundedSender<String>,
    /// The member's own presence record; only its owner may replace it
    pub record: PresenceRecord,
    /// Unix timestamp of the last frame or heartbeat (JST, milliseconds)
    pub last_seen_at: i64,
}

/// One session topic
#[derive(Default)]
pub struct SessionHub {
    /// Members keyed by user id
    pub members: HashMap<String, MemberHandle>,
    /// Unix timestamp when the hub was created (JST, milliseconds)
    pub created_at: i64,
}

/// Shared application state
pub struct AppState {
    /// Session hubs keyed by session id
    pub sessions: Mutex<HashMap<String, SessionHub>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
