//! Relay frame envelope.
//!
//! Frames wrap the broadcast events with the transport-level concerns the
//! relay owns: presence resolution, liveness and error reporting. The
//! relay never interprets event payloads beyond routing.

use serde::{Deserialize, Serialize};

use crate::presence::PresenceRecord;
use crate::protocol::event::SessionEvent;

/// Frames sent from a session client to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Publish an event onto the session topic
    Publish { event: SessionEvent },
    /// Replace this connection's presence record (the only client allowed
    /// to mutate a record is the one that owns it)
    PresenceUpdate { record: PresenceRecord },
    /// Liveness heartbeat
    Heartbeat,
    /// Explicit leave; the transport also detects silent disappearance
    Leave,
}

/// Frames sent from the relay to a session client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// First frame after a successful join: the full roster snapshot
    Welcome {
        session_id: String,
        roster: Vec<PresenceRecord>,
    },
    /// Full roster snapshot emitted whenever membership changes
    PresenceSync { roster: Vec<PresenceRecord> },
    /// Discrete join delta
    PresenceJoined { record: PresenceRecord },
    /// Discrete leave delta (explicit leave or liveness timeout)
    PresenceLeft { user_id: String },
    /// An event published by another session member
    Event { event: SessionEvent },
    /// Relay-side error report
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::Role;

    #[test]
    fn test_client_frame_heartbeat_wire_name() {
        // テスト項目: Heartbeat フレームが kebab-case のタグ名になる
        // given (前提条件):
        let frame = ClientFrame::Heartbeat;

        // when (操作):
        let json = serde_json::to_string(&frame).unwrap();

        // then (期待する結果):
        assert_eq!(json, r#"{"type":"heartbeat"}"#);
    }

    #[test]
    fn test_server_frame_round_trip() {
        // テスト項目: Welcome フレームがシリアライズ・デシリアライズで同一の値に戻る
        // given (前提条件):
        let frame = ServerFrame::Welcome {
            session_id: "s-1".to_string(),
            roster: vec![PresenceRecord::new(
                "alice".to_string(),
                "Alice".to_string(),
                Role::Moderator,
                1000,
            )],
        };

        // when (操作):
        let json = serde_json::to_string(&frame).unwrap();
        let back: ServerFrame = serde_json::from_str(&json).unwrap();

        // then (期待する結果):
        assert_eq!(back, frame);
    }
}
