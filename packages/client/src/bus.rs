//! WebSocket-backed event bus.
//!
//! Implements the engine's broadcast-channel port by serializing client
//! frames into the connection's write channel. Sends are fire-and-forget
//! to match the transport contract; a closed connection surfaces as
//! `BusError::Closed` and the reconnect policy takes over.

use async_trait::async_trait;
use tokio::sync::mpsc;

use yoriai_engine::port::bus::{BusError, EventBus};
use yoriai_shared::presence::PresenceRecord;
use yoriai_shared::protocol::{ClientFrame, SessionEvent};

pub struct WsEventBus {
    out: mpsc::UnboundedSender<String>,
}

impl WsEventBus {
    pub fn new(out: mpsc::UnboundedSender<String>) -> Self {
        Self { out }
    }

    fn send_frame(&self, frame: &ClientFrame) -> Result<(), BusError> {
        let json = serde_json::to_string(frame)
            .map_err(|e| BusError::Transport(e.to_string()))?;
        self.out.send(json).map_err(|_| BusError::Closed)
    }

    /// Liveness heartbeat, driven by the session loop
    pub fn heartbeat(&self) -> Result<(), BusError> {
        self.send_frame(&ClientFrame::Heartbeat)
    }
}

#[async_trait]
impl EventBus for WsEventBus {
    async fn publish(&self, event: SessionEvent) -> Result<(), BusError> {
        self.send_frame(&ClientFrame::Publish { event })
    }

    async fn update_presence(&self, record: PresenceRecord) -> Result<(), BusError> {
        self.send_frame(&ClientFrame::PresenceUpdate { record })
    }

    async fn leave(&self) -> Result<(), BusError> {
        // Leaving twice just sends a second no-op frame; the relay's
        // removal path is idempotent.
        self.send_frame(&ClientFrame::Leave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yoriai_shared::presence::Role;

    #[tokio::test]
    async fn test_publish_wraps_event_in_client_frame() {
        // テスト項目: publish がイベントを publish フレームに包んで送る
        // given (前提条件):
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bus = WsEventBus::new(tx);

        // when (操作):
        bus.publish(SessionEvent::ItemChanged {
            new_index: 1,
            actor_id: "mod".to_string(),
        })
        .await
        .unwrap();

        // then (期待する結果):
        let json = rx.recv().await.unwrap();
        assert!(json.contains(r#""type":"publish""#));
        assert!(json.contains(r#""type":"item-changed""#));
    }

    #[tokio::test]
    async fn test_closed_connection_surfaces_as_bus_error() {
        // テスト項目: 切断済みチャンネルへの送信は Closed エラーになる
        // given (前提条件):
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let bus = WsEventBus::new(tx);

        // when (操作):
        let result = bus
            .update_presence(PresenceRecord::new(
                "alice".to_string(),
                "Alice".to_string(),
                Role::TeamMember,
                1000,
            ))
            .await;

        // then (期待する結果):
        assert_eq!(result, Err(BusError::Closed));
    }
}
