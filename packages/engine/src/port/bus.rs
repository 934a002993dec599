//! Broadcast channel port.
//!
//! The channel is an unordered, at-most-once publish/subscribe topic
//! scoped to one session: delivered to currently-connected subscribers,
//! possibly reordered, possibly dropped, never queued or retried.
//! Presence is resolved by the transport itself — one record per
//! connection key, a sync snapshot on every membership change, plus
//! discrete join/leave deltas.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use yoriai_shared::presence::PresenceRecord;
use yoriai_shared::protocol::{ServerFrame, SessionEvent};

/// Errors surfaced by the broadcast channel
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BusError {
    #[error("broadcast channel closed")]
    Closed,

    #[error("broadcast transport error: {0}")]
    Transport(String),
}

/// Outbound half of the broadcast channel, held by each client.
///
/// Sends are fire-and-forget: a lost frame is non-fatal and is corrected
/// by periodic reconciliation.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event onto the session topic
    async fn publish(&self, event: SessionEvent) -> Result<(), BusError>;

    /// Replace this client's own presence record
    async fn update_presence(&self, record: PresenceRecord) -> Result<(), BusError>;

    /// Untrack presence and unsubscribe. Must be idempotent: both the
    /// explicit leave and the liveness-timeout path call it.
    async fn leave(&self) -> Result<(), BusError>;
}

struct HubInner {
    members: HashMap<String, mpsc::UnboundedSender<ServerFrame>>,
    presence: HashMap<String, PresenceRecord>,
}

/// In-process implementation of a session topic.
///
/// One hub is one session; every attached client gets a [`LocalEventBus`]
/// handle plus a frame receiver. Used by the engine tests and by any
/// single-process composition.
pub struct LocalHub {
    session_id: String,
    inner: Mutex<HubInner>,
}

impl LocalHub {
    pub fn new(session_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            session_id: session_id.into(),
            inner: Mutex::new(HubInner {
                members: HashMap::new(),
                presence: HashMap::new(),
            }),
        })
    }

    /// Attach a client. The new member receives a `Welcome` snapshot;
    /// everybody else receives the join delta and a fresh sync snapshot.
    pub async fn attach(
        self: &Arc<Self>,
        record: PresenceRecord,
    ) -> (LocalEventBus, mpsc::UnboundedReceiver<ServerFrame>) {
        let user_id = record.user_id.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = self.inner.lock().await;
        inner.members.insert(user_id.clone(), tx);
        inner.presence.insert(user_id.clone(), record.clone());

        let roster = Self::roster_of(&inner);
        Self::push_to(&inner, &user_id, ServerFrame::Welcome {
            session_id: self.session_id.clone(),
            roster: roster.clone(),
        });
        Self::push_except(&inner, &user_id, ServerFrame::PresenceJoined { record });
        Self::push_except(&inner, &user_id, ServerFrame::PresenceSync { roster });

        (
            LocalEventBus {
                hub: Arc::clone(self),
                user_id,
            },
            rx,
        )
    }

    fn roster_of(inner: &HubInner) -> Vec<PresenceRecord> {
        let mut roster: Vec<PresenceRecord> = inner.presence.values().cloned().collect();
        roster.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        roster
    }

    fn push_to(inner: &HubInner, user_id: &str, frame: ServerFrame) {
        if let Some(sender) = inner.members.get(user_id) {
            // At-most-once: a closed receiver just misses the frame.
            let _ = sender.send(frame);
        }
    }

    fn push_except(inner: &HubInner, exclude: &str, frame: ServerFrame) {
        for (user_id, sender) in &inner.members {
            if user_id != exclude && sender.send(frame.clone()).is_err() {
                tracing::debug!("Member '{}' missed a frame (receiver gone)", user_id);
            }
        }
    }

    fn push_all(inner: &HubInner, frame: ServerFrame) {
        for (user_id, sender) in &inner.members {
            if sender.send(frame.clone()).is_err() {
                tracing::debug!("Member '{}' missed a frame (receiver gone)", user_id);
            }
        }
    }
}

/// A client's handle onto a [`LocalHub`]
pub struct LocalEventBus {
    hub: Arc<LocalHub>,
    user_id: String,
}

#[async_trait]
impl EventBus for LocalEventBus {
    async fn publish(&self, event: SessionEvent) -> Result<(), BusError> {
        let inner = self.hub.inner.lock().await;
        match event.target() {
            // Peer-addressed events are routed to their target only.
            Some(target) => {
                let target = target.to_string();
                LocalHub::push_to(&inner, &target, ServerFrame::Event { event });
            }
            None => {
                LocalHub::push_except(&inner, &self.user_id, ServerFrame::Event { event });
            }
        }
        Ok(())
    }

    async fn update_presence(&self, record: PresenceRecord) -> Result<(), BusError> {
        let mut inner = self.hub.inner.lock().await;
        if !inner.members.contains_key(&self.user_id) {
            return Err(BusError::Closed);
        }
        inner.presence.insert(self.user_id.clone(), record);
        let roster = LocalHub::roster_of(&inner);
        LocalHub::push_all(&inner, ServerFrame::PresenceSync { roster });
        Ok(())
    }

    async fn leave(&self) -> Result<(), BusError> {
        let mut inner = self.hub.inner.lock().await;
        if inner.members.remove(&self.user_id).is_none() {
            // Already gone; leaving twice is fine.
            return Ok(());
        }
        inner.presence.remove(&self.user_id);
        let roster = LocalHub::roster_of(&inner);
        LocalHub::push_except(&inner, &self.user_id, ServerFrame::PresenceLeft {
            user_id: self.user_id.clone(),
        });
        LocalHub::push_except(&inner, &self.user_id, ServerFrame::PresenceSync { roster });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yoriai_shared::presence::Role;
    use yoriai_shared::protocol::{SignalKind, SignalPayload};

    fn record(user: &str) -> PresenceRecord {
        PresenceRecord::new(user.to_string(), user.to_string(), Role::TeamMember, 1000)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerFrame>) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn test_attach_sends_welcome_with_roster() {
        // テスト項目: 接続した本人に Welcome スナップショットが届く
        // given (前提条件):
        let hub = LocalHub::new("s-1");
        let (_alice_bus, _alice_rx) = hub.attach(record("alice")).await;

        // when (操作):
        let (_bob_bus, mut bob_rx) = hub.attach(record("bob")).await;

        // then (期待する結果):
        let frames = drain(&mut bob_rx);
        match &frames[0] {
            ServerFrame::Welcome { session_id, roster } => {
                assert_eq!(session_id, "s-1");
                assert_eq!(roster.len(), 2);
            }
            other => panic!("expected Welcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_excludes_the_publisher() {
        // テスト項目: パブリッシュしたイベントは本人以外に届く
        // given (前提条件):
        let hub = LocalHub::new("s-1");
        let (alice_bus, mut alice_rx) = hub.attach(record("alice")).await;
        let (_bob_bus, mut bob_rx) = hub.attach(record("bob")).await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        // when (操作):
        alice_bus
            .publish(SessionEvent::ItemChanged {
                new_index: 2,
                actor_id: "alice".to_string(),
            })
            .await
            .unwrap();

        // then (期待する結果):
        assert!(drain(&mut alice_rx).is_empty());
        let bob_frames = drain(&mut bob_rx);
        assert_eq!(bob_frames.len(), 1);
        assert!(matches!(bob_frames[0], ServerFrame::Event { .. }));
    }

    #[tokio::test]
    async fn test_video_signal_routed_to_target_only() {
        // テスト項目: video-signal は宛先のピアだけに配送される
        // given (前提条件):
        let hub = LocalHub::new("s-1");
        let (alice_bus, mut alice_rx) = hub.attach(record("alice")).await;
        let (_bob_bus, mut bob_rx) = hub.attach(record("bob")).await;
        let (_carol_bus, mut carol_rx) = hub.attach(record("carol")).await;
        drain(&mut alice_rx);
        drain(&mut bob_rx);
        drain(&mut carol_rx);

        // when (操作):
        alice_bus
            .publish(SessionEvent::VideoSignal {
                payload: SignalPayload {
                    from: "alice".to_string(),
                    to: "bob".to_string(),
                    session_id: "s-1".to_string(),
                    kind: SignalKind::Offer {
                        sdp: "v=0".to_string(),
                        handshake_id: "h-1".to_string(),
                    },
                },
            })
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(drain(&mut bob_rx).len(), 1);
        assert!(drain(&mut carol_rx).is_empty());
        assert!(drain(&mut alice_rx).is_empty());
    }

    #[tokio::test]
    async fn test_leave_is_idempotent_and_notifies_others() {
        // テスト項目: leave は二度呼んでも安全で、他メンバーに離脱が通知される
        // given (前提条件):
        let hub = LocalHub::new("s-1");
        let (alice_bus, _alice_rx) = hub.attach(record("alice")).await;
        let (_bob_bus, mut bob_rx) = hub.attach(record("bob")).await;
        drain(&mut bob_rx);

        // when (操作):
        alice_bus.leave().await.unwrap();
        alice_bus.leave().await.unwrap();

        // then (期待する結果):
        let frames = drain(&mut bob_rx);
        assert!(frames.iter().any(|f| matches!(
            f,
            ServerFrame::PresenceLeft { user_id } if user_id == "alice"
        )));
        let syncs: Vec<_> = frames
            .iter()
            .filter(|f| matches!(f, ServerFrame::PresenceSync { .. }))
            .collect();
        assert_eq!(syncs.len(), 1);
    }
}
