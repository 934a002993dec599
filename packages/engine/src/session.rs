//! Engine wiring.
//!
//! One [`SessionEngine`] per connected client: a single logical actor
//! driven by inbound frames, the once-per-second timer drive and user
//! intents. All cross-client coordination is message passing over the
//! broadcast channel; there is no shared-memory concurrency between
//! clients.

use std::sync::Arc;

use tokio::sync::Mutex;

use yoriai_shared::protocol::{Scale, ServerFrame, SessionEvent};
use yoriai_shared::time::Clock;

use crate::domain::entity::SessionLifecycle;
use crate::domain::replica::{Applied, SessionReplica};
use crate::domain::value_object::SessionId;
use crate::port::bus::EventBus;
use crate::port::store::EstimationStore;
use crate::sync::chat::ChatSynchronizer;
use crate::sync::navigator::SessionNavigator;
use crate::sync::presence::PresenceTracker;
use crate::sync::reconcile::Reconciler;
use crate::sync::timer::{TickOutcome, TimerCoordinator};
use crate::sync::video::{MediaSession, PeerVideoMesh};
use crate::sync::vote::VoteAggregator;
use crate::sync::Identity;

pub struct SessionEngine {
    identity: Arc<Identity>,
    session_id: SessionId,
    replica: Arc<Mutex<SessionReplica>>,
    pub presence: PresenceTracker,
    pub votes: VoteAggregator,
    pub timer: TimerCoordinator,
    pub navigator: SessionNavigator,
    pub mesh: PeerVideoMesh,
    pub chat: ChatSynchronizer,
    reconciler: Reconciler,
}

impl SessionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: SessionId,
        identity: Identity,
        default_scale: Scale,
        bus: Arc<dyn EventBus>,
        store: Arc<dyn EstimationStore>,
        media: Arc<dyn MediaSession>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let identity = Arc::new(identity);
        let replica = Arc::new(Mutex::new(SessionReplica::new(
            session_id.clone(),
            default_scale,
        )));

        let presence = PresenceTracker::new(
            replica.clone(),
            bus.clone(),
            identity.clone(),
            clock.clone(),
        );
        let votes = VoteAggregator::new(
            replica.clone(),
            store.clone(),
            bus.clone(),
            identity.clone(),
            clock.clone(),
        );
        let timer = TimerCoordinator::new(
            replica.clone(),
            bus.clone(),
            identity.clone(),
            clock.clone(),
        );
        let navigator = SessionNavigator::new(
            replica.clone(),
            store.clone(),
            bus.clone(),
            identity.clone(),
        );
        let mesh = PeerVideoMesh::new(
            replica.clone(),
            bus.clone(),
            identity.clone(),
            media,
            clock.clone(),
            session_id.clone(),
        );
        let chat = ChatSynchronizer::new(
            replica.clone(),
            store.clone(),
            bus.clone(),
            identity.clone(),
            clock,
            session_id.clone(),
        );
        let reconciler = Reconciler::new(replica.clone(), store, session_id.clone());

        Self {
            identity,
            session_id,
            replica,
            presence,
            votes,
            timer,
            navigator,
            mesh,
            chat,
            reconciler,
        }
    }

    /// Join the session: publish presence and pull the authoritative
    /// starting state (items, active votes, chat history) from the store.
    pub async fn bootstrap(&self) {
        if let Err(e) = self.presence.join().await {
            tracing::warn!("Presence join failed: {}", e);
        }
        self.reconcile().await;
    }

    /// Apply one inbound relay frame
    pub async fn handle_frame(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::Welcome { session_id, roster } => {
                tracing::info!(
                    "Joined session '{}' with {} participants",
                    session_id,
                    roster.len()
                );
                self.presence.handle_sync(roster).await;
                self.mesh.sync_with_roster().await;
            }
            ServerFrame::PresenceSync { roster } => {
                self.presence.handle_sync(roster).await;
                self.mesh.sync_with_roster().await;
            }
            ServerFrame::PresenceJoined { record } => {
                self.presence.handle_joined(record).await;
                self.mesh.sync_with_roster().await;
            }
            ServerFrame::PresenceLeft { user_id } => {
                self.presence.handle_left(&user_id).await;
                self.mesh.handle_presence_left(&user_id).await;
            }
            ServerFrame::Event { event } => self.handle_event(event).await,
            ServerFrame::Error { message } => {
                tracing::warn!("Relay error: {}", message);
            }
        }
    }

    /// Tick driver, called once per second. On the Moderator client the
    /// countdown advances; when it expires, the active item's votes are
    /// revealed automatically.
    pub async fn drive_second(&self) {
        if let Some(TickOutcome::Expired) = self.timer.tick().await {
            let active = {
                let replica = self.replica.lock().await;
                replica.active_item().map(|i| i.id.clone())
            };
            if let Some(item_id) = active {
                if let Err(e) = self.votes.reveal(&item_id).await {
                    tracing::warn!("Auto-reveal after timer expiry failed: {}", e);
                }
            }
        }
    }

    /// One reconciliation pass; store outages defer to the next pass
    pub async fn reconcile(&self) {
        if let Err(e) = self.reconciler.reconcile().await {
            tracing::warn!("Reconciliation pull failed: {}", e);
        }
    }

    /// Leave the session: unsubscribe, untrack presence, close every
    /// peer connection. Safe to call multiple times — the explicit leave
    /// and the liveness-timeout path both end up here.
    pub async fn leave_session(&self) {
        self.mesh.leave_call().await;
        if let Err(e) = self.presence.leave().await {
            tracing::warn!("Presence leave failed: {}", e);
        }
        let mut replica = self.replica.lock().await;
        replica.session.lifecycle = SessionLifecycle::Ended;
    }

    pub fn replica(&self) -> Arc<Mutex<SessionReplica>> {
        self.replica.clone()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    async fn handle_event(&self, event: SessionEvent) {
        let is_item_changed = matches!(event, SessionEvent::ItemChanged { .. });
        let applied = {
            let mut replica = self.replica.lock().await;
            replica.apply(&event, self.identity.user_id.as_str())
        };
        match applied {
            Ok(Applied::Signal(payload)) => {
                if let Err(e) = self.mesh.handle_signal(payload).await {
                    // One failed peer does not affect the rest of the mesh.
                    tracing::warn!("Peer negotiation failed: {}", e);
                }
            }
            Ok(_) => {
                if is_item_changed {
                    // The new item's state is re-fetched, not replayed.
                    self.navigator.refresh_active_item().await;
                }
            }
            Err(e) => {
                // Malformed events are tolerated like lost ones; the next
                // reconciliation pull corrects any divergence.
                tracing::warn!("Dropped inbound '{}' event: {}", event.name(), e);
            }
        }
    }
}
