//! Peer video mesh.
//!
//! Full mesh: every pair of active call participants holds one direct
//! peer connection, tracked by an explicit per-peer state machine
//! instead of ad hoc flags. Call membership is the `in_call` flag on the
//! presence record — distinct from session presence.
//!
//! Initiative rule: when a new member appears in the call, every member
//! that was already in the call (and therefore already holds its local
//! media) creates the offer; the newcomer only answers. This prevents
//! offer glare in the common path; a residual glare (both sides offered)
//! abandons the connection, which is retried on the next roster change.
//!
//! A device failure never removes a participant from the call roster:
//! the client degrades to audio-only, then to a connection carrying no
//! local track, and keeps receiving remote tracks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use yoriai_shared::presence::PresenceRecord;
use yoriai_shared::protocol::{SessionEvent, SignalKind, SignalPayload};
use yoriai_shared::time::Clock;

use crate::domain::replica::SessionReplica;
use crate::domain::value_object::{MessageId, SessionId};
use crate::port::bus::EventBus;

use super::error::{CallError, MediaError};
use super::{publish_lossy, Identity};

/// Fixed public STUN servers; no TURN fallback, so traversal may fail
/// for symmetric NATs.
pub const STUN_SERVERS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

/// Per-peer connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerPhase {
    /// Link created, waiting for the peer's offer
    New,
    /// We offered and await the answer
    OfferSent,
    /// We answered the peer's offer; media is converging
    Answered,
    /// Negotiation complete
    Connected,
}

#[derive(Debug, Clone)]
pub struct PeerLink {
    pub phase: PeerPhase,
    pub handshake_id: String,
}

/// What the local media device yielded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMedia {
    pub video: bool,
    pub audio: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Camera,
    Screen,
}

/// Collaborator wrapping the actual WebRTC/media stack.
///
/// The engine owns negotiation bookkeeping and signaling; SDP and ICE
/// contents are produced and consumed behind this seam.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Acquire local capture. May fail per device/permission state.
    async fn acquire_local(&self, video: bool, audio: bool) -> Result<LocalMedia, MediaError>;

    async fn release_local(&self);

    /// Create an offer SDP for a new peer connection
    async fn create_offer(&self, peer: &str) -> Result<String, MediaError>;

    /// Accept a remote offer; returns the answer SDP
    async fn accept_offer(&self, peer: &str, offer_sdp: &str) -> Result<String, MediaError>;

    /// Apply a remote answer to a connection we offered
    async fn apply_answer(&self, peer: &str, answer_sdp: &str) -> Result<(), MediaError>;

    async fn add_ice_candidate(&self, peer: &str, candidate: &str) -> Result<(), MediaError>;

    /// Swap the outgoing track on existing senders (e.g. screen share)
    /// instead of a full renegotiation cycle
    async fn replace_track(&self, kind: TrackKind) -> Result<(), MediaError>;

    async fn close_peer(&self, peer: &str);
}

/// Media session stand-in used by tests and the CLI client.
///
/// Produces placeholder SDPs; a deployment with real media implements
/// [`MediaSession`] over a WebRTC stack configured with [`STUN_SERVERS`].
pub struct StubMediaSession;

#[async_trait]
impl MediaSession for StubMediaSession {
    async fn acquire_local(&self, video: bool, audio: bool) -> Result<LocalMedia, MediaError> {
        Ok(LocalMedia { video, audio })
    }

    async fn release_local(&self) {}

    async fn create_offer(&self, peer: &str) -> Result<String, MediaError> {
        Ok(format!("v=0 offer for {peer}"))
    }

    async fn accept_offer(&self, peer: &str, _offer_sdp: &str) -> Result<String, MediaError> {
        Ok(format!("v=0 answer for {peer}"))
    }

    async fn apply_answer(&self, _peer: &str, _answer_sdp: &str) -> Result<(), MediaError> {
        Ok(())
    }

    async fn add_ice_candidate(&self, _peer: &str, _candidate: &str) -> Result<(), MediaError> {
        Ok(())
    }

    async fn replace_track(&self, _kind: TrackKind) -> Result<(), MediaError> {
        Ok(())
    }

    async fn close_peer(&self, _peer: &str) {}
}

pub struct PeerVideoMesh {
    replica: Arc<Mutex<SessionReplica>>,
    bus: Arc<dyn EventBus>,
    identity: Arc<Identity>,
    media: Arc<dyn MediaSession>,
    clock: Arc<dyn Clock>,
    session_id: SessionId,
    links: Mutex<HashMap<String, PeerLink>>,
    local: Mutex<Option<LocalMedia>>,
}

impl PeerVideoMesh {
    pub fn new(
        replica: Arc<Mutex<SessionReplica>>,
        bus: Arc<dyn EventBus>,
        identity: Arc<Identity>,
        media: Arc<dyn MediaSession>,
        clock: Arc<dyn Clock>,
        session_id: SessionId,
    ) -> Self {
        Self {
            replica,
            bus,
            identity,
            media,
            clock,
            session_id,
            links: Mutex::new(HashMap::new()),
            local: Mutex::new(None),
        }
    }

    /// Join the video call.
    ///
    /// Acquires local media with a degrade ladder — camera+mic, then
    /// mic-only, then no media at all — so one participant's device
    /// failure never blocks call attendance. Existing call members are
    /// expected to offer; this client only answers them.
    pub async fn join_call(&self) -> Result<LocalMedia, CallError> {
        let local = match self.media.acquire_local(true, true).await {
            Ok(local) => local,
            Err(e) => {
                tracing::warn!("Video capture unavailable ({}), trying audio only", e);
                match self.media.acquire_local(false, true).await {
                    Ok(local) => local,
                    Err(e) => {
                        tracing::warn!("Audio capture unavailable ({}), joining without media", e);
                        LocalMedia {
                            video: false,
                            audio: false,
                        }
                    }
                }
            }
        };
        *self.local.lock().await = Some(local);

        // Snapshot the members already in the call: they hold the
        // initiative and will offer; we answer.
        {
            let replica = self.replica.lock().await;
            let mut links = self.links.lock().await;
            for member in replica.call_members() {
                if member.user_id != self.identity.user_id.as_str() {
                    links.entry(member.user_id.clone()).or_insert(PeerLink {
                        phase: PeerPhase::New,
                        handshake_id: String::new(),
                    });
                }
            }
        }

        self.publish_own_presence(true, local).await;
        Ok(local)
    }

    /// Leave the call and close every peer connection. Idempotent: both
    /// the explicit leave and session teardown call it.
    pub async fn leave_call(&self) {
        let peers: Vec<String> = {
            let mut links = self.links.lock().await;
            links.drain().map(|(peer, _)| peer).collect()
        };
        for peer in &peers {
            self.media.close_peer(peer).await;
        }
        let was_in_call = self.local.lock().await.take().is_some();
        if was_in_call {
            self.media.release_local().await;
            self.publish_own_presence(
                false,
                LocalMedia {
                    video: false,
                    audio: false,
                },
            )
            .await;
        }
    }

    /// Reconcile the mesh with the current roster. Call after every
    /// presence change: members newly in the call get an offer from us
    /// (they joined after us, so we hold the initiative), members gone
    /// from the call get their connection reclaimed.
    pub async fn sync_with_roster(&self) {
        if self.local.lock().await.is_none() {
            return;
        }

        let call_peers: Vec<String> = {
            let replica = self.replica.lock().await;
            replica
                .call_members()
                .into_iter()
                .map(|p| p.user_id.clone())
                .filter(|id| id != self.identity.user_id.as_str())
                .collect()
        };

        // Reclaim links for peers that left the call (or the session —
        // ghosts are reclaimed here once the transport expires them).
        let stale: Vec<String> = {
            let links = self.links.lock().await;
            links
                .keys()
                .filter(|peer| !call_peers.contains(*peer))
                .cloned()
                .collect()
        };
        for peer in stale {
            self.drop_link(&peer).await;
        }

        // Offer to peers that joined the call after us.
        let new_peers: Vec<String> = {
            let links = self.links.lock().await;
            call_peers
                .into_iter()
                .filter(|peer| !links.contains_key(peer))
                .collect()
        };
        for peer in new_peers {
            if let Err(e) = self.offer_to(&peer).await {
                tracing::warn!("Offer to '{}' failed: {}", peer, e);
            }
        }
    }

    /// Handle a signal addressed to this client.
    ///
    /// A failure here abandons that one peer connection; the rest of the
    /// mesh is unaffected.
    pub async fn handle_signal(&self, payload: SignalPayload) -> Result<(), CallError> {
        if self.local.lock().await.is_none() {
            // Signals can race our own call-leave; nothing to do.
            return Ok(());
        }
        let peer = payload.from.clone();
        match payload.kind {
            SignalKind::Offer { sdp, handshake_id } => {
                let glare = {
                    let links = self.links.lock().await;
                    matches!(links.get(&peer), Some(link) if link.phase == PeerPhase::OfferSent)
                };
                if glare {
                    // Glare: both sides offered. Abandon; the next roster
                    // change retries.
                    self.drop_link(&peer).await;
                    return Err(CallError::Negotiation {
                        peer,
                        reason: "offer received while an own offer is pending".to_string(),
                    });
                }
                let answer_sdp = match self.media.accept_offer(&peer, &sdp).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        self.drop_link(&peer).await;
                        return Err(CallError::Negotiation {
                            peer,
                            reason: e.to_string(),
                        });
                    }
                };
                {
                    let mut links = self.links.lock().await;
                    links.insert(
                        peer.clone(),
                        PeerLink {
                            phase: PeerPhase::Answered,
                            handshake_id: handshake_id.clone(),
                        },
                    );
                }
                self.send_signal(&peer, SignalKind::Answer {
                    sdp: answer_sdp,
                    handshake_id,
                })
                .await;
                Ok(())
            }
            SignalKind::Answer { sdp, .. } => {
                let expecting_answer = {
                    let links = self.links.lock().await;
                    matches!(links.get(&peer), Some(link) if link.phase == PeerPhase::OfferSent)
                };
                if !expecting_answer {
                    self.drop_link(&peer).await;
                    return Err(CallError::Negotiation {
                        peer,
                        reason: "answer in wrong signaling state".to_string(),
                    });
                }
                if let Err(e) = self.media.apply_answer(&peer, &sdp).await {
                    self.drop_link(&peer).await;
                    return Err(CallError::Negotiation {
                        peer,
                        reason: e.to_string(),
                    });
                }
                if let Some(link) = self.links.lock().await.get_mut(&peer) {
                    link.phase = PeerPhase::Connected;
                }
                Ok(())
            }
            SignalKind::IceCandidate { candidate, .. } => {
                let known = self.links.lock().await.contains_key(&peer);
                if !known {
                    // Candidate for a connection we already reclaimed.
                    tracing::debug!("Ignoring ICE candidate from unknown peer '{}'", peer);
                    return Ok(());
                }
                if let Err(e) = self.media.add_ice_candidate(&peer, &candidate).await {
                    self.drop_link(&peer).await;
                    return Err(CallError::Negotiation {
                        peer,
                        reason: e.to_string(),
                    });
                }
                if let Some(link) = self.links.lock().await.get_mut(&peer) {
                    if link.phase == PeerPhase::Answered {
                        link.phase = PeerPhase::Connected;
                    }
                }
                Ok(())
            }
        }
    }

    /// Relay a locally-discovered ICE candidate to one peer
    pub async fn send_ice_candidate(
        &self,
        peer: &str,
        candidate: String,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u32>,
    ) {
        let handshake_id = {
            let links = self.links.lock().await;
            match links.get(peer) {
                Some(link) => link.handshake_id.clone(),
                None => return,
            }
        };
        self.send_signal(peer, SignalKind::IceCandidate {
            candidate,
            sdp_mid,
            sdp_mline_index,
            handshake_id,
        })
        .await;
    }

    /// The local media device failed mid-call: degrade, never drop out.
    pub async fn degrade_media(&self, video_lost: bool, audio_lost: bool) {
        let mut local_guard = self.local.lock().await;
        let Some(local) = local_guard.as_mut() else {
            return;
        };
        if video_lost {
            local.video = false;
        }
        if audio_lost {
            local.audio = false;
        }
        let local = *local;
        drop(local_guard);
        self.publish_own_presence(true, local).await;
    }

    /// Replace the outgoing video track with a screen capture on the
    /// existing senders
    pub async fn share_screen(&self) -> Result<(), CallError> {
        if self.local.lock().await.is_none() {
            return Err(CallError::NotInCall);
        }
        self.media.replace_track(TrackKind::Screen).await?;
        Ok(())
    }

    /// A participant left the session; reclaim their peer connection
    pub async fn handle_presence_left(&self, user_id: &str) {
        let known = self.links.lock().await.contains_key(user_id);
        if known {
            self.drop_link(user_id).await;
        }
    }

    /// Number of peer connections currently held (N−1 for N call members)
    pub async fn connection_count(&self) -> usize {
        self.links.lock().await.len()
    }

    pub async fn peer_phase(&self, peer: &str) -> Option<PeerPhase> {
        self.links.lock().await.get(peer).map(|l| l.phase)
    }

    async fn offer_to(&self, peer: &str) -> Result<(), CallError> {
        let sdp = match self.media.create_offer(peer).await {
            Ok(sdp) => sdp,
            Err(e) => {
                return Err(CallError::Negotiation {
                    peer: peer.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        let handshake_id = MessageId::generate().into_string();
        {
            let mut links = self.links.lock().await;
            links.insert(peer.to_string(), PeerLink {
                phase: PeerPhase::OfferSent,
                handshake_id: handshake_id.clone(),
            });
        }
        self.send_signal(peer, SignalKind::Offer { sdp, handshake_id }).await;
        Ok(())
    }

    async fn drop_link(&self, peer: &str) {
        self.links.lock().await.remove(peer);
        self.media.close_peer(peer).await;
    }

    async fn send_signal(&self, peer: &str, kind: SignalKind) {
        let event = SessionEvent::VideoSignal {
            payload: SignalPayload {
                from: self.identity.user_id.as_str().to_string(),
                to: peer.to_string(),
                session_id: self.session_id.as_str().to_string(),
                kind,
            },
        };
        publish_lossy(&self.bus, event).await;
    }

    async fn publish_own_presence(&self, in_call: bool, local: LocalMedia) {
        let mut record = self.identity.presence_record(self.clock.as_ref());
        record.in_call = in_call;
        record.video_enabled = local.video;
        record.audio_enabled = local.audio;
        {
            let mut replica = self.replica.lock().await;
            replica.apply_presence_joined(record.clone());
        }
        if let Err(e) = self.bus.update_presence(record).await {
            tracing::warn!("Failed to publish call presence: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yoriai_shared::presence::Role;
    use yoriai_shared::protocol::{Scale, ServerFrame};
    use yoriai_shared::time::FixedClock;

    use crate::domain::value_object::{DisplayName, UserId};
    use crate::port::bus::LocalHub;

    /// Media session whose capture can be made to fail
    struct FailingCamera {
        video_fails: bool,
        audio_fails: bool,
    }

    #[async_trait]
    impl MediaSession for FailingCamera {
        async fn acquire_local(&self, video: bool, audio: bool) -> Result<LocalMedia, MediaError> {
            if video && self.video_fails {
                return Err(MediaError::PermissionDenied);
            }
            if audio && self.audio_fails {
                return Err(MediaError::DeviceBusy);
            }
            Ok(LocalMedia { video, audio })
        }
        async fn release_local(&self) {}
        async fn create_offer(&self, peer: &str) -> Result<String, MediaError> {
            Ok(format!("offer-{peer}"))
        }
        async fn accept_offer(&self, peer: &str, _offer: &str) -> Result<String, MediaError> {
            Ok(format!("answer-{peer}"))
        }
        async fn apply_answer(&self, _peer: &str, _answer: &str) -> Result<(), MediaError> {
            Ok(())
        }
        async fn add_ice_candidate(&self, _peer: &str, _candidate: &str) -> Result<(), MediaError> {
            Ok(())
        }
        async fn replace_track(&self, _kind: TrackKind) -> Result<(), MediaError> {
            Ok(())
        }
        async fn close_peer(&self, _peer: &str) {}
    }

    fn in_call_record(user: &str) -> PresenceRecord {
        let mut record =
            PresenceRecord::new(user.to_string(), user.to_string(), Role::TeamMember, 1000);
        record.in_call = true;
        record
    }

    async fn mesh_for(
        user: &str,
        media: Arc<dyn MediaSession>,
    ) -> (
        PeerVideoMesh,
        Arc<Mutex<SessionReplica>>,
        tokio::sync::mpsc::UnboundedReceiver<ServerFrame>,
    ) {
        let replica = Arc::new(Mutex::new(SessionReplica::new(
            SessionId::new("s-1".to_string()).unwrap(),
            Scale::Fibonacci,
        )));
        let hub = LocalHub::new("s-1");
        let (bus, rx) = hub
            .attach(PresenceRecord::new(
                user.to_string(),
                user.to_string(),
                Role::TeamMember,
                1000,
            ))
            .await;
        let mesh = PeerVideoMesh::new(
            replica.clone(),
            Arc::new(bus),
            Arc::new(Identity {
                user_id: UserId::new(user.to_string()).unwrap(),
                display_name: DisplayName::new(user.to_string()).unwrap(),
                role: Role::TeamMember,
            }),
            media,
            Arc::new(FixedClock::new(1000)),
            SessionId::new("s-1".to_string()).unwrap(),
        );
        (mesh, replica, rx)
    }

    fn offer_from(peer: &str, to: &str) -> SignalPayload {
        SignalPayload {
            from: peer.to_string(),
            to: to.to_string(),
            session_id: "s-1".to_string(),
            kind: SignalKind::Offer {
                sdp: "v=0".to_string(),
                handshake_id: "h-1".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_existing_members_offer_to_newcomers() {
        // テスト項目: 通話中のメンバーは後から参加したピアにオファーを出す
        // given (前提条件): alice が通話に参加している
        let (mesh, replica, _rx) = mesh_for("alice", Arc::new(StubMediaSession)).await;
        {
            let mut r = replica.lock().await;
            r.apply_presence_joined(in_call_record("alice"));
        }
        mesh.join_call().await.unwrap();

        // when (操作): bob が通話に現れる
        {
            let mut r = replica.lock().await;
            r.apply_presence_joined(in_call_record("bob"));
        }
        mesh.sync_with_roster().await;

        // then (期待する結果): bob へのリンクが OfferSent になる
        assert_eq!(mesh.peer_phase("bob").await, Some(PeerPhase::OfferSent));
        assert_eq!(mesh.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_newcomer_answers_instead_of_offering() {
        // テスト項目: 後から参加したクライアントは既存メンバーにオファーしない
        // given (前提条件): bob が既に通話中の状態で alice が参加する
        let (mesh, replica, _rx) = mesh_for("alice", Arc::new(StubMediaSession)).await;
        {
            let mut r = replica.lock().await;
            r.apply_presence_joined(in_call_record("bob"));
            r.apply_presence_joined(in_call_record("alice"));
        }

        // when (操作):
        mesh.join_call().await.unwrap();
        mesh.sync_with_roster().await;

        // then (期待する結果): bob へのリンクは New のまま（オファー待ち）
        assert_eq!(mesh.peer_phase("bob").await, Some(PeerPhase::New));

        // bob からのオファーに応答すると Answered になる
        mesh.handle_signal(offer_from("bob", "alice")).await.unwrap();
        assert_eq!(mesh.peer_phase("bob").await, Some(PeerPhase::Answered));
    }

    #[tokio::test]
    async fn test_mesh_holds_n_minus_one_connections() {
        // テスト項目: N 人の通話で各クライアントは N-1 本の接続を持ち、
        //             1 人の離脱でちょうど 1 本減る
        // given (前提条件): alice の他に 3 人が通話中
        let (mesh, replica, _rx) = mesh_for("alice", Arc::new(StubMediaSession)).await;
        {
            let mut r = replica.lock().await;
            r.apply_presence_joined(in_call_record("alice"));
        }
        mesh.join_call().await.unwrap();
        {
            let mut r = replica.lock().await;
            r.apply_presence_joined(in_call_record("bob"));
            r.apply_presence_joined(in_call_record("carol"));
            r.apply_presence_joined(in_call_record("dave"));
        }
        mesh.sync_with_roster().await;
        assert_eq!(mesh.connection_count().await, 3);

        // when (操作): carol が離脱する
        {
            let mut r = replica.lock().await;
            r.apply_presence_left("carol");
        }
        mesh.sync_with_roster().await;

        // then (期待する結果):
        assert_eq!(mesh.connection_count().await, 2);
        assert_eq!(mesh.peer_phase("carol").await, None);
    }

    #[tokio::test]
    async fn test_device_failure_degrades_to_audio_only() {
        // テスト項目: カメラ取得失敗時は音声のみで参加する
        // given (前提条件):
        let media = Arc::new(FailingCamera {
            video_fails: true,
            audio_fails: false,
        });
        let (mesh, _replica, _rx) = mesh_for("alice", media).await;

        // when (操作):
        let local = mesh.join_call().await.unwrap();

        // then (期待する結果):
        assert!(!local.video);
        assert!(local.audio);
    }

    #[tokio::test]
    async fn test_total_device_failure_still_joins_the_call() {
        // テスト項目: 全デバイス失敗でもメディア無しで通話に参加できる
        // given (前提条件):
        let media = Arc::new(FailingCamera {
            video_fails: true,
            audio_fails: true,
        });
        let (mesh, replica, _rx) = mesh_for("alice", media).await;

        // when (操作):
        let local = mesh.join_call().await.unwrap();

        // then (期待する結果): ロスターには in_call で残る
        assert!(!local.video);
        assert!(!local.audio);
        let replica = replica.lock().await;
        assert!(replica.roster.get("alice").unwrap().in_call);
    }

    #[tokio::test]
    async fn test_answer_in_wrong_state_abandons_only_that_peer() {
        // テスト項目: 不正な状態での answer は該当ピアのみ破棄し他に影響しない
        // given (前提条件): bob へ OfferSent、carol は Connected 相当
        let (mesh, replica, _rx) = mesh_for("alice", Arc::new(StubMediaSession)).await;
        {
            let mut r = replica.lock().await;
            r.apply_presence_joined(in_call_record("alice"));
        }
        mesh.join_call().await.unwrap();
        {
            let mut r = replica.lock().await;
            r.apply_presence_joined(in_call_record("bob"));
            r.apply_presence_joined(in_call_record("carol"));
        }
        mesh.sync_with_roster().await;

        // when (操作): 何もオファーしていない dave からの answer が届く
        let rogue = SignalPayload {
            from: "dave".to_string(),
            to: "alice".to_string(),
            session_id: "s-1".to_string(),
            kind: SignalKind::Answer {
                sdp: "v=0".to_string(),
                handshake_id: "h-9".to_string(),
            },
        };
        let result = mesh.handle_signal(rogue).await;

        // then (期待する結果):
        assert!(matches!(result, Err(CallError::Negotiation { .. })));
        assert_eq!(mesh.connection_count().await, 2);
    }

    #[tokio::test]
    async fn test_leave_call_is_idempotent() {
        // テスト項目: leave_call を二度呼んでも安全で、接続が全て解放される
        // given (前提条件):
        let (mesh, replica, _rx) = mesh_for("alice", Arc::new(StubMediaSession)).await;
        {
            let mut r = replica.lock().await;
            r.apply_presence_joined(in_call_record("alice"));
            r.apply_presence_joined(in_call_record("bob"));
        }
        mesh.join_call().await.unwrap();
        mesh.sync_with_roster().await;

        // when (操作):
        mesh.leave_call().await;
        mesh.leave_call().await;

        // then (期待する結果):
        assert_eq!(mesh.connection_count().await, 0);
        let replica = replica.lock().await;
        assert!(!replica.roster.get("alice").unwrap().in_call);
    }

    #[tokio::test]
    async fn test_ice_candidate_for_unknown_peer_is_ignored() {
        // テスト項目: 解放済みピアの ICE candidate は無視される
        // given (前提条件):
        let (mesh, _replica, _rx) = mesh_for("alice", Arc::new(StubMediaSession)).await;
        mesh.join_call().await.unwrap();

        // when (操作):
        let result = mesh
            .handle_signal(SignalPayload {
                from: "ghost".to_string(),
                to: "alice".to_string(),
                session_id: "s-1".to_string(),
                kind: SignalKind::IceCandidate {
                    candidate: "candidate:0".to_string(),
                    sdp_mid: None,
                    sdp_mline_index: None,
                    handshake_id: "h-0".to_string(),
                },
            })
            .await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(mesh.connection_count().await, 0);
    }
}
