//! WebSocket and HTTP handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;

use yoriai_shared::presence::{PresenceRecord, Role};
use yoriai_shared::protocol::{ClientFrame, ServerFrame};
use yoriai_shared::time::{get_jst_timestamp, timestamp_to_jst_rfc3339};

use super::domain::{broadcast_targets, build_roster, is_duplicate_member, route_target};
use super::state::{AppState, ConnectQuery, MemberHandle, SessionHub};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // Create a channel for this member to receive frames
    let (tx, rx) = mpsc::unbounded_channel();

    let online_at = get_jst_timestamp();
    let record = PresenceRecord::new(
        query.user_id.clone(),
        query.display_name.clone(),
        query.role,
        online_at,
    );

    // Check for a duplicate user id and register the new member
    {
        let mut sessions = state.sessions.lock().await;
        let hub = sessions
            .entry(query.session_id.clone())
            .or_insert_with(|| SessionHub {
                members: HashMap::new(),
                created_at: online_at,
            });
        if is_duplicate_member(&hub.members, &query.user_id) {
            tracing::warn!(
                "User '{}' is already connected to session '{}'. Rejecting connection.",
                query.user_id,
                query.session_id
            );
            return Err(StatusCode::CONFLICT);
        }
        hub.members.insert(
            query.user_id.clone(),
            MemberHandle {
                sender: tx,
                record,
                last_seen_at: online_at,
            },
        );
    }

    tracing::info!(
        "User '{}' connected to session '{}'",
        query.user_id,
        query.session_id
    );

    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, state, query.session_id, query.user_id, rx)
    }))
}

pub async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    session_id: String,
    user_id: String,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let (mut sender, mut receiver) = socket.split();

    // Send the full roster to the newly connected member, then announce
    // the join to everybody else (delta plus a fresh sync snapshot).
    {
        let sessions = state.sessions.lock().await;
        let Some(hub) = sessions.get(&session_id) else {
            return;
        };
        let roster = build_roster(&hub.members);

        let welcome = ServerFrame::Welcome {
            session_id: session_id.clone(),
            roster: roster.clone(),
        };
        let welcome_json = serde_json::to_string(&welcome).unwrap();
        if let Err(e) = sender.send(Message::Text(welcome_json.into())).await {
            tracing::error!("Failed to send welcome to '{}': {}", user_id, e);
            return;
        }

        if let Some(record) = hub.members.get(&user_id).map(|m| m.record.clone()) {
            push_to_others(&hub.members, &user_id, &ServerFrame::PresenceJoined { record });
            push_to_others(&hub.members, &user_id, &ServerFrame::PresenceSync { roster });
        }
        tracing::info!("Sent roster of session '{}' to '{}'", session_id, user_id);
    }

    let state_clone = state.clone();
    let session_id_clone = session_id.clone();
    let user_id_clone = user_id.clone();

    // Task receiving frames from this member
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error from '{}': {}", user_id_clone, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let frame = match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(
                                "Unparseable frame from '{}': {}",
                                user_id_clone,
                                e
                            );
                            continue;
                        }
                    };
                    handle_client_frame(
                        &state_clone,
                        &session_id_clone,
                        &user_id_clone,
                        frame,
                    )
                    .await;
                }
                Message::Ping(_) => {
                    // Ping/pong is handled automatically by the WebSocket
                    // protocol; it still counts as liveness.
                    touch_member(&state_clone, &session_id_clone, &user_id_clone).await;
                }
                Message::Close(_) => {
                    tracing::info!("User '{}' requested close", user_id_clone);
                    break;
                }
                _ => {}
            }
        }
    });

    // Task forwarding relayed frames to this member
    let mut send_task = tokio::spawn(async move {
        while let Some(json) = rx.recv().await {
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    remove_member(&state, &session_id, &user_id).await;
}

/// Apply one inbound client frame
async fn handle_client_frame(
    state: &Arc<AppState>,
    session_id: &str,
    user_id: &str,
    frame: ClientFrame,
) {
    match frame {
        ClientFrame::Publish { event } => {
            let mut sessions = state.sessions.lock().await;
            let Some(hub) = sessions.get_mut(session_id) else {
                return;
            };
            if let Some(member) = hub.members.get_mut(user_id) {
                member.last_seen_at = get_jst_timestamp();
            }
            tracing::debug!(
                "Relaying '{}' event from '{}' in session '{}'",
                event.name(),
                user_id,
                session_id
            );
            match route_target(&event) {
                Some(target) => {
                    // Peer-addressed: deliver to the single target only.
                    let frame = ServerFrame::Event { event };
                    let json = serde_json::to_string(&frame).unwrap();
                    if let Some(member) = hub.members.get(&target) {
                        if member.sender.send(json).is_err() {
                            tracing::warn!("Failed to route signal to '{}'", target);
                        }
                    } else {
                        tracing::debug!("Dropping signal for absent peer '{}'", target);
                    }
                }
                None => {
                    // Fan out to everybody but the publisher, at most once,
                    // no queuing: a closed receiver just misses the event.
                    let frame = ServerFrame::Event { event };
                    let json = serde_json::to_string(&frame).unwrap();
                    for (id, member) in broadcast_targets(&hub.members, user_id) {
                        if member.sender.send(json.clone()).is_err() {
                            tracing::warn!("Failed to relay event to '{}'", id);
                        }
                    }
                }
            }
        }
        ClientFrame::PresenceUpdate { record } => {
            // Exactly one authoritative source per record: the owner.
            if record.user_id != user_id {
                tracing::warn!(
                    "User '{}' attempted to mutate presence of '{}'; ignored",
                    user_id,
                    record.user_id
                );
                return;
            }
            let mut sessions = state.sessions.lock().await;
            let Some(hub) = sessions.get_mut(session_id) else {
                return;
            };
            if let Some(member) = hub.members.get_mut(user_id) {
                member.record = record;
                member.last_seen_at = get_jst_timestamp();
            }
            let roster = build_roster(&hub.members);
            push_to_all(&hub.members, &ServerFrame::PresenceSync { roster });
        }
        ClientFrame::Heartbeat => {
            touch_member(state, session_id, user_id).await;
        }
        ClientFrame::Leave => {
            // The socket teardown path does the actual removal; leaving is
            // idempotent with the close that follows.
            tracing::debug!("User '{}' announced leave", user_id);
        }
    }
}

async fn touch_member(state: &Arc<AppState>, session_id: &str, user_id: &str) {
    let mut sessions = state.sessions.lock().await;
    if let Some(hub) = sessions.get_mut(session_id) {
        if let Some(member) = hub.members.get_mut(user_id) {
            member.last_seen_at = get_jst_timestamp();
        }
    }
}

/// Remove a member and announce the departure. Shared by the socket
/// teardown and the liveness sweep; removing an absent member is a no-op.
pub async fn remove_member(state: &Arc<AppState>, session_id: &str, user_id: &str) {
    let mut sessions = state.sessions.lock().await;
    let Some(hub) = sessions.get_mut(session_id) else {
        return;
    };
    if hub.members.remove(user_id).is_none() {
        return;
    }
    tracing::info!(
        "User '{}' disconnected from session '{}'",
        user_id,
        session_id
    );

    push_to_all(&hub.members, &ServerFrame::PresenceLeft {
        user_id: user_id.to_string(),
    });
    let roster = build_roster(&hub.members);
    push_to_all(&hub.members, &ServerFrame::PresenceSync { roster });

    if hub.members.is_empty() {
        sessions.remove(session_id);
        tracing::info!("Session '{}' is empty and was dropped", session_id);
    }
}

fn push_to_all(members: &HashMap<String, MemberHandle>, frame: &ServerFrame) {
    let json = serde_json::to_string(frame).unwrap();
    for (id, member) in members {
        if member.sender.send(json.clone()).is_err() {
            tracing::warn!("Failed to push frame to '{}'", id);
        }
    }
}

fn push_to_others(
    members: &HashMap<String, MemberHandle>,
    exclude_user_id: &str,
    frame: &ServerFrame,
) {
    let json = serde_json::to_string(frame).unwrap();
    for (id, member) in broadcast_targets(members, exclude_user_id) {
        if member.sender.send(json.clone()).is_err() {
            tracing::warn!("Failed to push frame to '{}'", id);
        }
    }
}

// ========================================
// HTTP API
// ========================================

#[derive(Debug, Serialize)]
pub struct SessionSummaryDto {
    pub id: String,
    pub participants: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct ParticipantDetailDto {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
    pub online_at: String,
    pub in_call: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionDetailDto {
    pub id: String,
    pub participants: Vec<ParticipantDetailDto>,
    pub created_at: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get the list of live sessions
pub async fn get_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSummaryDto>> {
    let sessions = state.sessions.lock().await;
    let mut summaries: Vec<SessionSummaryDto> = sessions
        .iter()
        .map(|(id, hub)| SessionSummaryDto {
            id: id.clone(),
            participants: build_roster(&hub.members)
                .into_iter()
                .map(|p| p.user_id)
                .collect(),
            created_at: timestamp_to_jst_rfc3339(hub.created_at),
        })
        .collect();
    summaries.sort_by(|a, b| a.id.cmp(&b.id));
    Json(summaries)
}

/// Get session detail by id
pub async fn get_session_detail(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetailDto>, StatusCode> {
    let sessions = state.sessions.lock().await;
    let hub = sessions.get(&session_id).ok_or(StatusCode::NOT_FOUND)?;

    let detail = SessionDetailDto {
        id: session_id.clone(),
        participants: build_roster(&hub.members)
            .into_iter()
            .map(|p| ParticipantDetailDto {
                user_id: p.user_id,
                display_name: p.display_name,
                role: p.role,
                online_at: timestamp_to_jst_rfc3339(p.online_at),
                in_call: p.in_call,
            })
            .collect(),
        created_at: timestamp_to_jst_rfc3339(hub.created_at),
    };

    Ok(Json(detail))
}

/// Debug endpoint returning a session's raw roster (for testing purposes)
pub async fn debug_session_state(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<PresenceRecord>>, StatusCode> {
    let sessions = state.sessions.lock().await;
    let hub = sessions.get(&session_id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(build_roster(&hub.members)))
}
