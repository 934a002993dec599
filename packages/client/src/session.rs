//! WebSocket client session management.
//!
//! Wires a [`SessionEngine`] onto a relay connection: inbound frames
//! drive the replica, slash commands become engine intents, and
//! background tasks drive the once-per-second timer tick, the periodic
//! reconciliation pull and the liveness heartbeat.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use yoriai_engine::domain::entity::Item;
use yoriai_engine::domain::value_object::{DisplayName, ItemId, SessionId, UserId};
use yoriai_engine::port::store::InMemoryEstimationStore;
use yoriai_engine::session::SessionEngine;
use yoriai_engine::sync::video::StubMediaSession;
use yoriai_engine::sync::Identity;
use yoriai_shared::presence::Role;
use yoriai_shared::protocol::{Scale, ServerFrame, SessionEvent};
use yoriai_shared::time::SystemClock;

use crate::bus::WsEventBus;
use crate::commands::{parse_line, Command, HELP_TEXT};
use crate::error::ClientError;
use crate::formatter::MessageFormatter;

/// How often the reconciliation pull runs
const RECONCILE_EVERY: Duration = Duration::from_secs(15);
/// How often a liveness heartbeat is sent
const HEARTBEAT_EVERY: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub session_id: String,
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
}

/// Demo backlog seeded into the CLI's in-memory store. Item ids are
/// stable so every client that connects to the same session agrees on
/// them; a real deployment injects its own persistence collaborator.
fn demo_backlog() -> Vec<Item> {
    let titles = [
        ("item-1", "Sign-in flow"),
        ("item-2", "Backlog search"),
        ("item-3", "CSV export"),
    ];
    titles
        .iter()
        .map(|(id, title)| {
            Item::new(
                ItemId::new((*id).to_string()).expect("demo item ids are non-empty"),
                (*title).to_string(),
                Scale::Fibonacci,
            )
        })
        .collect()
}

fn role_query_value(role: Role) -> &'static str {
    match role {
        Role::Moderator => "moderator",
        Role::TeamMember => "team_member",
    }
}

fn redisplay_prompt(user_id: &str) {
    print!("{}> ", user_id);
    let _ = std::io::stdout().flush();
}

/// Run the client session until the connection drops or the user exits
pub async fn run_client_session(config: SessionConfig) -> Result<(), ClientError> {
    let url = format!(
        "{}?session_id={}&user_id={}&display_name={}&role={}",
        config.url,
        config.session_id,
        config.user_id,
        config.display_name,
        role_query_value(config.role),
    );

    let (ws_stream, response) = match connect_async(&url).await {
        Ok(result) => result,
        Err(e) => {
            let error_msg = e.to_string();
            // The relay answers a duplicate user id with HTTP 409
            if error_msg.contains("409") || error_msg.contains("Conflict") {
                return Err(ClientError::DuplicateUser(config.user_id.clone()));
            }
            return Err(ClientError::ConnectionError(error_msg));
        }
    };
    if response.status().as_u16() == 409 {
        return Err(ClientError::DuplicateUser(config.user_id.clone()));
    }

    tracing::info!("Connected to session '{}'", config.session_id);
    println!(
        "\nYou are '{}' ({:?}) in session '{}'. Type /help for commands, Ctrl+C to exit.\n",
        config.display_name, config.role, config.session_id
    );

    // Engine wiring: the WebSocket is the broadcast channel, the store
    // is the (demo) persistence collaborator.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let bus = Arc::new(WsEventBus::new(out_tx));
    let store = Arc::new(InMemoryEstimationStore::new());
    let session_id = SessionId::new(config.session_id.clone())
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;
    store.seed_items(session_id.clone(), demo_backlog()).await;

    let identity = Identity {
        user_id: UserId::new(config.user_id.clone())
            .map_err(|e| ClientError::ConnectionError(e.to_string()))?,
        display_name: DisplayName::new(config.display_name.clone())
            .map_err(|e| ClientError::ConnectionError(e.to_string()))?,
        role: config.role,
    };
    let engine = Arc::new(SessionEngine::new(
        session_id,
        identity,
        Scale::Fibonacci,
        bus.clone(),
        store,
        Arc::new(StubMediaSession),
        Arc::new(SystemClock),
    ));
    engine.bootstrap().await;

    let (mut write, mut read) = ws_stream.split();

    // Task: inbound frames drive the engine and the display
    let engine_for_read = engine.clone();
    let user_id_for_read = config.user_id.clone();
    let mut read_task = tokio::spawn(async move {
        let mut connection_error = false;

        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ServerFrame>(&text) {
                        Ok(frame) => {
                            let display =
                                render_frame(&engine_for_read, &frame, &user_id_for_read).await;
                            engine_for_read.handle_frame(frame).await;
                            if let Some(display) = display {
                                print!("{}", display);
                                redisplay_prompt(&user_id_for_read);
                            }
                        }
                        Err(_) => {
                            print!("{}", MessageFormatter::format_raw_message(&text));
                            redisplay_prompt(&user_id_for_read);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Relay closed the connection");
                    connection_error = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    connection_error = true;
                    break;
                }
                _ => {}
            }
        }

        connection_error
    });

    // Task: outbound frames to the relay
    let mut write_task = tokio::spawn(async move {
        let mut write_error = false;
        while let Some(json) = out_rx.recv().await {
            if let Err(e) = write.send(Message::Text(json.into())).await {
                tracing::warn!("Failed to send frame: {}", e);
                write_error = true;
                break;
            }
        }
        write_error
    });

    // Task: once-per-second timer drive (authority ticks, mirrors no-op)
    let engine_for_tick = engine.clone();
    let tick_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            engine_for_tick.drive_second().await;
        }
    });

    // Task: periodic reconciliation pull
    let engine_for_reconcile = engine.clone();
    let reconcile_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(RECONCILE_EVERY);
        loop {
            interval.tick().await;
            engine_for_reconcile.reconcile().await;
        }
    });

    // Task: liveness heartbeat
    let bus_for_heartbeat = bus.clone();
    let heartbeat_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_EVERY);
        loop {
            interval.tick().await;
            if bus_for_heartbeat.heartbeat().is_err() {
                break;
            }
        }
    });

    // Blocking thread for rustyline (synchronous readline)
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    let prompt_user_id = config.user_id.clone();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", prompt_user_id);
        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    tracing::info!("Input closed");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    // Task: user intents
    let engine_for_input = engine.clone();
    let user_id_for_input = config.user_id.clone();
    let mut input_task = tokio::spawn(async move {
        while let Some(line) = input_rx.recv().await {
            dispatch_line(&engine_for_input, &line).await;
            redisplay_prompt(&user_id_for_input);
        }
    });

    // If the connection or the input ends, tear everything down
    let result = tokio::select! {
        read_result = &mut read_task => {
            write_task.abort();
            input_task.abort();
            if read_result.unwrap_or(false) {
                Err(ClientError::ConnectionError("Connection lost".to_string()))
            } else {
                Ok(())
            }
        }
        write_result = &mut write_task => {
            read_task.abort();
            input_task.abort();
            if write_result.unwrap_or(false) {
                Err(ClientError::ConnectionError("Connection lost".to_string()))
            } else {
                Ok(())
            }
        }
        _ = &mut input_task => {
            read_task.abort();
            write_task.abort();
            Ok(())
        }
    };

    tick_task.abort();
    reconcile_task.abort();
    heartbeat_task.abort();
    engine.leave_session().await;

    result
}

async fn active_item_id(engine: &SessionEngine) -> Option<ItemId> {
    let replica = engine.replica();
    let replica = replica.lock().await;
    replica.active_item().map(|i| i.id.clone())
}

/// Map one input line to an engine intent and print the outcome
async fn dispatch_line(engine: &Arc<SessionEngine>, line: &str) {
    let command = match parse_line(line) {
        Ok(command) => command,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };

    match command {
        Command::Chat(text) => {
            let item_id = active_item_id(engine).await;
            if let Err(e) = engine.chat.send(text, item_id).await {
                println!("Message not sent: {}", e);
            }
        }
        Command::Vote(value) => {
            let Some(item_id) = active_item_id(engine).await else {
                println!("No active item to vote on");
                return;
            };
            match engine.votes.submit_vote(item_id, value).await {
                Ok(()) => println!("Vote recorded"),
                Err(e) => println!("Vote rejected: {}", e),
            }
        }
        Command::Reveal => {
            let Some(item_id) = active_item_id(engine).await else {
                println!("No active item");
                return;
            };
            match engine.votes.reveal(&item_id).await {
                Ok(()) => {
                    let votes = engine.votes.get_votes(&item_id).await;
                    let consensus = engine.votes.consensus(&item_id).await;
                    print!("{}", MessageFormatter::format_reveal(&votes, &consensus));
                }
                Err(e) => println!("Reveal failed: {}", e),
            }
        }
        Command::Override(value) => {
            let Some(item_id) = active_item_id(engine).await else {
                println!("No active item");
                return;
            };
            match engine.votes.override_consensus(&item_id, value).await {
                Ok(()) => println!("Consensus overridden"),
                Err(e) => println!("Override rejected: {}", e),
            }
        }
        Command::Start(duration) => {
            if let Err(e) = engine.timer.start(duration).await {
                println!("Timer not started: {}", e);
            }
        }
        Command::Pause => {
            if let Err(e) = engine.timer.pause().await {
                println!("Timer not paused: {}", e);
            }
        }
        Command::Resume => {
            if let Err(e) = engine.timer.resume().await {
                println!("Timer not resumed: {}", e);
            }
        }
        Command::ResetTimer => {
            if let Err(e) = engine.timer.reset().await {
                println!("Timer not reset: {}", e);
            }
        }
        Command::Limit(seconds) => {
            if let Err(e) = engine.timer.set_limit(seconds).await {
                println!("Limit not changed: {}", e);
            }
        }
        Command::Accept => match engine.navigator.accept().await {
            Ok(label) => println!("Item accepted with estimate {}", label),
            Err(e) => println!("Accept failed: {}", e),
        },
        Command::Skip => {
            if let Err(e) = engine.navigator.skip().await {
                println!("Skip failed: {}", e);
            }
        }
        Command::GoTo(index) => {
            if let Err(e) = engine.navigator.go_to(index).await {
                println!("Navigation failed: {}", e);
            }
        }
        Command::ChangeScale(scale) => {
            if let Err(e) = engine.navigator.change_scale(scale).await {
                println!("Scale not changed: {}", e);
            }
        }
        Command::Edit { id, text } => {
            match yoriai_engine::domain::value_object::MessageId::new(id) {
                Ok(id) => {
                    if let Err(e) = engine.chat.edit(&id, text).await {
                        println!("Edit failed: {}", e);
                    }
                }
                Err(e) => println!("Edit failed: {}", e),
            }
        }
        Command::Delete { id } => {
            match yoriai_engine::domain::value_object::MessageId::new(id) {
                Ok(id) => {
                    if let Err(e) = engine.chat.delete(&id).await {
                        println!("Delete failed: {}", e);
                    }
                }
                Err(e) => println!("Delete failed: {}", e),
            }
        }
        Command::Call => match engine.mesh.join_call().await {
            Ok(local) => println!(
                "Joined the call (video: {}, audio: {})",
                local.video, local.audio
            ),
            Err(e) => println!("Could not join the call: {}", e),
        },
        Command::Hangup => {
            engine.mesh.leave_call().await;
            println!("Left the call");
        }
        Command::Screen => {
            if let Err(e) = engine.mesh.share_screen().await {
                println!("Screen share failed: {}", e);
            }
        }
        Command::Participants => {
            let roster = engine.presence.roster().await;
            print!(
                "{}",
                MessageFormatter::format_roster(&roster, engine.identity().user_id.as_str())
            );
        }
        Command::Votes => {
            let Some(item_id) = active_item_id(engine).await else {
                println!("No active item");
                return;
            };
            let votes = engine.votes.get_votes(&item_id).await;
            let revealed = {
                let replica = engine.replica();
                let replica = replica.lock().await;
                replica.is_revealed(&item_id)
            };
            print!("{}", MessageFormatter::format_current_votes(&votes, revealed));
        }
        Command::Help => println!("{}", HELP_TEXT),
    }
}

/// Decide what to print for an inbound frame. Called before the frame is
/// applied so notices can compare against the pre-apply state, while
/// lookups that need the post-apply state read the replica afterwards.
async fn render_frame(
    engine: &Arc<SessionEngine>,
    frame: &ServerFrame,
    user_id: &str,
) -> Option<String> {
    match frame {
        ServerFrame::Welcome { roster, .. } => {
            Some(MessageFormatter::format_roster(roster, user_id))
        }
        ServerFrame::PresenceJoined { record } => {
            Some(MessageFormatter::format_participant_joined(record))
        }
        ServerFrame::PresenceLeft { user_id } => {
            Some(MessageFormatter::format_participant_left(user_id))
        }
        ServerFrame::PresenceSync { .. } => None,
        ServerFrame::Error { message } => Some(format!("\nRelay error: {}\n", message)),
        ServerFrame::Event { event } => render_event(engine, event).await,
    }
}

async fn render_event(engine: &Arc<SessionEngine>, event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::VoteSubmitted { vote } | SessionEvent::VoteChanged { vote } => {
            let is_change = matches!(event, SessionEvent::VoteChanged { .. });
            Some(MessageFormatter::format_vote_notice(
                &vote.voter_name,
                is_change,
                vote.revealed,
                &vote.value.label(),
            ))
        }
        SessionEvent::VotesRevealed { votes, consensus, .. } => {
            let votes: Vec<_> = votes
                .iter()
                .cloned()
                .filter_map(|record| record.try_into().ok())
                .collect();
            Some(MessageFormatter::format_reveal(&votes, consensus))
        }
        SessionEvent::TimerStart {
            duration_seconds, ..
        } => Some(MessageFormatter::format_timer(*duration_seconds, true)),
        SessionEvent::TimerPause {
            remaining_seconds, ..
        } => Some(MessageFormatter::format_timer(*remaining_seconds, false)),
        SessionEvent::TimerResume {
            remaining_seconds, ..
        } => Some(MessageFormatter::format_timer(*remaining_seconds, true)),
        SessionEvent::TimerReset { .. } => Some("\n[timer] reset\n".to_string()),
        SessionEvent::TimerTick {
            remaining_seconds,
            running,
            ..
        } => {
            // Print sparsely: every ten seconds, plus the final five.
            if *remaining_seconds % 10 == 0 || *remaining_seconds <= 5 {
                Some(MessageFormatter::format_timer(*remaining_seconds, *running))
            } else {
                None
            }
        }
        SessionEvent::TimerConfigChanged {
            new_limit_seconds, ..
        } => Some(format!("\n[timer] default set to {}s\n", new_limit_seconds)),
        SessionEvent::ConsensusChanged { new_value, .. } => Some(format!(
            "\n* Consensus overridden to {}\n",
            new_value.label()
        )),
        SessionEvent::ItemChanged { new_index, .. } => {
            let title = {
                let replica = engine.replica();
                let replica = replica.lock().await;
                replica.items.get(*new_index).map(|i| i.title.clone())
            };
            Some(MessageFormatter::format_item_changed(
                *new_index,
                title.as_deref(),
            ))
        }
        SessionEvent::EstimationTypeChanged { new_scale, .. } => {
            Some(format!("\n* Estimation scale changed to {:?}\n", new_scale))
        }
        SessionEvent::ChatMessage { message }
        | SessionEvent::ChatMessageUpdated { message }
        | SessionEvent::ChatMessageDeleted { message } => message
            .clone()
            .try_into()
            .ok()
            .map(|entry| MessageFormatter::format_chat_message(&entry)),
        SessionEvent::VideoSignal { .. } => None,
    }
}
