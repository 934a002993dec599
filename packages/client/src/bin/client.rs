//! Yoriai CLI client binary.
//!
//! Connects to a session relay, replicates the session state and maps
//! slash commands onto estimation intents. Duplicate user ids are
//! rejected by the relay; connection drops are retried a bounded number
//! of times (max 5 attempts with a 5 second interval).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin yoriai-client -- --user-id alice --moderator
//! cargo run --bin yoriai-client -- --user-id bob --name "Bob B." --session sprint-42
//! ```

use std::time::Duration;

use clap::Parser;

use yoriai_client::policy::{should_attempt_reconnect, should_exit_immediately};
use yoriai_client::session::{run_client_session, SessionConfig};
use yoriai_shared::logger::setup_logger;
use yoriai_shared::presence::Role;

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "Yoriai estimation session client", long_about = None)]
struct Args {
    /// User id within the session (must be unique)
    #[arg(short = 'c', long)]
    user_id: String,

    /// Display name (defaults to the user id)
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Session to join
    #[arg(short = 's', long, default_value = "demo")]
    session: String,

    /// Join as the session moderator
    #[arg(short = 'm', long, default_value_t = false)]
    moderator: bool,

    /// Relay WebSocket URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let config = SessionConfig {
        url: args.url,
        session_id: args.session,
        display_name: args.name.unwrap_or_else(|| args.user_id.clone()),
        user_id: args.user_id,
        role: if args.moderator {
            Role::Moderator
        } else {
            Role::TeamMember
        },
    };

    let mut attempt = 0;
    loop {
        match run_client_session(config.clone()).await {
            Ok(()) => break,
            Err(e) => {
                tracing::error!("Client error: {}", e);
                if should_exit_immediately(&e) {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
                if !should_attempt_reconnect(&e, attempt, MAX_RECONNECT_ATTEMPTS) {
                    eprintln!("Giving up after {} attempts", attempt + 1);
                    std::process::exit(1);
                }
                attempt += 1;
                tracing::info!(
                    "Reconnecting in {:?} (attempt {}/{}) after: {}",
                    RECONNECT_INTERVAL,
                    attempt,
                    MAX_RECONNECT_ATTEMPTS,
                    e
                );
                tokio::time::sleep(RECONNECT_INTERVAL).await;
            }
        }
    }
}
