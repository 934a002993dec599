//! Yoriai session relay binary.
//!
//! Relays estimation-session events between connected clients, resolves
//! presence and routes video signals.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin yoriai-server
//! cargo run --bin yoriai-server -- --host 0.0.0.0 --port 3000
//! ```

use clap::Parser;

use yoriai_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Yoriai session relay with presence and signal routing", long_about = None)]
struct Args {
    /// Host address to bind the relay to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the relay to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    if let Err(e) = yoriai_server::run_server(args.host, args.port).await {
        tracing::error!("Relay error: {}", e);
        std::process::exit(1);
    }
}
