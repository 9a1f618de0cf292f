//! Parley CLI binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use parley::cli::{chat::handle_chat, ChatArgs};

fn init_tracing(debug: bool) {
    let fallback = if debug { "warn,parley=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() {
    let args = ChatArgs::parse();
    init_tracing(args.debug);

    if let Err(e) = handle_chat(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
