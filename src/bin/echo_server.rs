//! Blocking WebSocket echo server
//!
//! Serves one connection at a time: text messages are echoed back, binary
//! messages are acknowledged with their size.
//!
//! Run with: cargo run --bin echo_server -- --port 9001

use std::net::IpAddr;

use clap::Parser;

use plainws::{Config, Message, Server};

#[derive(Parser)]
#[command(name = "echo_server")]
#[command(about = "Sequential WebSocket echo server")]
struct Args {
    #[arg(short, long, default_value_t = 9001, help = "Port to listen on")]
    port: u16,

    #[arg(long, default_value = "127.0.0.1", help = "Address to bind")]
    host: IpAddr,

    #[arg(long, help = "Treat reserved opcodes as protocol errors")]
    strict: bool,

    #[arg(short, long, help = "Enable debug logging")]
    verbose: bool,
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = if verbose {
        EnvFilter::new("debug,plainws=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(env_filter).init();
}

fn main() -> plainws::Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    let config = Config::builder().strict_opcodes(args.strict).build();
    let server = Server::bind_addr((args.host, args.port), config)?;

    tracing::info!("echo server listening on ws://{}", server.local_addr()?);

    server.serve(|session, msg| {
        let reply = match msg {
            Message::Text(text) => text,
            Message::Binary(data) => format!("received {} bytes", data.len()),
        };
        if let Err(e) = session.send(&reply) {
            tracing::warn!(error = %e, "reply failed");
        }
    })
}
