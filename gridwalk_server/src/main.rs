//! Standalone relay server binary.
//!
//! Usage:
//!   cargo run -p gridwalk_server -- [--addr 127.0.0.1:40000] [--tick-hz 60]
//!                                    [--heartbeat-ms 200] [--config server.json]
//!
//! The server listens for players, collects the tile steps they report, and
//! relays them to everyone else once per heartbeat.
//!
//! Console commands:
//!   status         - Show server status
//!   kick <player>  - Drop a player by id
//!   quit           - Shutdown server

use std::env;

use anyhow::Context;
use gridwalk_server::GameServer;
use gridwalk_shared::{config::EngineConfig, console};
use tokio::sync::mpsc;
use tracing::{info, warn};

fn parse_args() -> anyhow::Result<EngineConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => EngineConfig::load(&args[i + 1])?,
        _ => EngineConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().context("parse --tick-hz")?;
                i += 2;
            }
            "--heartbeat-ms" if i + 1 < args.len() => {
                cfg.heartbeat_ms = args[i + 1].parse().context("parse --heartbeat-ms")?;
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(addr = %cfg.server_addr, tick_hz = cfg.tick_hz, heartbeat_ms = cfg.heartbeat_ms, "Starting server");

    let mut server = GameServer::new(cfg.clone())
        .await
        .context("create server")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    server.set_console_input(console_rx);

    console::spawn_stdin_reader(console_tx);

    println!("Server ready. Type 'status' for info, 'quit' to exit.");
    println!();

    // Main server loop.
    let tick_interval = std::time::Duration::from_secs_f32(1.0 / cfg.tick_hz as f32);
    let mut next_tick = tokio::time::Instant::now();

    loop {
        // Accept new clients (non-blocking).
        match server.try_accept(std::time::Duration::from_millis(1)).await {
            Ok(Some(peer)) => info!(%peer, "Connection accepted"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Accept failed"),
        }

        server.step().await?;

        // Wait for next tick.
        next_tick += tick_interval;
        tokio::time::sleep_until(next_tick).await;
    }
}
