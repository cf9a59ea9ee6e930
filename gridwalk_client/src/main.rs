//! Standalone headless client binary.
//!
//! Usage:
//!   cargo run -p gridwalk_client -- [--addr 127.0.0.1:40000] [--maps-dir maps]
//!                                    [--map start] [--name Player] [--config client.json]
//!
//! The client connects to the server, loads the tile map, and runs the
//! movement core once per frame. Sprites are replaced by log lines.
//!
//! Console commands:
//!   w|a|s|d|up|down|left|right [frames] - Hold a direction key for N frames
//!   status                              - Show client status
//!   quit                                - Exit client

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use gridwalk_client::client::{ClientState, GameClient};
use gridwalk_client::input::InputState;
use gridwalk_shared::{
    config::EngineConfig,
    console,
    math::{Direction, PixelPos},
    net::PlayerId,
    render::{EntityView, ViewSpawner},
    tilemap::TileMap,
};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Sprite stand-in that logs what a renderer would draw.
struct TracingView {
    name: String,
}

impl EntityView for TracingView {
    fn set_pixel_position(&mut self, position: PixelPos) {
        trace!(sprite = %self.name, x = position.x, y = position.y, "Move sprite");
    }

    fn play_walk_animation(&mut self, direction: Direction) {
        debug!(sprite = %self.name, %direction, "Walk animation");
    }

    fn play_idle_animation(&mut self, direction: Direction) {
        debug!(sprite = %self.name, %direction, "Idle animation");
    }

    fn destroy(&mut self) {
        debug!(sprite = %self.name, "Destroy sprite");
    }
}

struct TracingSpawner;

impl ViewSpawner for TracingSpawner {
    fn spawn(&mut self, player: &PlayerId, _position: PixelPos) -> Box<dyn EntityView> {
        Box::new(TracingView {
            name: player.to_string(),
        })
    }
}

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
            "--maps-dir" if i + 1 < args.len() => {
                cfg.maps_dir = args[i + 1].clone();
                i += 2;
            }
            "--map" if i + 1 < args.len() => {
                cfg.map_name = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
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
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(server = %cfg.server_addr, map = %cfg.map_path().display(), "Starting client");

    let map = TileMap::load(cfg.map_path()).context("load map")?;
    info!(map = %map.name, width = map.width, height = map.height, spawn = %map.spawn_tile(), "Map loaded");

    let local_view = Box::new(TracingView {
        name: cfg.player_name.clone(),
    });
    let mut client = GameClient::connect(&cfg, Arc::new(map), local_view, Box::new(TracingSpawner))
        .await
        .context("connect")?;

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    console::spawn_stdin_reader(console_tx);

    println!("Client connected. Type 'status' for info, 'quit' to exit.");
    println!();

    let dt = 1.0 / cfg.tick_hz as f32;
    let frames_per_tile = (cfg.tile_size / (cfg.walk_speed_px() * dt)).ceil() as u32;
    let mut held = InputState::empty();
    let mut held_frames = 0u32;

    loop {
        // Process console commands.
        while let Ok(line) = console_rx.try_recv() {
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("status") => {
                    for line in client.status() {
                        println!("{}", line);
                    }
                }
                Some("quit" | "exit") => {
                    client.disconnect("quit").await?;
                    return Ok(());
                }
                Some(key) => match InputState::from_key(key) {
                    Some(input) => {
                        held = input;
                        held_frames = tokens
                            .next()
                            .and_then(|n| n.parse().ok())
                            .unwrap_or(frames_per_tile);
                    }
                    None => println!("Unknown command: {}", key),
                },
                None => {}
            }
        }

        let input = if held_frames > 0 {
            held_frames -= 1;
            held
        } else {
            InputState::empty()
        };

        for event in client.frame(input, dt).await? {
            info!(?event, "Movement");
        }

        if client.state == ClientState::Disconnected {
            println!("Disconnected from server.");
            break;
        }

        tokio::time::sleep(Duration::from_secs_f32(dt)).await;
    }

    Ok(())
}
