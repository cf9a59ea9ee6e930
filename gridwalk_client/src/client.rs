//! Client implementation.
//!
//! The client maintains:
//! - A reliable connection: sends movement notifications, receives heartbeats
//! - The local player's grid controller
//! - The remote player roster
//!
//! Everything runs on the frame loop. Inbound messages are read by a
//! background task and only applied between frames, each one in full.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use gridwalk_shared::{
    config::EngineConfig,
    event::{EventBus, MovementEvent},
    net::{spawn_reader, Inbound, NetMsg, PlayerId, ReliableConn, ReliableSend, PROTOCOL_VERSION},
    render::{EntityView, ViewSpawner},
    stepper::StepParams,
    tilemap::TileMap,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::{input::InputState, local::LocalMovementController, remote::RemoteSyncEngine};

/// Client connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Handshake done, exchanging movement.
    Connected,
    /// The server closed the connection or asked us to leave.
    Disconnected,
}

/// High-level game client.
pub struct GameClient {
    pub player_id: PlayerId,
    pub state: ClientState,
    pub local: LocalMovementController,
    pub remote: RemoteSyncEngine,

    sender: ReliableSend,
    inbox: mpsc::UnboundedReceiver<Inbound<()>>,
    reader: JoinHandle<()>,
    events: EventBus,
    frame: u64,
    heartbeats: u64,
}

impl GameClient {
    /// Connects to a server, performs the handshake, and places the local
    /// player on the map's spawn tile.
    pub async fn connect(
        cfg: &EngineConfig,
        map: Arc<TileMap>,
        local_view: Box<dyn EntityView>,
        spawner: Box<dyn ViewSpawner>,
    ) -> anyhow::Result<Self> {
        cfg.validate()?;
        let server_addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;

        info!(server = %server_addr, name = %cfg.player_name, "Connecting to server");

        let mut conn = ReliableConn::connect(server_addr).await?;
        conn.send(&NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
            player_name: cfg.player_name.clone(),
        })
        .await?;

        let player_id = match conn.recv().await? {
            NetMsg::Welcome { player_id } => player_id,
            NetMsg::Disconnect { reason } => anyhow::bail!("server refused: {reason}"),
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };

        info!(player = %player_id, "Connected to server");

        let (recv, sender) = conn.into_split();
        let (tx, inbox) = mpsc::unbounded_channel();
        let reader = spawn_reader(recv, (), tx);

        let params = StepParams::new(cfg.walk_speed_px(), cfg.tile_size);
        let spawn = map.spawn_tile();

        Ok(Self {
            player_id,
            state: ClientState::Connected,
            local: LocalMovementController::new(spawn, params, map, local_view),
            remote: RemoteSyncEngine::new(spawn, params, spawner),
            sender,
            inbox,
            reader,
            events: EventBus::new(),
            frame: 0,
            heartbeats: 0,
        })
    }

    /// Applies every message that arrived since the last call. Returns how
    /// many heartbeats were applied.
    pub fn poll_network(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(inbound) = self.inbox.try_recv() {
            match inbound {
                Inbound::Msg((), NetMsg::HeartBeat(snapshot)) => {
                    trace!(players = snapshot.remote_movement_queues.len(), "Heartbeat");
                    self.remote.apply_snapshot(&snapshot);
                    self.heartbeats += 1;
                    applied += 1;
                }
                Inbound::Msg((), NetMsg::Disconnect { reason }) => {
                    info!(reason = %reason, "Disconnected by server");
                    self.state = ClientState::Disconnected;
                }
                Inbound::Msg((), other) => {
                    debug!(?other, "Unhandled message");
                }
                Inbound::Closed((), error) => {
                    warn!(error = ?error, "Connection closed");
                    self.state = ClientState::Disconnected;
                }
            }
        }
        applied
    }

    /// Runs one frame: network in, input, movement, notifications out.
    /// Returns the notifications sent this frame.
    pub async fn frame(
        &mut self,
        input: InputState,
        dt_sec: f32,
    ) -> anyhow::Result<Vec<MovementEvent>> {
        self.poll_network();

        let intent = input.intent();
        if !intent.is_none() {
            self.local.set_intent(intent, &mut self.events);
        }
        self.local.update(dt_sec, &mut self.events);
        self.remote.update(dt_sec);
        self.frame += 1;

        self.flush().await
    }

    async fn flush(&mut self) -> anyhow::Result<Vec<MovementEvent>> {
        let events = self.events.drain::<MovementEvent>();
        if self.state == ClientState::Disconnected {
            return Ok(events);
        }
        for e in &events {
            debug!(event = ?e, "Notify server");
            self.sender
                .send(&NetMsg::from(*e))
                .await
                .context("send movement")?;
        }
        Ok(events)
    }

    /// Tells the server we are leaving and closes the connection.
    pub async fn disconnect(mut self, reason: &str) -> anyhow::Result<()> {
        self.sender
            .send(&NetMsg::Disconnect {
                reason: reason.to_string(),
            })
            .await?;
        self.state = ClientState::Disconnected;
        Ok(())
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn heartbeat_count(&self) -> u64 {
        self.heartbeats
    }

    /// Human-readable status lines for the console.
    pub fn status(&self) -> Vec<String> {
        let mut out = vec![
            format!("State: {:?}", self.state),
            format!("Player: {}", self.player_id),
            format!("Frame: {}", self.frame),
            format!(
                "Tile: {} moving={} facing={}",
                self.local.tile(),
                self.local.is_moving(),
                self.local.state().facing()
            ),
            format!("Heartbeats: {}", self.heartbeats),
            format!("Remote players: {}", self.remote.len()),
        ];
        for id in self.remote.ids() {
            if let Some(p) = self.remote.get(id) {
                out.push(format!(
                    "  {}: tile={} queued={}",
                    id,
                    p.state().tile(),
                    p.queue_len()
                ));
            }
        }
        out
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
