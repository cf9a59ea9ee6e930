//! Server implementation.
//!
//! A relay: clients report their own movement, and the server forwards it to
//! everyone else in periodic heartbeats. It supports:
//! - Handshake with protocol version check, each in its own task with a deadline
//! - Per-player step recording from start/tile/stop notifications
//! - Heartbeat broadcast of every other player's new steps
//! - Roster removal on disconnect (the next heartbeat omits the player)
//!
//! The server does not validate moves against a map; clients check collisions
//! before they move and remote clients trust what they receive.

use std::{
    collections::BTreeMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use anyhow::Context;
use gridwalk_shared::{
    config::EngineConfig,
    math::{Direction, TilePos},
    net::{
        spawn_reader, Inbound, NetMsg, PlayerId, ReliableConn, ReliableListener, ReliableRecv,
        ReliableSend, Snapshot, PROTOCOL_VERSION,
    },
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

/// Steps one player reported since the last heartbeat.
#[derive(Debug, Default)]
struct MoveLog {
    /// Direction of the walk in progress, if any.
    moving: Direction,
    /// Last tile the player reported.
    tile: Option<TilePos>,
    /// Steps not yet sent to the other players.
    pending: Vec<Direction>,
}

impl MoveLog {
    fn record(&mut self, id: &PlayerId, msg: NetMsg) {
        match msg {
            NetMsg::StartMoving { direction } => {
                debug!(player = %id, %direction, "Start moving");
                self.moving = direction;
            }
            NetMsg::NewTilePos { tile } => {
                // Adjacent reports carry their own direction; the first one
                // (or a jump) falls back to the active walk.
                let step = self
                    .tile
                    .and_then(|last| Direction::from_step(TilePos::new(tile.x - last.x, tile.y - last.y)))
                    .unwrap_or(self.moving);
                if step.is_none() {
                    debug!(player = %id, %tile, "Tile report outside a walk ignored");
                } else {
                    self.pending.push(step);
                }
                self.tile = Some(tile);
            }
            NetMsg::StopMoving { direction } => {
                debug!(player = %id, %direction, "Stop moving");
                self.moving = Direction::None;
            }
            other => {
                debug!(player = %id, ?other, "Unexpected message");
            }
        }
    }
}

/// Connected player.
struct Session {
    name: String,
    sender: ReliableSend,
    reader: JoinHandle<()>,
    log: MoveLog,
}

/// How long a new connection gets to send its `Hello`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// A connection that finished the handshake and waits to be admitted.
struct Joined {
    id: PlayerId,
    name: String,
    peer: SocketAddr,
    recv: ReliableRecv,
    sender: ReliableSend,
}

async fn handshake(mut conn: ReliableConn, peer: SocketAddr) -> anyhow::Result<Joined> {
    let hello = tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv())
        .await
        .context("handshake timed out")??;
    match hello {
        NetMsg::Hello {
            protocol,
            player_name,
        } if protocol == PROTOCOL_VERSION => {
            let id = PlayerId::new_unique(&player_name);
            conn.send(&NetMsg::Welcome {
                player_id: id.clone(),
            })
            .await?;

            let (recv, sender) = conn.into_split();
            Ok(Joined {
                id,
                name: player_name,
                peer,
                recv,
                sender,
            })
        }
        NetMsg::Hello { protocol, .. } => {
            let reason = format!("protocol {protocol} unsupported, expected {PROTOCOL_VERSION}");
            let _ = conn.send(&NetMsg::Disconnect { reason: reason.clone() }).await;
            anyhow::bail!(reason)
        }
        other => anyhow::bail!("unexpected handshake msg: {other:?}"),
    }
}

/// Relay server.
pub struct GameServer {
    pub cfg: EngineConfig,
    listener: ReliableListener,
    sessions: BTreeMap<PlayerId, Session>,
    inbox_tx: mpsc::UnboundedSender<Inbound<PlayerId>>,
    inbox: mpsc::UnboundedReceiver<Inbound<PlayerId>>,
    joins_tx: mpsc::UnboundedSender<Joined>,
    joins: mpsc::UnboundedReceiver<Joined>,
    tick: u32,
    heartbeats: u64,
    last_heartbeat: Instant,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
}

impl GameServer {
    /// Binds the listener and creates a server with the given config.
    pub async fn new(cfg: EngineConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let listener = ReliableListener::bind(addr).await?;
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let (joins_tx, joins) = mpsc::unbounded_channel();

        Ok(Self {
            cfg,
            listener,
            sessions: BTreeMap::new(),
            inbox_tx,
            inbox,
            joins_tx,
            joins,
            tick: 0,
            heartbeats: 0,
            last_heartbeat: Instant::now(),
            console_rx: None,
        })
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn player_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerId> {
        self.sessions.keys()
    }

    pub fn heartbeat_count(&self) -> u64 {
        self.heartbeats
    }

    /// Accepts exactly one client and performs the handshake inline.
    pub async fn accept_one(&mut self) -> anyhow::Result<PlayerId> {
        let (conn, peer) = self.listener.accept().await?;
        let joined = handshake(conn, peer).await?;
        Ok(self.admit(joined))
    }

    /// Accepts a client with timeout (non-blocking).
    ///
    /// The handshake runs in its own task; the player is admitted by the next
    /// [`GameServer::step`] after it completes.
    pub async fn try_accept(&mut self, timeout: Duration) -> anyhow::Result<Option<SocketAddr>> {
        match tokio::time::timeout(timeout, self.listener.accept()).await {
            Ok(Ok((conn, peer))) => {
                let joins_tx = self.joins_tx.clone();
                tokio::spawn(async move {
                    match handshake(conn, peer).await {
                        Ok(joined) => {
                            let _ = joins_tx.send(joined);
                        }
                        Err(e) => warn!(%peer, error = %e, "Handshake failed"),
                    }
                });
                Ok(Some(peer))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None), // Timeout
        }
    }

    fn admit(&mut self, joined: Joined) -> PlayerId {
        let Joined {
            id,
            name,
            peer,
            recv,
            sender,
        } = joined;
        let reader = spawn_reader(recv, id.clone(), self.inbox_tx.clone());
        self.sessions.insert(
            id.clone(),
            Session {
                name,
                sender,
                reader,
                log: MoveLog::default(),
            },
        );
        info!(player = %id, %peer, players = self.sessions.len(), "Player connected");
        id
    }

    /// Runs the server for a number of ticks.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = Duration::from_secs_f32(1.0 / self.cfg.tick_hz as f32);
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step().await?;
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Executes one step: console, new players, inbound messages, heartbeat if due.
    pub async fn step(&mut self) -> anyhow::Result<()> {
        self.process_console_commands();
        while let Ok(joined) = self.joins.try_recv() {
            self.admit(joined);
        }
        self.drain_inbox();
        if self.last_heartbeat.elapsed() >= Duration::from_millis(self.cfg.heartbeat_ms) {
            self.broadcast_heartbeat().await?;
        }
        self.tick += 1;
        Ok(())
    }

    fn drain_inbox(&mut self) {
        while let Ok(inbound) = self.inbox.try_recv() {
            match inbound {
                Inbound::Msg(id, NetMsg::Disconnect { reason }) => {
                    self.remove(&id, &reason);
                }
                Inbound::Msg(id, msg) => {
                    if let Some(session) = self.sessions.get_mut(&id) {
                        session.log.record(&id, msg);
                    }
                }
                Inbound::Closed(id, error) => {
                    let reason = error.unwrap_or_else(|| "closed".to_string());
                    self.remove(&id, &reason);
                }
            }
        }
    }

    fn remove(&mut self, id: &PlayerId, reason: &str) {
        if let Some(session) = self.sessions.remove(id) {
            session.reader.abort();
            info!(player = %id, name = %session.name, reason = %reason, "Player left");
        }
    }

    /// Sends every player the steps the others took since the last heartbeat.
    pub async fn broadcast_heartbeat(&mut self) -> anyhow::Result<()> {
        self.last_heartbeat = Instant::now();
        self.heartbeats += 1;

        let moves: BTreeMap<PlayerId, Vec<Direction>> = self
            .sessions
            .iter_mut()
            .map(|(id, s)| (id.clone(), std::mem::take(&mut s.log.pending)))
            .collect();

        let mut failed = Vec::new();
        for (id, session) in self.sessions.iter_mut() {
            let mut others = moves.clone();
            others.remove(id);
            let msg = NetMsg::HeartBeat(Snapshot {
                remote_movement_queues: others,
            });
            if let Err(e) = session.sender.send(&msg).await {
                warn!(player = %id, error = %e, "Heartbeat send failed");
                failed.push(id.clone());
            }
        }

        for id in failed {
            self.remove(&id, "send failed");
        }
        Ok(())
    }

    fn process_console_commands(&mut self) {
        // Collect lines first to avoid borrow conflict
        let lines: Vec<String> = if let Some(ref mut rx) = self.console_rx {
            let mut collected = Vec::new();
            while let Ok(line) = rx.try_recv() {
                collected.push(line);
            }
            collected
        } else {
            Vec::new()
        };

        for line in lines {
            for out in self.exec_console(&line) {
                println!("{}", out);
            }
        }
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> Vec<String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] => Vec::new(),
            ["status"] => {
                let mut out = vec![
                    format!("Tick: {}", self.tick),
                    format!("Heartbeats: {}", self.heartbeats),
                    format!("Players: {}", self.sessions.len()),
                ];
                for (id, s) in &self.sessions {
                    out.push(format!(
                        "  {}: moving={} tile={:?} pending={}",
                        id,
                        s.log.moving,
                        s.log.tile,
                        s.log.pending.len()
                    ));
                }
                out
            }
            ["kick", name] => {
                let id = PlayerId::new(*name);
                if self.sessions.contains_key(&id) {
                    self.remove(&id, "kicked");
                    vec![format!("Kicked {}", name)]
                } else {
                    vec![format!("No such player: {}", name)]
                }
            }
            ["quit" | "exit"] => {
                info!("Server shutting down");
                std::process::exit(0);
            }
            _ => vec![format!("Unknown command: {}", line.trim())],
        }
    }
}

/// Helper for tests: bind to an ephemeral port.
pub async fn bind_ephemeral(heartbeat_ms: u64) -> anyhow::Result<(GameServer, EngineConfig)> {
    let cfg = EngineConfig {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        heartbeat_ms,
        ..Default::default()
    };

    let mut server = GameServer::new(cfg).await?;
    let addr = server.local_addr()?;
    server.cfg.server_addr = addr.to_string();
    let cfg = server.cfg.clone();
    Ok((server, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(log: &mut MoveLog, msgs: Vec<NetMsg>) {
        let id = PlayerId::new("ash#1");
        for msg in msgs {
            log.record(&id, msg);
        }
    }

    #[test]
    fn tile_reports_become_steps() {
        let mut log = MoveLog::default();
        walk(
            &mut log,
            vec![
                NetMsg::StartMoving {
                    direction: Direction::Right,
                },
                NetMsg::NewTilePos {
                    tile: TilePos::new(4, 2),
                },
                NetMsg::NewTilePos {
                    tile: TilePos::new(5, 2),
                },
                NetMsg::StopMoving {
                    direction: Direction::Right,
                },
                NetMsg::StartMoving {
                    direction: Direction::Up,
                },
                NetMsg::NewTilePos {
                    tile: TilePos::new(5, 1),
                },
            ],
        );
        assert_eq!(
            log.pending,
            vec![Direction::Right, Direction::Right, Direction::Up]
        );
        assert_eq!(log.tile, Some(TilePos::new(5, 1)));
        assert_eq!(log.moving, Direction::Up);
    }

    #[test]
    fn tile_report_while_idle_is_not_a_step() {
        let mut log = MoveLog::default();
        walk(
            &mut log,
            vec![NetMsg::NewTilePos {
                tile: TilePos::new(3, 3),
            }],
        );
        assert!(log.pending.is_empty());
        assert_eq!(log.tile, Some(TilePos::new(3, 3)));
    }

    #[tokio::test]
    async fn console_rejects_unknown_commands() -> anyhow::Result<()> {
        let (mut server, _cfg) = bind_ephemeral(200).await?;
        assert_eq!(server.exec_console("jump"), vec!["Unknown command: jump".to_string()]);
        assert_eq!(
            server.exec_console("kick nobody"),
            vec!["No such player: nobody".to_string()]
        );
        assert_eq!(server.exec_console("status")[2], "Players: 0");
        Ok(())
    }
}
