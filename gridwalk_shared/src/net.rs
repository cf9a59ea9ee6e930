//! Networking primitives.
//!
//! Goals:
//! - One reliable (TCP) channel per client, length-prefixed JSON frames.
//! - Movement notifications up, roster heartbeats down.
//! - Reads happen on a background task so the frame loop only ever sees
//!   whole messages.

use std::{
    collections::BTreeMap,
    fmt,
    net::SocketAddr,
    sync::atomic::{AtomicU32, Ordering},
};

use anyhow::{bail, Context};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, trace};

use crate::{
    event::MovementEvent,
    math::{Direction, TilePos},
};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on a single frame's payload.
pub const MAX_FRAME_LEN: usize = 1 << 20;

static NEXT_PLAYER_SERIAL: AtomicU32 = AtomicU32::new(1);

/// Stable identifier of a connected player.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        PlayerId(id.into())
    }

    /// Derives a process-unique id from a display name.
    pub fn new_unique(name: &str) -> Self {
        let serial = NEXT_PLAYER_SERIAL.fetch_add(1, Ordering::Relaxed);
        PlayerId(format!("{name}#{serial}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Roster snapshot: every other player in the scene and the steps they took
/// since the previous heartbeat. A player missing from the map has left.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub remote_movement_queues: BTreeMap<PlayerId, Vec<Direction>>,
}

impl Snapshot {
    /// Adds `player` with the given new moves, replacing any earlier entry.
    pub fn with(mut self, player: impl Into<String>, moves: &[Direction]) -> Self {
        self.remote_movement_queues
            .insert(PlayerId::new(player), moves.to_vec());
        self
    }
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    // ─── Connection handshake ───
    Hello {
        protocol: u32,
        player_name: String,
    },
    Welcome {
        player_id: PlayerId,
    },

    // ─── Local movement (client -> server) ───
    StartMoving {
        direction: Direction,
    },
    /// The tile the player is about to walk onto.
    NewTilePos {
        tile: TilePos,
    },
    StopMoving {
        direction: Direction,
    },

    // ─── Remote movement (server -> client) ───
    HeartBeat(Snapshot),

    // ─── Disconnect ───
    Disconnect {
        reason: String,
    },
}

impl From<MovementEvent> for NetMsg {
    fn from(e: MovementEvent) -> Self {
        match e {
            MovementEvent::Started(direction) => NetMsg::StartMoving { direction },
            MovementEvent::TileEntered(tile) => NetMsg::NewTilePos { tile },
            MovementEvent::Stopped(direction) => NetMsg::StopMoving { direction },
        }
    }
}

async fn write_msg<W: AsyncWrite + Unpin>(w: &mut W, msg: &NetMsg) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(msg).context("serialize msg")?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    w.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

async fn read_msg<R: AsyncRead + Unpin>(r: &mut R) -> anyhow::Result<NetMsg> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await.context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        bail!("frame of {len} bytes exceeds limit");
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
    Ok(msg)
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        stream.set_nodelay(true).context("tcp nodelay")?;
        Ok(Self::new(stream))
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        write_msg(&mut self.stream, msg).await
    }

    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_msg(&mut self.stream).await
    }

    /// Splits into independently owned receive and send halves.
    pub fn into_split(self) -> (ReliableRecv, ReliableSend) {
        let (read, write) = self.stream.into_split();
        (ReliableRecv { half: read }, ReliableSend { half: write })
    }
}

/// Receive half of a [`ReliableConn`].
#[derive(Debug)]
pub struct ReliableRecv {
    half: OwnedReadHalf,
}

impl ReliableRecv {
    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_msg(&mut self.half).await
    }
}

/// Send half of a [`ReliableConn`].
#[derive(Debug)]
pub struct ReliableSend {
    half: OwnedWriteHalf,
}

impl ReliableSend {
    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        write_msg(&mut self.half, msg).await
    }
}

/// What a reader task hands to its owner.
#[derive(Debug)]
pub enum Inbound<K> {
    Msg(K, NetMsg),
    /// The peer went away; carries the read error, if any.
    Closed(K, Option<String>),
}

/// Spawns a task that reads whole messages from `conn` and forwards them,
/// tagged with `key`, until the connection or the channel closes.
pub fn spawn_reader<K>(
    mut conn: ReliableRecv,
    key: K,
    tx: mpsc::UnboundedSender<Inbound<K>>,
) -> JoinHandle<()>
where
    K: Clone + fmt::Debug + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match conn.recv().await {
                Ok(msg) => {
                    trace!(key = ?key, ?msg, "Frame received");
                    if tx.send(Inbound::Msg(key.clone(), msg)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(key = ?key, error = %e, "Reader stopped");
                    let _ = tx.send(Inbound::Closed(key, Some(format!("{e:#}"))));
                    break;
                }
            }
        }
    })
}

/// TCP server listener.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        stream.set_nodelay(true).context("tcp nodelay")?;
        Ok((ReliableConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_wire_shape() {
        let msg = NetMsg::HeartBeat(
            Snapshot::default()
                .with("ash#1", &[Direction::Up, Direction::Left])
                .with("misty#2", &[]),
        );
        let json = String::from_utf8(encode_to_bytes(&msg).unwrap().to_vec()).unwrap();
        assert_eq!(
            json,
            r#"{"HeartBeat":{"remote_movement_queues":{"ash#1":["UP","LEFT"],"misty#2":[]}}}"#
        );
        assert_eq!(decode_from_bytes(json.as_bytes()).unwrap(), msg);
    }

    #[test]
    fn movement_events_map_to_messages() {
        assert_eq!(
            NetMsg::from(MovementEvent::TileEntered(TilePos::new(1, 0))),
            NetMsg::NewTilePos {
                tile: TilePos::new(1, 0)
            }
        );
        assert_eq!(
            NetMsg::from(MovementEvent::Stopped(Direction::Down)),
            NetMsg::StopMoving {
                direction: Direction::Down
            }
        );
    }

    #[tokio::test]
    async fn oversized_frames_are_rejected() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&((MAX_FRAME_LEN as u32) + 1).to_be_bytes());
        let mut reader = frame.as_slice();
        let err = read_msg(&mut reader).await.unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
    }

    #[tokio::test]
    async fn frames_roundtrip_through_a_buffer() {
        let msg = NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
            player_name: "red".to_string(),
        };
        let mut buf = Vec::new();
        write_msg(&mut buf, &msg).await.unwrap();
        assert_eq!(u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize, buf.len() - 4);
        let mut reader = buf.as_slice();
        assert_eq!(read_msg(&mut reader).await.unwrap(), msg);
    }
}
