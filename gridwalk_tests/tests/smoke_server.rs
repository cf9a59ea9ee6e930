use std::time::Duration;

use gridwalk_server::bind_ephemeral;
use gridwalk_shared::net::{NetMsg, ReliableConn, PROTOCOL_VERSION};
use tokio::net::TcpStream;

/// Smoke test: an empty server ticks and heartbeats without panicking.
#[tokio::test]
async fn server_runs_few_ticks() -> anyhow::Result<()> {
    let (mut server, _cfg) = bind_ephemeral(0).await?;
    server.run_for_ticks(3).await?;
    assert_eq!(server.player_count(), 0);
    assert_eq!(server.heartbeat_count(), 3);
    Ok(())
}

/// A connection that never says hello must not hold up heartbeats or the
/// players queued behind it.
#[tokio::test]
async fn silent_connection_does_not_stall_the_server() -> anyhow::Result<()> {
    let (mut server, cfg) = bind_ephemeral(10).await?;
    let addr = cfg.server_addr.parse()?;

    let _silent = TcpStream::connect(addr).await?;
    let mut conn = ReliableConn::connect(addr).await?;
    conn.send(&NetMsg::Hello {
        protocol: PROTOCOL_VERSION,
        player_name: "ash".to_string(),
    })
    .await?;

    let before = server.heartbeat_count();
    tokio::time::timeout(Duration::from_secs(2), async {
        while server.player_count() < 1 || server.heartbeat_count() == before {
            server.try_accept(Duration::from_millis(1)).await?;
            server.step().await?;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        Ok::<_, anyhow::Error>(())
    })
    .await??;

    assert_eq!(server.player_count(), 1);
    assert!(server.heartbeat_count() > before);
    match conn.recv().await? {
        NetMsg::Welcome { player_id } => assert!(player_id.as_str().starts_with("ash")),
        other => panic!("expected Welcome, got {other:?}"),
    }
    Ok(())
}
