//! `gridwalk_server`
//!
//! Movement relay:
//! - Accepts players over TCP (`Hello` / `Welcome`)
//! - Records each player's reported tile steps
//! - Sends every player a heartbeat with the other players' new steps
//!
//! The server holds no map and runs no movement of its own.

pub mod server;

pub use server::{bind_ephemeral, GameServer};
