//! `gridwalk_client`
//!
//! Client-side systems:
//! - Input sampling into a single walking intent per frame
//! - Local player grid movement with collision checks
//! - Remote player roster and step queues driven by server heartbeats
//! - Connection wiring (reliable channel, background reader)

pub mod client;
pub mod input;
pub mod local;
pub mod remote;

pub use client::GameClient;
pub use local::LocalMovementController;
pub use remote::RemoteSyncEngine;
