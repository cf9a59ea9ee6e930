//! `gridwalk_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - Deterministic movement arithmetic, identical for every entity.
//! - Clear separation of concerns (math, maps, stepping, events, net).
//! - Traits at the seams (tile queries, sprites) for dependency injection.
//! - No `unsafe`.

pub mod config;
pub mod console;
pub mod event;
pub mod math;
pub mod net;
pub mod render;
pub mod stepper;
pub mod tilemap;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::event::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::render::*;
    pub use crate::stepper::*;
    pub use crate::tilemap::*;
}
