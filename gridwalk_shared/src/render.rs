//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend. The
//! movement controllers only need to place sprites and pick animation clips,
//! so that is all the seam exposes.

use crate::{
    math::{Direction, PixelPos},
    net::PlayerId,
};

/// A sprite the controllers position every frame.
pub trait EntityView: Send {
    fn set_pixel_position(&mut self, position: PixelPos);
    /// Loops the walk cycle facing `direction`.
    fn play_walk_animation(&mut self, direction: Direction);
    /// Shows the standing frame facing `direction`.
    fn play_idle_animation(&mut self, direction: Direction);
    fn destroy(&mut self);
}

/// Creates sprites for players that join the scene.
pub trait ViewSpawner: Send {
    fn spawn(&mut self, player: &PlayerId, position: PixelPos) -> Box<dyn EntityView>;
}

/// A no-op sprite useful for headless runs.
#[derive(Debug, Default)]
pub struct NullView;

impl EntityView for NullView {
    fn set_pixel_position(&mut self, _position: PixelPos) {}
    fn play_walk_animation(&mut self, _direction: Direction) {}
    fn play_idle_animation(&mut self, _direction: Direction) {}
    fn destroy(&mut self) {}
}

/// Spawns [`NullView`]s.
#[derive(Debug, Default)]
pub struct NullSpawner;

impl ViewSpawner for NullSpawner {
    fn spawn(&mut self, _player: &PlayerId, _position: PixelPos) -> Box<dyn EntityView> {
        Box::new(NullView)
    }
}
