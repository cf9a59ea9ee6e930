//! Shared fixtures for the integration tests.
//!
//! - Recording sprites that log every call the controllers make
//! - Small programmatic maps

use std::sync::{Arc, Mutex};

use gridwalk_shared::{
    math::{Direction, PixelPos, TilePos},
    net::PlayerId,
    render::{EntityView, ViewSpawner},
    stepper::StepParams,
    tilemap::TileMap,
};

/// One call a controller made on a sprite.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Spawned(String, PixelPos),
    Position(String, PixelPos),
    Walk(String, Direction),
    Idle(String, Direction),
    Destroyed(String),
}

impl ViewCall {
    pub fn sprite(&self) -> &str {
        match self {
            ViewCall::Spawned(s, _)
            | ViewCall::Position(s, _)
            | ViewCall::Walk(s, _)
            | ViewCall::Idle(s, _)
            | ViewCall::Destroyed(s) => s,
        }
    }
}

/// Call log shared between a test and the sprites it hands out.
#[derive(Debug, Clone, Default)]
pub struct ViewLog(Arc<Mutex<Vec<ViewCall>>>);

impl ViewLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: ViewCall) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<ViewCall> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.0.lock() {
            calls.clear();
        }
    }

    /// Positions set on `sprite`, oldest first.
    pub fn positions(&self, sprite: &str) -> Vec<PixelPos> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ViewCall::Position(s, p) if s == sprite => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&ViewCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn view(&self, name: &str) -> Box<dyn EntityView> {
        Box::new(RecordingView {
            name: name.to_string(),
            log: self.clone(),
        })
    }

    pub fn spawner(&self) -> Box<dyn ViewSpawner> {
        Box::new(RecordingSpawner { log: self.clone() })
    }
}

/// Sprite that appends every call to a [`ViewLog`].
pub struct RecordingView {
    name: String,
    log: ViewLog,
}

impl EntityView for RecordingView {
    fn set_pixel_position(&mut self, position: PixelPos) {
        self.log.push(ViewCall::Position(self.name.clone(), position));
    }

    fn play_walk_animation(&mut self, direction: Direction) {
        self.log.push(ViewCall::Walk(self.name.clone(), direction));
    }

    fn play_idle_animation(&mut self, direction: Direction) {
        self.log.push(ViewCall::Idle(self.name.clone(), direction));
    }

    fn destroy(&mut self) {
        self.log.push(ViewCall::Destroyed(self.name.clone()));
    }
}

pub struct RecordingSpawner {
    log: ViewLog,
}

impl ViewSpawner for RecordingSpawner {
    fn spawn(&mut self, player: &PlayerId, position: PixelPos) -> Box<dyn EntityView> {
        self.log
            .push(ViewCall::Spawned(player.to_string(), position));
        self.log.view(player.as_str())
    }
}

/// 32 px tiles walked at 128 px/s: a 0.25 s frame covers exactly one tile.
pub fn params() -> StepParams {
    StepParams::new(128.0, 32.0)
}

/// One row of `len` floor tiles starting at the origin.
pub fn corridor(len: u32) -> TileMap {
    TileMap::builder(len, 1).layer("Below Player", 1).build()
}

/// `width` x `height` floor with a spawn point.
pub fn open_field(width: u32, height: u32, spawn: TilePos) -> TileMap {
    TileMap::builder(width, height)
        .layer("Below Player", 1)
        .spawn(spawn)
        .build()
}

/// Installs a test-friendly subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}
