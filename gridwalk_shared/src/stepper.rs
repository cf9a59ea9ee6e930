//! Tile-step interpolation.
//!
//! Both the local player and remote players walk with the same arithmetic:
//! an entity commits to a tile step, then covers it in pixels over several
//! frames. Whether it keeps walking once the step is done is decided by the
//! caller and passed in as a single boolean; everything else lives here.

use crate::{
    math::{Direction, PixelPos, TilePos},
    tilemap::TileGrid,
};

/// Speed and grid scale used for stepping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    /// Walking speed in pixels per second.
    pub speed: f32,
    /// Tile edge length in pixels.
    pub tile_size: f32,
}

impl StepParams {
    pub fn new(speed: f32, tile_size: f32) -> Self {
        Self { speed, tile_size }
    }
}

/// What happened at the tile boundary during one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Still inside the current step.
    NotReached,
    /// Crossed and kept walking into the next tile.
    Continued,
    /// Crossed and stopped exactly on the boundary.
    Stopped,
}

/// Result of [`step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Pixels walked into the current step after this update.
    pub progress: f32,
    /// Pixels to move along the walking direction this update.
    pub advance: f32,
    pub boundary: Boundary,
}

/// Advances sub-tile progress by one frame.
///
/// `progress` must lie in `[0, tile_size)`. A frame never covers more than one
/// tile, so long frame hitches slow the walk down instead of skipping tiles.
pub fn step(progress: f32, params: StepParams, dt_sec: f32, continue_across: bool) -> StepOutcome {
    let tile = params.tile_size;
    debug_assert!(
        (0.0..tile).contains(&progress),
        "progress {progress} outside [0, {tile})"
    );

    let pixels = (params.speed * dt_sec).clamp(0.0, tile);

    if progress + pixels < tile {
        return StepOutcome {
            progress: progress + pixels,
            advance: pixels,
            boundary: Boundary::NotReached,
        };
    }

    if continue_across {
        let progress = (progress + pixels) % tile;
        debug_assert!((0.0..tile).contains(&progress));
        StepOutcome {
            progress,
            advance: pixels,
            boundary: Boundary::Continued,
        }
    } else {
        StepOutcome {
            progress: 0.0,
            advance: tile - progress,
            boundary: Boundary::Stopped,
        }
    }
}

/// Whether collisions are checked before continuing into the next tile.
#[derive(Clone, Copy)]
pub enum CollisionPolicy<'a> {
    /// Consult the grid; blocked tiles end the walk.
    Enforce(&'a dyn TileGrid),
    /// The server already validated the move.
    TrustServer,
}

impl CollisionPolicy<'_> {
    pub fn allows(&self, tile: TilePos) -> bool {
        match self {
            CollisionPolicy::Enforce(grid) => grid.is_passable(tile),
            CollisionPolicy::TrustServer => true,
        }
    }

    /// Continue decision: the controller wants to keep going and the policy
    /// lets it into `next`.
    pub fn should_continue(&self, wants: bool, next: TilePos) -> bool {
        wants && self.allows(next)
    }
}

/// Per-entity movement state.
///
/// `tile` is the tile the entity has committed to: it moves forward the
/// moment a step begins or a boundary is crossed while continuing, ahead of
/// the pixel position.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementState {
    direction: Direction,
    facing: Direction,
    progress: f32,
    tile: TilePos,
    pixel: PixelPos,
}

impl MovementState {
    /// Idle entity standing on `tile`.
    pub fn at(tile: TilePos, tile_size: f32) -> Self {
        Self {
            direction: Direction::None,
            facing: Direction::Down,
            progress: 0.0,
            tile,
            pixel: tile.to_pixel(tile_size),
        }
    }

    pub fn is_moving(&self) -> bool {
        !self.direction.is_none()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Last direction walked or faced.
    pub fn facing(&self) -> Direction {
        self.facing
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn tile(&self) -> TilePos {
        self.tile
    }

    pub fn pixel(&self) -> PixelPos {
        self.pixel
    }

    /// The tile beyond the current one in the walking direction.
    pub fn next_tile(&self) -> TilePos {
        self.tile.step(self.direction)
    }

    /// Turns toward `direction` without moving.
    pub fn face(&mut self, direction: Direction) {
        if !direction.is_none() {
            self.facing = direction;
        }
    }

    /// Starts a step from idle and returns the committed target tile.
    pub fn begin(&mut self, direction: Direction) -> TilePos {
        debug_assert!(!self.is_moving(), "begin while walking {}", self.direction);
        debug_assert!(!direction.is_none());
        self.direction = direction;
        self.facing = direction;
        self.tile = self.tile.step(direction);
        self.tile
    }

    /// Runs [`step`] and applies it to this entity.
    pub fn advance(&mut self, params: StepParams, dt_sec: f32, continue_across: bool) -> Boundary {
        if !self.is_moving() {
            return Boundary::NotReached;
        }

        let out = step(self.progress, params, dt_sec, continue_across);
        self.pixel += PixelPos::along(self.direction, out.advance);
        self.progress = out.progress;

        match out.boundary {
            Boundary::NotReached => {}
            Boundary::Continued => {
                self.tile = self.tile.step(self.direction);
            }
            Boundary::Stopped => {
                self.direction = Direction::None;
                // Drop accumulated float error; the step ends on the grid.
                self.pixel = self.tile.to_pixel(params.tile_size);
            }
        }
        out.boundary
    }
}
