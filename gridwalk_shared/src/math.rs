//! Grid math types.
//!
//! This module intentionally stays small and deterministic.
//! Tile coordinates are integers, pixel coordinates are `f32`, and the only
//! bridge between the two is the tile size.

use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Default edge length of a square tile, in pixels.
pub const TILE_SIZE: f32 = 32.0;

/// A cardinal walking direction. `None` means "not moving".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    None,
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All walkable directions.
    pub const CARDINAL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit displacement in tile space (screen convention, +y is down).
    pub const fn unit(self) -> TilePos {
        match self {
            Direction::None => TilePos::new(0, 0),
            Direction::Up => TilePos::new(0, -1),
            Direction::Down => TilePos::new(0, 1),
            Direction::Left => TilePos::new(-1, 0),
            Direction::Right => TilePos::new(1, 0),
        }
    }

    pub const fn is_none(self) -> bool {
        matches!(self, Direction::None)
    }

    /// Direction of a single axis-aligned tile step, if `delta` is one.
    pub fn from_step(delta: TilePos) -> Option<Self> {
        Self::CARDINAL.into_iter().find(|d| d.unit() == delta)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::None => "none",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(s)
    }
}

/// Grid-aligned position in tile units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring tile one step in `direction`.
    pub fn step(self, direction: Direction) -> Self {
        self + direction.unit()
    }

    /// Top-left pixel corner of this tile.
    pub fn to_pixel(self, tile_size: f32) -> PixelPos {
        PixelPos::new(self.x as f32 * tile_size, self.y as f32 * tile_size)
    }
}

impl Add for TilePos {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for TilePos {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Rendered location in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPos {
    pub x: f32,
    pub y: f32,
}

impl PixelPos {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Displacement of `pixels` along `direction`.
    pub fn along(direction: Direction, pixels: f32) -> Self {
        let u = direction.unit();
        Self::new(u.x as f32 * pixels, u.y as f32 * pixels)
    }

    /// The tile containing this pixel (floor division).
    pub fn to_tile(self, tile_size: f32) -> TilePos {
        TilePos::new(
            (self.x / tile_size).floor() as i32,
            (self.y / tile_size).floor() as i32,
        )
    }
}

impl Add for PixelPos {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for PixelPos {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_vectors_follow_screen_axes() {
        assert_eq!(TilePos::new(3, 3).step(Direction::Up), TilePos::new(3, 2));
        assert_eq!(TilePos::new(3, 3).step(Direction::Down), TilePos::new(3, 4));
        assert_eq!(TilePos::new(3, 3).step(Direction::Left), TilePos::new(2, 3));
        assert_eq!(TilePos::new(3, 3).step(Direction::None), TilePos::new(3, 3));
    }

    #[test]
    fn from_step_rejects_diagonals() {
        assert_eq!(Direction::from_step(TilePos::new(1, 0)), Some(Direction::Right));
        assert_eq!(Direction::from_step(TilePos::new(1, 1)), None);
        assert_eq!(Direction::from_step(TilePos::ZERO), None);
    }

    #[test]
    fn pixel_to_tile_floors_negative_coordinates() {
        assert_eq!(PixelPos::new(-1.0, 31.9).to_tile(32.0), TilePos::new(-1, 0));
        assert_eq!(TilePos::new(2, -1).to_pixel(32.0), PixelPos::new(64.0, -32.0));
    }

    #[test]
    fn direction_wire_names_are_uppercase() {
        let json = serde_json::to_string(&Direction::Left).unwrap();
        assert_eq!(json, "\"LEFT\"");
    }
}
