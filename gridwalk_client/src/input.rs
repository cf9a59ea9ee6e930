//! Input handling.
//!
//! In a real client this would integrate with windowing and key bindings.
//! Here input is a set of held direction keys, sampled once per frame and
//! collapsed to a single walking intent.

use bitflags::bitflags;
use gridwalk_shared::math::Direction;

bitflags! {
    /// Direction keys held during a frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InputState: u8 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

impl InputState {
    /// The single direction to walk this frame; no diagonals.
    ///
    /// Horizontal keys win over vertical ones, left over right, up over down.
    pub fn intent(self) -> Direction {
        if self.contains(Self::LEFT) {
            Direction::Left
        } else if self.contains(Self::RIGHT) {
            Direction::Right
        } else if self.contains(Self::UP) {
            Direction::Up
        } else if self.contains(Self::DOWN) {
            Direction::Down
        } else {
            Direction::None
        }
    }

    /// Input holding exactly the key for `direction`.
    pub fn holding(direction: Direction) -> Self {
        match direction {
            Direction::None => Self::empty(),
            Direction::Up => Self::UP,
            Direction::Down => Self::DOWN,
            Direction::Left => Self::LEFT,
            Direction::Right => Self::RIGHT,
        }
    }

    /// Parses a console key name (`w`, `up`, ...).
    pub fn from_key(key: &str) -> Option<Self> {
        let input = match key.to_ascii_lowercase().as_str() {
            "w" | "up" => Self::UP,
            "s" | "down" => Self::DOWN,
            "a" | "left" => Self::LEFT,
            "d" | "right" => Self::RIGHT,
            _ => return None,
        };
        Some(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_resolves_chords_without_diagonals() {
        assert_eq!((InputState::UP | InputState::RIGHT).intent(), Direction::Right);
        assert_eq!((InputState::LEFT | InputState::RIGHT).intent(), Direction::Left);
        assert_eq!((InputState::UP | InputState::DOWN).intent(), Direction::Up);
        assert_eq!(InputState::empty().intent(), Direction::None);
    }

    #[test]
    fn key_names_map_to_directions() {
        assert_eq!(InputState::from_key("A").map(InputState::intent), Some(Direction::Left));
        assert_eq!(InputState::from_key("down"), Some(InputState::holding(Direction::Down)));
        assert_eq!(InputState::from_key("jump"), None);
    }
}
