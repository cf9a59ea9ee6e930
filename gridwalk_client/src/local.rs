//! Local player grid movement.
//!
//! Turns one tile step of intent into frame-by-frame pixel motion, checks the
//! map before every step, and reports starts, stops and tile changes so the
//! server can relay them to other players.
//!
//! Intent must be re-asserted every frame: `update` clears it, so releasing a
//! key ends the walk at the next tile boundary.

use std::sync::Arc;

use gridwalk_shared::{
    event::{EventBus, MovementEvent},
    math::{Direction, PixelPos, TilePos},
    render::EntityView,
    stepper::{Boundary, CollisionPolicy, MovementState, StepParams},
    tilemap::TileGrid,
};
use tracing::{debug, trace};

/// Grid movement controller for the player at this keyboard.
pub struct LocalMovementController {
    state: MovementState,
    last_intent: Direction,
    params: StepParams,
    grid: Arc<dyn TileGrid>,
    view: Box<dyn EntityView>,
}

impl LocalMovementController {
    pub fn new(
        spawn: TilePos,
        params: StepParams,
        grid: Arc<dyn TileGrid>,
        mut view: Box<dyn EntityView>,
    ) -> Self {
        let state = MovementState::at(spawn, params.tile_size);
        view.set_pixel_position(state.pixel());
        view.play_idle_animation(state.facing());
        Self {
            state,
            last_intent: Direction::None,
            params,
            grid,
            view,
        }
    }

    /// Records this frame's intent and starts a step if idle.
    ///
    /// A blocked direction only turns the player to face it.
    pub fn set_intent(&mut self, direction: Direction, events: &mut EventBus) {
        self.last_intent = direction;

        if self.state.is_moving() || direction.is_none() {
            return;
        }

        let target = self.state.tile().step(direction);
        if !self.grid.is_passable(target) {
            debug!(%direction, tile = %target, "Blocked");
            self.state.face(direction);
            self.view.play_idle_animation(direction);
            return;
        }

        debug!(%direction, from = %self.state.tile(), "Start moving");
        events.push(MovementEvent::Started(direction));
        self.view.play_walk_animation(direction);
        let entered = self.state.begin(direction);
        events.push(MovementEvent::TileEntered(entered));
    }

    /// Advances the walk by `dt_sec` and clears the intent.
    pub fn update(&mut self, dt_sec: f32, events: &mut EventBus) {
        if self.state.is_moving() {
            self.walk(dt_sec, events);
        }
        self.last_intent = Direction::None;
    }

    fn walk(&mut self, dt_sec: f32, events: &mut EventBus) {
        let direction = self.state.direction();
        let policy = CollisionPolicy::Enforce(self.grid.as_ref());
        let keep_going =
            policy.should_continue(self.last_intent == direction, self.state.next_tile());

        match self.state.advance(self.params, dt_sec, keep_going) {
            Boundary::NotReached => {}
            Boundary::Continued => {
                trace!(tile = %self.state.tile(), "Continue into next tile");
                events.push(MovementEvent::TileEntered(self.state.tile()));
            }
            Boundary::Stopped => {
                debug!(%direction, tile = %self.state.tile(), "Stop moving");
                events.push(MovementEvent::Stopped(direction));
                self.view.play_idle_animation(direction);
            }
        }
        self.view.set_pixel_position(self.state.pixel());
    }

    pub fn state(&self) -> &MovementState {
        &self.state
    }

    pub fn tile(&self) -> TilePos {
        self.state.tile()
    }

    pub fn pixel(&self) -> PixelPos {
        self.state.pixel()
    }

    pub fn is_moving(&self) -> bool {
        self.state.is_moving()
    }

    /// Intent recorded so far this frame.
    pub fn last_intent(&self) -> Direction {
        self.last_intent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridwalk_shared::{render::NullView, tilemap::TileMap};

    fn controller(map: TileMap, spawn: TilePos) -> LocalMovementController {
        LocalMovementController::new(
            spawn,
            StepParams::new(128.0, 32.0),
            Arc::new(map),
            Box::new(NullView),
        )
    }

    fn corridor(len: u32) -> TileMap {
        TileMap::builder(len, 1).layer("Below Player", 1).build()
    }

    #[test]
    fn single_step_reports_start_tile_and_stop() {
        // Only (0,0) and (1,0) exist, so the held intent cannot carry on.
        let mut c = controller(corridor(2), TilePos::ZERO);
        let mut bus = EventBus::new();

        c.set_intent(Direction::Right, &mut bus);
        c.update(0.25, &mut bus);

        assert_eq!(c.tile(), TilePos::new(1, 0));
        assert_eq!(c.state().progress(), 0.0);
        assert_eq!(c.pixel(), PixelPos::new(32.0, 0.0));
        assert!(!c.is_moving());
        assert_eq!(
            bus.drain::<MovementEvent>(),
            vec![
                MovementEvent::Started(Direction::Right),
                MovementEvent::TileEntered(TilePos::new(1, 0)),
                MovementEvent::Stopped(Direction::Right),
            ]
        );
    }

    #[test]
    fn blocked_intent_only_turns() {
        let map = TileMap::builder(3, 1)
            .layer("Below Player", 1)
            .tile("World", TilePos::new(1, 0), 5)
            .colliding(5)
            .build();
        let mut c = controller(map, TilePos::ZERO);
        let mut bus = EventBus::new();

        for _ in 0..3 {
            c.set_intent(Direction::Right, &mut bus);
            c.update(0.1, &mut bus);
        }
        // Off the map edge counts as blocked too.
        c.set_intent(Direction::Up, &mut bus);

        assert!(!c.is_moving());
        assert_eq!(c.tile(), TilePos::ZERO);
        assert_eq!(c.state().facing(), Direction::Up);
        assert_eq!(bus.pending::<MovementEvent>(), 0);
    }

    #[test]
    fn intent_while_walking_does_not_turn() {
        let field = TileMap::builder(3, 3).layer("Below Player", 1).build();
        let mut c = controller(field, TilePos::new(1, 1));
        let mut bus = EventBus::new();

        c.set_intent(Direction::Down, &mut bus);
        c.update(0.1, &mut bus);
        c.set_intent(Direction::Left, &mut bus);
        assert_eq!(c.state().direction(), Direction::Down);
        assert_eq!(c.last_intent(), Direction::Left);

        // Left is not the walking direction, so the step ends at the boundary.
        c.update(0.2, &mut bus);
        assert!(!c.is_moving());
        assert_eq!(c.tile(), TilePos::new(1, 2));
    }

    #[test]
    fn same_intent_every_frame_keeps_direction_until_boundary() {
        let mut c = controller(corridor(8), TilePos::ZERO);
        let mut bus = EventBus::new();

        for _ in 0..7 {
            c.set_intent(Direction::Right, &mut bus);
            assert!(c.state().progress() < 32.0);
            c.update(0.05, &mut bus);
            assert_eq!(c.state().direction(), Direction::Right);
        }
        assert_eq!(bus.pending::<MovementEvent>(), 3);
    }

    #[test]
    fn intent_decays_after_each_frame() {
        let mut c = controller(corridor(8), TilePos::ZERO);
        let mut bus = EventBus::new();

        c.set_intent(Direction::Right, &mut bus);
        assert_eq!(c.last_intent(), Direction::Right);
        c.update(0.1, &mut bus);
        assert_eq!(c.last_intent(), Direction::None);

        // No re-assertion: the step in progress finishes and the walk ends.
        c.update(0.2, &mut bus);
        assert!(!c.is_moving());
        assert_eq!(c.tile(), TilePos::new(1, 0));
    }
}
