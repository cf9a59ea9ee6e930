//! Remote player synchronization.
//!
//! The server sends discrete tile steps per player in every heartbeat. Each
//! remote player gets a FIFO of pending steps and walks them with the same
//! stepping arithmetic as the local player, but without collision checks:
//! the server already accepted those moves.
//!
//! The roster follows the heartbeats. A player appears the first time a
//! snapshot names it and disappears when a snapshot leaves it out.

use std::collections::{BTreeMap, VecDeque};

use gridwalk_shared::{
    math::{Direction, TilePos},
    net::{PlayerId, Snapshot},
    render::{EntityView, ViewSpawner},
    stepper::{Boundary, CollisionPolicy, MovementState, StepParams},
};
use tracing::{debug, trace};

/// One remote player: movement state, pending steps, and its sprite.
pub struct RemotePlayer {
    state: MovementState,
    queue: VecDeque<Direction>,
    view: Box<dyn EntityView>,
}

impl RemotePlayer {
    pub fn state(&self) -> &MovementState {
        &self.state
    }

    /// Steps received but not started yet.
    pub fn queued(&self) -> impl Iterator<Item = Direction> + '_ {
        self.queue.iter().copied()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn update(&mut self, params: StepParams, dt_sec: f32) {
        if self.state.is_moving() {
            let direction = self.state.direction();
            // Only a same-direction step can absorb the overshoot; a turn
            // starts from the tile boundary on the next frame.
            let wants = self.queue.front() == Some(&direction);
            let keep_going =
                CollisionPolicy::TrustServer.should_continue(wants, self.state.next_tile());

            match self.state.advance(params, dt_sec, keep_going) {
                Boundary::NotReached => {}
                Boundary::Continued => {
                    self.queue.pop_front();
                }
                Boundary::Stopped => {
                    self.view.play_idle_animation(direction);
                }
            }
            self.view.set_pixel_position(self.state.pixel());
        } else if let Some(direction) = self.queue.pop_front() {
            self.state.begin(direction);
            self.view.play_walk_animation(direction);
        }
    }
}

/// Owns every remote player and keeps them in step with the server.
pub struct RemoteSyncEngine {
    roster: BTreeMap<PlayerId, RemotePlayer>,
    spawn_tile: TilePos,
    params: StepParams,
    spawner: Box<dyn ViewSpawner>,
}

impl RemoteSyncEngine {
    pub fn new(spawn_tile: TilePos, params: StepParams, spawner: Box<dyn ViewSpawner>) -> Self {
        Self {
            roster: BTreeMap::new(),
            spawn_tile,
            params,
            spawner,
        }
    }

    /// Applies one heartbeat: roster first, so newcomers get their first
    /// moves in the same pass, then the moves.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.reconcile_roster(snapshot);
        for (id, moves) in &snapshot.remote_movement_queues {
            self.append_moves(id, moves);
        }
    }

    /// Spawns players new to `snapshot` and despawns the ones it omits.
    pub fn reconcile_roster(&mut self, snapshot: &Snapshot) {
        for id in snapshot.remote_movement_queues.keys() {
            self.spawn(id);
        }

        let gone: Vec<PlayerId> = self
            .roster
            .keys()
            .filter(|id| !snapshot.remote_movement_queues.contains_key(*id))
            .cloned()
            .collect();
        for id in gone {
            self.despawn(&id);
        }
    }

    /// Creates a player at the spawn tile. Returns false if it already exists.
    pub fn spawn(&mut self, id: &PlayerId) -> bool {
        if self.roster.contains_key(id) {
            return false;
        }

        let state = MovementState::at(self.spawn_tile, self.params.tile_size);
        let mut view = self.spawner.spawn(id, state.pixel());
        view.play_idle_animation(state.facing());

        debug!(player = %id, tile = %self.spawn_tile, "Remote player joined");
        self.roster.insert(
            id.clone(),
            RemotePlayer {
                state,
                queue: VecDeque::new(),
                view,
            },
        );
        true
    }

    /// Destroys a player and drops its pending steps. Returns false if unknown.
    pub fn despawn(&mut self, id: &PlayerId) -> bool {
        match self.roster.remove(id) {
            Some(mut player) => {
                player.view.destroy();
                debug!(player = %id, dropped = player.queue.len(), "Remote player left");
                true
            }
            None => false,
        }
    }

    /// Queues steps behind any not yet walked. Unknown players are ignored.
    pub fn append_moves(&mut self, id: &PlayerId, moves: &[Direction]) -> bool {
        let Some(player) = self.roster.get_mut(id) else {
            trace!(player = %id, count = moves.len(), "Moves for unknown player dropped");
            return false;
        };
        player
            .queue
            .extend(moves.iter().copied().filter(|d| !d.is_none()));
        true
    }

    /// Advances every remote player by one frame.
    pub fn update(&mut self, dt_sec: f32) {
        for player in self.roster.values_mut() {
            player.update(self.params, dt_sec);
        }
    }

    pub fn get(&self, id: &PlayerId) -> Option<&RemotePlayer> {
        self.roster.get(id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.roster.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.roster.keys()
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }
}
