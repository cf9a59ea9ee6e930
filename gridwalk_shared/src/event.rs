//! Event and messaging system.
//!
//! A small typed event bus. The local controller pushes movement
//! notifications during a frame; the client drains them once the frame is
//! done and forwards them to the server.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use serde::{Deserialize, Serialize};

use crate::math::{Direction, TilePos};

/// Movement notifications emitted by the local player's controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementEvent {
    /// A walk began in this direction.
    Started(Direction),
    /// The player committed to this tile. Fired before the sprite gets there.
    TileEntered(TilePos),
    /// The walk ended; carries the direction that was active.
    Stopped(Direction),
}

/// Typed event bus.
#[derive(Default)]
pub struct EventBus {
    queues: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes an event into the queue.
    pub fn push<E: 'static + Send + Sync>(&mut self, e: E) {
        let q = self
            .queues
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<E>::new()));
        let q = q.downcast_mut::<Vec<E>>().expect("queue type mismatch");
        q.push(e);
    }

    /// Number of queued events of a type.
    pub fn pending<E: 'static + Send + Sync>(&self) -> usize {
        self.queues
            .get(&TypeId::of::<E>())
            .and_then(|boxed| boxed.downcast_ref::<Vec<E>>())
            .map_or(0, Vec::len)
    }

    /// Drains all queued events of a type, oldest first.
    pub fn drain<E: 'static + Send + Sync>(&mut self) -> Vec<E> {
        self.queues
            .remove(&TypeId::of::<E>())
            .and_then(|boxed| boxed.downcast::<Vec<E>>().ok())
            .map(|boxed| *boxed)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_keeps_order_and_separates_types() {
        let mut bus = EventBus::new();
        bus.push(MovementEvent::Started(Direction::Left));
        bus.push(7u32);
        bus.push(MovementEvent::Stopped(Direction::Left));

        assert_eq!(bus.pending::<MovementEvent>(), 2);
        assert_eq!(
            bus.drain::<MovementEvent>(),
            vec![
                MovementEvent::Started(Direction::Left),
                MovementEvent::Stopped(Direction::Left)
            ]
        );
        assert!(bus.drain::<MovementEvent>().is_empty());
        assert_eq!(bus.drain::<u32>(), vec![7]);
    }
}
