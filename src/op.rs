//! Wire-level operations and the Lamport clock.
//!
//! Operations are the only way the store mutates: local gestures are
//! translated into operations before being applied, so local and remote
//! mutation paths are unified. Every operation is uniquely identified and
//! safe to deliver more than once.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::element::{AuthorId, ElementId, ElementKind, Geometry, Stamp, Style};

/// Unique operation identifier, used for duplicate-delivery absorption
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct OpId(pub Uuid);

impl OpId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OpId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A field-level update carried by an update operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdatePatch {
    Geometry(Geometry),
    Style(Style),
}

/// What an operation does to its target element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpKind {
    /// Create the element; rejected silently if the id already exists
    Insert {
        kind: ElementKind,
        geometry: Geometry,
        style: Style,
    },
    /// Mutate one field, resolved by last-writer-wins on `(clock, author)`
    Update { patch: UpdatePatch },
    /// Tombstone the element; idempotent, retained forever
    Tombstone,
}

/// An atomic, uniquely-identified mutation record exchanged between replicas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub op_id: OpId,
    pub author: AuthorId,
    pub clock: u64,
    pub element_id: ElementId,
    pub kind: OpKind,
}

impl Operation {
    /// The logical stamp this operation writes with
    pub fn stamp(&self) -> Stamp {
        Stamp::new(self.clock, self.author)
    }
}

/// Lamport-style logical clock.
///
/// Gives outbound operations a total order usable for tie-breaking; never a
/// wall-clock ordering guarantee.
#[derive(Debug, Clone, Copy, Default)]
pub struct LamportClock {
    value: u64,
}

impl LamportClock {
    pub fn new() -> Self {
        Self { value: 0 }
    }

    /// Advance past everything seen so far and return the new value.
    /// Outbound operations carry `max(local, last_seen_remote) + 1`.
    pub fn tick(&mut self) -> u64 {
        self.value += 1;
        self.value
    }

    /// Fold in a remotely observed clock value before applying its operation
    pub fn observe(&mut self, remote: u64) {
        self.value = self.value.max(remote);
    }

    pub fn current(&self) -> u64 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    #[test]
    fn clock_ticks_past_observed_values() {
        let mut clock = LamportClock::new();
        assert_eq!(clock.tick(), 1);
        clock.observe(10);
        assert_eq!(clock.tick(), 11);
        // Observing an older value never rewinds
        clock.observe(3);
        assert_eq!(clock.tick(), 12);
    }

    #[test]
    fn operation_round_trips_through_msgpack() {
        let op = Operation {
            op_id: OpId::new(),
            author: AuthorId::new(),
            clock: 7,
            element_id: ElementId::new(AuthorId::new(), 3),
            kind: OpKind::Insert {
                kind: ElementKind::Rectangle,
                geometry: Geometry::Corners {
                    start: Point::new(0.0, 0.0),
                    end: Point::new(4.0, 4.0),
                },
                style: Style::default(),
            },
        };
        let bytes = rmp_serde::to_vec(&op).unwrap();
        let back: Operation = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(op, back);
    }
}
