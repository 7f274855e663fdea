//! Entity identifiers and allocation.
//!
//! An [`Entity`] is an opaque word-sized handle drawn from a monotonically
//! increasing counter. Ids are never reused within a session, so a stored
//! `Entity` either still names the object it was issued for or names nothing
//! at all -- there is no ABA window. [`Entity::NONE`] is the reserved
//! "no entity" sentinel.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EcsError;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An opaque entity identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u64);

impl Entity {
    /// The reserved "no entity" sentinel. Never issued by an allocator.
    pub const NONE: Entity = Entity(u64::MAX);

    /// Whether this is the [`NONE`](Self::NONE) sentinel.
    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "Entity(NONE)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Allocates [`Entity`] ids from a monotonically increasing counter.
///
/// Ids are unique for the allocator's lifetime and are never recycled; the
/// counter saturating at the sentinel surfaces as [`EcsError::IdExhausted`].
#[derive(Debug, Default)]
pub struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    /// Create a new allocator starting at id 0.
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Allocate a fresh, never-before-issued [`Entity`].
    pub fn allocate(&mut self) -> Result<Entity, EcsError> {
        if self.next == Entity::NONE.to_raw() {
            return Err(EcsError::IdExhausted { space: "entity" });
        }
        let id = Entity(self.next);
        self.next += 1;
        Ok(id)
    }

    /// Total number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.next
    }

    /// Restart the counter. Only legal once every previously issued id has
    /// been dropped from the world's maps.
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
