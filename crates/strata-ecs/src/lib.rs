//! Strata ECS -- an archetype-based entity-component store with a
//! query/iteration engine.
//!
//! Simulation state is organised as entities (opaque ids) bearing a dynamic
//! set of plain-data components. Entities sharing the same component set are
//! stored together in an archetype, one contiguous column per component, so
//! a query over a component subset iterates contiguous memory. Changing an
//! entity's component set migrates it between archetypes with byte copies;
//! structural changes requested during iteration are deferred into a
//! per-pass queue and applied when the pass completes.
//!
//! # Quick Start
//!
//! ```
//! use strata_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, Copy, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, Copy, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut world = World::new();
//! let entity = world.spawn((
//!     Position { x: 0.0, y: 0.0 },
//!     Velocity { dx: 1.0, dy: 0.0 },
//! ))?;
//!
//! world.for_each::<(Position, Velocity)>(|_entity, (pos, vel)| {
//!     pos.x += vel.dx;
//!     pos.y += vel.dy;
//! })?;
//!
//! assert_eq!(world.get_component::<Position>(entity)?, &Position { x: 1.0, y: 0.0 });
//! # Ok::<(), strata_ecs::EcsError>(())
//! ```
//!
//! Component types are restricted to `Copy` plain data -- that restriction
//! is what makes migration a byte copy and column storage free of drop glue.
//! The world is single-threaded: there is no locking anywhere on the hot
//! path, and none of the registries are `Sync`.

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod archetype;
pub mod component;
pub mod deferred;
pub mod entity;
pub mod handle;
#[allow(unsafe_code)]
pub mod query;
pub mod registry;
pub mod signature;
pub mod system;
#[allow(unsafe_code)]
pub mod world;

use component::ComponentId;
use entity::Entity;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// Every kind is deterministic and surfaced to the immediate caller; nothing
/// retries, falls back or logs-and-swallows. The `find_*` lookup variants
/// convert [`MissingComponent`](EcsError::MissingComponent) to `None` and
/// are the recommended probes on hot paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// An operation referenced an entity the world does not track.
    #[error("entity {0} is not tracked by the world")]
    UnknownEntity(Entity),

    /// A component type key was used that was never registered.
    #[error("component type {name} has not been registered")]
    UnknownComponent { name: String },

    /// A component was requested that the entity's archetype does not hold.
    #[error("component {0} is not present in the entity's archetype")]
    MissingComponent(ComponentId),

    /// A column was indexed past its length.
    #[error("row {row} is out of range for a column of length {len}")]
    OutOfRange { row: usize, len: usize },

    /// A unique-id counter saturated.
    #[error("the {space} id space is exhausted")]
    IdExhausted { space: &'static str },

    /// A structurally invalid argument, e.g. an empty signature list or a
    /// bundle naming the same component type twice.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::archetype::{ArchetypeId, ArchetypeSet, Column};
    pub use crate::component::{Component, ComponentId, ComponentInfo, ComponentRegistry};
    pub use crate::deferred::{DeferredAction, DeferredKind, DeferredQueue};
    pub use crate::entity::{Entity, EntityAllocator};
    pub use crate::handle::EntityHandle;
    pub use crate::query::{ComponentSet, QueryEntity};
    pub use crate::registry::ArchetypeRegistry;
    pub use crate::signature::Signature;
    pub use crate::system::{System, SystemHandle};
    pub use crate::world::{Bundle, World};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------
