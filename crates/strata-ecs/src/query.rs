//! Query execution: iterate every entity whose archetype contains a given
//! component subset.
//!
//! A query is parameterised by a tuple of component types. Execution resolves
//! each type to its serial (interning unseen types), intersects the
//! registry's inverted index to find the matching archetypes, and walks each
//! archetype's rows in order, handing the callback a [`QueryEntity`] plus one
//! `&mut` per requested component.
//!
//! Structural changes requested mid-walk go through the handle's deferred
//! methods into a queue scoped to the pass and drained when it ends; rows
//! those actions append are not visited in the originating pass. Immediate
//! structural mutation during iteration is not possible at all: the walk
//! holds the `&mut World`.
//!
//! # Safety
//!
//! Fetching produces `&mut` references into column storage from a shared
//! `ArchetypeSet` borrow. This is sound because `for_each` holds the
//! exclusive `&mut World` for the whole pass, every row is visited at most
//! once, and a tuple is rejected up front if it names the same component
//! twice (two `&mut` into one column would alias).
// Note: unsafe_code is allowed on this module via #[allow(unsafe_code)] in lib.rs

use std::cell::RefCell;

use crate::archetype::{ArchetypeId, ArchetypeSet};
use crate::component::{Component, ComponentId, ComponentRegistry};
use crate::deferred::{DeferredKind, DeferredQueue};
use crate::entity::Entity;
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentSet -- a tuple of component types to query for
// ---------------------------------------------------------------------------

/// A tuple of component types (arity 1 to 4) that a query matches on.
pub trait ComponentSet {
    /// The per-row borrow handed to the callback: one `&mut` per component.
    type Refs<'a>;

    /// Resolve the tuple's component serials, interning unseen types.
    fn component_ids(components: &ComponentRegistry) -> Result<Vec<ComponentId>, EcsError>;

    /// Fetch one row's references.
    ///
    /// # Safety
    ///
    /// The caller must hold exclusive access to the world's storage for the
    /// borrow `'a`, visit each `(set, row)` pair at most once per pass, and
    /// have verified that the tuple's component types are distinct. `row`
    /// must be below `set.len()` and every component must be present in
    /// `set`'s signature.
    unsafe fn fetch<'a>(
        set: &'a ArchetypeSet,
        components: &ComponentRegistry,
        row: usize,
    ) -> Self::Refs<'a>;
}

/// Fetch one `&mut T` out of a shared set borrow.
///
/// # Safety
///
/// See [`ComponentSet::fetch`]; the const-to-mut cast is licensed by the
/// exclusive `&mut World` the pass holds.
#[allow(unsafe_code)]
unsafe fn fetch_mut<'a, T: Component>(
    set: &'a ArchetypeSet,
    components: &ComponentRegistry,
    row: usize,
) -> &'a mut T {
    let id = components
        .lookup::<T>()
        .expect("component interned at query start");
    let slot = set
        .component_ptr(id, row)
        .expect("planned archetype contains the component and the row is in bounds");
    &mut *(slot as *mut T)
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            type Refs<'a> = ($(&'a mut $name,)+);

            fn component_ids(
                components: &ComponentRegistry,
            ) -> Result<Vec<ComponentId>, EcsError> {
                Ok(vec![$(components.id_of::<$name>()?),+])
            }

            #[allow(unsafe_code)]
            unsafe fn fetch<'a>(
                set: &'a ArchetypeSet,
                components: &ComponentRegistry,
                row: usize,
            ) -> Self::Refs<'a> {
                ($(fetch_mut::<$name>(set, components, row),)+)
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);

// ---------------------------------------------------------------------------
// QueryEntity -- the handle synthesised per visited row
// ---------------------------------------------------------------------------

/// Handle to the entity currently visited by a query pass.
///
/// Structural mutation through this handle is deferred into the pass's
/// queue and applied when the pass completes.
pub struct QueryEntity<'q> {
    entity: Entity,
    archetype: ArchetypeId,
    components: &'q ComponentRegistry,
    queue: &'q RefCell<DeferredQueue>,
}

impl QueryEntity<'_> {
    /// The visited entity.
    #[inline]
    pub fn id(&self) -> Entity {
        self.entity
    }

    /// The archetype the entity is being visited in. Valid for the duration
    /// of the pass (deferred actions have not been applied yet).
    #[inline]
    pub fn archetype_id(&self) -> ArchetypeId {
        self.archetype
    }

    /// Request that the entity gain component `T` once the pass completes.
    /// The materialised value is zero-initialised; a duplicate of a
    /// component the entity already has by then is skipped.
    pub fn deferred_add_component<T: Component>(&self) -> Result<(), EcsError> {
        let id = self.components.id_of::<T>()?;
        self.queue
            .borrow_mut()
            .enqueue(DeferredKind::AddComponent, self.entity, id);
        Ok(())
    }

    /// Request that the entity lose component `T` once the pass completes.
    /// Skipped if the component is absent by then.
    pub fn deferred_remove_component<T: Component>(&self) -> Result<(), EcsError> {
        let id = self.components.id_of::<T>()?;
        self.queue
            .borrow_mut()
            .enqueue(DeferredKind::RemoveComponent, self.entity, id);
        Ok(())
    }
}

impl std::fmt::Debug for QueryEntity<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEntity")
            .field("entity", &self.entity)
            .field("archetype", &self.archetype)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// World query entry points
// ---------------------------------------------------------------------------

impl World {
    /// Call `f` once for every entity whose archetype contains all of `S`'s
    /// component types, passing a [`QueryEntity`] and one `&mut` per
    /// component.
    ///
    /// Archetypes are walked in creation order, rows in storage order; every
    /// row present when the pass starts is visited exactly once. Deferred
    /// actions queued by the callback are applied after the walk, in
    /// enqueue order.
    ///
    /// # Panics
    ///
    /// Panics if `S` names the same component type more than once -- two
    /// `&mut` into one column would alias.
    ///
    /// ```
    /// # use strata_ecs::prelude::*;
    /// # #[derive(Clone, Copy)] struct Pos { x: f32 }
    /// # #[derive(Clone, Copy)] struct Vel { dx: f32 }
    /// # let mut world = World::new();
    /// # world.spawn((Pos { x: 0.0 }, Vel { dx: 1.0 })).unwrap();
    /// world
    ///     .for_each::<(Pos, Vel)>(|_entity, (pos, vel)| {
    ///         pos.x += vel.dx;
    ///     })
    ///     .unwrap();
    /// ```
    pub fn for_each<S: ComponentSet>(
        &mut self,
        mut f: impl FnMut(QueryEntity<'_>, S::Refs<'_>),
    ) -> Result<(), EcsError> {
        let ids = S::component_ids(&self.components)?;
        for (i, id) in ids.iter().enumerate() {
            assert!(
                !ids[..i].contains(id),
                "query names the same component type more than once"
            );
        }

        let plan = self.archetypes.matching_archetypes(&ids);
        let queue = RefCell::new(DeferredQueue::new());
        {
            let components = &self.components;
            let archetypes = &self.archetypes;
            for archetype in plan {
                let set = archetypes
                    .set(archetype)
                    .expect("planned archetype id was issued by this registry");
                // The row count is fixed for the pass: structural changes are
                // deferred until after the walk.
                for row in 0..set.len() {
                    let entity = set.entity_at(row)?;
                    let handle = QueryEntity {
                        entity,
                        archetype,
                        components,
                        queue: &queue,
                    };
                    #[allow(unsafe_code)]
                    let refs = unsafe { S::fetch(set, components, row) };
                    f(handle, refs);
                }
            }
        }

        queue
            .into_inner()
            .drain(&mut self.archetypes, &self.components)?;
        Ok(())
    }

    /// The entities whose archetype contains all of `S`'s component types,
    /// without touching component data.
    pub fn collect_entities<S: ComponentSet>(&self) -> Result<Vec<Entity>, EcsError> {
        let ids = S::component_ids(&self.components)?;
        Ok(self.archetypes.collect_entities(&ids))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
