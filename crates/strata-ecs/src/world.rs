//! The [`World`] is the top-level container: it owns the component registry,
//! the archetype registry, the entity id allocator and the ordered system
//! registry, and exposes the primary API for entity lifecycle and component
//! access.
//!
//! # Safety
//!
//! Typed component access converts the registry's bounds-checked raw
//! pointers into references. This is sound because the pointed-to column was
//! created for exactly the component type whose serial is used to reach it,
//! and the borrow-checker discipline on `&self`/`&mut self` rules out
//! aliasing mutation.
// Note: unsafe_code is allowed on this module via #[allow(unsafe_code)] in lib.rs

use std::ptr;

use tracing::debug;

use crate::archetype::{ArchetypeId, ArchetypeSet};
use crate::component::{Component, ComponentId, ComponentRegistry};
use crate::entity::{Entity, EntityAllocator};
use crate::handle::EntityHandle;
use crate::registry::ArchetypeRegistry;
use crate::signature::Signature;
use crate::system::{System, SystemHandle, SystemSlot};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Bundle -- a tuple of component values to spawn with
// ---------------------------------------------------------------------------

/// A set of component values that spawns as one entity.
///
/// Implemented for value tuples of one to four distinct component types:
/// `world.spawn((Pos { .. }, Vel { .. }))`.
pub trait Bundle {
    /// Resolve the bundle's component serials, interning unseen types.
    fn component_ids(components: &ComponentRegistry) -> Result<Vec<ComponentId>, EcsError>;

    /// Write the bundle's values into `row` of `set`.
    fn write_into(
        self,
        set: &mut ArchetypeSet,
        components: &ComponentRegistry,
        row: usize,
    ) -> Result<(), EcsError>;
}

fn write_component<T: Component>(
    set: &mut ArchetypeSet,
    components: &ComponentRegistry,
    row: usize,
    value: T,
) -> Result<(), EcsError> {
    let id = components.id_of::<T>()?;
    let slot = set.component_ptr_mut(id, row)?;
    #[allow(unsafe_code)]
    unsafe {
        ptr::write(slot as *mut T, value);
    }
    Ok(())
}

macro_rules! impl_bundle {
    ($(($name:ident, $index:tt)),+) => {
        impl<$($name: Component),+> Bundle for ($($name,)+) {
            fn component_ids(
                components: &ComponentRegistry,
            ) -> Result<Vec<ComponentId>, EcsError> {
                Ok(vec![$(components.id_of::<$name>()?),+])
            }

            fn write_into(
                self,
                set: &mut ArchetypeSet,
                components: &ComponentRegistry,
                row: usize,
            ) -> Result<(), EcsError> {
                $(write_component(set, components, row, self.$index)?;)+
                Ok(())
            }
        }
    };
}

impl_bundle!((A, 0));
impl_bundle!((A, 0), (B, 1));
impl_bundle!((A, 0), (B, 1), (C, 2));
impl_bundle!((A, 0), (B, 1), (C, 2), (D, 3));

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The top-level simulation container. One world, one registry of each kind.
pub struct World {
    pub(crate) components: ComponentRegistry,
    pub(crate) archetypes: ArchetypeRegistry,
    entities: EntityAllocator,
    systems: Vec<SystemSlot>,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self {
            components: ComponentRegistry::new(),
            archetypes: ArchetypeRegistry::new(),
            entities: EntityAllocator::new(),
            systems: Vec::new(),
        }
    }

    /// Read access to the component type registry.
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Register a component type with an explicit initial column capacity.
    /// Idempotent; the first registration wins.
    pub fn register_component<T: Component>(
        &self,
        initial_capacity: usize,
    ) -> Result<ComponentId, EcsError> {
        self.components.register::<T>(initial_capacity)
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity carrying the bundle's component values.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Result<Entity, EcsError> {
        let ids = B::component_ids(&self.components)?;
        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                return Err(EcsError::InvalidArgument(
                    "bundle contains duplicate component types",
                ));
            }
        }
        let signature = Signature::from_ids(&ids)?;

        let entity = self.entities.allocate()?;
        let (archetype, row) = self
            .archetypes
            .add_entity(entity, &signature, &self.components)?;
        let set = self
            .archetypes
            .set_mut(archetype)
            .expect("freshly resolved archetype exists");
        bundle.write_into(set, &self.components, row)?;
        Ok(entity)
    }

    /// Create an entity with no components.
    pub fn spawn_empty(&mut self) -> Result<Entity, EcsError> {
        let entity = self.entities.allocate()?;
        self.archetypes
            .add_entity(entity, &Signature::empty(), &self.components)?;
        Ok(entity)
    }

    /// Remove an entity and its component row.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.archetypes.remove_entity(entity)
    }

    /// Whether `entity` is live in this world.
    pub fn contains(&self, entity: Entity) -> bool {
        self.archetypes.contains(entity)
    }

    /// A handle for `entity`, borrowing the world exclusively.
    pub fn entity(&mut self, entity: Entity) -> Result<EntityHandle<'_>, EcsError> {
        let archetype = self.archetypes.archetype_id_of(entity)?;
        Ok(EntityHandle::new(self, entity, archetype))
    }

    // -- component access ---------------------------------------------------

    /// Give `entity` the component `value`. No-op (the existing value is
    /// kept) when the entity already has a component of this type.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), EcsError> {
        let id = self.components.id_of::<T>()?;
        if self.archetypes.signature_of(entity)?.contains(id) {
            return Ok(());
        }
        self.archetypes.add_component(entity, id, &self.components)?;
        let slot = self.archetypes.component_ptr_mut(entity, id)?;
        #[allow(unsafe_code)]
        unsafe {
            ptr::write(slot as *mut T, value);
        }
        Ok(())
    }

    /// Take component `T` away from `entity`. No-op when absent.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<(), EcsError> {
        let id = self.components.id_of::<T>()?;
        self.archetypes.remove_component(entity, id, &self.components)
    }

    /// Reference to `entity`'s component of type `T`.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T, EcsError> {
        let id = self.components.id_of::<T>()?;
        let slot = self.archetypes.component_ptr(entity, id)?;
        #[allow(unsafe_code)]
        Ok(unsafe { &*(slot as *const T) })
    }

    /// Mutable reference to `entity`'s component of type `T`.
    pub fn get_component_mut<T: Component>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut T, EcsError> {
        let id = self.components.id_of::<T>()?;
        let slot = self.archetypes.component_ptr_mut(entity, id)?;
        #[allow(unsafe_code)]
        Ok(unsafe { &mut *(slot as *mut T) })
    }

    /// Reference to `entity`'s component of type `T`, or `None`. Never
    /// fails; the recommended probe on hot paths.
    pub fn find_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let id = self.components.lookup::<T>()?;
        let slot = self.archetypes.find_component_ptr(entity, id)?;
        #[allow(unsafe_code)]
        Some(unsafe { &*(slot as *const T) })
    }

    /// Mutable variant of [`find_component`](Self::find_component).
    pub fn find_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let id = self.components.lookup::<T>()?;
        let slot = self.archetypes.find_component_ptr_mut(entity, id)?;
        #[allow(unsafe_code)]
        Some(unsafe { &mut *(slot as *mut T) })
    }

    /// Whether `entity` currently has a component of type `T`.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.components
            .lookup::<T>()
            .and_then(|id| {
                self.archetypes
                    .signature_of(entity)
                    .ok()
                    .map(|sig| sig.contains(id))
            })
            .unwrap_or(false)
    }

    // -- archetype introspection --------------------------------------------

    /// The id of `entity`'s current archetype.
    pub fn archetype_id_of(&self, entity: Entity) -> Result<ArchetypeId, EcsError> {
        self.archetypes.archetype_id_of(entity)
    }

    /// The signature of `entity`'s current archetype.
    pub fn signature_of(&self, entity: Entity) -> Result<&Signature, EcsError> {
        self.archetypes.signature_of(entity)
    }

    /// Number of archetypes created so far.
    pub fn archetype_count(&self) -> usize {
        self.archetypes.archetype_count()
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.archetypes.entity_count()
    }

    /// Number of entities in archetype `id`; 0 for unknown ids.
    pub fn entity_count_of(&self, id: ArchetypeId) -> usize {
        self.archetypes.entity_count_of(id)
    }

    // -- systems ------------------------------------------------------------

    /// Register `system` for execution on [`update`](Self::update) and hand
    /// back a shared handle to it.
    ///
    /// Systems run in registration order. Re-registering a type replaces the
    /// existing instance in place, keeping its position.
    pub fn add_system<S: System>(&mut self, system: S) -> SystemHandle<S> {
        let (slot, handle) = SystemSlot::new(system);
        debug!(system = slot.name, "registered system");
        match self.systems.iter().position(|s| s.key == slot.key) {
            Some(index) => self.systems[index] = slot,
            None => self.systems.push(slot),
        }
        handle
    }

    /// Handle to the registered system of type `S`.
    ///
    /// # Panics
    ///
    /// Panics if no such system is registered; use
    /// [`find_system`](Self::find_system) for the non-panicking probe.
    pub fn get_system<S: System>(&self) -> SystemHandle<S> {
        self.find_system::<S>().unwrap_or_else(|| {
            panic!("system {} is not registered", std::any::type_name::<S>())
        })
    }

    /// Handle to the registered system of type `S`, if any.
    pub fn find_system<S: System>(&self) -> Option<SystemHandle<S>> {
        self.systems
            .iter()
            .find(|slot| slot.key == std::any::TypeId::of::<S>())
            .and_then(SystemSlot::downcast)
    }

    /// Unregister the system of type `S`. Returns whether one was removed.
    /// Outstanding handles keep the system object itself alive.
    pub fn remove_system<S: System>(&mut self) -> bool {
        let key = std::any::TypeId::of::<S>();
        match self.systems.iter().position(|slot| slot.key == key) {
            Some(index) => {
                self.systems.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of registered systems.
    pub fn systems_count(&self) -> usize {
        self.systems.len()
    }

    /// Run every registered system once, in registration order.
    ///
    /// The pass iterates a snapshot of the registry, so systems registered
    /// or removed from inside a running system take effect from the next
    /// pass.
    pub fn update(&mut self, dt: f32) {
        let snapshot: Vec<_> = self.systems.iter().map(|slot| slot.runner.clone()).collect();
        for system in snapshot {
            system.borrow_mut().update(self, dt);
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Clear all entities, archetypes and component registrations and
    /// restart both id sequences. Registered systems survive.
    pub fn reset(&mut self) {
        self.archetypes.reset();
        self.components.reset();
        self.entities.reset();
        debug!("world reset");
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entity_count())
            .field("archetype_count", &self.archetype_count())
            .field("systems_count", &self.systems_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
