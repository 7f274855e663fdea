//! Entity handles.
//!
//! An [`EntityHandle`] is a thin accessor pairing an entity id with a cached
//! archetype id and an exclusive borrow of the world. It is the convenient
//! surface for immediate, one-entity operations; bulk work goes through
//! queries.
//!
//! The cached archetype id is informational: any structural mutation --
//! through this handle or any other path -- invalidates it, and every
//! operation that depends on it re-resolves from the registry. Handles
//! issued during query iteration are a different type
//! ([`QueryEntity`](crate::query::QueryEntity)) that routes structural
//! changes through the pass's deferred queue instead; the exclusive borrow
//! here is what makes immediate mutation safe.

use crate::archetype::ArchetypeId;
use crate::component::Component;
use crate::entity::Entity;
use crate::world::World;
use crate::EcsError;

/// Thin accessor for one entity, holding an exclusive world borrow.
pub struct EntityHandle<'w> {
    world: &'w mut World,
    entity: Entity,
    archetype: ArchetypeId,
}

impl<'w> EntityHandle<'w> {
    pub(crate) fn new(world: &'w mut World, entity: Entity, archetype: ArchetypeId) -> Self {
        Self {
            world,
            entity,
            archetype,
        }
    }

    /// The entity this handle refers to.
    #[inline]
    pub fn id(&self) -> Entity {
        self.entity
    }

    /// The cached archetype id. Stale after any structural mutation that
    /// did not go through this handle; see [`refresh`](Self::refresh).
    #[inline]
    pub fn archetype_id(&self) -> ArchetypeId {
        self.archetype
    }

    /// Re-resolve the cached archetype id from the registry.
    pub fn refresh(&mut self) -> Result<ArchetypeId, EcsError> {
        self.archetype = self.world.archetype_id_of(self.entity)?;
        Ok(self.archetype)
    }

    /// Give the entity the component `value`, migrating it immediately.
    /// No-op when a component of this type is already present.
    pub fn add_component<T: Component>(&mut self, value: T) -> Result<(), EcsError> {
        self.world.add_component(self.entity, value)?;
        self.refresh()?;
        Ok(())
    }

    /// Take component `T` away from the entity, migrating it immediately.
    /// No-op when absent.
    pub fn remove_component<T: Component>(&mut self) -> Result<(), EcsError> {
        self.world.remove_component::<T>(self.entity)?;
        self.refresh()?;
        Ok(())
    }

    /// Reference to the entity's component of type `T`.
    pub fn get_component<T: Component>(&self) -> Result<&T, EcsError> {
        self.world.get_component::<T>(self.entity)
    }

    /// Mutable reference to the entity's component of type `T`.
    pub fn get_component_mut<T: Component>(&mut self) -> Result<&mut T, EcsError> {
        self.world.get_component_mut::<T>(self.entity)
    }

    /// Reference to the entity's component of type `T`, or `None`.
    pub fn find_component<T: Component>(&self) -> Option<&T> {
        self.world.find_component::<T>(self.entity)
    }

    /// Mutable variant of [`find_component`](Self::find_component).
    pub fn find_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.world.find_component_mut::<T>(self.entity)
    }

    /// Whether the entity currently has a component of type `T`.
    pub fn has_component<T: Component>(&self) -> bool {
        self.world.has_component::<T>(self.entity)
    }
}

impl std::fmt::Debug for EntityHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityHandle")
            .field("entity", &self.entity)
            .field("archetype", &self.archetype)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
