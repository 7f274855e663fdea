//! Component type registration and metadata.
//!
//! Every component type is interned in a [`ComponentRegistry`], which assigns
//! it a dense 16-bit [`ComponentId`]. That serial is the key used everywhere
//! downstream: archetype signatures, column lookups and the query planner's
//! inverted index are all arrays or sorted vectors over it.
//!
//! Interning happens lazily on first reference to a type and is idempotent.
//! The registry interns behind `&self` (interior mutability) because queries
//! must be able to resolve unseen component types while archetype storage is
//! borrowed for iteration; the core is single-threaded by contract, which
//! the `RefCell` encodes -- the registry is deliberately not `Sync`.

use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::EcsError;

/// Default initial column capacity for types interned without an explicit
/// capacity hint.
pub const DEFAULT_COLUMN_CAPACITY: usize = 8;

// ---------------------------------------------------------------------------
// Component marker trait
// ---------------------------------------------------------------------------

/// Marker for types that can be stored as components.
///
/// The `Copy` bound is the storage contract: component values carry no drop
/// glue and no interior pointers that need fix-up, so columns may move them
/// as plain bytes. Types that need non-trivial moves must be wrapped in a
/// handle-and-arena pattern at the component layer.
///
/// Components must additionally treat the all-zero byte pattern as a valid
/// value: structural adds that carry no value (the deferred path and the
/// id-based registry path) materialise zeroed instances. Plain numeric
/// records satisfy this trivially; do not use types with niche-constrained
/// fields (references, `NonZero*`) as components.
pub trait Component: Copy + Send + Sync + 'static {}

impl<T: Copy + Send + Sync + 'static> Component for T {}

// ---------------------------------------------------------------------------
// ComponentId
// ---------------------------------------------------------------------------

/// Dense, stable serial assigned to a registered component type.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ComponentId(pub(crate) u16);

impl ComponentId {
    /// Raw `u16` serial.
    #[inline]
    pub fn to_raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Descriptor of a registered component type.
///
/// Captured once at interning time and never rewritten.
#[derive(Debug, Clone, Copy)]
pub struct ComponentInfo {
    /// The dense serial assigned at registration.
    pub id: ComponentId,
    /// Rust type key of the component type.
    pub type_id: TypeId,
    /// `std::any::type_name` of the component type.
    pub name: &'static str,
    /// `std::mem::size_of::<T>()`
    pub size: usize,
    /// `std::mem::align_of::<T>()`
    pub align: usize,
    /// Initial capacity for columns of this component.
    pub initial_capacity: usize,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RegistryInner {
    /// TypeId -> ComponentId for interning.
    by_type: HashMap<TypeId, ComponentId>,
    /// Indexed by `ComponentId` serial.
    infos: Vec<ComponentInfo>,
}

/// Registry interning Rust component types to [`ComponentId`]s.
///
/// A type is assigned exactly one serial for the registry's lifetime; the
/// serial space is 16 bits and saturating it surfaces as
/// [`EcsError::IdExhausted`].
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    inner: RefCell<RegistryInner>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(RegistryInner::default()),
        }
    }

    /// Return the serial for `T`, interning it with the default capacity
    /// hint on first reference. Idempotent.
    pub fn id_of<T: Component>(&self) -> Result<ComponentId, EcsError> {
        self.intern::<T>(DEFAULT_COLUMN_CAPACITY)
    }

    /// Return the serial for a runtime type key.
    ///
    /// Unlike [`id_of`](Self::id_of), this variant never interns: a key that
    /// was never registered fails with [`EcsError::UnknownComponent`].
    pub fn id_of_key(&self, key: TypeId) -> Result<ComponentId, EcsError> {
        self.inner
            .borrow()
            .by_type
            .get(&key)
            .copied()
            .ok_or_else(|| EcsError::UnknownComponent {
                name: format!("{key:?}"),
            })
    }

    /// Probe for `T`'s serial without interning.
    pub fn lookup<T: Component>(&self) -> Option<ComponentId> {
        self.inner.borrow().by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Register `T` explicitly with a non-default initial column capacity.
    ///
    /// If `T` is already interned the existing descriptor is returned
    /// unchanged; the first registration wins.
    pub fn register<T: Component>(
        &self,
        initial_capacity: usize,
    ) -> Result<ComponentId, EcsError> {
        self.intern::<T>(initial_capacity)
    }

    /// Descriptor for a previously issued serial. Total for valid ids.
    pub fn info(&self, id: ComponentId) -> Result<ComponentInfo, EcsError> {
        self.inner
            .borrow()
            .infos
            .get(id.index())
            .copied()
            .ok_or(EcsError::UnknownComponent {
                name: format!("{id:?}"),
            })
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.inner.borrow().infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().infos.is_empty()
    }

    /// Clear all registrations and restart the serial counter.
    ///
    /// Only legal while no archetype set still references the issued
    /// serials; the world upholds this by resetting archetype storage first.
    pub fn reset(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.by_type.clear();
        inner.infos.clear();
    }

    fn intern<T: Component>(&self, initial_capacity: usize) -> Result<ComponentId, EcsError> {
        let key = TypeId::of::<T>();
        let mut inner = self.inner.borrow_mut();
        if let Some(&existing) = inner.by_type.get(&key) {
            return Ok(existing);
        }

        if inner.infos.len() > u16::MAX as usize {
            return Err(EcsError::IdExhausted { space: "component" });
        }
        let id = ComponentId(inner.infos.len() as u16);
        inner.infos.push(ComponentInfo {
            id,
            type_id: key,
            name: std::any::type_name::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            initial_capacity,
        });
        inner.by_type.insert(key, id);
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
