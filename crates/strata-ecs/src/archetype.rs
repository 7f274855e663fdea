//! Columnar archetype storage.
//!
//! An [`ArchetypeSet`] stores every entity whose component set matches one
//! [`Signature`], in a Structure-of-Arrays layout: one [`Column`] of packed
//! component instances per member, plus bidirectional entity<->row maps. All
//! columns of a set share the same length and row indexing, so one `row`
//! addresses a whole entity.
//!
//! # Safety
//!
//! Component data lives in type-erased byte buffers, so this module contains
//! `unsafe` allocation and copy code. Soundness rests on two facts upheld by
//! the callers: every column access uses the [`ComponentInfo`] layout the
//! column was created with, and component types are `Copy` (see
//! [`Component`](crate::component::Component)), so byte copies are complete
//! moves and no element ever needs drop glue.
// Note: unsafe_code is allowed on this module via #[allow(unsafe_code)] in lib.rs

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::fmt;
use std::ptr;

use crate::component::{ComponentId, ComponentInfo, ComponentRegistry};
use crate::entity::Entity;
use crate::signature::Signature;
use crate::EcsError;

// ---------------------------------------------------------------------------
// ArchetypeId
// ---------------------------------------------------------------------------

/// Identifies an archetype within a registry. A pure index into the
/// registry's dense archetype vector; ids are append-only and never reused.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct ArchetypeId(pub(crate) u32);

impl ArchetypeId {
    /// Raw `u32` index.
    #[inline]
    pub fn to_raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArchetypeId({})", self.0)
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Column -- type-erased packed component storage
// ---------------------------------------------------------------------------

/// A type-erased, densely packed, growable array of component instances of a
/// single type.
///
/// Elements are treated as plain bytes: appends hand back zero-filled slots
/// for the caller to overwrite, removal is a byte-level swap-remove, and
/// migration copies rows across columns without any per-element hooks.
pub struct Column {
    /// Heap allocation (null while capacity is 0 and for ZSTs).
    data: *mut u8,
    /// Number of live elements.
    len: usize,
    /// Number of elements the current allocation holds.
    capacity: usize,
    /// Size of one element in bytes.
    item_size: usize,
    /// Alignment of one element.
    item_align: usize,
}

impl Column {
    /// Create a column for the component described by `info`, eagerly
    /// reserving the descriptor's initial capacity.
    pub fn new(info: &ComponentInfo) -> Self {
        let mut column = Self {
            data: ptr::null_mut(),
            len: 0,
            capacity: 0,
            item_size: info.size,
            item_align: info.align,
        };
        if info.size == 0 {
            // ZSTs never allocate; the capacity is unbounded.
            column.capacity = usize::MAX;
        } else if info.initial_capacity > 0 {
            column.grow_to(info.initial_capacity);
        }
        column
    }

    /// Number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the column is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the current allocation holds.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size of one element in bytes.
    #[inline]
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    // -- internal helpers ---------------------------------------------------

    fn layout_for_capacity(&self, cap: usize) -> Layout {
        Layout::from_size_align(self.item_size * cap, self.item_align)
            .expect("column layout overflow")
    }

    fn grow_to(&mut self, new_cap: usize) {
        debug_assert!(self.item_size > 0 && new_cap > self.capacity);
        let new_layout = self.layout_for_capacity(new_cap);
        #[allow(unsafe_code)]
        unsafe {
            let new_data = if self.capacity == 0 {
                alloc::alloc(new_layout)
            } else {
                let old_layout = self.layout_for_capacity(self.capacity);
                alloc::realloc(self.data, old_layout, new_layout.size())
            };
            assert!(!new_data.is_null(), "allocation failed");
            self.data = new_data;
        }
        self.capacity = new_cap;
    }

    fn grow_for_push(&mut self) {
        if self.len < self.capacity || self.item_size == 0 {
            return;
        }
        let new_cap = if self.capacity == 0 { 1 } else { self.capacity * 2 };
        self.grow_to(new_cap);
    }

    #[inline]
    fn raw_ptr(&self, row: usize) -> *mut u8 {
        debug_assert!(row < self.len);
        if self.item_size == 0 {
            // ZST -- dangling but aligned.
            return self.item_align as *mut u8;
        }
        #[allow(unsafe_code)]
        unsafe {
            self.data.add(row * self.item_size)
        }
    }

    // -- operations ---------------------------------------------------------

    /// Append one slot, growing if needed, and return its row index.
    ///
    /// The fresh slot is zero-filled; callers that append through a typed
    /// path overwrite it with a real value before any user-visible read.
    pub fn push_zeroed(&mut self) -> usize {
        self.grow_for_push();
        let row = self.len;
        self.len += 1;
        if self.item_size > 0 {
            #[allow(unsafe_code)]
            unsafe {
                ptr::write_bytes(self.raw_ptr(row), 0, self.item_size);
            }
        }
        row
    }

    /// Pointer to the element at `row`. Bounds-checked.
    pub fn ptr(&self, row: usize) -> Result<*const u8, EcsError> {
        if row >= self.len {
            return Err(EcsError::OutOfRange { row, len: self.len });
        }
        Ok(self.raw_ptr(row) as *const u8)
    }

    /// Mutable pointer to the element at `row`. Bounds-checked.
    pub fn ptr_mut(&mut self, row: usize) -> Result<*mut u8, EcsError> {
        if row >= self.len {
            return Err(EcsError::OutOfRange { row, len: self.len });
        }
        Ok(self.raw_ptr(row))
    }

    /// Overwrite the element at `row` with the last element's bytes and
    /// shrink by one. The caller fixes the parallel entity<->row maps.
    pub fn swap_remove(&mut self, row: usize) -> Result<(), EcsError> {
        if row >= self.len {
            return Err(EcsError::OutOfRange { row, len: self.len });
        }
        let last = self.len - 1;
        if self.item_size > 0 && row != last {
            #[allow(unsafe_code)]
            unsafe {
                let src = self.raw_ptr(last);
                let dst = self.raw_ptr(row);
                ptr::copy_nonoverlapping(src, dst, self.item_size);
            }
        }
        self.len -= 1;
        Ok(())
    }

    /// Byte-copy the element at `row` into `dst` at `dst_row`. Both columns
    /// must store the same component type.
    pub fn copy_row_to(
        &self,
        row: usize,
        dst: &mut Column,
        dst_row: usize,
    ) -> Result<(), EcsError> {
        debug_assert_eq!(self.item_size, dst.item_size);
        if row >= self.len {
            return Err(EcsError::OutOfRange { row, len: self.len });
        }
        if dst_row >= dst.len {
            return Err(EcsError::OutOfRange {
                row: dst_row,
                len: dst.len,
            });
        }
        if self.item_size > 0 {
            #[allow(unsafe_code)]
            unsafe {
                ptr::copy_nonoverlapping(self.raw_ptr(row), dst.raw_ptr(dst_row), self.item_size);
            }
        }
        Ok(())
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        // Elements are plain bytes; only the buffer itself is released.
        if self.item_size > 0 && self.capacity > 0 {
            let layout = self.layout_for_capacity(self.capacity);
            #[allow(unsafe_code)]
            unsafe {
                alloc::dealloc(self.data, layout);
            }
        }
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("item_size", &self.item_size)
            .field("item_align", &self.item_align)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ArchetypeSet
// ---------------------------------------------------------------------------

/// Storage for every entity of one archetype: the signature, one column per
/// member, and bidirectional entity<->row maps.
///
/// Invariant: every column's length equals the entity count, and the
/// row->entity vector and entity->row map are exact inverses. Debug builds
/// assert this after each structural mutation.
pub struct ArchetypeSet {
    signature: Signature,
    /// One column per signature member, sorted by serial for binary-search
    /// lookup (signature iteration order is already ascending).
    columns: Vec<(ComponentId, Column)>,
    /// row -> entity.
    entities: Vec<Entity>,
    /// entity -> row.
    rows: HashMap<Entity, usize>,
}

impl ArchetypeSet {
    /// Create an empty set for `signature`, pre-creating one column per
    /// member from its registered descriptor.
    pub fn new(
        signature: Signature,
        components: &ComponentRegistry,
    ) -> Result<Self, EcsError> {
        let mut columns = Vec::with_capacity(signature.len());
        for id in signature.iter() {
            let info = components.info(id)?;
            columns.push((id, Column::new(&info)));
        }
        Ok(Self {
            signature,
            columns,
            entities: Vec::new(),
            rows: HashMap::new(),
        })
    }

    /// The signature this set stores.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Number of entities in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the set holds no entities.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The row -> entity map as a dense slice.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Whether the signature contains `id`.
    #[inline]
    pub fn has_component(&self, id: ComponentId) -> bool {
        self.column_index(id).is_some()
    }

    #[inline]
    fn column_index(&self, id: ComponentId) -> Option<usize> {
        self.columns.binary_search_by_key(&id, |(cid, _)| *cid).ok()
    }

    /// The column storing `id`, if the signature contains it.
    pub fn column(&self, id: ComponentId) -> Option<&Column> {
        let idx = self.column_index(id)?;
        Some(&self.columns[idx].1)
    }

    pub(crate) fn column_mut(&mut self, id: ComponentId) -> Option<&mut Column> {
        let idx = self.column_index(id)?;
        Some(&mut self.columns[idx].1)
    }

    /// Append one row across every column and record both map directions.
    /// Returns the common row index. The fresh row is zero-filled.
    pub fn add_entity(&mut self, entity: Entity) -> usize {
        debug_assert!(
            !self.rows.contains_key(&entity),
            "entity already present in archetype set"
        );
        let row = self.entities.len();
        for (_, column) in &mut self.columns {
            let column_row = column.push_zeroed();
            debug_assert_eq!(column_row, row);
        }
        self.entities.push(entity);
        self.rows.insert(entity, row);
        self.debug_check();
        row
    }

    /// Swap-remove `entity`'s row from every column and fix the maps so the
    /// entity previously stored at the last row takes over the vacated one.
    ///
    /// Returns the relocated entity, if any.
    pub fn remove_entity(&mut self, entity: Entity) -> Result<Option<Entity>, EcsError> {
        let row = self
            .rows
            .remove(&entity)
            .ok_or(EcsError::UnknownEntity(entity))?;
        for (_, column) in &mut self.columns {
            column.swap_remove(row)?;
        }
        self.entities.swap_remove(row);

        let moved = if row < self.entities.len() {
            let moved = self.entities[row];
            self.rows.insert(moved, row);
            Some(moved)
        } else {
            None
        };
        self.debug_check();
        Ok(moved)
    }

    /// The row `entity` occupies.
    pub fn row_of(&self, entity: Entity) -> Result<usize, EcsError> {
        self.rows
            .get(&entity)
            .copied()
            .ok_or(EcsError::UnknownEntity(entity))
    }

    /// The row `entity` occupies, or `None` if it is not in this set.
    pub fn try_row_of(&self, entity: Entity) -> Option<usize> {
        self.rows.get(&entity).copied()
    }

    /// The entity stored at `row`.
    pub fn entity_at(&self, row: usize) -> Result<Entity, EcsError> {
        self.entities
            .get(row)
            .copied()
            .ok_or(EcsError::OutOfRange {
                row,
                len: self.entities.len(),
            })
    }

    /// Pointer to `id`'s instance at `row`.
    pub fn component_ptr(&self, id: ComponentId, row: usize) -> Result<*const u8, EcsError> {
        let column = self.column(id).ok_or(EcsError::MissingComponent(id))?;
        column.ptr(row)
    }

    /// Mutable pointer to `id`'s instance at `row`.
    pub fn component_ptr_mut(
        &mut self,
        id: ComponentId,
        row: usize,
    ) -> Result<*mut u8, EcsError> {
        let column = self.column_mut(id).ok_or(EcsError::MissingComponent(id))?;
        column.ptr_mut(row)
    }

    /// Byte-copy every column present in both signatures from `src_row` to
    /// `dst`'s `dst_row`.
    pub fn copy_row_to(
        &self,
        src_row: usize,
        dst: &mut ArchetypeSet,
        dst_row: usize,
    ) -> Result<(), EcsError> {
        for (id, column) in &self.columns {
            if let Some(dst_column) = dst.column_mut(*id) {
                column.copy_row_to(src_row, dst_column, dst_row)?;
            }
        }
        Ok(())
    }

    fn debug_check(&self) {
        #[cfg(debug_assertions)]
        {
            debug_assert_eq!(self.rows.len(), self.entities.len());
            for (_, column) in &self.columns {
                debug_assert_eq!(column.len(), self.entities.len());
            }
            for (row, entity) in self.entities.iter().enumerate() {
                debug_assert_eq!(self.rows.get(entity), Some(&row));
            }
        }
    }
}

impl fmt::Debug for ArchetypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeSet")
            .field("signature", &self.signature)
            .field("entity_count", &self.entities.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
