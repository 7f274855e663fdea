//! Archetype signatures.
//!
//! A [`Signature`] is the set of component serials that defines one storage
//! class. It is a value type: two signatures holding the same members compare
//! equal and hash identically regardless of the order the members were
//! supplied in. Internally the members are kept as a sorted, deduplicated
//! vector, so equality and hashing over the canonical form are
//! order-independent by construction and iteration is in ascending serial
//! order.

use std::fmt;

use crate::component::ComponentId;
use crate::EcsError;

/// An ordered set of component serials identifying one archetype.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    /// Sorted ascending, no duplicates.
    ids: Vec<ComponentId>,
}

impl Signature {
    /// The empty signature -- the storage class of entities with no
    /// components.
    pub fn empty() -> Self {
        Self { ids: Vec::new() }
    }

    /// Build a signature from a list of serials.
    ///
    /// Duplicates collapse. An empty list is rejected with
    /// [`EcsError::InvalidArgument`]; use [`empty`](Self::empty) when a
    /// componentless signature is genuinely intended.
    pub fn from_ids(ids: &[ComponentId]) -> Result<Self, EcsError> {
        if ids.is_empty() {
            return Err(EcsError::InvalidArgument(
                "signature requires at least one component",
            ));
        }
        let mut sorted = ids.to_vec();
        sorted.sort();
        sorted.dedup();
        Ok(Self { ids: sorted })
    }

    /// Whether `id` is a member.
    #[inline]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Insert a member. Returns `false` if it was already present.
    pub fn insert(&mut self, id: ComponentId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(_) => false,
            Err(pos) => {
                self.ids.insert(pos, id);
                true
            }
        }
    }

    /// Remove a member. Returns `false` if it was absent.
    pub fn remove(&mut self, id: ComponentId) -> bool {
        match self.ids.binary_search(&id) {
            Ok(pos) => {
                self.ids.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// A copy of this signature with `id` added.
    pub fn with(&self, id: ComponentId) -> Self {
        let mut next = self.clone();
        next.insert(id);
        next
    }

    /// A copy of this signature with `id` removed.
    pub fn without(&self, id: ComponentId) -> Self {
        let mut next = self.clone();
        next.remove(id);
        next
    }

    /// Number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the signature has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Members in ascending serial order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.ids.iter().copied()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ids.iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
