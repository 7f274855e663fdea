//! The system extension point.
//!
//! Systems are plain polymorphic objects with a single `update` operation,
//! registered on a [`World`](crate::world::World) and invoked in
//! registration order by `World::update`. Scheduling beyond that -- ordering
//! constraints, parallelism -- is out of scope; cross-cutting per-frame
//! logic goes here and nowhere else.
//!
//! Registration hands back a shared [`SystemHandle`], so callers can keep a
//! reference for later configuration and systems stay reachable (through the
//! world) while a pass is running. The core is single-threaded, which the
//! `Rc<RefCell<_>>` handle encodes.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::rc::Rc;

use crate::world::World;

/// Shared handle to a registered system.
pub type SystemHandle<S> = Rc<RefCell<S>>;

/// A per-frame callback over the world.
pub trait System: Any {
    /// Advance this system by `dt` seconds.
    fn update(&mut self, world: &mut World, dt: f32);
}

/// One registered system: its type key plus two views of the same cell --
/// one for dynamic dispatch during `update`, one for typed retrieval.
pub(crate) struct SystemSlot {
    pub(crate) key: TypeId,
    pub(crate) name: &'static str,
    pub(crate) runner: Rc<RefCell<dyn System>>,
    typed: Rc<dyn Any>,
}

impl SystemSlot {
    pub(crate) fn new<S: System>(system: S) -> (Self, SystemHandle<S>) {
        let cell: Rc<RefCell<S>> = Rc::new(RefCell::new(system));
        let slot = Self {
            key: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
            runner: cell.clone(),
            typed: cell.clone(),
        };
        (slot, cell)
    }

    pub(crate) fn downcast<S: System>(&self) -> Option<SystemHandle<S>> {
        self.typed.clone().downcast::<RefCell<S>>().ok()
    }
}

impl std::fmt::Debug for SystemSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSlot").field("name", &self.name).finish()
    }
}
