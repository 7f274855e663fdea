//! Deferred structural mutations.
//!
//! Iteration walks row-indexed columns whose layout any migration would
//! invalidate, so structural changes requested mid-walk are captured in a
//! [`DeferredQueue`] and replayed once the walk completes. One queue is
//! created per `for_each` pass and drained when the pass ends; queues never
//! outlive the pass that owns them.

use tracing::trace;

use crate::component::{ComponentId, ComponentRegistry};
use crate::entity::Entity;
use crate::registry::ArchetypeRegistry;
use crate::EcsError;

/// Initial queue capacity; passes that defer more simply grow.
const QUEUE_RESERVE: usize = 64;

/// What a deferred action does to its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredKind {
    /// Give the entity the component (zero-initialised).
    AddComponent,
    /// Take the component away from the entity.
    RemoveComponent,
}

/// One captured structural mutation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredAction {
    pub kind: DeferredKind,
    pub entity: Entity,
    pub component: ComponentId,
}

/// FIFO buffer of structural mutations issued during one iteration pass.
#[derive(Debug)]
pub struct DeferredQueue {
    actions: Vec<DeferredAction>,
}

impl DeferredQueue {
    /// Create an empty queue with the standard reserved capacity.
    pub fn new() -> Self {
        Self {
            actions: Vec::with_capacity(QUEUE_RESERVE),
        }
    }

    /// Append an action. Non-blocking, no back-pressure.
    pub fn enqueue(&mut self, kind: DeferredKind, entity: Entity, component: ComponentId) {
        self.actions.push(DeferredAction {
            kind,
            entity,
            component,
        });
    }

    /// Number of queued actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Replay every action against the registry in enqueue order, then clear
    /// the queue. Actions that became no-ops (adds of a component already
    /// present, removes of an absent one) are skipped silently by the
    /// registry. Returns the number of actions replayed.
    pub fn drain(
        &mut self,
        registry: &mut ArchetypeRegistry,
        components: &ComponentRegistry,
    ) -> Result<usize, EcsError> {
        let queued = self.actions.len();
        for action in self.actions.drain(..) {
            match action.kind {
                DeferredKind::AddComponent => {
                    registry.add_component(action.entity, action.component, components)?;
                }
                DeferredKind::RemoveComponent => {
                    registry.remove_component(action.entity, action.component, components)?;
                }
            }
        }
        if queued > 0 {
            trace!(actions = queued, "drained deferred mutation queue");
        }
        Ok(queued)
    }
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
