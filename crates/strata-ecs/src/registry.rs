//! The archetype registry: owner of all archetype sets and the maps that
//! route entities and queries to them.
//!
//! The registry holds four structures that must stay consistent:
//!
//! - `sets`: dense vector of [`ArchetypeSet`]s. An [`ArchetypeId`] is a pure
//!   index into it; ids are issued sequentially and never reused, so the
//!   vector doubles as a collision-free hash table keyed by id.
//! - `ids_by_signature`: signature -> id, consulted on every migration.
//! - `homes`: entity -> id, the authoritative home of each live entity.
//! - `component_index`: component serial -> sorted list of archetype ids
//!   whose signature contains that component. The query planner intersects
//!   these lists. Entries are append-only and archetype ids grow
//!   monotonically, so each list stays sorted without ever re-sorting.

use std::collections::HashMap;

use tracing::debug;

use crate::archetype::{ArchetypeId, ArchetypeSet};
use crate::component::{ComponentId, ComponentRegistry};
use crate::entity::Entity;
use crate::signature::Signature;
use crate::EcsError;

/// Owns every archetype set in a world and performs entity placement,
/// component add/remove migration and archetype queries.
#[derive(Debug, Default)]
pub struct ArchetypeRegistry {
    sets: Vec<ArchetypeSet>,
    ids_by_signature: HashMap<Signature, ArchetypeId>,
    homes: HashMap<Entity, ArchetypeId>,
    component_index: Vec<Vec<ArchetypeId>>,
}

impl ArchetypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // -- archetype management -----------------------------------------------

    /// Resolve `signature` to its archetype id, creating the set on first
    /// sight and indexing it under every member component.
    pub fn get_or_create(
        &mut self,
        signature: &Signature,
        components: &ComponentRegistry,
    ) -> Result<ArchetypeId, EcsError> {
        if let Some(&id) = self.ids_by_signature.get(signature) {
            return Ok(id);
        }

        if self.sets.len() > u32::MAX as usize {
            return Err(EcsError::IdExhausted { space: "archetype" });
        }
        let id = ArchetypeId(self.sets.len() as u32);
        let set = ArchetypeSet::new(signature.clone(), components)?;
        self.sets.push(set);
        self.ids_by_signature.insert(signature.clone(), id);

        for component in signature.iter() {
            let slot = component.index();
            if slot >= self.component_index.len() {
                self.component_index.resize_with(slot + 1, Vec::new);
            }
            // Ids grow monotonically, so pushing keeps the list sorted.
            self.component_index[slot].push(id);
        }

        debug!(
            archetype = id.to_raw(),
            components = signature.len(),
            "created archetype"
        );
        Ok(id)
    }

    /// The set stored under `id`, if issued.
    pub fn set(&self, id: ArchetypeId) -> Option<&ArchetypeSet> {
        self.sets.get(id.index())
    }

    pub(crate) fn set_mut(&mut self, id: ArchetypeId) -> Option<&mut ArchetypeSet> {
        self.sets.get_mut(id.index())
    }

    /// Number of archetypes created so far.
    pub fn archetype_count(&self) -> usize {
        self.sets.len()
    }

    /// Number of live entities tracked by the registry.
    pub fn entity_count(&self) -> usize {
        self.homes.len()
    }

    /// Number of entities currently stored in archetype `id`; 0 for ids that
    /// were never issued.
    pub fn entity_count_of(&self, id: ArchetypeId) -> usize {
        self.sets.get(id.index()).map_or(0, ArchetypeSet::len)
    }

    // -- entity placement ---------------------------------------------------

    /// Place a fresh entity into the archetype for `signature`, creating the
    /// set if needed. Returns the archetype id and the entity's row.
    pub fn add_entity(
        &mut self,
        entity: Entity,
        signature: &Signature,
        components: &ComponentRegistry,
    ) -> Result<(ArchetypeId, usize), EcsError> {
        if self.homes.contains_key(&entity) {
            return Err(EcsError::InvalidArgument(
                "entity is already tracked by the archetype registry",
            ));
        }
        let id = self.get_or_create(signature, components)?;
        let row = self.sets[id.index()].add_entity(entity);
        self.homes.insert(entity, id);
        Ok((id, row))
    }

    /// Remove an entity from its archetype and drop it from the registry.
    pub fn remove_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        let id = self
            .homes
            .remove(&entity)
            .ok_or(EcsError::UnknownEntity(entity))?;
        self.sets[id.index()].remove_entity(entity)?;
        Ok(())
    }

    /// Whether the registry tracks `entity`.
    pub fn contains(&self, entity: Entity) -> bool {
        self.homes.contains_key(&entity)
    }

    /// The signature of `entity`'s current archetype.
    pub fn signature_of(&self, entity: Entity) -> Result<&Signature, EcsError> {
        let id = self.archetype_id_of(entity)?;
        Ok(self.sets[id.index()].signature())
    }

    /// The id of `entity`'s current archetype.
    pub fn archetype_id_of(&self, entity: Entity) -> Result<ArchetypeId, EcsError> {
        self.homes
            .get(&entity)
            .copied()
            .ok_or(EcsError::UnknownEntity(entity))
    }

    // -- component add / remove ---------------------------------------------

    /// Give `entity` component `component`, migrating it to the widened
    /// archetype. No-op if the current archetype already contains it. The
    /// fresh column bytes are zero-filled; typed callers overwrite them.
    pub fn add_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
        components: &ComponentRegistry,
    ) -> Result<(), EcsError> {
        let home = self.archetype_id_of(entity)?;
        let current = self.sets[home.index()].signature();
        if current.contains(component) {
            return Ok(());
        }
        let target = current.with(component);
        self.move_entity(entity, home, &target, components)
    }

    /// Take component `component` away from `entity`, migrating it to the
    /// narrowed archetype. No-op if the component is absent.
    pub fn remove_component(
        &mut self,
        entity: Entity,
        component: ComponentId,
        components: &ComponentRegistry,
    ) -> Result<(), EcsError> {
        let home = self.archetype_id_of(entity)?;
        let current = self.sets[home.index()].signature();
        if !current.contains(component) {
            return Ok(());
        }
        let target = current.without(component);
        self.move_entity(entity, home, &target, components)
    }

    /// Move `entity` from its current set to the set for `target`.
    ///
    /// Ordering matters: the target row must exist before the copy, and the
    /// source row is removed only after the copy completes, so an
    /// interrupted migration leaves the entity whole in exactly one set.
    fn move_entity(
        &mut self,
        entity: Entity,
        src_id: ArchetypeId,
        target: &Signature,
        components: &ComponentRegistry,
    ) -> Result<(), EcsError> {
        let dst_id = self.get_or_create(target, components)?;
        if dst_id == src_id {
            return Ok(());
        }

        let (src, dst) = Self::two_sets_mut(&mut self.sets, src_id, dst_id);
        let src_row = src.row_of(entity)?;
        let dst_row = dst.add_entity(entity);
        src.copy_row_to(src_row, dst, dst_row)?;
        src.remove_entity(entity)?;

        self.homes.insert(entity, dst_id);
        Ok(())
    }

    /// Split-borrow two distinct sets out of the dense vector.
    fn two_sets_mut(
        sets: &mut [ArchetypeSet],
        a: ArchetypeId,
        b: ArchetypeId,
    ) -> (&mut ArchetypeSet, &mut ArchetypeSet) {
        debug_assert_ne!(a, b);
        if a.index() < b.index() {
            let (lo, hi) = sets.split_at_mut(b.index());
            (&mut lo[a.index()], &mut hi[0])
        } else {
            let (lo, hi) = sets.split_at_mut(a.index());
            (&mut hi[0], &mut lo[b.index()])
        }
    }

    // -- component access ---------------------------------------------------

    /// Pointer to `component`'s instance on `entity`.
    pub fn component_ptr(
        &self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<*const u8, EcsError> {
        let id = self.archetype_id_of(entity)?;
        let set = &self.sets[id.index()];
        let row = set.row_of(entity)?;
        set.component_ptr(component, row)
    }

    /// Mutable pointer to `component`'s instance on `entity`.
    pub fn component_ptr_mut(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Result<*mut u8, EcsError> {
        let id = self.archetype_id_of(entity)?;
        let set = &mut self.sets[id.index()];
        let row = set.row_of(entity)?;
        set.component_ptr_mut(component, row)
    }

    /// Pointer to `component`'s instance on `entity`, or `None`. Never
    /// fails; this is the recommended probe on hot paths.
    pub fn find_component_ptr(
        &self,
        entity: Entity,
        component: ComponentId,
    ) -> Option<*const u8> {
        let id = self.homes.get(&entity)?;
        let set = &self.sets[id.index()];
        let row = set.try_row_of(entity)?;
        set.component_ptr(component, row).ok()
    }

    /// Mutable variant of [`find_component_ptr`](Self::find_component_ptr).
    pub fn find_component_ptr_mut(
        &mut self,
        entity: Entity,
        component: ComponentId,
    ) -> Option<*mut u8> {
        let id = *self.homes.get(&entity)?;
        let set = &mut self.sets[id.index()];
        let row = set.try_row_of(entity)?;
        set.component_ptr_mut(component, row).ok()
    }

    // -- query planning -----------------------------------------------------

    /// All archetype ids whose signature contains every serial in
    /// `required`. An empty list matches every archetype. Returned ascending
    /// (creation order).
    ///
    /// Intersection starts from the smallest per-component id list to
    /// minimise work.
    pub fn matching_archetypes(&self, required: &[ComponentId]) -> Vec<ArchetypeId> {
        if required.is_empty() {
            return (0..self.sets.len() as u32).map(ArchetypeId).collect();
        }

        let seed = required
            .iter()
            .copied()
            .min_by_key(|&component| self.index_entry(component).len())
            .expect("required is non-empty");

        let mut matching: Vec<ArchetypeId> = self.index_entry(seed).to_vec();
        for &component in required {
            if component == seed {
                continue;
            }
            let other = self.index_entry(component);
            matching.retain(|id| other.binary_search(id).is_ok());
            if matching.is_empty() {
                break;
            }
        }
        matching
    }

    fn index_entry(&self, component: ComponentId) -> &[ArchetypeId] {
        self.component_index
            .get(component.index())
            .map_or(&[], Vec::as_slice)
    }

    /// All entities whose archetype contains every serial in `required`.
    pub fn collect_entities(&self, required: &[ComponentId]) -> Vec<Entity> {
        let mut entities = Vec::new();
        for id in self.matching_archetypes(required) {
            entities.extend_from_slice(self.sets[id.index()].entities());
        }
        entities
    }

    // -- lifecycle ----------------------------------------------------------

    /// Drop all entities and archetypes and restart the id sequence.
    pub fn reset(&mut self) {
        self.sets.clear();
        self.ids_by_signature.clear();
        self.homes.clear();
        self.component_index.clear();
        debug!("archetype registry reset");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Vel {
        dx: f32,
        dy: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Rot {
        angle: f32,
    }

    struct Fixture {
        components: ComponentRegistry,
        registry: ArchetypeRegistry,
        pos: ComponentId,
        vel: ComponentId,
        rot: ComponentId,
    }

    fn fixture() -> Fixture {
        let components = ComponentRegistry::new();
        let pos = components.id_of::<Pos>().unwrap();
        let vel = components.id_of::<Vel>().unwrap();
        let rot = components.id_of::<Rot>().unwrap();
        Fixture {
            components,
            registry: ArchetypeRegistry::new(),
            pos,
            vel,
            rot,
        }
    }

    fn sig(ids: &[ComponentId]) -> Signature {
        Signature::from_ids(ids).unwrap()
    }

    #[test]
    fn ids_are_dense_and_stable() {
        let mut f = fixture();
        let a = f
            .registry
            .get_or_create(&sig(&[f.pos]), &f.components)
            .unwrap();
        let b = f
            .registry
            .get_or_create(&sig(&[f.pos, f.vel]), &f.components)
            .unwrap();
        let a_again = f
            .registry
            .get_or_create(&sig(&[f.pos]), &f.components)
            .unwrap();

        assert_eq!(a.to_raw(), 0);
        assert_eq!(b.to_raw(), 1);
        assert_eq!(a, a_again);
        assert_eq!(f.registry.archetype_count(), 2);
    }

    #[test]
    fn signature_order_resolves_to_one_archetype() {
        let mut f = fixture();
        let a = f
            .registry
            .get_or_create(&sig(&[f.pos, f.vel]), &f.components)
            .unwrap();
        let b = f
            .registry
            .get_or_create(&sig(&[f.vel, f.pos]), &f.components)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn add_component_migrates_and_is_idempotent() {
        let mut f = fixture();
        let e = Entity::from_raw(0);
        let (home, _) = f
            .registry
            .add_entity(e, &sig(&[f.pos]), &f.components)
            .unwrap();

        f.registry.add_component(e, f.vel, &f.components).unwrap();
        let widened = f.registry.archetype_id_of(e).unwrap();
        assert_ne!(widened, home);
        assert!(f.registry.signature_of(e).unwrap().contains(f.vel));

        // Adding a component that is already present changes nothing.
        f.registry.add_component(e, f.vel, &f.components).unwrap();
        assert_eq!(f.registry.archetype_id_of(e).unwrap(), widened);
    }

    #[test]
    fn add_then_remove_returns_to_original_archetype() {
        let mut f = fixture();
        let e = Entity::from_raw(0);
        let (home, _) = f
            .registry
            .add_entity(e, &sig(&[f.pos]), &f.components)
            .unwrap();

        f.registry.add_component(e, f.vel, &f.components).unwrap();
        f.registry
            .remove_component(e, f.vel, &f.components)
            .unwrap();

        assert_eq!(f.registry.archetype_id_of(e).unwrap(), home);
        assert_eq!(f.registry.entity_count_of(home), 1);
    }

    #[test]
    fn remove_absent_component_is_a_noop() {
        let mut f = fixture();
        let e = Entity::from_raw(0);
        let (home, _) = f
            .registry
            .add_entity(e, &sig(&[f.pos]), &f.components)
            .unwrap();
        f.registry
            .remove_component(e, f.rot, &f.components)
            .unwrap();
        assert_eq!(f.registry.archetype_id_of(e).unwrap(), home);
    }

    #[test]
    fn migration_preserves_component_bytes() {
        let mut f = fixture();
        let e = Entity::from_raw(0);
        let (_, row) = f
            .registry
            .add_entity(e, &sig(&[f.pos]), &f.components)
            .unwrap();
        assert_eq!(row, 0);

        let ptr = f.registry.component_ptr_mut(e, f.pos).unwrap();
        #[allow(unsafe_code)]
        unsafe {
            std::ptr::write(ptr as *mut Pos, Pos { x: 3.0, y: 4.0 });
        }

        f.registry.add_component(e, f.vel, &f.components).unwrap();

        let ptr = f.registry.component_ptr(e, f.pos).unwrap();
        #[allow(unsafe_code)]
        let pos = unsafe { std::ptr::read(ptr as *const Pos) };
        assert_eq!(pos, Pos { x: 3.0, y: 4.0 });
    }

    #[test]
    fn mixed_archetype_population_counts() {
        let mut f = fixture();
        let pos_sig = sig(&[f.pos]);
        let vel_sig = sig(&[f.vel]);
        let pos_vel_sig = sig(&[f.pos, f.vel]);
        let pos_vel_rot_sig = sig(&[f.pos, f.vel, f.rot]);

        let e1 = Entity::from_raw(1);
        let e2 = Entity::from_raw(2);
        let e3 = Entity::from_raw(3);
        let e4 = Entity::from_raw(4);
        let e5 = Entity::from_raw(5);

        f.registry.add_entity(e1, &pos_sig, &f.components).unwrap();
        f.registry.add_entity(e2, &pos_sig, &f.components).unwrap();
        f.registry
            .add_entity(e3, &pos_vel_sig, &f.components)
            .unwrap();
        f.registry.add_entity(e4, &vel_sig, &f.components).unwrap();
        f.registry
            .add_entity(e5, &pos_vel_rot_sig, &f.components)
            .unwrap();

        f.registry.add_component(e1, f.vel, &f.components).unwrap();
        f.registry.add_component(e2, f.vel, &f.components).unwrap();

        let id_of = |s: &Signature, f: &mut Fixture| {
            f.registry.get_or_create(s, &f.components).unwrap()
        };
        let pos_id = id_of(&pos_sig, &mut f);
        let vel_id = id_of(&vel_sig, &mut f);
        let pos_vel_id = id_of(&pos_vel_sig, &mut f);
        let pos_vel_rot_id = id_of(&pos_vel_rot_sig, &mut f);

        assert_eq!(f.registry.entity_count_of(pos_id), 0);
        assert_eq!(f.registry.entity_count_of(vel_id), 1);
        assert_eq!(f.registry.entity_count_of(pos_vel_id), 3);
        assert_eq!(f.registry.entity_count_of(pos_vel_rot_id), 1);

        assert_eq!(f.registry.collect_entities(&[f.pos]).len(), 4);
        assert_eq!(f.registry.collect_entities(&[f.vel]).len(), 5);
    }

    #[test]
    fn inverted_index_matches_signatures() {
        let mut f = fixture();
        f.registry
            .get_or_create(&sig(&[f.pos]), &f.components)
            .unwrap();
        f.registry
            .get_or_create(&sig(&[f.pos, f.vel]), &f.components)
            .unwrap();
        f.registry
            .get_or_create(&sig(&[f.vel, f.rot]), &f.components)
            .unwrap();

        for id in f.registry.matching_archetypes(&[f.pos]) {
            assert!(f.registry.set(id).unwrap().signature().contains(f.pos));
        }
        assert_eq!(f.registry.matching_archetypes(&[f.pos]).len(), 2);
        assert_eq!(f.registry.matching_archetypes(&[f.pos, f.vel]).len(), 1);
        assert_eq!(f.registry.matching_archetypes(&[f.rot, f.pos]).len(), 0);

        // An empty component list matches every archetype.
        assert_eq!(f.registry.matching_archetypes(&[]).len(), 3);
    }

    #[test]
    fn matching_unknown_component_is_empty() {
        let mut f = fixture();
        f.registry
            .get_or_create(&sig(&[f.pos]), &f.components)
            .unwrap();
        // rot was interned but never stored in any archetype.
        assert!(f.registry.matching_archetypes(&[f.rot]).is_empty());
    }

    #[test]
    fn removing_an_entity_forgets_it() {
        let mut f = fixture();
        let e = Entity::from_raw(0);
        let (home, _) = f
            .registry
            .add_entity(e, &sig(&[f.pos]), &f.components)
            .unwrap();

        f.registry.remove_entity(e).unwrap();
        assert!(!f.registry.contains(e));
        assert_eq!(f.registry.entity_count_of(home), 0);
        assert!(matches!(
            f.registry.component_ptr(e, f.pos),
            Err(EcsError::UnknownEntity(_))
        ));
        assert!(matches!(
            f.registry.remove_entity(e),
            Err(EcsError::UnknownEntity(_))
        ));
    }

    #[test]
    fn find_component_ptr_never_fails() {
        let mut f = fixture();
        let e = Entity::from_raw(0);
        f.registry
            .add_entity(e, &sig(&[f.pos]), &f.components)
            .unwrap();

        assert!(f.registry.find_component_ptr(e, f.pos).is_some());
        assert!(f.registry.find_component_ptr(e, f.vel).is_none());
        assert!(f
            .registry
            .find_component_ptr(Entity::from_raw(99), f.pos)
            .is_none());
    }

    #[test]
    fn empty_archetypes_keep_their_ids() {
        let mut f = fixture();
        let e = Entity::from_raw(0);
        let (home, _) = f
            .registry
            .add_entity(e, &sig(&[f.pos]), &f.components)
            .unwrap();
        f.registry.add_component(e, f.vel, &f.components).unwrap();

        // The source archetype is empty but still resolvable.
        assert_eq!(f.registry.entity_count_of(home), 0);
        let resolved = f
            .registry
            .get_or_create(&sig(&[f.pos]), &f.components)
            .unwrap();
        assert_eq!(resolved, home);
    }

    #[test]
    fn reset_restarts_id_sequence() {
        let mut f = fixture();
        f.registry
            .add_entity(Entity::from_raw(0), &sig(&[f.pos]), &f.components)
            .unwrap();
        f.registry.reset();

        assert_eq!(f.registry.archetype_count(), 0);
        assert_eq!(f.registry.entity_count(), 0);
        let id = f
            .registry
            .get_or_create(&sig(&[f.vel]), &f.components)
            .unwrap();
        assert_eq!(id.to_raw(), 0);
    }
}
