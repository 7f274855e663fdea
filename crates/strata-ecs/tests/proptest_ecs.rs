//! Property tests for ECS operations.
//!
//! Random sequences of spawn/despawn/add/remove/query operations are run
//! against a shadow model, and the world's invariants are checked after
//! every step: entity counts match, each entity's archetype signature equals
//! the component set it actually holds, and queries see exactly the entities
//! the model predicts.

use std::collections::HashMap;

use proptest::prelude::*;
use strata_ecs::prelude::*;

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

/// Operations we can perform on the world.
#[derive(Debug, Clone)]
enum EcsOp {
    SpawnPos(f32, f32),
    SpawnPosVel(f32, f32, f32, f32),
    Despawn(usize),
    AddVel(usize, f32, f32),
    RemoveVel(usize),
    QueryPos,
    QueryPosVel,
}

/// Strategy that generates finite (non-NaN, non-Inf) f32 values.
fn finite_f32() -> impl Strategy<Value = f32> {
    (-1_000_000i32..1_000_000i32).prop_map(|v| v as f32 * 0.01)
}

fn ecs_op_strategy() -> impl Strategy<Value = EcsOp> {
    prop_oneof![
        (finite_f32(), finite_f32()).prop_map(|(x, y)| EcsOp::SpawnPos(x, y)),
        (finite_f32(), finite_f32(), finite_f32(), finite_f32())
            .prop_map(|(x, y, dx, dy)| EcsOp::SpawnPosVel(x, y, dx, dy)),
        (0..100usize).prop_map(EcsOp::Despawn),
        (0..100usize, finite_f32(), finite_f32())
            .prop_map(|(i, dx, dy)| EcsOp::AddVel(i, dx, dy)),
        (0..100usize).prop_map(EcsOp::RemoveVel),
        Just(EcsOp::QueryPos),
        Just(EcsOp::QueryPosVel),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn random_ops_preserve_invariants(ops in prop::collection::vec(ecs_op_strategy(), 1..60)) {
        let mut world = World::new();

        // Shadow model: every tracked entity has Pos; the bool is "has Vel".
        let mut alive: Vec<Entity> = Vec::new();
        let mut has_vel: HashMap<Entity, bool> = HashMap::new();

        for op in ops {
            match op {
                EcsOp::SpawnPos(x, y) => {
                    let e = world.spawn((Pos { x, y },)).unwrap();
                    alive.push(e);
                    has_vel.insert(e, false);
                }
                EcsOp::SpawnPosVel(x, y, dx, dy) => {
                    let e = world.spawn((Pos { x, y }, Vel { dx, dy })).unwrap();
                    alive.push(e);
                    has_vel.insert(e, true);
                }
                EcsOp::Despawn(idx) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        let e = alive.remove(idx);
                        has_vel.remove(&e);
                        world.despawn(e).unwrap();
                        prop_assert!(world.despawn(e).is_err());
                    }
                }
                EcsOp::AddVel(idx, dx, dy) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        let e = alive[idx];
                        world.add_component(e, Vel { dx, dy }).unwrap();
                        has_vel.insert(e, true);
                    }
                }
                EcsOp::RemoveVel(idx) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        let e = alive[idx];
                        world.remove_component::<Vel>(e).unwrap();
                        has_vel.insert(e, false);
                    }
                }
                EcsOp::QueryPos => {
                    let seen = world.collect_entities::<(Pos,)>().unwrap();
                    prop_assert_eq!(seen.len(), alive.len());
                }
                EcsOp::QueryPosVel => {
                    let seen = world.collect_entities::<(Pos, Vel)>().unwrap();
                    let expected = has_vel.values().filter(|&&v| v).count();
                    prop_assert_eq!(seen.len(), expected);
                }
            }

            // Entity accounting matches the model.
            prop_assert_eq!(world.entity_count(), alive.len());

            // Each entity's signature equals the component set it holds.
            for &e in &alive {
                prop_assert!(world.contains(e));
                prop_assert!(world.has_component::<Pos>(e));
                prop_assert_eq!(world.has_component::<Vel>(e), has_vel[&e]);

                let expected_len = if has_vel[&e] { 2 } else { 1 };
                prop_assert_eq!(world.signature_of(e).unwrap().len(), expected_len);

                // The entity is stored at exactly one row of its archetype.
                let home = world.archetype_id_of(e).unwrap();
                prop_assert!(world.entity_count_of(home) >= 1);
            }
        }
    }

    /// Adding and removing a component is an identity on the archetype id,
    /// and repeating either half is a no-op.
    #[test]
    fn add_remove_roundtrip(xs in prop::collection::vec(finite_f32(), 1..20)) {
        let mut world = World::new();
        let entities: Vec<Entity> = xs
            .iter()
            .map(|&x| world.spawn((Pos { x, y: 0.0 },)).unwrap())
            .collect();

        for &e in &entities {
            let home = world.archetype_id_of(e).unwrap();

            world.add_component(e, Vel { dx: 1.0, dy: 1.0 }).unwrap();
            let widened = world.archetype_id_of(e).unwrap();
            world.add_component(e, Vel { dx: 9.0, dy: 9.0 }).unwrap();
            prop_assert_eq!(world.archetype_id_of(e).unwrap(), widened);
            // The duplicate add did not overwrite the value.
            prop_assert_eq!(
                world.get_component::<Vel>(e).unwrap(),
                &Vel { dx: 1.0, dy: 1.0 }
            );

            world.remove_component::<Vel>(e).unwrap();
            prop_assert_eq!(world.archetype_id_of(e).unwrap(), home);
            world.remove_component::<Vel>(e).unwrap();
            prop_assert_eq!(world.archetype_id_of(e).unwrap(), home);
        }
    }

    /// Entity ids are never reused, even after despawn.
    #[test]
    fn entity_ids_are_never_recycled(count in 1..50usize) {
        let mut world = World::new();
        let mut seen: Vec<Entity> = Vec::new();

        for i in 0..count {
            let e = world.spawn((Pos { x: i as f32, y: 0.0 },)).unwrap();
            prop_assert!(!seen.contains(&e));
            seen.push(e);
            if i % 2 == 0 {
                world.despawn(e).unwrap();
            }
        }
    }
}
