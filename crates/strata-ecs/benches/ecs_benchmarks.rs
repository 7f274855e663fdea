//! Criterion benchmarks for the hot paths: spawning, query iteration and
//! migration churn.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
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

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tag(u32);

fn populated_world(count: u32) -> (World, Vec<Entity>) {
    let mut world = World::new();
    let entities = (0..count)
        .map(|i| {
            world
                .spawn((
                    Pos {
                        x: i as f32,
                        y: 0.0,
                    },
                    Vel { dx: 1.0, dy: -1.0 },
                ))
                .unwrap()
        })
        .collect();
    (world, entities)
}

fn bench_spawn(c: &mut Criterion) {
    c.bench_function("spawn_1k_pos_vel", |b| {
        b.iter(|| {
            let mut world = World::new();
            for i in 0..1_000u32 {
                let e = world
                    .spawn((
                        Pos {
                            x: i as f32,
                            y: 0.0,
                        },
                        Vel { dx: 1.0, dy: 0.0 },
                    ))
                    .unwrap();
                black_box(e);
            }
            world
        })
    });
}

fn bench_iteration(c: &mut Criterion) {
    let (mut world, _entities) = populated_world(10_000);
    c.bench_function("for_each_10k_pos_vel", |b| {
        b.iter(|| {
            world
                .for_each::<(Pos, Vel)>(|_entity, (pos, vel)| {
                    pos.x += vel.dx;
                    pos.y += vel.dy;
                })
                .unwrap();
        })
    });
}

fn bench_migration_churn(c: &mut Criterion) {
    let (mut world, entities) = populated_world(1_000);
    c.bench_function("add_remove_component_1k", |b| {
        b.iter(|| {
            for &e in &entities {
                world.add_component(e, Tag(7)).unwrap();
            }
            for &e in &entities {
                world.remove_component::<Tag>(e).unwrap();
            }
        })
    });
}

fn bench_deferred_pass(c: &mut Criterion) {
    c.bench_function("deferred_add_then_remove_1k", |b| {
        b.iter(|| {
            let (mut world, _entities) = populated_world(1_000);
            world
                .for_each::<(Pos,)>(|entity, (_pos,)| {
                    entity.deferred_add_component::<Tag>().unwrap();
                })
                .unwrap();
            world
                .for_each::<(Tag,)>(|entity, (_tag,)| {
                    entity.deferred_remove_component::<Tag>().unwrap();
                })
                .unwrap();
            world
        })
    });
}

criterion_group!(
    benches,
    bench_spawn,
    bench_iteration,
    bench_migration_churn,
    bench_deferred_pass
);
criterion_main!(benches);
