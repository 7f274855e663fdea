//! Headless demo scene: a fixed-count swarm of entities bouncing inside a
//! box, ticked at a fixed step.
//!
//! Takes no flags. Set `RUST_LOG=debug` (or `trace`) to watch the world's
//! internals; the default filter prints the per-run summary lines.

use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use tracing::info;

use strata_ecs::prelude::*;

const WORLD_WIDTH: f32 = 1024.0;
const WORLD_HEIGHT: f32 = 720.0;
const NUM_ENTITIES: usize = 20_000;
const NUM_FRAMES: u32 = 600;
const MIN_SPEED: f32 = 100.0;
const MAX_SPEED: f32 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    x: f32,
    y: f32,
    w: f32,
    h: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tint {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
}

/// Integrates velocities and bounces entities off the box edges.
struct MovementSystem;

impl System for MovementSystem {
    fn update(&mut self, world: &mut World, dt: f32) {
        world
            .for_each::<(Rect, Velocity)>(|_entity, (rect, vel)| {
                rect.x += vel.x * dt;
                rect.y += vel.y * dt;

                if rect.x < 0.0 || rect.x > WORLD_WIDTH {
                    vel.x = -vel.x;
                    rect.x = rect.x.clamp(3.0, WORLD_WIDTH - 3.0);
                }
                if rect.y < 0.0 || rect.y > WORLD_HEIGHT {
                    vel.y = -vel.y;
                    rect.y = rect.y.clamp(3.0, WORLD_HEIGHT - 3.0);
                }
            })
            .expect("movement query over a live world");
    }
}

/// Periodically reports tick progress.
struct ReportSystem {
    frames: u32,
    simulated: f32,
}

impl System for ReportSystem {
    fn update(&mut self, world: &mut World, dt: f32) {
        self.frames += 1;
        self.simulated += dt;
        if self.frames % 120 == 0 {
            info!(
                frames = self.frames,
                simulated_seconds = self.simulated,
                entities = world.entity_count(),
                "tick"
            );
        }
    }
}

fn random_velocity(rng: &mut impl Rng) -> f32 {
    let speed = rng.gen_range(MIN_SPEED..MAX_SPEED);
    if rng.gen_bool(0.5) {
        -speed
    } else {
        speed
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut world = World::new();
    let mut rng = Pcg64Mcg::seed_from_u64(0x5eed_cafe);

    let setup = Instant::now();
    for _ in 0..NUM_ENTITIES {
        world
            .spawn((
                Rect {
                    x: WORLD_WIDTH / 2.0,
                    y: WORLD_HEIGHT / 2.0,
                    w: 5.0,
                    h: 5.0,
                },
                Tint {
                    r: 0,
                    g: 128,
                    b: 135,
                    a: 255,
                },
                Velocity {
                    x: random_velocity(&mut rng),
                    y: random_velocity(&mut rng),
                },
            ))
            .expect("spawn demo entity");
    }
    info!(
        entities = NUM_ENTITIES,
        elapsed_ms = setup.elapsed().as_millis(),
        archetypes = world.archetype_count(),
        "scene created"
    );

    world.add_system(MovementSystem);
    let report = world.add_system(ReportSystem {
        frames: 0,
        simulated: 0.0,
    });

    let dt = 1.0 / 60.0;
    let run = Instant::now();
    for _ in 0..NUM_FRAMES {
        world.update(dt);
    }

    let elapsed = run.elapsed();
    info!(
        frames = report.borrow().frames,
        elapsed_ms = elapsed.as_millis(),
        frames_per_second = NUM_FRAMES as f64 / elapsed.as_secs_f64(),
        "run complete"
    );
}
