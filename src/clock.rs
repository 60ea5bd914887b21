//! Simulation clock.
//!
//! A dedicated thread ticking at the configured collision-detection rate.
//! Each tick integrates the mouse, checks body collision, updates run stats,
//! and publishes a fresh snapshot. The pause flag freezes integration without
//! stopping the loop, so resuming is instantaneous and costs no catch-up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::geometry::polygon_intersects;
use crate::sim::{MouseSnapshot, SimSnapshot, Simulation};

pub struct SimulationClock {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimulationClock {
    /// Starts the clock thread. The thread owns its execution from
    /// construction and runs until [`SimulationClock::shutdown`] or drop.
    pub fn spawn(sim: Simulation) -> SimulationClock {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("mousim-clock".to_string())
            .spawn(move || run_loop(&sim, &flag))
            .ok();
        if handle.is_none() {
            warn!("failed to spawn simulation clock thread");
        }
        SimulationClock {
            shutdown,
            handle,
        }
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SimulationClock {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(sim: &Simulation, shutdown: &AtomicBool) {
    let dt = sim.config().tick_dt();
    let period = Duration::from_secs_f32(dt);
    let late_threshold = period * 2;
    // Integration runs at the collision rate; snapshots are published at
    // most frame_rate times per second.
    let frame_period = Duration::from_secs_f64(1.0 / sim.config().frame_rate as f64);
    let mut last_publish: Option<Instant> = None;
    let mut sim_time = 0.0f64;

    loop {
        let started = Instant::now();
        thread::sleep(period);
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        if sim.paused() {
            continue;
        }

        let sim_dt = dt * sim.sim_speed();
        sim_time += sim_dt as f64;
        let snapshot = tick(sim, sim_dt, sim_time);

        let now = Instant::now();
        if last_publish.map_or(true, |t| now.duration_since(t) >= frame_period) {
            sim.publish_snapshot(snapshot);
            last_publish = Some(now);
        }

        let elapsed = started.elapsed();
        if elapsed > late_threshold {
            debug!(?elapsed, "late simulation tick");
        }
    }
}

/// One integration step over the mouse slot; returns the snapshot to publish.
fn tick(sim: &Simulation, sim_dt: f32, sim_time: f64) -> SimSnapshot {
    let world = sim.world();
    sim.with_slot(|slot| {
        let Some(slot) = slot else {
            return SimSnapshot { sim_time, mouse: None };
        };

        if !slot.stats.crashed() {
            slot.mouse.integrate(sim_dt);
            if let Some(world) = world.as_deref() {
                if polygon_intersects(&slot.mouse.body_polygon(), &world.segments) {
                    slot.stats.set_crashed();
                    warn!(name = %slot.name, "mouse body collided with a wall");
                }
                let (tx, ty) = slot.mouse.current_tile();
                slot.stats.record_position(
                    (tx, ty),
                    sim_time,
                    world.maze.distance(tx, ty),
                    world.maze.is_center(tx, ty),
                );
            }
        }

        let (position, heading) = slot.mouse.pose();
        let (tile_x, tile_y) = slot.mouse.current_tile();
        SimSnapshot {
            sim_time,
            mouse: Some(MouseSnapshot {
                name: slot.name.clone(),
                x: position.x,
                y: position.y,
                heading,
                tile_x,
                tile_y,
                direction: slot.mouse.current_direction(),
                stats: slot.stats.snapshot(),
            }),
        }
    })
}
