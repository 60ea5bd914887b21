//! Run-scoped simulation state.
//!
//! [`Simulation`] is the single owner of everything one run shares: the maze
//! and its precomputed wall segments, the mouse slot (kinematics, knowledge,
//! stats, dynamic options), the pause flag, the speed factor, and the
//! published snapshot. Handles are cheap clones; every critical section is
//! short and nothing holds a lock across a blocking wait.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::SimConfig;
use crate::fog::Knowledge;
use crate::geometry::{wall_segments, Segment};
use crate::maze::{Direction, Maze};
use crate::mouse::Mouse;
use crate::options::DynamicOptions;
use crate::stats::{RunStats, StatsSnapshot};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("no maze is loaded")]
    NoMaze,
    #[error("a mouse named {0:?} is already in the simulation")]
    MouseInUse(String),
}

/// A maze plus its collision segments, shared immutably for one run.
#[derive(Debug)]
pub struct MazeWorld {
    pub maze: Maze,
    pub segments: Vec<Segment>,
}

/// Everything owned on behalf of the current mouse.
#[derive(Debug)]
pub(crate) struct MouseSlot {
    pub name: String,
    pub mouse: Mouse,
    pub fog: Knowledge,
    pub stats: RunStats,
    pub dynamic: DynamicOptions,
}

struct SimShared {
    config: SimConfig,
    maze: RwLock<Option<Arc<MazeWorld>>>,
    slot: Mutex<Option<MouseSlot>>,
    paused: AtomicBool,
    // Speed factor stored as f32 bits so readers never take a lock.
    speed_bits: AtomicU32,
    snapshot: RwLock<SimSnapshot>,
}

#[derive(Clone)]
pub struct Simulation {
    shared: Arc<SimShared>,
}

/// Locks without propagating poison: a panicked writer leaves data that is
/// still the best available state for diagnostics and teardown.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Simulation {
    pub fn new(config: SimConfig) -> Simulation {
        let paused = config.default_paused;
        Simulation {
            shared: Arc::new(SimShared {
                config,
                maze: RwLock::new(None),
                slot: Mutex::new(None),
                paused: AtomicBool::new(paused),
                speed_bits: AtomicU32::new(1.0f32.to_bits()),
                snapshot: RwLock::new(SimSnapshot::default()),
            }),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.shared.config
    }

    /// Replaces the maze. Any mouse from a previous run is removed along with
    /// it; a run never outlives the maze it was started on.
    pub fn set_maze(&self, maze: Maze) {
        let world = Arc::new(MazeWorld {
            segments: wall_segments(&maze, &self.shared.config),
            maze,
        });
        let mut guard = self
            .shared
            .maze
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(world);
        drop(guard);
        *lock(&self.shared.slot) = None;
        self.publish_snapshot(SimSnapshot::default());
        info!("maze replaced; simulation reset");
    }

    pub fn world(&self) -> Option<Arc<MazeWorld>> {
        self.shared
            .maze
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn maze_info(&self) -> Option<MazeInfo> {
        self.world().map(|world| MazeInfo {
            width: world.maze.width(),
            height: world.maze.height(),
            max_distance: world.maze.max_distance(),
            is_valid: world.maze.is_valid(),
            is_official: world.maze.is_official(),
            optimal_start_direction: world.maze.optimal_start_direction(),
        })
    }

    /// Adds a mouse to the simulation. Fails if no maze is loaded or a mouse
    /// is already present; the previous run must be torn down first.
    pub fn set_mouse(&self, name: &str, mouse: Mouse) -> Result<(), SimError> {
        let world = self.world().ok_or(SimError::NoMaze)?;
        let mut guard = lock(&self.shared.slot);
        if let Some(existing) = guard.as_ref() {
            return Err(SimError::MouseInUse(existing.name.clone()));
        }
        *guard = Some(MouseSlot {
            name: name.to_string(),
            mouse,
            fog: Knowledge::new(world.maze.width(), world.maze.height()),
            stats: RunStats::new(),
            dynamic: DynamicOptions::from_config(&self.shared.config),
        });
        Ok(())
    }

    pub fn remove_mouse(&self) {
        *lock(&self.shared.slot) = None;
        self.publish_snapshot(SimSnapshot {
            sim_time: self.snapshot().sim_time,
            mouse: None,
        });
    }

    pub fn contains_mouse(&self, name: &str) -> bool {
        lock(&self.shared.slot)
            .as_ref()
            .map(|slot| slot.name == name)
            .unwrap_or(false)
    }

    pub fn mouse_stats(&self, name: &str) -> Option<StatsSnapshot> {
        lock(&self.shared.slot)
            .as_ref()
            .filter(|slot| slot.name == name)
            .map(|slot| slot.stats.snapshot())
    }

    pub fn set_paused(&self, paused: bool) {
        self.shared.paused.store(paused, Ordering::SeqCst);
    }

    pub fn paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    /// Sets the global speed factor. Clamped to a sane range; 1.0 is real
    /// time.
    pub fn set_sim_speed(&self, factor: f32) {
        let clamped = factor.clamp(0.01, 100.0);
        self.shared
            .speed_bits
            .store(clamped.to_bits(), Ordering::SeqCst);
    }

    pub fn sim_speed(&self) -> f32 {
        f32::from_bits(self.shared.speed_bits.load(Ordering::SeqCst))
    }

    pub fn set_dynamic_options(&self, options: DynamicOptions) {
        if let Some(slot) = lock(&self.shared.slot).as_mut() {
            slot.dynamic = options;
        }
    }

    pub fn dynamic_options(&self) -> Option<DynamicOptions> {
        lock(&self.shared.slot).as_ref().map(|slot| slot.dynamic)
    }

    pub fn snapshot(&self) -> SimSnapshot {
        self.shared
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn publish_snapshot(&self, snapshot: SimSnapshot) {
        let mut guard = self
            .shared
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = snapshot;
    }

    pub(crate) fn with_slot<R>(&self, f: impl FnOnce(Option<&mut MouseSlot>) -> R) -> R {
        let mut guard = lock(&self.shared.slot);
        f(guard.as_mut())
    }
}

/// Serializable maze summary for collaborators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MazeInfo {
    pub width: u32,
    pub height: u32,
    pub max_distance: u32,
    pub is_valid: bool,
    pub is_official: bool,
    pub optimal_start_direction: Direction,
}

/// Consistent view of one tick, replaced atomically by the clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimSnapshot {
    pub sim_time: f64,
    pub mouse: Option<MouseSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseSnapshot {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    pub tile_x: u32,
    pub tile_y: u32,
    pub direction: Direction,
    pub stats: StatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::test_mazes::open_maze;
    use crate::mouse::MouseGeometry;

    fn sim_with_maze() -> Simulation {
        let sim = Simulation::new(SimConfig::default());
        sim.set_maze(Maze::parse(&open_maze(4, 4, &[])).unwrap());
        sim
    }

    fn mouse(sim: &Simulation) -> Mouse {
        let config = sim.config();
        Mouse::new(MouseGeometry::standard(config), config, Direction::North)
    }

    #[test]
    fn mouse_requires_a_maze() {
        let sim = Simulation::new(SimConfig::default());
        let config = SimConfig::default();
        let m = Mouse::new(MouseGeometry::standard(&config), &config, Direction::North);
        assert!(matches!(sim.set_mouse("", m), Err(SimError::NoMaze)));
    }

    #[test]
    fn second_mouse_is_rejected() {
        let sim = sim_with_maze();
        sim.set_mouse("a", mouse(&sim)).unwrap();
        let err = sim.set_mouse("b", mouse(&sim)).unwrap_err();
        assert!(matches!(err, SimError::MouseInUse(name) if name == "a"));
    }

    #[test]
    fn contains_and_stats_match_by_name() {
        let sim = sim_with_maze();
        sim.set_mouse("solver", mouse(&sim)).unwrap();
        assert!(sim.contains_mouse("solver"));
        assert!(!sim.contains_mouse("other"));
        assert!(sim.mouse_stats("solver").is_some());
        assert!(sim.mouse_stats("other").is_none());

        sim.remove_mouse();
        assert!(!sim.contains_mouse("solver"));
    }

    #[test]
    fn replacing_the_maze_evicts_the_mouse() {
        let sim = sim_with_maze();
        sim.set_mouse("", mouse(&sim)).unwrap();
        sim.set_maze(Maze::parse(&open_maze(3, 3, &[])).unwrap());
        assert!(!sim.contains_mouse(""));
        assert!(sim.snapshot().mouse.is_none());
    }

    #[test]
    fn sim_speed_is_clamped() {
        let sim = Simulation::new(SimConfig::default());
        assert_eq!(sim.sim_speed(), 1.0);
        sim.set_sim_speed(0.0);
        assert_eq!(sim.sim_speed(), 0.01);
        sim.set_sim_speed(1e9);
        assert_eq!(sim.sim_speed(), 100.0);
    }

    #[test]
    fn maze_info_reports_rule_checks() {
        let sim = sim_with_maze();
        let info = sim.maze_info().unwrap();
        assert_eq!((info.width, info.height), (4, 4));
        assert!(info.is_valid);
        assert!(!info.is_official);
    }

    #[test]
    fn dynamic_options_are_per_run() {
        let sim = sim_with_maze();
        assert!(sim.dynamic_options().is_none());
        sim.set_mouse("", mouse(&sim)).unwrap();

        let mut options = sim.dynamic_options().unwrap();
        assert!(!options.allow_omniscience);
        options.allow_omniscience = true;
        sim.set_dynamic_options(options);
        assert!(sim.dynamic_options().unwrap().allow_omniscience);
    }
}
