//! mousim - micromouse simulation engine.
//!
//! The core of a micromouse simulator: a maze model with BFS distances and
//! rule checks, a continuous mouse kinematic/collision model, a dual
//! discrete/continuous interface for navigation algorithms, a controller
//! that drives an algorithm as an external process, and a fixed-rate
//! simulation clock. Rendering, file browsing, and build tooling live in
//! consumers of this crate; they observe the simulation only through
//! published snapshots and the collaborator API on [`sim::Simulation`].

pub mod clock;
pub mod config;
pub mod controller;
pub mod fog;
pub mod geometry;
pub mod interface;
pub mod maze;
pub mod mouse;
pub mod options;
pub mod protocol;
pub mod sim;
pub mod stats;

pub use clock::SimulationClock;
pub use config::{ConfigError, SimConfig};
pub use controller::{AlgoSpec, Controller, ControllerError, RunState};
pub use interface::Interface;
pub use maze::{Direction, Maze, MazeError};
pub use mouse::{Mouse, MouseGeometry};
pub use options::{DynamicOptions, InterfaceMode, StaticOptions};
pub use sim::{MazeInfo, SimSnapshot, Simulation};
pub use stats::StatsSnapshot;
