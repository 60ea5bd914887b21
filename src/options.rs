//! Per-run options.
//!
//! Static options are fixed when the controller starts and never change for
//! the lifetime of the run. Dynamic options may be toggled by the surrounding
//! application at any time; the interface re-reads them on every access.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::maze::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterfaceMode {
    Discrete,
    Continuous,
}

impl InterfaceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InterfaceMode::Discrete => "discrete",
            InterfaceMode::Continuous => "continuous",
        }
    }
}

/// Options fixed at `Controller::start`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StaticOptions {
    pub mode: InterfaceMode,
    pub initial_direction: Direction,
    /// Fraction of the maximum speed, in [0, 1]. Scales the discrete command
    /// speed and caps continuous wheel setpoints.
    pub speed_fraction: f32,
    pub tile_text_rows: u32,
    pub tile_text_cols: u32,
}

impl StaticOptions {
    pub fn new(config: &SimConfig, mode: InterfaceMode) -> StaticOptions {
        StaticOptions {
            mode,
            initial_direction: Direction::North,
            speed_fraction: config.default_speed_fraction(),
            tile_text_rows: 2,
            tile_text_cols: 4,
        }
    }

    /// Effective discrete speed in tiles per second, clamped to the
    /// configured bounds.
    pub fn discrete_speed(&self, config: &SimConfig) -> f32 {
        (self.speed_fraction * config.discrete_max_speed)
            .clamp(config.discrete_min_speed, config.discrete_max_speed)
    }

    /// Wheel setpoint cap for the continuous interface, in rad/s.
    pub fn wheel_speed_limit(&self, config: &SimConfig) -> f32 {
        config.max_wheel_speed * self.speed_fraction.clamp(0.0, 1.0)
    }

    pub fn tile_text_capacity(&self) -> usize {
        (self.tile_text_rows as usize) * (self.tile_text_cols as usize)
    }
}

/// Options the application may toggle mid-run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DynamicOptions {
    /// Whether pose-introspection commands are answered.
    pub allow_omniscience: bool,
    /// Clear fog on tiles the mouse enters (discrete mode).
    pub auto_clear_fog: bool,
    /// Mirror wall declarations onto both halves of a shared edge.
    pub declare_both_wall_halves: bool,
    /// Declare walls as a side effect of discrete wall queries.
    pub declare_wall_on_read: bool,
    /// Annotate newly entered tiles with their true distance.
    pub auto_set_tile_text: bool,
    /// Color newly entered tiles.
    pub auto_set_tile_color: bool,
}

impl DynamicOptions {
    pub fn from_config(config: &SimConfig) -> DynamicOptions {
        DynamicOptions {
            allow_omniscience: false,
            auto_clear_fog: config.unfog_tile_on_entry,
            declare_both_wall_halves: config.declare_both_wall_halves,
            declare_wall_on_read: config.declare_wall_on_read,
            auto_set_tile_text: false,
            auto_set_tile_color: false,
        }
    }
}
