//! Simulation configuration.
//!
//! One immutable [`SimConfig`] value is constructed at process start,
//! validated once, and passed by reference into everything that needs it.
//! There is no global parameter registry; a bad value is fatal before any
//! simulation state exists.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be positive (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("discrete speed bounds are inverted or degenerate (min {min}, max {max})")]
    SpeedBounds { min: f32, max: f32 },
    #[error("discrete default speed {speed} is outside [{min}, {max}]")]
    DefaultSpeed { speed: f32, min: f32, max: f32 },
    #[error("body polygon needs at least 3 points (got {0})")]
    BodyPoints(u32),
    #[error("sensor fan needs at least 1 edge ray (got {0})")]
    SensorPoints(u32),
}

/// Fixed simulation parameters, consumed at construction and never reloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Snapshot/render pacing hint, in frames per second.
    pub frame_rate: u32,
    /// Physics and collision tick rate. The integration step is `1 / rate`.
    pub collision_detection_rate: u32,

    /// Discrete-interface speed bounds, in tiles per second.
    pub discrete_min_speed: f32,
    pub discrete_max_speed: f32,
    pub discrete_default_speed: f32,

    /// Slice size for interruptible synthetic sleeps, in milliseconds.
    /// Smaller slices observe pause/stop sooner at the cost of more wakeups.
    pub min_sleep_ms: u64,

    /// Vertex count of the polygon approximating the mouse body.
    pub circle_approximation_points: u32,
    /// Rays cast per sensor to approximate its angular spread.
    pub sensor_edge_points: u32,

    /// Physical maze geometry, in meters.
    pub wall_width: f32,
    pub wall_length: f32,

    /// Wheel setpoint cap for the continuous interface, in rad/s.
    pub max_wheel_speed: f32,
    pub wheel_radius: f32,
    pub wheel_base: f32,

    /// How long a stop request waits for cooperative unwinding before the
    /// algorithm process is killed, in milliseconds.
    pub stop_grace_period_ms: u64,

    pub default_paused: bool,

    /// Defaults for the per-run dynamic options.
    pub declare_wall_on_read: bool,
    pub unfog_tile_on_entry: bool,
    pub declare_both_wall_halves: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            collision_detection_rate: 40,
            discrete_min_speed: 1.0,
            discrete_max_speed: 300.0,
            discrete_default_speed: 30.0,
            min_sleep_ms: 5,
            circle_approximation_points: 8,
            sensor_edge_points: 3,
            wall_width: 0.012,
            wall_length: 0.168,
            max_wheel_speed: 8.0 * PI,
            wheel_radius: 0.011,
            wheel_base: 0.08,
            stop_grace_period_ms: 2000,
            default_paused: false,
            declare_wall_on_read: true,
            unfog_tile_on_entry: true,
            declare_both_wall_halves: true,
        }
    }
}

impl SimConfig {
    /// Center-to-center tile spacing: one wall length plus one post width.
    pub fn tile_pitch(&self) -> f32 {
        self.wall_length + self.wall_width
    }

    /// Physics integration step in seconds.
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.collision_detection_rate as f32
    }

    /// Default discrete speed expressed as a fraction of the maximum, so
    /// callers that never set a speed fraction get the default speed.
    pub fn default_speed_fraction(&self) -> f32 {
        self.discrete_default_speed / self.discrete_max_speed
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::NonPositive { name, value })
            }
        }

        positive("frame-rate", self.frame_rate as f64)?;
        positive("collision-detection-rate", self.collision_detection_rate as f64)?;
        positive("min-sleep-ms", self.min_sleep_ms as f64)?;
        positive("wall-width", self.wall_width as f64)?;
        positive("wall-length", self.wall_length as f64)?;
        positive("max-wheel-speed", self.max_wheel_speed as f64)?;
        positive("wheel-radius", self.wheel_radius as f64)?;
        positive("wheel-base", self.wheel_base as f64)?;

        if !(self.discrete_min_speed > 0.0 && self.discrete_min_speed < self.discrete_max_speed) {
            return Err(ConfigError::SpeedBounds {
                min: self.discrete_min_speed,
                max: self.discrete_max_speed,
            });
        }
        if self.discrete_default_speed < self.discrete_min_speed
            || self.discrete_default_speed > self.discrete_max_speed
        {
            return Err(ConfigError::DefaultSpeed {
                speed: self.discrete_default_speed,
                min: self.discrete_min_speed,
                max: self.discrete_max_speed,
            });
        }
        if self.circle_approximation_points < 3 {
            return Err(ConfigError::BodyPoints(self.circle_approximation_points));
        }
        if self.sensor_edge_points < 1 {
            return Err(ConfigError::SensorPoints(self.sensor_edge_points));
        }
        Ok(())
    }
}
