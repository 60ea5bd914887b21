//! Mouse kinematic model.
//!
//! Continuous pose plus differential-drive integration at a fixed step, and
//! the discretization back to tile coordinates and a compass direction. The
//! body is approximated by an N-point regular polygon and each sensor by a
//! fan of M rays; both counts come from [`SimConfig`] rather than being baked
//! into the geometry.

use std::f32::consts::TAU;

use crate::config::SimConfig;
use crate::geometry::Vec2;
use crate::maze::Direction;

/// One range sensor, described in the body frame (+x is forward).
#[derive(Debug, Clone, Copy)]
pub struct SensorSpec {
    /// Mount point relative to the body center.
    pub offset: Vec2,
    /// Facing angle relative to the heading.
    pub bearing: f32,
    /// Angular half-spread of the fan.
    pub half_spread: f32,
    /// Maximum reading.
    pub range: f32,
}

#[derive(Debug, Clone)]
pub struct MouseGeometry {
    pub body_radius: f32,
    pub body_points: u32,
    pub sensors: Vec<SensorSpec>,
}

impl MouseGeometry {
    /// The default three-sensor micromouse: one forward sensor and one at
    /// 45 degrees to each side, all mounted on the body rim.
    pub fn standard(config: &SimConfig) -> MouseGeometry {
        let radius = config.tile_pitch() * 0.25;
        let spread = 10f32.to_radians();
        let range = config.tile_pitch() * 2.0;
        let rim = |bearing: f32| SensorSpec {
            offset: Vec2::from_angle(bearing).scale(radius),
            bearing,
            half_spread: spread,
            range,
        };
        MouseGeometry {
            body_radius: radius,
            body_points: config.circle_approximation_points,
            sensors: vec![
                rim(0.0),
                rim(45f32.to_radians()),
                rim(-45f32.to_radians()),
            ],
        }
    }
}

/// Continuous mouse state. Mutated by the simulation clock (integration) or,
/// in discrete mode, atomically by the interface on command completion.
#[derive(Debug, Clone)]
pub struct Mouse {
    geometry: MouseGeometry,
    position: Vec2,
    heading: f32,
    left_speed: f32,
    right_speed: f32,

    wheel_radius: f32,
    wheel_base: f32,
    tile_pitch: f32,
    tiles: (u32, u32),
}

impl Mouse {
    /// Places a new mouse at the center of the start tile.
    pub fn new(geometry: MouseGeometry, config: &SimConfig, facing: Direction) -> Mouse {
        let pitch = config.tile_pitch();
        Mouse {
            geometry,
            position: Vec2::new(pitch / 2.0, pitch / 2.0),
            heading: facing.angle(),
            left_speed: 0.0,
            right_speed: 0.0,
            wheel_radius: config.wheel_radius,
            wheel_base: config.wheel_base,
            tile_pitch: pitch,
            tiles: (u32::MAX, u32::MAX),
        }
    }

    pub fn geometry(&self) -> &MouseGeometry {
        &self.geometry
    }

    pub fn pose(&self) -> (Vec2, f32) {
        (self.position, self.heading)
    }

    pub fn wheel_speeds(&self) -> (f32, f32) {
        (self.left_speed, self.right_speed)
    }

    pub fn set_wheel_speeds(&mut self, left: f32, right: f32) {
        self.left_speed = left;
        self.right_speed = right;
    }

    /// Advances the pose by one step of simple Euler integration. With both
    /// wheels at zero this is exactly a no-op.
    pub fn integrate(&mut self, dt: f32) {
        let linear = self.wheel_radius * (self.left_speed + self.right_speed) / 2.0;
        let angular = self.wheel_radius * (self.right_speed - self.left_speed) / self.wheel_base;

        self.heading = (self.heading + angular * dt).rem_euclid(TAU);
        self.position = self
            .position
            .add(Vec2::from_angle(self.heading).scale(linear * dt));
    }

    /// Tile coordinates of the containing cell (clamped at the maze edge
    /// handled by callers; negative positions clamp to zero).
    pub fn current_tile(&self) -> (u32, u32) {
        let tile = |v: f32| (v / self.tile_pitch).floor().max(0.0) as u32;
        (tile(self.position.x), tile(self.position.y))
    }

    /// Compass direction nearest to the continuous heading.
    pub fn current_direction(&self) -> Direction {
        let quadrant = (self.heading.rem_euclid(TAU) / (TAU / 4.0)).round() as u32 % 4;
        match quadrant {
            0 => Direction::East,
            1 => Direction::North,
            2 => Direction::West,
            _ => Direction::South,
        }
    }

    /// Teleports the mouse to the center of a tile, facing a compass
    /// direction. Used by the discrete interface, where moves are atomic.
    pub fn place_at_tile(&mut self, x: u32, y: u32, facing: Direction) {
        self.position = Vec2::new(
            (x as f32 + 0.5) * self.tile_pitch,
            (y as f32 + 0.5) * self.tile_pitch,
        );
        self.heading = facing.angle();
    }

    /// Remembers the last discretized tile so traversal bookkeeping can
    /// detect entries; returns true when the tile changed.
    pub fn note_tile_change(&mut self) -> bool {
        let tile = self.current_tile();
        if tile != self.tiles {
            self.tiles = tile;
            true
        } else {
            false
        }
    }

    /// World-space body outline for collision checks.
    pub fn body_polygon(&self) -> Vec<Vec2> {
        (0..self.geometry.body_points)
            .map(|i| {
                let angle = self.heading + i as f32 / self.geometry.body_points as f32 * TAU;
                self.position
                    .add(Vec2::from_angle(angle).scale(self.geometry.body_radius))
            })
            .collect()
    }

    /// World-space ray fan for one sensor: `(origin, angle)` per edge ray,
    /// spread uniformly across the sensor's angular width.
    pub fn sensor_rays(&self, index: usize, edge_points: u32) -> Option<(Vec<(Vec2, f32)>, f32)> {
        let sensor = self.geometry.sensors.get(index)?;
        let origin = self.position.add(sensor.offset.rotated(self.heading));
        let center = self.heading + sensor.bearing;

        let rays = if edge_points == 1 {
            vec![(origin, center)]
        } else {
            (0..edge_points)
                .map(|i| {
                    let t = i as f32 / (edge_points - 1) as f32;
                    let angle = center - sensor.half_spread + t * 2.0 * sensor.half_spread;
                    (origin, angle)
                })
                .collect()
        };
        Some((rays, sensor.range))
    }

    pub fn sensor_count(&self) -> usize {
        self.geometry.sensors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mouse() -> Mouse {
        let config = SimConfig::default();
        Mouse::new(MouseGeometry::standard(&config), &config, Direction::North)
    }

    #[test]
    fn zero_wheel_speeds_is_a_no_op() {
        let mut m = mouse();
        let before = m.pose();
        for _ in 0..1000 {
            m.integrate(0.025);
        }
        assert_eq!(m.pose(), before);
    }

    #[test]
    fn equal_wheel_speeds_drive_straight() {
        let mut m = mouse();
        let (start, heading) = m.pose();
        m.set_wheel_speeds(10.0, 10.0);
        for _ in 0..40 {
            m.integrate(0.025);
        }
        let (end, new_heading) = m.pose();
        assert!((new_heading - heading).abs() < 1e-5);
        // Facing north: +y motion only.
        assert!((end.x - start.x).abs() < 1e-4);
        assert!(end.y > start.y);
    }

    #[test]
    fn opposite_wheel_speeds_spin_in_place() {
        let mut m = mouse();
        let (start, _) = m.pose();
        m.set_wheel_speeds(-5.0, 5.0);
        for _ in 0..40 {
            m.integrate(0.025);
        }
        let (end, _) = m.pose();
        assert!((end.x - start.x).abs() < 1e-4);
        assert!((end.y - start.y).abs() < 1e-4);
    }

    #[test]
    fn integration_is_deterministic() {
        let mut a = mouse();
        let mut b = mouse();
        for m in [&mut a, &mut b] {
            m.set_wheel_speeds(3.0, 7.0);
            for _ in 0..200 {
                m.integrate(0.025);
            }
        }
        assert_eq!(a.pose(), b.pose());
    }

    #[test]
    fn discretization_snaps_to_tile_and_direction() {
        let config = SimConfig::default();
        let mut m = mouse();
        m.place_at_tile(3, 5, Direction::East);
        assert_eq!(m.current_tile(), (3, 5));
        assert_eq!(m.current_direction(), Direction::East);

        let (pos, _) = m.pose();
        assert!((pos.x - 3.5 * config.tile_pitch()).abs() < 1e-5);

        // A slight wobble still snaps to the same compass direction.
        m.set_wheel_speeds(1.0, 1.4);
        m.integrate(0.025);
        assert_eq!(m.current_direction(), Direction::East);
    }

    #[test]
    fn tile_change_notes_fire_once_per_entry() {
        let mut m = mouse();
        assert!(m.note_tile_change());
        assert!(!m.note_tile_change());
        m.place_at_tile(1, 0, Direction::East);
        assert!(m.note_tile_change());
        assert!(!m.note_tile_change());
    }

    #[test]
    fn sensor_fan_spans_the_spread() {
        let m = mouse();
        let (rays, range) = m.sensor_rays(0, 3).unwrap();
        assert_eq!(rays.len(), 3);
        assert!(range > 0.0);
        let first = rays.first().unwrap().1;
        let last = rays.last().unwrap().1;
        assert!((last - first - 2.0 * 10f32.to_radians()).abs() < 1e-5);
        assert!(m.sensor_rays(99, 3).is_none());
    }
}
