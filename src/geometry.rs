//! Collision geometry.
//!
//! Stateless primitives shared by the physics clock (body collision) and the
//! continuous interface (sensor rays). Walls are extracted once per maze as
//! axis-aligned rectangles with real thickness, then everything reduces to
//! segment/segment and ray/segment intersection.

use crate::config::SimConfig;
use crate::maze::{Direction, Maze};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Vec2 {
        Vec2 { x, y }
    }

    pub fn from_angle(angle: f32) -> Vec2 {
        Vec2::new(angle.cos(), angle.sin())
    }

    pub fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, k: f32) -> Vec2 {
        Vec2::new(self.x * k, self.y * k)
    }

    pub fn cross(self, other: Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Rotates the vector counterclockwise by `angle` radians.
    pub fn rotated(self, angle: f32) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub a: Vec2,
    pub b: Vec2,
}

impl Segment {
    pub const fn new(a: Vec2, b: Vec2) -> Segment {
        Segment { a, b }
    }
}

/// Extracts every present wall as the four edge segments of its rectangle.
///
/// Each shared edge is emitted once: cells contribute their north and east
/// walls, plus south/west walls along the maze boundary.
pub fn wall_segments(maze: &Maze, config: &SimConfig) -> Vec<Segment> {
    let pitch = config.tile_pitch();
    let half = config.wall_width / 2.0;
    let mut segments = Vec::new();

    let mut push_rect = |x0: f32, y0: f32, x1: f32, y1: f32| {
        let corners = [
            Vec2::new(x0, y0),
            Vec2::new(x1, y0),
            Vec2::new(x1, y1),
            Vec2::new(x0, y1),
        ];
        for i in 0..4 {
            segments.push(Segment::new(corners[i], corners[(i + 1) % 4]));
        }
    };

    for y in 0..maze.height() {
        for x in 0..maze.width() {
            let west = x as f32 * pitch;
            let south = y as f32 * pitch;
            if maze.has_wall(x, y, Direction::North) {
                push_rect(west, south + pitch - half, west + pitch, south + pitch + half);
            }
            if maze.has_wall(x, y, Direction::East) {
                push_rect(west + pitch - half, south, west + pitch + half, south + pitch);
            }
            if y == 0 && maze.has_wall(x, y, Direction::South) {
                push_rect(west, south - half, west + pitch, south + half);
            }
            if x == 0 && maze.has_wall(x, y, Direction::West) {
                push_rect(west - half, south, west + half, south + pitch);
            }
        }
    }
    segments
}

fn orientation(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    b.sub(a).cross(c.sub(a))
}

/// Proper or touching intersection of two closed segments.
pub fn segments_intersect(p: Segment, q: Segment) -> bool {
    let o1 = orientation(p.a, p.b, q.a);
    let o2 = orientation(p.a, p.b, q.b);
    let o3 = orientation(q.a, q.b, p.a);
    let o4 = orientation(q.a, q.b, p.b);

    if o1 * o2 < 0.0 && o3 * o4 < 0.0 {
        return true;
    }

    // Collinear or endpoint-touching cases.
    let on = |a: Vec2, b: Vec2, c: Vec2| {
        orientation(a, b, c).abs() < 1e-9
            && c.x >= a.x.min(b.x) - 1e-9
            && c.x <= a.x.max(b.x) + 1e-9
            && c.y >= a.y.min(b.y) - 1e-9
            && c.y <= a.y.max(b.y) + 1e-9
    };
    on(p.a, p.b, q.a) || on(p.a, p.b, q.b) || on(q.a, q.b, p.a) || on(q.a, q.b, p.b)
}

/// Whether the closed polygon outline crosses any wall segment.
///
/// The mouse body never fully contains a wall rectangle, so outline
/// intersection is a complete overlap test.
pub fn polygon_intersects(polygon: &[Vec2], segments: &[Segment]) -> bool {
    if polygon.len() < 2 {
        return false;
    }
    for i in 0..polygon.len() {
        let edge = Segment::new(polygon[i], polygon[(i + 1) % polygon.len()]);
        if segments.iter().any(|s| segments_intersect(edge, *s)) {
            return true;
        }
    }
    false
}

/// Distance along a ray to the nearest segment hit, or `max_range`.
pub fn cast_ray(origin: Vec2, angle: f32, max_range: f32, segments: &[Segment]) -> f32 {
    let dir = Vec2::from_angle(angle);
    let mut nearest = max_range;

    for segment in segments {
        let edge = segment.b.sub(segment.a);
        let denom = dir.cross(edge);
        if denom.abs() < 1e-12 {
            continue;
        }
        let to_a = segment.a.sub(origin);
        let t = to_a.cross(edge) / denom;
        let u = to_a.cross(dir) / denom;
        if t >= 0.0 && (0.0..=1.0).contains(&u) && t < nearest {
            nearest = t;
        }
    }
    nearest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::test_mazes::open_maze;
    use crate::maze::Maze;

    fn segment(ax: f32, ay: f32, bx: f32, by: f32) -> Segment {
        Segment::new(Vec2::new(ax, ay), Vec2::new(bx, by))
    }

    #[test]
    fn crossing_segments_intersect() {
        assert!(segments_intersect(
            segment(0.0, 0.0, 1.0, 1.0),
            segment(0.0, 1.0, 1.0, 0.0),
        ));
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        assert!(!segments_intersect(
            segment(0.0, 0.0, 1.0, 0.0),
            segment(0.0, 0.5, 1.0, 0.5),
        ));
    }

    #[test]
    fn touching_endpoint_counts_as_intersection() {
        assert!(segments_intersect(
            segment(0.0, 0.0, 1.0, 0.0),
            segment(1.0, 0.0, 1.0, 1.0),
        ));
    }

    #[test]
    fn ray_hits_perpendicular_segment() {
        let wall = [segment(1.0, -1.0, 1.0, 1.0)];
        let hit = cast_ray(Vec2::new(0.0, 0.0), 0.0, 5.0, &wall);
        assert!((hit - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ray_misses_behind_origin() {
        let wall = [segment(-1.0, -1.0, -1.0, 1.0)];
        let hit = cast_ray(Vec2::new(0.0, 0.0), 0.0, 5.0, &wall);
        assert!((hit - 5.0).abs() < 1e-6);
    }

    #[test]
    fn ray_clamps_to_max_range() {
        let wall = [segment(10.0, -1.0, 10.0, 1.0)];
        let hit = cast_ray(Vec2::new(0.0, 0.0), 0.0, 2.0, &wall);
        assert!((hit - 2.0).abs() < 1e-6);
    }

    #[test]
    fn wall_segments_cover_boundary() {
        let config = SimConfig::default();
        let maze = Maze::parse(&open_maze(2, 2, &[])).unwrap();
        let segments = wall_segments(&maze, &config);
        // 8 boundary walls, 4 segments each; no interior walls.
        assert_eq!(segments.len(), 8 * 4);

        // A ray fired east from the middle of the maze reaches the east
        // boundary wall's inner face.
        let pitch = config.tile_pitch();
        let origin = Vec2::new(pitch, pitch);
        let hit = cast_ray(origin, 0.0, 10.0, &segments);
        let expected = pitch - config.wall_width / 2.0;
        assert!((hit - expected).abs() < 1e-4, "hit {hit}, expected {expected}");
    }

    #[test]
    fn polygon_inside_open_tile_is_clear() {
        let config = SimConfig::default();
        let maze = Maze::parse(&open_maze(2, 2, &[])).unwrap();
        let segments = wall_segments(&maze, &config);
        let pitch = config.tile_pitch();
        let center = Vec2::new(pitch / 2.0, pitch / 2.0);

        let small: Vec<Vec2> = (0..8)
            .map(|i| {
                let a = i as f32 / 8.0 * std::f32::consts::TAU;
                center.add(Vec2::from_angle(a).scale(pitch * 0.2))
            })
            .collect();
        assert!(!polygon_intersects(&small, &segments));

        let big: Vec<Vec2> = (0..8)
            .map(|i| {
                let a = i as f32 / 8.0 * std::f32::consts::TAU;
                center.add(Vec2::from_angle(a).scale(pitch * 0.8))
            })
            .collect();
        assert!(polygon_intersects(&big, &segments));
    }
}
