//! Maze data model.
//!
//! A maze is a rectangular grid of cells, each storing wall presence for its
//! four sides as bits. Construction parses a textual grid description,
//! verifies that shared edges agree and that the outer boundary is closed,
//! and computes the BFS distance field from the center region. A `Maze` is
//! immutable after construction; loading a new maze replaces the old one.

use std::collections::VecDeque;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

// Wall bits per cell.
pub const WALL_N: u8 = 1;
pub const WALL_E: u8 = 2;
pub const WALL_S: u8 = 4;
pub const WALL_W: u8 = 8;

const ALL_WALLS: u8 = WALL_N | WALL_E | WALL_S | WALL_W;

/// Compass direction. `(0, 0)` is the south-west corner and north is +y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub fn wall_bit(self) -> u8 {
        match self {
            Direction::North => WALL_N,
            Direction::East => WALL_E,
            Direction::South => WALL_S,
            Direction::West => WALL_W,
        }
    }

    pub fn left(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    pub fn right(self) -> Direction {
        self.left().opposite()
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// Unit step toward this direction in tile coordinates.
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    /// Heading angle in radians, east = 0, counterclockwise positive.
    pub fn angle(self) -> f32 {
        use std::f32::consts::FRAC_PI_2;
        match self {
            Direction::East => 0.0,
            Direction::North => FRAC_PI_2,
            Direction::West => 2.0 * FRAC_PI_2,
            Direction::South => 3.0 * FRAC_PI_2,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Direction::North => 'n',
            Direction::East => 'e',
            Direction::South => 's',
            Direction::West => 'w',
        }
    }

    pub fn from_char(c: char) -> Option<Direction> {
        match c.to_ascii_lowercase() {
            'n' => Some(Direction::North),
            'e' => Some(Direction::East),
            's' => Some(Direction::South),
            'w' => Some(Direction::West),
            _ => None,
        }
    }

    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];
}

#[derive(Debug, Error)]
pub enum MazeError {
    #[error("failed to read maze file: {0}")]
    Io(#[from] std::io::Error),
    #[error("maze description is not valid UTF-8")]
    NotUtf8,
    #[error("maze description is empty")]
    Empty,
    #[error("line {line}: {reason}")]
    BadLine { line: usize, reason: String },
    #[error("cell ({x}, {y}) appears more than once")]
    DuplicateCell { x: u32, y: u32 },
    #[error("missing cell ({x}, {y}); expected a full {width}x{height} grid")]
    MissingCell { x: u32, y: u32, width: u32, height: u32 },
    #[error("wall mismatch between ({x}, {y}) and the cell to the {side}")]
    InconsistentEdge { x: u32, y: u32, side: &'static str },
    #[error("outer boundary is open at ({x}, {y}) {side}")]
    OpenBoundary { x: u32, y: u32, side: &'static str },
}

/// Immutable maze: walls, BFS distance field, and rule queries.
#[derive(Debug, Clone)]
pub struct Maze {
    width: u32,
    height: u32,
    walls: Vec<u8>,
    distances: Vec<Option<u32>>,
    center: Vec<(u32, u32)>,
}

impl Maze {
    /// Parses a maze from a file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Maze, MazeError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let maze = Self::parse(&text)?;
        info!(
            width = maze.width,
            height = maze.height,
            path = %path.as_ref().display(),
            "loaded maze"
        );
        Ok(maze)
    }

    /// Parses a maze from the raw output of a maze-generation process.
    pub fn from_generated(bytes: &[u8]) -> Result<Maze, MazeError> {
        let text = std::str::from_utf8(bytes).map_err(|_| MazeError::NotUtf8)?;
        Self::parse(text)
    }

    /// Parses the textual grid format: one `x y n e s w` line per cell,
    /// with 0/1 wall flags. Every cell must appear exactly once.
    pub fn parse(text: &str) -> Result<Maze, MazeError> {
        let mut entries: Vec<(u32, u32, u8)> = Vec::new();
        let mut max_x = 0u32;
        let mut max_y = 0u32;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let line_no = index + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 6 {
                return Err(MazeError::BadLine {
                    line: line_no,
                    reason: format!("expected 6 fields, found {}", fields.len()),
                });
            }

            let coord = |field: &str, name: &str| -> Result<u32, MazeError> {
                field.parse::<u32>().map_err(|_| MazeError::BadLine {
                    line: line_no,
                    reason: format!("bad {name} value {field:?}"),
                })
            };
            let x = coord(fields[0], "x")?;
            let y = coord(fields[1], "y")?;

            let mut bits = 0u8;
            for (field, bit) in fields[2..].iter().zip([WALL_N, WALL_E, WALL_S, WALL_W]) {
                match *field {
                    "0" => {}
                    "1" => bits |= bit,
                    other => {
                        return Err(MazeError::BadLine {
                            line: line_no,
                            reason: format!("wall flag must be 0 or 1, found {other:?}"),
                        })
                    }
                }
            }

            max_x = max_x.max(x);
            max_y = max_y.max(y);
            entries.push((x, y, bits));
        }

        if entries.is_empty() {
            return Err(MazeError::Empty);
        }

        let width = max_x + 1;
        let height = max_y + 1;
        let mut walls: Vec<Option<u8>> = vec![None; (width as usize) * (height as usize)];
        for (x, y, bits) in entries {
            let slot = &mut walls[(y as usize) * (width as usize) + (x as usize)];
            if slot.is_some() {
                return Err(MazeError::DuplicateCell { x, y });
            }
            *slot = Some(bits);
        }
        if let Some(hole) = walls.iter().position(Option::is_none) {
            let x = (hole % width as usize) as u32;
            let y = (hole / width as usize) as u32;
            return Err(MazeError::MissingCell { x, y, width, height });
        }
        let walls: Vec<u8> = walls.into_iter().map(|w| w.unwrap_or(ALL_WALLS)).collect();

        let maze = Maze {
            width,
            height,
            walls,
            distances: Vec::new(),
            center: center_cells(width, height),
        };
        maze.check_consistency()?;
        maze.check_boundary()?;

        let mut maze = maze;
        maze.distances = maze.compute_distances();
        Ok(maze)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Wall presence on the given side of a cell. Out-of-bounds coordinates
    /// read as fully walled so callers never step off the grid.
    pub fn has_wall(&self, x: u32, y: u32, direction: Direction) -> bool {
        if x >= self.width || y >= self.height {
            return true;
        }
        self.walls[self.idx(x, y)] & direction.wall_bit() != 0
    }

    /// Neighbor across an open wall, if any.
    pub fn open_neighbor(&self, x: u32, y: u32, direction: Direction) -> Option<(u32, u32)> {
        if self.has_wall(x, y, direction) {
            return None;
        }
        let (dx, dy) = direction.delta();
        let nx = x as i64 + dx;
        let ny = y as i64 + dy;
        if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
            return None;
        }
        Some((nx as u32, ny as u32))
    }

    /// BFS distance to the center region, if the cell is reachable from it.
    pub fn distance(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.distances[self.idx(x, y)]
    }

    /// Largest finite distance in the field.
    pub fn max_distance(&self) -> u32 {
        self.distances.iter().flatten().copied().max().unwrap_or(0)
    }

    /// The goal cells: the 2x2 center block for even dimensions, collapsing
    /// to a single row/column/cell for odd ones.
    pub fn center_cells(&self) -> &[(u32, u32)] {
        &self.center
    }

    pub fn is_center(&self, x: u32, y: u32) -> bool {
        self.center.contains(&(x, y))
    }

    /// A maze is valid when every cell is reachable from the start cell.
    pub fn is_valid(&self) -> bool {
        let total = (self.width as usize) * (self.height as usize);
        self.reachable_from(0, 0) == total
    }

    /// Official competition rules: canonical 16x16 dimensions, a start cell
    /// with exactly one opening, and a single-entrance open center block.
    pub fn is_official(&self) -> bool {
        if self.width != 16 || self.height != 16 {
            return false;
        }
        if !self.is_valid() {
            return false;
        }

        let start_openings = Direction::ALL
            .iter()
            .filter(|d| !self.has_wall(0, 0, **d))
            .count();
        if start_openings != 1 {
            return false;
        }

        // The 2x2 center block must be internally open and reachable through
        // exactly one wall opening from outside the block.
        let mut entrances = 0usize;
        for &(cx, cy) in &self.center {
            for direction in Direction::ALL {
                let (dx, dy) = direction.delta();
                let nx = cx as i64 + dx;
                let ny = cy as i64 + dy;
                let neighbor_in_center =
                    nx >= 0 && ny >= 0 && self.center.contains(&(nx as u32, ny as u32));
                let open = !self.has_wall(cx, cy, direction);
                if neighbor_in_center {
                    if !open {
                        return false;
                    }
                } else if open {
                    entrances += 1;
                }
            }
        }
        entrances == 1
    }

    /// Direction of the opening out of the start cell. Prefers north when
    /// both north and east are open (non-official mazes).
    pub fn optimal_start_direction(&self) -> Direction {
        if !self.has_wall(0, 0, Direction::North) {
            Direction::North
        } else {
            Direction::East
        }
    }

    fn reachable_from(&self, x: u32, y: u32) -> usize {
        let mut seen = vec![false; (self.width as usize) * (self.height as usize)];
        let mut queue = VecDeque::new();
        seen[self.idx(x, y)] = true;
        queue.push_back((x, y));
        let mut count = 0usize;
        while let Some((cx, cy)) = queue.pop_front() {
            count += 1;
            for direction in Direction::ALL {
                if let Some((nx, ny)) = self.open_neighbor(cx, cy, direction) {
                    let i = self.idx(nx, ny);
                    if !seen[i] {
                        seen[i] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }
        count
    }

    fn compute_distances(&self) -> Vec<Option<u32>> {
        let mut distances = vec![None; (self.width as usize) * (self.height as usize)];
        let mut queue = VecDeque::new();
        for &(x, y) in &self.center {
            distances[self.idx(x, y)] = Some(0);
            queue.push_back((x, y));
        }
        while let Some((x, y)) = queue.pop_front() {
            let next = distances[self.idx(x, y)].unwrap_or(0) + 1;
            for direction in Direction::ALL {
                if let Some((nx, ny)) = self.open_neighbor(x, y, direction) {
                    let i = self.idx(nx, ny);
                    if distances[i].is_none() {
                        distances[i] = Some(next);
                        queue.push_back((nx, ny));
                    }
                }
            }
        }
        distances
    }

    fn check_consistency(&self) -> Result<(), MazeError> {
        for y in 0..self.height {
            for x in 0..self.width {
                if y + 1 < self.height
                    && self.has_wall(x, y, Direction::North)
                        != self.has_wall(x, y + 1, Direction::South)
                {
                    return Err(MazeError::InconsistentEdge { x, y, side: "north" });
                }
                if x + 1 < self.width
                    && self.has_wall(x, y, Direction::East)
                        != self.has_wall(x + 1, y, Direction::West)
                {
                    return Err(MazeError::InconsistentEdge { x, y, side: "east" });
                }
            }
        }
        Ok(())
    }

    fn check_boundary(&self) -> Result<(), MazeError> {
        for x in 0..self.width {
            if !self.has_wall(x, 0, Direction::South) {
                return Err(MazeError::OpenBoundary { x, y: 0, side: "south" });
            }
            if !self.has_wall(x, self.height - 1, Direction::North) {
                return Err(MazeError::OpenBoundary { x, y: self.height - 1, side: "north" });
            }
        }
        for y in 0..self.height {
            if !self.has_wall(0, y, Direction::West) {
                return Err(MazeError::OpenBoundary { x: 0, y, side: "west" });
            }
            if !self.has_wall(self.width - 1, y, Direction::East) {
                return Err(MazeError::OpenBoundary { x: self.width - 1, y, side: "east" });
            }
        }
        Ok(())
    }
}

fn center_cells(width: u32, height: u32) -> Vec<(u32, u32)> {
    let xs: Vec<u32> = if width % 2 == 0 {
        vec![width / 2 - 1, width / 2]
    } else {
        vec![width / 2]
    };
    let ys: Vec<u32> = if height % 2 == 0 {
        vec![height / 2 - 1, height / 2]
    } else {
        vec![height / 2]
    };
    let mut cells = Vec::with_capacity(xs.len() * ys.len());
    for &y in &ys {
        for &x in &xs {
            cells.push((x, y));
        }
    }
    cells
}


#[cfg(test)]
mod tests {
    use super::test_mazes::{official_16, open_maze};
    use super::*;

    #[test]
    fn parses_minimal_maze() {
        let maze = Maze::parse(&open_maze(3, 2, &[])).unwrap();
        assert_eq!(maze.width(), 3);
        assert_eq!(maze.height(), 2);
        assert!(maze.has_wall(0, 0, Direction::South));
        assert!(!maze.has_wall(0, 0, Direction::North));
        assert!(maze.has_wall(2, 1, Direction::East));
    }

    #[test]
    fn rejects_ragged_grid() {
        let err = Maze::parse("0 0 1 1 1 1\n1 1 1 1 1 1\n").unwrap_err();
        assert!(matches!(err, MazeError::MissingCell { .. }));
    }

    #[test]
    fn rejects_duplicate_cell() {
        let err = Maze::parse("0 0 1 1 1 1\n0 0 1 1 1 1\n").unwrap_err();
        assert!(matches!(err, MazeError::DuplicateCell { x: 0, y: 0 }));
    }

    #[test]
    fn rejects_bad_field_count() {
        let err = Maze::parse("0 0 1 1 1\n").unwrap_err();
        assert!(matches!(err, MazeError::BadLine { line: 1, .. }));
    }

    #[test]
    fn rejects_inconsistent_shared_edge() {
        // (0,0) claims a north wall, (0,1) claims no south wall.
        let text = "0 0 1 0 1 1\n1 0 1 1 1 0\n0 1 1 0 0 1\n1 1 1 1 0 0\n";
        let err = Maze::parse(text).unwrap_err();
        assert!(matches!(err, MazeError::InconsistentEdge { .. }));
    }

    #[test]
    fn rejects_open_outer_boundary() {
        // (0,0) west wall missing.
        let text = "0 0 0 0 1 0\n1 0 0 1 1 0\n0 1 1 0 0 1\n1 1 1 1 0 0\n";
        let err = Maze::parse(text).unwrap_err();
        assert!(matches!(err, MazeError::OpenBoundary { .. }));
    }

    #[test]
    fn distance_field_is_a_bfs_labeling() {
        let maze = Maze::parse(&open_maze(4, 4, &[])).unwrap();
        for &(x, y) in maze.center_cells() {
            assert_eq!(maze.distance(x, y), Some(0));
        }
        for y in 0..4 {
            for x in 0..4 {
                let d = maze.distance(x, y).unwrap();
                if d == 0 {
                    continue;
                }
                let best = Direction::ALL
                    .iter()
                    .filter_map(|dir| maze.open_neighbor(x, y, *dir))
                    .filter_map(|(nx, ny)| maze.distance(nx, ny))
                    .min()
                    .unwrap();
                assert_eq!(d, best + 1, "cell ({x}, {y})");
            }
        }
    }

    #[test]
    fn unreachable_cell_invalidates_maze() {
        // Box in (0, 1) of a 3x3 grid.
        let maze = Maze::parse(&open_maze(
            3,
            3,
            &[
                (0, 1, Direction::North),
                (0, 1, Direction::South),
                (0, 1, Direction::East),
            ],
        ))
        .unwrap();
        assert!(!maze.is_valid());
        assert_eq!(maze.distance(0, 1), None);
        assert!(maze.max_distance() > 0);
    }

    #[test]
    fn even_dimensions_use_two_by_two_center() {
        let maze = Maze::parse(&open_maze(4, 4, &[])).unwrap();
        let mut cells = maze.center_cells().to_vec();
        cells.sort_unstable();
        assert_eq!(cells, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
    }

    #[test]
    fn odd_dimensions_use_single_center() {
        let maze = Maze::parse(&open_maze(5, 3, &[])).unwrap();
        assert_eq!(maze.center_cells(), &[(2, 1)]);
    }

    #[test]
    fn official_maze_passes_rule_check() {
        let maze = Maze::parse(&official_16(&[])).unwrap();
        assert!(maze.is_valid());
        assert!(maze.is_official());
        assert_eq!(maze.optimal_start_direction(), Direction::North);
    }

    #[test]
    fn two_center_entrances_fail_official_check() {
        // Reopen the south edge of (8, 7) as a second entrance.
        let mut text = official_16(&[]);
        text = text
            .replace("8 7 0 1 1 0", "8 7 0 1 0 0")
            .replace("8 6 1 0 0 0", "8 6 0 0 0 0");
        let maze = Maze::parse(&text).unwrap();
        assert!(maze.is_valid());
        assert!(!maze.is_official());
    }

    #[test]
    fn open_start_cell_fails_official_check() {
        // Reopen the start cell's east wall on both halves of the edge.
        let text = official_16(&[])
            .replace("0 0 0 1 1 1", "0 0 0 0 1 1")
            .replace("1 0 0 0 1 1", "1 0 0 0 1 0");
        let maze = Maze::parse(&text).unwrap();
        assert!(maze.is_valid());
        assert!(!maze.is_official());
    }

    #[test]
    fn generated_bytes_round_trip() {
        let text = open_maze(3, 3, &[]);
        let maze = Maze::from_generated(text.as_bytes()).unwrap();
        assert_eq!(maze.width(), 3);
        assert!(Maze::from_generated(&[0xff, 0xfe]).is_err());
    }
}
