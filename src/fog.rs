//! Algorithm knowledge state.
//!
//! Tracks what the algorithm has seen and claimed, separate from maze truth:
//! per-tile discovery ("fog"), per-side wall declarations, and tile text and
//! color annotations. Mutated only through interface calls; the simulation
//! clock never touches it.

use hashbrown::HashMap;

use crate::maze::{Direction, Maze};

/// A wall claim made by the algorithm for one side of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WallDeclaration {
    #[default]
    Undeclared,
    Declared {
        present: bool,
    },
}

/// A declaration judged against maze truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallKnowledge {
    Undeclared,
    Correct { present: bool },
    Incorrect { declared: bool },
}

#[derive(Debug, Clone)]
pub struct Knowledge {
    width: u32,
    height: u32,
    discovered: Vec<bool>,
    declarations: Vec<[WallDeclaration; 4]>,
    tile_text: HashMap<(u32, u32), String>,
    tile_color: HashMap<(u32, u32), char>,
}

impl Knowledge {
    pub fn new(width: u32, height: u32) -> Knowledge {
        let cells = (width as usize) * (height as usize);
        Knowledge {
            width,
            height,
            discovered: vec![false; cells],
            declarations: vec![[WallDeclaration::Undeclared; 4]; cells],
            tile_text: HashMap::new(),
            tile_color: HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.discovered.fill(false);
        self.declarations.fill([WallDeclaration::Undeclared; 4]);
        self.tile_text.clear();
        self.tile_color.clear();
    }

    fn idx(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some((y as usize) * (self.width as usize) + (x as usize))
        } else {
            None
        }
    }

    fn side(direction: Direction) -> usize {
        match direction {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    /// Marks a tile as seen; returns true on first discovery.
    pub fn discover(&mut self, x: u32, y: u32) -> bool {
        match self.idx(x, y) {
            Some(i) if !self.discovered[i] => {
                self.discovered[i] = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_discovered(&self, x: u32, y: u32) -> bool {
        self.idx(x, y).map(|i| self.discovered[i]).unwrap_or(false)
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.iter().filter(|d| **d).count()
    }

    /// Records a wall claim. With `both_halves` the matching declaration is
    /// mirrored onto the far side of the shared edge.
    pub fn declare_wall(
        &mut self,
        x: u32,
        y: u32,
        direction: Direction,
        present: bool,
        both_halves: bool,
    ) {
        if let Some(i) = self.idx(x, y) {
            self.declarations[i][Self::side(direction)] = WallDeclaration::Declared { present };
        }
        if both_halves {
            let (dx, dy) = direction.delta();
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx >= 0 && ny >= 0 {
                if let Some(i) = self.idx(nx as u32, ny as u32) {
                    self.declarations[i][Self::side(direction.opposite())] =
                        WallDeclaration::Declared { present };
                }
            }
        }
    }

    pub fn declaration(&self, x: u32, y: u32, direction: Direction) -> WallDeclaration {
        self.idx(x, y)
            .map(|i| self.declarations[i][Self::side(direction)])
            .unwrap_or_default()
    }

    /// Judges a declaration against maze truth.
    pub fn classify(&self, x: u32, y: u32, direction: Direction, maze: &Maze) -> WallKnowledge {
        match self.declaration(x, y, direction) {
            WallDeclaration::Undeclared => WallKnowledge::Undeclared,
            WallDeclaration::Declared { present } => {
                if maze.has_wall(x, y, direction) == present {
                    WallKnowledge::Correct { present }
                } else {
                    WallKnowledge::Incorrect { declared: present }
                }
            }
        }
    }

    /// Sets a tile annotation, truncated to `max_len` characters.
    pub fn set_tile_text(&mut self, x: u32, y: u32, text: &str, max_len: usize) {
        if self.idx(x, y).is_none() {
            return;
        }
        let clamped: String = text.chars().take(max_len).collect();
        if clamped.is_empty() {
            self.tile_text.remove(&(x, y));
        } else {
            self.tile_text.insert((x, y), clamped);
        }
    }

    pub fn tile_text(&self, x: u32, y: u32) -> Option<&str> {
        self.tile_text.get(&(x, y)).map(String::as_str)
    }

    pub fn set_tile_color(&mut self, x: u32, y: u32, color: char) {
        if self.idx(x, y).is_some() {
            self.tile_color.insert((x, y), color);
        }
    }

    pub fn tile_color(&self, x: u32, y: u32) -> Option<char> {
        self.tile_color.get(&(x, y)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::test_mazes::open_maze;

    #[test]
    fn discovery_fires_once() {
        let mut fog = Knowledge::new(4, 4);
        assert!(fog.discover(1, 1));
        assert!(!fog.discover(1, 1));
        assert!(fog.is_discovered(1, 1));
        assert!(!fog.is_discovered(0, 0));
        assert_eq!(fog.discovered_count(), 1);
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut fog = Knowledge::new(2, 2);
        assert!(!fog.discover(5, 5));
        fog.declare_wall(5, 5, Direction::North, true, true);
        assert_eq!(fog.declaration(5, 5, Direction::North), WallDeclaration::Undeclared);
    }

    #[test]
    fn declaring_both_halves_mirrors_the_edge() {
        let mut fog = Knowledge::new(3, 3);
        fog.declare_wall(1, 1, Direction::North, true, true);
        assert_eq!(
            fog.declaration(1, 1, Direction::North),
            WallDeclaration::Declared { present: true }
        );
        assert_eq!(
            fog.declaration(1, 2, Direction::South),
            WallDeclaration::Declared { present: true }
        );
    }

    #[test]
    fn single_half_declaration_leaves_neighbor_untouched() {
        let mut fog = Knowledge::new(3, 3);
        fog.declare_wall(1, 1, Direction::East, false, false);
        assert_eq!(
            fog.declaration(1, 1, Direction::East),
            WallDeclaration::Declared { present: false }
        );
        assert_eq!(fog.declaration(2, 1, Direction::West), WallDeclaration::Undeclared);
    }

    #[test]
    fn classification_compares_against_truth() {
        let maze = Maze::parse(&open_maze(3, 3, &[(1, 1, Direction::North)])).unwrap();
        let mut fog = Knowledge::new(3, 3);

        assert_eq!(
            fog.classify(1, 1, Direction::North, &maze),
            WallKnowledge::Undeclared
        );

        fog.declare_wall(1, 1, Direction::North, true, false);
        assert_eq!(
            fog.classify(1, 1, Direction::North, &maze),
            WallKnowledge::Correct { present: true }
        );

        fog.declare_wall(1, 1, Direction::East, true, false);
        assert_eq!(
            fog.classify(1, 1, Direction::East, &maze),
            WallKnowledge::Incorrect { declared: true }
        );
    }

    #[test]
    fn tile_text_is_clamped_and_clearable() {
        let mut fog = Knowledge::new(2, 2);
        fog.set_tile_text(0, 1, "hello world", 5);
        assert_eq!(fog.tile_text(0, 1), Some("hello"));
        fog.set_tile_text(0, 1, "", 5);
        assert_eq!(fog.tile_text(0, 1), None);

        fog.set_tile_color(1, 1, 'r');
        assert_eq!(fog.tile_color(1, 1), Some('r'));
        fog.clear();
        assert_eq!(fog.tile_color(1, 1), None);
    }
}
