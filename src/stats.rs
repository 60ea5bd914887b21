//! Run statistics.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

/// Traversal and scoring state for one run. The crashed flag is terminal:
/// once set it survives until the next fresh run.
#[derive(Debug, Clone)]
pub struct RunStats {
    traversed: HashSet<(u32, u32)>,
    best_time_to_center: Option<f64>,
    last_time_to_center: Option<f64>,
    closest_distance_to_center: Option<u32>,
    time_of_origin_departure: Option<f64>,
    crashed: bool,
    in_center: bool,
}

impl RunStats {
    pub fn new() -> RunStats {
        RunStats {
            traversed: HashSet::new(),
            best_time_to_center: None,
            last_time_to_center: None,
            closest_distance_to_center: None,
            time_of_origin_departure: None,
            crashed: false,
            in_center: false,
        }
    }

    /// Records the discretized position for one tick.
    ///
    /// `sim_time` is seconds of simulated time; `distance` is the tile's BFS
    /// distance; `is_center` marks the goal region. Center timing measures
    /// from the moment the mouse first left the start tile.
    pub fn record_position(
        &mut self,
        tile: (u32, u32),
        sim_time: f64,
        distance: Option<u32>,
        is_center: bool,
    ) {
        let _ = self.traversed.insert(tile);

        if self.time_of_origin_departure.is_none() && tile != (0, 0) {
            self.time_of_origin_departure = Some(sim_time);
        }

        if let Some(d) = distance {
            self.closest_distance_to_center = Some(
                self.closest_distance_to_center
                    .map_or(d, |best| best.min(d)),
            );
        }

        if is_center && !self.in_center {
            if let Some(departed) = self.time_of_origin_departure {
                let elapsed = sim_time - departed;
                self.last_time_to_center = Some(elapsed);
                self.best_time_to_center = Some(
                    self.best_time_to_center
                        .map_or(elapsed, |best| best.min(elapsed)),
                );
            }
        }
        self.in_center = is_center;
    }

    pub fn set_crashed(&mut self) {
        self.crashed = true;
    }

    pub fn crashed(&self) -> bool {
        self.crashed
    }

    pub fn traversed(&self) -> &HashSet<(u32, u32)> {
        &self.traversed
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            traversed_tiles: self.traversed.len(),
            best_time_to_center: self.best_time_to_center,
            last_time_to_center: self.last_time_to_center,
            closest_distance_to_center: self.closest_distance_to_center,
            time_of_origin_departure: self.time_of_origin_departure,
            crashed: self.crashed,
        }
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable summary published with each simulation snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub traversed_tiles: usize,
    pub best_time_to_center: Option<f64>,
    pub last_time_to_center: Option<f64>,
    pub closest_distance_to_center: Option<u32>,
    pub time_of_origin_departure: Option<f64>,
    pub crashed: bool,
}
