//! Tile classification and the all-pairs distance oracle.
//!
//! [`GridIndex`] is the single owner of the map. It answers two different
//! questions that must not be confused:
//!
//! - *What is this tile right now?* ([`GridIndex::kind`]) is live and reflects
//!   every [`GridIndex::set_type`] call. The pathfinder reads this.
//! - *How far apart are two tiles?* ([`GridIndex::distance`]) comes from the
//!   matrix built by the last [`GridIndex::calculate_distances`] call and is
//!   deliberately blind to later type changes. Transient obstacles belong in a
//!   [`crate::path::Obstacles`] overlay, never in the matrix.
//!
//! Bases and spawn tiles are kept in coordinate order, so every scan over
//! them (nearest base, spawn sampling, clustering) is reproducible.
mod distances;
mod partition;

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::SliceRandom;

pub use distances::DistanceMatrix;

use crate::config::{AgentTuning, ServerConfig};
use crate::payload::TileUpdate;
use crate::types::{AgentId, Position, TileKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("map size has not been received yet")]
    NotSized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Default)]
pub struct GridIndex {
    size: Option<MapSize>,
    tiles: BTreeMap<Position, TileKind>,
    bases: BTreeSet<Position>,
    spawns: BTreeSet<Position>,
    /// Cluster owner per spawn tile; survives temporary type changes.
    assignments: BTreeMap<Position, AgentId>,
    distances: DistanceMatrix,
    spawn_sparse: bool,
}

impl GridIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = Some(MapSize { width, height });
    }

    pub fn size(&self) -> Option<MapSize> {
        self.size
    }

    /// True once the map has been sized and the distance oracle built.
    pub fn is_ready(&self) -> bool {
        self.size.is_some() && !self.distances.is_empty()
    }

    /// Sizes the grid, inserts every tile and builds the distance oracle.
    pub fn load_map(
        &mut self,
        width: u32,
        height: u32,
        tiles: impl IntoIterator<Item = TileUpdate>,
    ) -> Result<(), GridError> {
        self.set_size(width, height);
        for tile in tiles {
            self.add_tile(tile.position(), tile.kind);
        }
        self.calculate_distances()
    }

    /// Inserts or overwrites a tile, keeping base/spawn membership in sync.
    pub fn add_tile(&mut self, position: Position, kind: TileKind) {
        self.set_type(position, kind);
    }

    /// Changes a tile's live type and returns the previous one (`Empty` if unknown).
    ///
    /// The distance matrix is left untouched: callers restoring the old type
    /// get back exactly the state they started from.
    pub fn set_type(&mut self, position: Position, kind: TileKind) -> TileKind {
        let previous = self
            .tiles
            .insert(position, kind)
            .unwrap_or(TileKind::Empty);

        match kind {
            TileKind::Base => {
                self.bases.insert(position);
            }
            _ => {
                self.bases.remove(&position);
            }
        }
        match kind {
            TileKind::Spawn => {
                self.spawns.insert(position);
            }
            _ => {
                self.spawns.remove(&position);
            }
        }

        previous
    }

    pub fn kind(&self, position: Position) -> Option<TileKind> {
        self.tiles.get(&position).copied()
    }

    /// Live passability: known and not `Empty`.
    pub fn is_passable(&self, position: Position) -> bool {
        self.kind(position).is_some_and(TileKind::is_passable)
    }

    pub fn bases(&self) -> impl Iterator<Item = Position> + '_ {
        self.bases.iter().copied()
    }

    pub fn spawns(&self) -> impl Iterator<Item = Position> + '_ {
        self.spawns.iter().copied()
    }

    pub fn is_base(&self, position: Position) -> bool {
        self.bases.contains(&position)
    }

    pub fn is_spawn(&self, position: Position) -> bool {
        self.spawns.contains(&position)
    }

    /// Rebuilds the distance oracle from the current passable tiles.
    pub fn calculate_distances(&mut self) -> Result<(), GridError> {
        if self.size.is_none() {
            return Err(GridError::NotSized);
        }

        let passable: Vec<Position> = self
            .tiles
            .iter()
            .filter(|(_, kind)| kind.is_passable())
            .map(|(position, _)| *position)
            .collect();
        self.distances = DistanceMatrix::compute(&passable);

        tracing::debug!(tiles = passable.len(), "distance oracle rebuilt");
        Ok(())
    }

    /// Shortest walking distance as of the last [`Self::calculate_distances`].
    ///
    /// `f64::INFINITY` when either tile was absent or `Empty` at build time.
    pub fn distance(&self, from: Position, to: Position) -> f64 {
        self.distances.get(from, to)
    }

    /// Closest reachable base; exact ties go to the lowest `(x, y)`.
    pub fn nearest_base(&self, from: Position) -> Option<(Position, f64)> {
        self.nearest_base_excluding(from, &BTreeSet::new())
    }

    /// [`Self::nearest_base`] ignoring the bases in `excluded`.
    pub fn nearest_base_excluding(
        &self,
        from: Position,
        excluded: &BTreeSet<Position>,
    ) -> Option<(Position, f64)> {
        let mut best: Option<(Position, f64)> = None;
        for base in self.bases.iter().filter(|base| !excluded.contains(base)) {
            let distance = self.distance(from, *base);
            let current = best.map_or(f64::INFINITY, |(_, d)| d);
            if distance < current {
                best = Some((*base, distance));
            }
        }
        best
    }

    /// Passable 4-neighbours in [`crate::types::Direction::ALL`] order.
    pub fn walkable_neighbours(&self, position: Position) -> Vec<Position> {
        position
            .neighbours()
            .into_iter()
            .filter(|neighbour| self.is_passable(*neighbour))
            .collect()
    }

    /// Decides whether spawns are scarce enough that camping beats wandering.
    pub fn calculate_sparseness(&mut self, config: &ServerConfig, tuning: &AgentTuning) -> bool {
        let non_empty = self.tiles.values().filter(|kind| kind.is_passable()).count();
        let spawn_count = self.spawns.len() as f64;

        let density = if non_empty == 0 {
            f64::INFINITY
        } else {
            spawn_count / non_empty as f64
        };
        let per_parcel = if config.parcels_max == 0 {
            f64::INFINITY
        } else {
            spawn_count / f64::from(config.parcels_max)
        };

        self.spawn_sparse =
            density < tuning.max_green_cell_ratio && per_parcel < tuning.max_spawn_ratio;
        tracing::debug!(density, per_parcel, sparse = self.spawn_sparse, "spawn sparseness");
        self.spawn_sparse
    }

    pub fn is_spawn_sparse(&self) -> bool {
        self.spawn_sparse
    }

    pub fn spawn_assignment(&self, position: Position) -> Option<&AgentId> {
        self.assignments.get(&position)
    }

    /// Clears every cluster assignment; any agent may then use any spawn tile.
    pub fn reset_partition(&mut self) {
        self.assignments.clear();
    }

    /// Picks an exploration target for `agent`.
    ///
    /// Candidates are the spawn tiles assigned to `agent`, or every spawn tile
    /// when nothing is assigned to it. Tiles reachable from `from` and other
    /// than `from` itself are preferred. `None` when the map has no spawns.
    pub fn random_spawn_tile<R: Rng + ?Sized>(
        &self,
        agent: Option<&AgentId>,
        from: Position,
        rng: &mut R,
    ) -> Option<Position> {
        let assigned: Vec<Position> = match agent {
            Some(agent) => self
                .spawns
                .iter()
                .copied()
                .filter(|spawn| self.assignments.get(spawn) == Some(agent))
                .collect(),
            None => Vec::new(),
        };
        let pool: Vec<Position> = if assigned.is_empty() {
            self.spawns.iter().copied().collect()
        } else {
            assigned
        };

        let reachable: Vec<Position> = pool
            .iter()
            .copied()
            .filter(|spawn| self.distance(from, *spawn).is_finite())
            .collect();
        let pool = if reachable.is_empty() { pool } else { reachable };

        let elsewhere: Vec<Position> = pool.iter().copied().filter(|s| *s != from).collect();
        if elsewhere.is_empty() {
            pool.choose(rng).copied()
        } else {
            elsewhere.choose(rng).copied()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    /// Builds a grid from rows written top-down (`rows[0]` is the highest `y`).
    ///
    /// `.` walkable, `#` empty, `B` base, `S` spawn.
    pub(crate) fn grid_from_rows(rows: &[&str]) -> GridIndex {
        let height = rows.len() as i32;
        let width = rows.first().map_or(0, |row| row.len()) as i32;
        let mut tiles = Vec::new();
        for (row_index, row) in rows.iter().enumerate() {
            let y = height - 1 - row_index as i32;
            for (x, symbol) in row.chars().enumerate() {
                let kind = match symbol {
                    '#' => TileKind::Empty,
                    'B' => TileKind::Base,
                    'S' => TileKind::Spawn,
                    _ => TileKind::Walkable,
                };
                tiles.push(TileUpdate::new(x as i32, y, kind));
            }
        }
        let mut grid = GridIndex::new();
        grid.load_map(width as u32, height as u32, tiles)
            .expect("sized map");
        grid
    }

    #[test]
    fn distances_are_symmetric_and_satisfy_triangle_inequality() {
        let grid = grid_from_rows(&[
            "..#..", //
            ".##.B", //
            "S....", //
            "#..#.", //
        ]);
        let tiles: Vec<Position> = grid
            .tiles
            .iter()
            .filter(|(_, kind)| kind.is_passable())
            .map(|(position, _)| *position)
            .collect();

        for &a in &tiles {
            for &b in &tiles {
                let ab = grid.distance(a, b);
                assert_eq!(ab, grid.distance(b, a), "asymmetric {a} {b}");
                if ab.is_infinite() {
                    continue;
                }
                for &c in &tiles {
                    let via = grid.distance(a, c) + grid.distance(c, b);
                    assert!(ab <= via, "triangle violated {a} {b} via {c}");
                }
            }
        }
    }

    #[test]
    fn unknown_or_empty_tiles_are_infinitely_far() {
        let grid = grid_from_rows(&[".#."]);
        assert!(grid.distance(Position::new(0, 0), Position::new(1, 0)).is_infinite());
        assert!(grid.distance(Position::new(0, 0), Position::new(7, 7)).is_infinite());
        assert!(grid.distance(Position::new(0, 0), Position::new(2, 0)).is_infinite());
    }

    #[test]
    fn set_type_round_trip_leaves_oracle_untouched() {
        let mut grid = grid_from_rows(&["B..", "...", "..S"]);
        let tile = Position::new(1, 1);
        let before = grid.distance(Position::new(0, 0), Position::new(2, 2));

        let old = grid.set_type(tile, TileKind::Empty);
        assert_eq!(old, TileKind::Walkable);
        assert!(!grid.is_passable(tile));
        assert_eq!(grid.distance(Position::new(0, 0), Position::new(2, 2)), before);

        let blanked = grid.set_type(tile, old);
        assert_eq!(blanked, TileKind::Empty);
        assert_eq!(grid.kind(tile), Some(TileKind::Walkable));
        assert_eq!(grid.distance(Position::new(0, 0), Position::new(2, 2)), before);
    }

    #[test]
    fn set_type_keeps_membership_in_sync() {
        let mut grid = grid_from_rows(&["B.S"]);
        let base = Position::new(0, 0);
        assert!(grid.is_base(base));

        let old = grid.set_type(base, TileKind::Empty);
        assert!(!grid.is_base(base));
        grid.set_type(base, old);
        assert!(grid.is_base(base));

        grid.set_type(Position::new(2, 0), TileKind::Walkable);
        assert_eq!(grid.spawns().count(), 0);
    }

    #[test]
    fn nearest_base_ties_go_to_lowest_coordinate() {
        let grid = grid_from_rows(&["B...B"]);
        let (base, distance) = grid.nearest_base(Position::new(2, 0)).expect("base");
        assert_eq!(base, Position::new(0, 0));
        assert_eq!(distance, 2.0);

        let excluded = BTreeSet::from([Position::new(0, 0)]);
        let (other, _) = grid
            .nearest_base_excluding(Position::new(2, 0), &excluded)
            .expect("other base");
        assert_eq!(other, Position::new(4, 0));
    }

    #[test]
    fn calculate_distances_requires_size() {
        let mut grid = GridIndex::new();
        grid.add_tile(Position::ORIGIN, TileKind::Walkable);
        assert_eq!(grid.calculate_distances(), Err(GridError::NotSized));
    }

    #[test]
    fn sparseness_needs_both_ratios_low() {
        let mut grid = grid_from_rows(&["S.........", "..........", "B........."]);
        let tuning = AgentTuning::default();

        let few_parcels = ServerConfig {
            parcels_max: 1,
            ..ServerConfig::default()
        };
        assert!(grid.calculate_sparseness(&few_parcels, &tuning));

        let mut dense = grid_from_rows(&["SSS", "S.S", "BSS"]);
        assert!(!dense.calculate_sparseness(&few_parcels, &tuning));
    }

    #[test]
    fn random_spawn_prefers_other_reachable_tiles() {
        let grid = grid_from_rows(&["S.S#S"]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let pick = grid
                .random_spawn_tile(None, Position::new(0, 0), &mut rng)
                .expect("spawn");
            assert_eq!(pick, Position::new(2, 0));
        }
    }
}
