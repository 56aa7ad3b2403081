//! Dense all-pairs shortest distances over passable tiles.
use std::collections::HashMap;

use crate::types::Position;

/// Floyd–Warshall result over the 4-connected passable subgraph.
///
/// Rows and columns follow the order tiles were handed to [`DistanceMatrix::compute`].
/// Unreachable pairs hold `f64::INFINITY`.
#[derive(Clone, Debug, Default)]
pub struct DistanceMatrix {
    index: HashMap<Position, usize>,
    cells: Vec<f64>,
}

impl DistanceMatrix {
    /// O(n³) in the number of passable tiles; run once per map, never per tick.
    pub fn compute(tiles: &[Position]) -> Self {
        let n = tiles.len();
        let index: HashMap<Position, usize> = tiles
            .iter()
            .enumerate()
            .map(|(i, position)| (*position, i))
            .collect();

        let mut cells = vec![f64::INFINITY; n * n];
        for (i, from) in tiles.iter().enumerate() {
            cells[i * n + i] = 0.0;
            for neighbour in from.neighbours() {
                if let Some(&j) = index.get(&neighbour) {
                    cells[i * n + j] = 1.0;
                }
            }
        }

        for k in 0..n {
            for i in 0..n {
                let via = cells[i * n + k];
                if via.is_infinite() {
                    continue;
                }
                for j in 0..n {
                    let candidate = via + cells[k * n + j];
                    if candidate < cells[i * n + j] {
                        cells[i * n + j] = candidate;
                    }
                }
            }
        }

        Self { index, cells }
    }

    pub fn get(&self, from: Position, to: Position) -> f64 {
        match (self.index.get(&from), self.index.get(&to)) {
            (Some(&i), Some(&j)) => self.cells[i * self.index.len() + j],
            _ => f64::INFINITY,
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        self.index.contains_key(&position)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corridor_distances() {
        let tiles: Vec<Position> = (0..4).map(|x| Position::new(x, 0)).collect();
        let matrix = DistanceMatrix::compute(&tiles);
        assert_eq!(matrix.get(Position::new(0, 0), Position::new(3, 0)), 3.0);
        assert_eq!(matrix.get(Position::new(2, 0), Position::new(2, 0)), 0.0);
        assert!(matrix.get(Position::new(0, 0), Position::new(9, 9)).is_infinite());
    }

    #[test]
    fn disconnected_islands_are_unreachable() {
        let tiles = [Position::new(0, 0), Position::new(2, 0)];
        let matrix = DistanceMatrix::compute(&tiles);
        assert!(matrix.get(tiles[0], tiles[1]).is_infinite());
    }
}
