//! Point-to-point shortest paths over the live grid.
//!
//! [`search`] runs A* with a Manhattan heuristic on the 4-connected grid with
//! unit edge costs. A tile is impassable when its current type is `Empty` or
//! when the caller lists it in an [`Obstacles`] overlay. The overlay is how
//! rivals and contested bases are avoided without touching shared tile state.
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use crate::grid::GridIndex;
use crate::types::{Direction, Position};

/// Per-query set of tiles to treat as impassable on top of the grid.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Obstacles {
    blocked: BTreeSet<Position>,
}

impl Obstacles {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn block(&mut self, position: Position) {
        self.blocked.insert(position);
    }

    pub fn contains(&self, position: Position) -> bool {
        self.blocked.contains(&position)
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Position> + '_ {
        self.blocked.iter().copied()
    }
}

impl FromIterator<Position> for Obstacles {
    fn from_iter<I: IntoIterator<Item = Position>>(iter: I) -> Self {
        Self {
            blocked: iter.into_iter().collect(),
        }
    }
}

impl Extend<Position> for Obstacles {
    fn extend<I: IntoIterator<Item = Position>>(&mut self, iter: I) {
        self.blocked.extend(iter);
    }
}

/// Ordered tiles from `start` (excluded) to `goal` (included).
///
/// Empty when no path exists, when either endpoint is unknown or impassable,
/// or when `start == goal`. The overlay never blocks `start` itself, since
/// that is where the searching agent stands.
///
/// Among equal f-scores the node pushed first is expanded first, so results
/// are reproducible.
pub fn search(
    start: Position,
    goal: Position,
    grid: &GridIndex,
    obstacles: &Obstacles,
) -> Vec<Position> {
    let passable = |position: Position| grid.is_passable(position) && !obstacles.contains(position);

    if start == goal || !grid.is_passable(start) || !passable(goal) {
        return Vec::new();
    }

    let mut g_score: HashMap<Position, u32> = HashMap::from([(start, 0)]);
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut open: BinaryHeap<Reverse<(u32, u64, Position)>> = BinaryHeap::new();
    let mut sequence = 0_u64;
    open.push(Reverse((start.manhattan(goal), sequence, start)));

    while let Some(Reverse((_, _, current))) = open.pop() {
        if current == goal {
            return reconstruct(&came_from, start, goal);
        }

        let current_g = g_score[&current];
        for neighbour in current.neighbours() {
            if !passable(neighbour) {
                continue;
            }
            let tentative = current_g + 1;
            if g_score.get(&neighbour).is_some_and(|g| tentative >= *g) {
                continue;
            }
            g_score.insert(neighbour, tentative);
            came_from.insert(neighbour, current);
            sequence += 1;
            open.push(Reverse((
                tentative + neighbour.manhattan(goal),
                sequence,
                neighbour,
            )));
        }
    }

    Vec::new()
}

fn reconstruct(
    came_from: &HashMap<Position, Position>,
    start: Position,
    goal: Position,
) -> Vec<Position> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(previous) = came_from.get(&current) {
        if *previous == start {
            break;
        }
        path.push(*previous);
        current = *previous;
    }
    path.reverse();
    path
}

/// Single-step direction between two tiles; see [`Direction::between`].
pub fn direction(from: Position, to: Position) -> Option<Direction> {
    Direction::between(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::tests::grid_from_rows;

    #[test]
    fn routes_around_the_centre_hole() {
        let grid = grid_from_rows(&["...", ".#.", "..."]);
        let path = search(
            Position::new(0, 0),
            Position::new(2, 2),
            &grid,
            &Obstacles::none(),
        );
        assert_eq!(path.len(), 4);
        assert!(!path.contains(&Position::new(1, 1)));
        assert_eq!(path.last(), Some(&Position::new(2, 2)));

        let mut previous = Position::new(0, 0);
        for step in &path {
            assert!(previous.is_adjacent(*step));
            previous = *step;
        }
    }

    #[test]
    fn path_length_matches_distance_oracle() {
        let grid = grid_from_rows(&[
            "..#....", //
            ".##.##.", //
            "...#...", //
            "#.....#", //
            "..#.#..", //
        ]);
        let tiles: Vec<Position> = (0..7)
            .flat_map(|x| (0..5).map(move |y| Position::new(x, y)))
            .filter(|p| grid.is_passable(*p))
            .collect();

        for &a in &tiles {
            for &b in &tiles {
                let distance = grid.distance(a, b);
                let path = search(a, b, &grid, &Obstacles::none());
                if distance.is_finite() {
                    assert_eq!(path.len() as f64, distance, "{a} -> {b}");
                } else {
                    assert!(path.is_empty());
                }
            }
        }
    }

    #[test]
    fn overlay_blocks_without_mutating_grid() {
        let grid = grid_from_rows(&["...", "...", "..."]);
        let blocked: Obstacles = [Position::new(1, 0), Position::new(1, 1)].into_iter().collect();

        let path = search(Position::new(0, 0), Position::new(2, 0), &grid, &blocked);
        assert_eq!(path.len(), 6);
        assert!(path.iter().all(|p| !blocked.contains(*p)));
        assert!(grid.is_passable(Position::new(1, 0)));
    }

    #[test]
    fn unreachable_or_blocked_goal_yields_empty_path() {
        let grid = grid_from_rows(&[".#."]);
        let none = Obstacles::none();
        assert!(search(Position::new(0, 0), Position::new(2, 0), &grid, &none).is_empty());
        assert!(search(Position::new(0, 0), Position::new(1, 0), &grid, &none).is_empty());
        assert!(search(Position::new(0, 0), Position::new(9, 9), &grid, &none).is_empty());
        assert!(search(Position::new(0, 0), Position::new(0, 0), &grid, &none).is_empty());

        let open = grid_from_rows(&["..."]);
        let goal_blocked: Obstacles = [Position::new(2, 0)].into_iter().collect();
        assert!(search(Position::new(0, 0), Position::new(2, 0), &open, &goal_blocked).is_empty());
    }

    #[test]
    fn start_is_never_blocked_by_overlay() {
        let grid = grid_from_rows(&["..."]);
        let overlay: Obstacles = [Position::new(0, 0)].into_iter().collect();
        let path = search(Position::new(0, 0), Position::new(2, 0), &grid, &overlay);
        assert_eq!(path, vec![Position::new(1, 0), Position::new(2, 0)]);
    }

    #[test]
    fn direction_of_first_step() {
        let grid = grid_from_rows(&["...", "...", "..."]);
        let path = search(Position::new(1, 1), Position::new(1, 2), &grid, &Obstacles::none());
        assert_eq!(direction(Position::new(1, 1), path[0]), Some(Direction::Up));
    }
}
