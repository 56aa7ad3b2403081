//! Path following, collision waits and base selection.
use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use tokio::time::Instant;
use tracing::{debug, warn};

use courier_core::{Direction, Obstacles, Position, search};

use super::Agent;
use crate::beliefs::{Beliefs, SelfState};

/// Path being followed towards the current intention's target.
#[derive(Clone, Debug, Default)]
pub(super) struct Route {
    steps: Vec<Position>,
    cursor: usize,
}

impl Route {
    pub(super) fn new(steps: Vec<Position>) -> Self {
        Self { steps, cursor: 0 }
    }

    pub(super) fn clear(&mut self) {
        self.steps.clear();
        self.cursor = 0;
    }

    fn peek(&self) -> Option<Position> {
        self.steps.get(self.cursor).copied()
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    /// True when the next step starts from `here`.
    fn continues_from(&self, here: Position) -> bool {
        self.peek().is_some_and(|next| next.is_adjacent(here))
    }

    fn ends_at(&self, goal: Position) -> bool {
        self.steps.last() == Some(&goal)
    }
}

/// Camping state on sparse-spawn maps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(super) enum Camp {
    #[default]
    Roaming,
    Camping { tile: Position, since: Instant },
    /// A session on `tile` ran out; do not camp there again straight away.
    Done { tile: Position },
}

/// Result of trying to make one step of progress towards a goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Walk {
    Arrived,
    Step { direction: Direction, arrives: bool },
    /// A rival stands on the next tile; hold position this tick.
    Wait,
    /// A rival kept the next tile occupied past the collision timeout.
    Collided,
    Unreachable,
}

impl Agent {
    /// Tiles we must not step on: visible rivals and the teammate.
    pub(super) fn occupied(&self, beliefs: &Beliefs) -> Obstacles {
        let mut occupied: Obstacles = beliefs.visible_rival_tiles(self.slot).into_iter().collect();
        if let Some(mate) = self.mate(beliefs) {
            occupied.block(mate.tile());
        }
        occupied
    }

    pub(super) fn fresh_path(&self, beliefs: &Beliefs, from: Position, goal: Position) -> Vec<Position> {
        search(from, goal, &beliefs.grid, &self.occupied(beliefs))
    }

    /// Advances one step along the route to `goal`, computing a new route
    /// when `fresh` is set or the current one no longer fits.
    pub(super) fn walk(
        &mut self,
        beliefs: &Beliefs,
        me: &SelfState,
        goal: Position,
        fresh: bool,
        now: Instant,
    ) -> Walk {
        let here = me.tile();
        if here == goal {
            self.route.clear();
            return Walk::Arrived;
        }

        if fresh || !self.route.continues_from(here) || !self.route.ends_at(goal) {
            let path = self.fresh_path(beliefs, here, goal);
            if path.is_empty() {
                self.route.clear();
                return Walk::Unreachable;
            }
            self.route = Route::new(path);
        }

        let Some(next) = self.route.peek() else {
            return Walk::Unreachable;
        };

        if self.occupied(beliefs).contains(next) {
            let since = *self.colliding_since.get_or_insert(now);
            if now.duration_since(since) > beliefs.tuning.agent_collision_time {
                debug!(slot = %self.slot, tile = %next, "path still blocked, rerouting");
                self.colliding_since = None;
                return Walk::Collided;
            }
            return Walk::Wait;
        }
        self.colliding_since = None;

        let Some(direction) = Direction::between(here, next) else {
            self.route.clear();
            return Walk::Unreachable;
        };
        self.route.advance();
        Walk::Step {
            direction,
            arrives: next == goal,
        }
    }

    /// Nearest usable base and a path to it.
    ///
    /// Bases with no path are blacklisted for the base removal time and the
    /// next nearest is tried, up to `base_switch_max_tries / base_tries`
    /// switches.
    pub(super) fn base_path(
        &mut self,
        beliefs: &Beliefs,
        from: Position,
        now: Instant,
    ) -> Option<(Position, Vec<Position>)> {
        let tuning = &beliefs.tuning;
        let switches = tuning.base_switch_max_tries / tuning.base_tries.max(1);

        for _ in 0..=switches {
            let excluded: BTreeSet<Position> = self.blocked_bases.keys().copied().collect();
            let (base, _) = beliefs.grid.nearest_base_excluding(from, &excluded)?;
            let path = self.fresh_path(beliefs, from, base);
            if !path.is_empty() {
                return Some((base, path));
            }
            self.block_base(base, beliefs, now);
        }
        None
    }

    pub(super) fn block_base(&mut self, base: Position, beliefs: &Beliefs, now: Instant) {
        warn!(slot = %self.slot, %base, "base unreachable, blacklisting for a while");
        self.blocked_bases
            .insert(base, now + beliefs.tuning.base_removal_time);
        if self.deposit_base == Some(base) {
            self.deposit_base = None;
        }
    }

    /// Up to `go_away_moves` greedy steps, each to the free neighbour
    /// furthest (Manhattan) from the teammate. First maximum wins ties.
    pub(super) fn go_away_steps(
        &self,
        beliefs: &Beliefs,
        from: Position,
        mate: Position,
    ) -> Vec<Direction> {
        let occupied = self.occupied(beliefs);
        let mut visited = BTreeSet::from([from]);
        let mut here = from;
        let mut steps = Vec::new();

        for _ in 0..beliefs.tuning.go_away_moves {
            let mut best: Option<(Position, u32)> = None;
            for neighbour in beliefs.grid.walkable_neighbours(here) {
                if neighbour == mate || occupied.contains(neighbour) || visited.contains(&neighbour)
                {
                    continue;
                }
                let distance = neighbour.manhattan(mate);
                if best.is_none_or(|(_, current)| distance > current) {
                    best = Some((neighbour, distance));
                }
            }
            let Some((next, _)) = best else {
                break;
            };
            let Some(direction) = Direction::between(here, next) else {
                break;
            };
            steps.push(direction);
            visited.insert(next);
            here = next;
        }
        steps
    }

    /// A random free neighbour direction, used to jitter while camping.
    pub(super) fn jitter_direction(&mut self, beliefs: &Beliefs, from: Position) -> Option<Direction> {
        let occupied = self.occupied(beliefs);
        let free: Vec<Position> = beliefs
            .grid
            .walkable_neighbours(from)
            .into_iter()
            .filter(|tile| !occupied.contains(*tile))
            .collect();
        let target = free.choose(&mut self.rng)?;
        Direction::between(from, *target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_follows_cursor() {
        let mut route = Route::new(vec![Position::new(1, 0), Position::new(2, 0)]);
        assert!(route.continues_from(Position::new(0, 0)));
        assert!(route.ends_at(Position::new(2, 0)));
        route.advance();
        assert!(!route.continues_from(Position::new(0, 0)));
        assert!(route.continues_from(Position::new(1, 0)));
        route.advance();
        assert_eq!(route.peek(), None);
        route.clear();
        assert!(!route.ends_at(Position::new(2, 0)));
    }
}
