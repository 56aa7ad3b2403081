//! Spawn-tile clustering between cooperating agents.
//!
//! Lloyd's algorithm over spawn coordinates with Euclidean distance. Initial
//! centroids are drawn uniformly from the spawns' bounding box, so a run can
//! end with an empty cluster; [`GridIndex::partition_spawns`] re-seeds a
//! bounded number of times before falling back to a shared pool.
use rand::Rng;

use super::GridIndex;
use crate::config::AgentTuning;
use crate::types::{AgentId, Position};

type Point = (f64, f64);

fn to_point(position: Position) -> Point {
    (f64::from(position.x), f64::from(position.y))
}

fn squared_distance(a: Point, b: Point) -> f64 {
    (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)
}

/// Index of the closest centroid; ties keep the lower index.
fn closest(point: Point, centroids: &[Point]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, *centroid);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

impl GridIndex {
    /// One clustering attempt assigning every spawn tile to one of `agents`.
    ///
    /// Stops when no centroid moves by `epsilon` or more, or after
    /// `max_iterations`. Returns `true` and records the assignment only when
    /// every agent received at least one spawn tile.
    pub fn k_means<R: Rng + ?Sized>(
        &mut self,
        agents: &[AgentId],
        max_iterations: usize,
        epsilon: f64,
        rng: &mut R,
    ) -> bool {
        let k = agents.len();
        let points: Vec<Point> = self.spawns.iter().copied().map(to_point).collect();
        if k == 0 || points.len() < k {
            return false;
        }

        let (min_x, max_x) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.0), hi.max(p.0))
            });
        let (min_y, max_y) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.1), hi.max(p.1))
            });

        let mut centroids: Vec<Point> = (0..k)
            .map(|_| (rng.gen_range(min_x..=max_x), rng.gen_range(min_y..=max_y)))
            .collect();

        for iteration in 0..max_iterations {
            let labels: Vec<usize> = points.iter().map(|p| closest(*p, &centroids)).collect();

            let mut shift = 0.0_f64;
            for (cluster, centroid) in centroids.iter_mut().enumerate() {
                let members: Vec<Point> = points
                    .iter()
                    .zip(&labels)
                    .filter(|(_, label)| **label == cluster)
                    .map(|(point, _)| *point)
                    .collect();
                if members.is_empty() {
                    continue;
                }
                let count = members.len() as f64;
                let mean = (
                    members.iter().map(|p| p.0).sum::<f64>() / count,
                    members.iter().map(|p| p.1).sum::<f64>() / count,
                );
                shift = shift.max(squared_distance(*centroid, mean).sqrt());
                *centroid = mean;
            }

            if shift < epsilon {
                tracing::trace!(iteration, "k-means converged");
                break;
            }
        }

        let labels: Vec<usize> = points.iter().map(|p| closest(*p, &centroids)).collect();
        let mut counts = vec![0usize; k];
        for label in &labels {
            counts[*label] += 1;
        }
        if counts.contains(&0) {
            return false;
        }

        self.assignments = self
            .spawns
            .iter()
            .zip(&labels)
            .map(|(spawn, label)| (*spawn, agents[*label].clone()))
            .collect();
        true
    }

    /// Partitions spawn tiles among `agents`, re-seeding up to
    /// `tuning.kmeans_max_tries` times. Clears every assignment and returns
    /// `false` if no attempt gave each agent a non-empty cluster.
    pub fn partition_spawns<R: Rng + ?Sized>(
        &mut self,
        agents: &[AgentId],
        tuning: &AgentTuning,
        rng: &mut R,
    ) -> bool {
        for attempt in 1..=tuning.kmeans_max_tries {
            if self.k_means(
                agents,
                tuning.kmeans_max_iterations,
                tuning.kmeans_epsilon,
                rng,
            ) {
                tracing::info!(attempt, agents = agents.len(), "spawn tiles partitioned");
                return true;
            }
            tracing::debug!(attempt, "k-means left a cluster empty, re-seeding");
        }

        self.reset_partition();
        tracing::warn!("spawn partition failed, sharing all spawn tiles");
        false
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::grid::tests::grid_from_rows;

    fn agents() -> [AgentId; 2] {
        [AgentId::from("left"), AgentId::from("right")]
    }

    #[test]
    fn separable_spawns_split_or_fall_back() {
        let rows = ["SS......SS", "SS......SS", ".........."];
        let tuning = AgentTuning::default();

        for seed in 0..16 {
            let mut grid = grid_from_rows(&rows);
            let mut rng = StdRng::seed_from_u64(seed);
            let agents = agents();
            let split = grid.partition_spawns(&agents, &tuning, &mut rng);

            let owners: Vec<Option<&AgentId>> =
                grid.spawns().map(|s| grid.spawn_assignment(s)).collect();
            if split {
                for agent in &agents {
                    assert!(owners.contains(&Some(agent)), "seed {seed}: {agent} empty");
                }
            } else {
                assert!(owners.iter().all(Option::is_none), "seed {seed}: stale owners");
            }
        }
    }

    #[test]
    fn too_few_spawns_never_assign() {
        let mut grid = grid_from_rows(&["S...."]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!grid.partition_spawns(&agents(), &AgentTuning::default(), &mut rng));
        assert!(grid.spawn_assignment(Position::ORIGIN).is_none());
    }

    #[test]
    fn clusters_follow_the_gap_and_bound_sampling() {
        let mut grid = grid_from_rows(&["SS......SS"]);
        let mut rng = StdRng::seed_from_u64(3);
        let agents = agents();
        assert!(grid.partition_spawns(&agents, &AgentTuning::default(), &mut rng));
        let owner = grid.spawn_assignment(Position::new(0, 0)).cloned();
        assert_eq!(grid.spawn_assignment(Position::new(1, 0)).cloned(), owner);
        assert_ne!(grid.spawn_assignment(Position::new(9, 0)).cloned(), owner);
        for _ in 0..10 {
            let pick = grid
                .random_spawn_tile(owner.as_ref(), Position::new(5, 0), &mut rng)
                .expect("spawn");
            assert_eq!(grid.spawn_assignment(pick).cloned(), owner);
        }
    }
}
