//! Economic utility of candidate goals.
//!
//! Every computed score is "reward still in hand when it reaches a base":
//! the value carried plus the value picked up, minus the decay paid on each
//! parcel for every tile walked. The per-tile decay is
//! [`ServerConfig::step_cost`], i.e. `(clock_ms / 1000) / decay_interval`.
//!
//! Coordination and opportunistic actions use fixed sentinel scores above any
//! value a real parcel can produce:
//!
//! | sentinel | meaning |
//! |---|---|
//! | [`DEPOSIT_INSTANTLY`] | carrying while standing on a base |
//! | [`FREE_MATE`] | teammate asked us to step aside |
//! | [`EXCHANGE_PARCELS`] | hand carried parcels to an adjacent teammate |
//! | [`PICKUP_NEAR_PARCEL`] | a parcel lies on our own tile |
use courier_core::ServerConfig;

/// Largest integer an `f64` represents exactly; sentinels count down from it.
const SENTINEL_CEILING: f64 = 9_007_199_254_740_991.0;

pub const DEPOSIT_INSTANTLY: f64 = SENTINEL_CEILING;
pub const FREE_MATE: f64 = SENTINEL_CEILING - 1.0;
pub const EXCHANGE_PARCELS: f64 = SENTINEL_CEILING - 2.0;
pub const PICKUP_NEAR_PARCEL: f64 = SENTINEL_CEILING - 3.0;

/// True for scores reserved for the priority band above computed scores.
pub fn is_sentinel(score: f64) -> bool {
    score >= PICKUP_NEAR_PARCEL
}

/// Value and count of what an agent is carrying.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Load {
    pub value: f64,
    pub count: usize,
}

impl Load {
    pub fn new(value: f64, count: usize) -> Self {
        Self { value, count }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl From<(f64, usize)> for Load {
    fn from((value, count): (f64, usize)) -> Self {
        Self { value, count }
    }
}

fn travel_cost(distance: f64, parcels: usize, config: &ServerConfig) -> f64 {
    let step_cost = config.step_cost();
    if step_cost == 0.0 || parcels == 0 {
        return 0.0;
    }
    distance * parcels as f64 * step_cost
}

/// Score of fetching `quantity` parcels worth `reward` at `distance`, then
/// walking `base_distance` to deliver them with everything already carried.
///
/// A missing base distance counts as zero.
pub fn pickup_score(
    distance: f64,
    load: Load,
    reward: f64,
    quantity: usize,
    base_distance: Option<f64>,
    config: &ServerConfig,
) -> f64 {
    let total_reward = load.value + reward;
    let total_distance = distance + base_distance.unwrap_or(0.0);
    let total_parcels = load.count + quantity;
    total_reward - travel_cost(total_distance, total_parcels, config)
}

/// Score of delivering the current load at a base `distance` away.
///
/// Standing on the base short-circuits to [`DEPOSIT_INSTANTLY`].
pub fn deposit_score(distance: f64, load: Load, config: &ServerConfig) -> f64 {
    if distance == 0.0 {
        return DEPOSIT_INSTANTLY;
    }
    load.value - travel_cost(distance, load.count, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            decay_interval: 1.0,
            clock_ms: 100,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn single_parcel_pickup_score() {
        let score = pickup_score(5.0, Load::default(), 10.0, 1, Some(2.0), &config());
        assert!((score - 9.3).abs() < 1e-9, "score {score}");
    }

    #[test]
    fn pickup_score_never_rises_with_distance() {
        let cfg = config();
        let load = Load::new(4.0, 2);
        let mut previous = f64::INFINITY;
        for distance in 0..20 {
            let score = pickup_score(f64::from(distance), load, 10.0, 1, Some(3.0), &cfg);
            assert!(score <= previous);
            previous = score;
        }
        let mut previous = f64::INFINITY;
        for base in 0..20 {
            let score = pickup_score(4.0, load, 10.0, 1, Some(f64::from(base)), &cfg);
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn deposit_on_base_is_sentinel() {
        let load = Load::new(12.0, 3);
        assert_eq!(deposit_score(0.0, load, &config()), DEPOSIT_INSTANTLY);
        let away = deposit_score(4.0, load, &config());
        assert!((away - (12.0 - 4.0 * 3.0 * 0.1)).abs() < 1e-9);
        assert!(!is_sentinel(away));
    }

    #[test]
    fn sentinels_are_strictly_ordered() {
        assert!(DEPOSIT_INSTANTLY > FREE_MATE);
        assert!(FREE_MATE > EXCHANGE_PARCELS);
        assert!(EXCHANGE_PARCELS > PICKUP_NEAR_PARCEL);
        assert!(is_sentinel(PICKUP_NEAR_PARCEL));
    }

    #[test]
    fn without_decay_distance_is_free() {
        let cfg = ServerConfig::default();
        let score = pickup_score(50.0, Load::default(), 7.0, 1, None, &cfg);
        assert_eq!(score, 7.0);
    }
}
