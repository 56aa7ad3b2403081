//! Server-supplied game configuration and the agent's own tuning constants.
use std::time::Duration;

/// Game configuration delivered by the environment on connect.
///
/// Read-only to the decision engine; it feeds the scoring time-cost and the
/// visibility radii. Field names on the wire are the server's upper-case keys.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ServerConfig {
    #[cfg_attr(feature = "serde", serde(rename = "PARCELS_MAX"))]
    pub parcels_max: u32,
    #[cfg_attr(feature = "serde", serde(rename = "PARCEL_REWARD_AVG"))]
    pub parcel_reward_avg: f64,
    /// Seconds for a parcel to lose one reward point. `f64::INFINITY` disables decay.
    #[cfg_attr(
        feature = "serde",
        serde(
            rename = "PARCEL_DECADING_INTERVAL",
            deserialize_with = "decay_interval::deserialize"
        )
    )]
    pub decay_interval: f64,
    /// Tick interval in milliseconds.
    #[cfg_attr(feature = "serde", serde(rename = "CLOCK"))]
    pub clock_ms: u64,
    #[cfg_attr(feature = "serde", serde(rename = "AGENTS_OBSERVATION_DISTANCE"))]
    pub agents_obs_distance: u32,
    #[cfg_attr(feature = "serde", serde(rename = "PARCELS_OBSERVATION_DISTANCE"))]
    pub parcels_obs_distance: u32,
}

impl ServerConfig {
    pub const DEFAULT_CLOCK_MS: u64 = 100;

    pub fn clock(&self) -> Duration {
        Duration::from_millis(self.clock_ms)
    }

    pub fn clock_seconds(&self) -> f64 {
        self.clock_ms as f64 / 1000.0
    }

    pub fn decays(&self) -> bool {
        self.decay_interval.is_finite() && self.decay_interval > 0.0
    }

    /// Reward lost per parcel per tile walked: `(clock / 1000) / decay_interval`.
    pub fn step_cost(&self) -> f64 {
        if self.decays() {
            self.clock_seconds() / self.decay_interval
        } else {
            0.0
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            parcels_max: 0,
            parcel_reward_avg: 0.0,
            decay_interval: f64::INFINITY,
            clock_ms: Self::DEFAULT_CLOCK_MS,
            agents_obs_distance: 0,
            parcels_obs_distance: 0,
        }
    }
}

/// Parses the server's decay interval, which arrives as a number of seconds or
/// as text such as `"1s"` or `"infinite"`.
///
/// Leading digits are taken as seconds; anything without them, or zero,
/// disables decay.
pub fn parse_decay_interval(raw: &str) -> f64 {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u64>() {
        Ok(seconds) if seconds > 0 => seconds as f64,
        _ => f64::INFINITY,
    }
}

#[cfg(feature = "serde")]
mod decay_interval {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(seconds) if seconds > 0.0 => seconds.trunc(),
            Raw::Number(_) => f64::INFINITY,
            Raw::Text(text) => super::parse_decay_interval(&text),
        })
    }
}

/// Tunable constants of the decision engine.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentTuning {
    /// Spawn tiles / non-empty tiles below this marks spawns as sparse.
    pub max_green_cell_ratio: f64,
    /// Spawn tiles / max parcels below this marks spawns as sparse.
    pub max_spawn_ratio: f64,
    pub kmeans_max_tries: usize,
    pub kmeans_max_iterations: usize,
    pub kmeans_epsilon: f64,
    /// Whether two cooperating agents split spawn tiles between them.
    pub use_map_division: bool,
    /// λ in `exp(-λ · seconds_unseen · agents)`.
    pub parcel_survival_lambda: f64,
    /// Parcels below this existence probability are not offered as pickups.
    pub availability_threshold: f64,
    pub camp_time: Duration,
    /// How long a rival may block the next tile before the path is recomputed.
    pub agent_collision_time: Duration,
    pub go_away_moves: usize,
    /// Path attempts against one base before it is blacklisted.
    pub base_tries: usize,
    pub base_switch_max_tries: usize,
    pub base_removal_time: Duration,
    pub move_ack_timeout: Duration,
    pub explore_score: f64,
}

impl Default for AgentTuning {
    fn default() -> Self {
        Self {
            max_green_cell_ratio: 0.2,
            max_spawn_ratio: 3.0,
            kmeans_max_tries: 5,
            kmeans_max_iterations: 10,
            kmeans_epsilon: 0.1,
            use_map_division: true,
            parcel_survival_lambda: 0.069,
            availability_threshold: 0.5,
            camp_time: Duration::from_secs(3),
            agent_collision_time: Duration::ZERO,
            go_away_moves: 3,
            base_tries: 10,
            base_switch_max_tries: 60,
            base_removal_time: Duration::from_millis(3000),
            move_ack_timeout: Duration::from_millis(1000),
            explore_score: 0.0001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_interval_text_forms() {
        assert_eq!(parse_decay_interval("1s"), 1.0);
        assert_eq!(parse_decay_interval("10s"), 10.0);
        assert!(parse_decay_interval("infinite").is_infinite());
        assert!(parse_decay_interval("0").is_infinite());
    }

    #[test]
    fn step_cost_uses_clock_over_interval() {
        let config = ServerConfig {
            decay_interval: 1.0,
            clock_ms: 100,
            ..ServerConfig::default()
        };
        assert!((config.step_cost() - 0.1).abs() < 1e-12);
        assert_eq!(ServerConfig::default().step_cost(), 0.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_server_keys() {
        let raw = r#"{
            "PARCELS_MAX": 5,
            "PARCEL_REWARD_AVG": 30,
            "PARCEL_DECADING_INTERVAL": "2s",
            "CLOCK": 50,
            "AGENTS_OBSERVATION_DISTANCE": 5,
            "PARCELS_OBSERVATION_DISTANCE": 4
        }"#;
        let config: ServerConfig = serde_json::from_str(raw).expect("valid config");
        assert_eq!(config.parcels_max, 5);
        assert_eq!(config.decay_interval, 2.0);
        assert_eq!(config.clock_ms, 50);
        assert_eq!(config.parcels_obs_distance, 4);
    }
}
