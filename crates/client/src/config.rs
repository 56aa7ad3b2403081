//! Client configuration loaded from the process environment.
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use courier_runtime::TeamMode;

/// Configuration required to start the agents against an arena.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClientConfig {
    pub mode: TeamMode,
    /// JSON arena description; the built-in demo field when unset.
    pub arena_map: Option<PathBuf>,
    pub seed: u64,
    /// Directory for the log file. Logs only go to stderr when unset.
    pub log_dir: Option<PathBuf>,
    /// Stop after this many ticks instead of running until interrupted.
    pub ticks: Option<u64>,
}

impl ClientConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `COURIER_MODE` - `solo` or `duo` (default: solo)
    /// - `COURIER_ARENA_MAP` - Path to a JSON arena description
    /// - `COURIER_SEED` - Seed for every random choice (default: 0)
    /// - `COURIER_LOG_DIR` - Directory for `courier.log`
    /// - `COURIER_TICKS` - Number of ticks to run before exiting
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(mode) = read_var::<TeamMode>(&lookup, "COURIER_MODE") {
            config.mode = mode;
        }
        if let Some(seed) = read_var::<u64>(&lookup, "COURIER_SEED") {
            config.seed = seed;
        }
        config.arena_map = lookup("COURIER_ARENA_MAP").map(PathBuf::from);
        config.log_dir = lookup("COURIER_LOG_DIR").map(PathBuf::from);
        config.ticks = read_var::<u64>(&lookup, "COURIER_TICKS").filter(|ticks| *ticks > 0);

        config
    }
}

fn read_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
{
    lookup(key)?.trim().parse().ok()
}
