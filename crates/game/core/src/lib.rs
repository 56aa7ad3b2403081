//! Deterministic world model for the delivery agent.
//!
//! `courier-core` owns everything the decision engine believes about the map
//! and its occupants, with no I/O and no clocks: callers hand in elapsed time,
//! frames and random sources explicitly.
//!
//! - [`grid`] classifies tiles and serves the all-pairs distance oracle, and
//!   partitions spawn tiles between cooperating agents
//! - [`path`] finds shortest routes over the live grid plus an obstacle overlay
//! - [`entities`] tracks parcels (with decay) and other agents
//! - [`config`] carries the server configuration and the agent's tuning
pub mod config;
pub mod entities;
pub mod grid;
pub mod path;
pub mod payload;
pub mod types;

pub use config::{AgentTuning, ServerConfig, parse_decay_interval};
pub use entities::{Observer, Parcel, ParcelStore, Rival, RivalStore};
pub use grid::{DistanceMatrix, GridError, GridIndex, MapSize};
pub use path::{Obstacles, search};
pub use payload::{SelfPayload, SensedAgent, SensedParcel, ServerTime, TileUpdate};
pub use types::{
    AgentId, Direction, FRAMES_PER_SECOND, ParcelId, Position, TeamId, TileKind, UnknownTileCode,
    frames_to_seconds,
};
