//! Asynchronous boundary towards the game environment.
//!
//! One [`Transport`] per agent slot carries that agent's commands. Sensing
//! flows the other way through a [`super::SensingFeed`]; the runtime never
//! assumes a command's effect until the matching sensing event arrives.
use std::fmt;

use async_trait::async_trait;
use courier_core::{Direction, ParcelId};

use super::errors::Result;

/// Command emitted by one agent in a single plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentCommand {
    Move(Direction),
    Pickup,
    Putdown,
}

impl fmt::Display for AgentCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentCommand::Move(direction) => write!(f, "move {direction}"),
            AgentCommand::Pickup => f.write_str("pickup"),
            AgentCommand::Putdown => f.write_str("putdown"),
        }
    }
}

/// Commands accepted by the environment for one agent.
///
/// Implementations may be a network client, an in-process arena or a
/// scripted fixture.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Requests a one-tile move. `Ok(false)` means the environment refused it.
    ///
    /// The move only counts as done once the agent's self state settles on
    /// the destination tile; the executor waits for that separately.
    async fn emit_move(&self, direction: Direction) -> Result<bool>;

    /// Picks up every parcel on the agent's tile and returns their ids.
    async fn emit_pickup(&self) -> Result<Vec<ParcelId>>;

    /// Drops every carried parcel and returns their ids.
    async fn emit_putdown(&self) -> Result<Vec<ParcelId>>;
}
