//! Sensing events flowing from the transport into the belief worker.
//!
//! Each variant corresponds to one environment callback. Transports push them
//! through a [`SensingFeed`], which never blocks so it can be used from
//! synchronous socket handlers.
use std::fmt;

use tokio::sync::mpsc;

use courier_core::{SelfPayload, SensedAgent, SensedParcel, ServerConfig, ServerTime, TileUpdate};

use super::errors::{Result, RuntimeError};

/// Index of one of our own agents within the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentSlot(pub usize);

impl AgentSlot {
    pub const FIRST: Self = Self(0);
    pub const SECOND: Self = Self(1);

    pub fn index(self) -> usize {
        self.0
    }

    /// The other slot of a two-agent team.
    pub fn mate(self) -> AgentSlot {
        AgentSlot(1 - self.0.min(1))
    }
}

impl fmt::Display for AgentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SensingEvent {
    /// Authoritative self state of the agent in `slot` (`onYou`).
    You {
        slot: AgentSlot,
        payload: SelfPayload,
        time: ServerTime,
    },
    /// A single tile changed or was revealed (`onTile`).
    Tile(TileUpdate),
    /// The full map (`onMap`).
    Map {
        width: u32,
        height: u32,
        tiles: Vec<TileUpdate>,
    },
    Config(ServerConfig),
    /// Parcels currently seen by the agent in `slot`.
    Parcels {
        slot: AgentSlot,
        parcels: Vec<SensedParcel>,
    },
    /// Other agents currently seen by the agent in `slot`.
    Agents {
        slot: AgentSlot,
        agents: Vec<SensedAgent>,
    },
}

/// Cloneable, non-blocking sender for [`SensingEvent`]s.
#[derive(Clone, Debug)]
pub struct SensingFeed {
    tx: mpsc::UnboundedSender<SensingEvent>,
}

impl SensingFeed {
    /// Feed plus the receiving end; the runtime builder owns one of these.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SensingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn push(&self, event: SensingEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| RuntimeError::CommandChannelClosed)
    }
}
