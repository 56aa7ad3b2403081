//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, the transport and the planner so
//! the tick loop can log them with consistent context and carry on.
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

use courier_core::{Direction, GridError, Position};

use crate::api::AgentSlot;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("belief worker command channel closed")]
    CommandChannelClosed,

    #[error("belief worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("belief worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error("agent task join failed")]
    AgentJoin(#[source] tokio::task::JoinError),

    #[error("no agent registered in slot {0}")]
    UnknownSlot(AgentSlot),

    #[error("runtime requires a transport for every agent slot (missing {0})")]
    MissingTransport(AgentSlot),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("move {direction} refused by the environment")]
    MoveRefused { direction: Direction },

    #[error("move {direction} not acknowledged within {waited:?}")]
    MoveTimeout {
        direction: Direction,
        waited: Duration,
    },

    #[error("move {direction} landed on {actual}, expected {expected}")]
    MoveMismatch {
        direction: Direction,
        expected: Position,
        actual: Position,
    },

    #[error("self-state feed closed while awaiting a move")]
    SelfFeedClosed,

    #[error("self state for slot {0} not received yet")]
    SelfUnknown(AgentSlot),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("planner failed: {0}")]
    Planner(String),

    #[error("unrecognised plan step {0:?}")]
    MalformedPlanStep(String),
}
