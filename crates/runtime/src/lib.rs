//! Runtime orchestration for the delivery agents.
//!
//! This crate wires the world model from `courier-core` into a BDI decision
//! loop, a belief worker task and per-agent command executors. Consumers embed
//! [`Runtime`] to drive ticks, push sensing through a [`SensingFeed`] and
//! plug the environment in through [`Transport`].
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`agent`] generates, ranks and achieves desires for one agent
//! - [`beliefs`] folds sensing events into the shared world model
//! - [`scoring`] and [`coordination`] hold the utility model and the
//!   two-agent blackboard
//! - [`executor`] sends commands and confirms moves against self state
//! - [`planner`] is the alternate PDDL-backed decision path
//! - [`workers`] keeps background tasks internal to the crate
pub mod agent;
pub mod api;
pub mod beliefs;
pub mod coordination;
pub mod executor;
pub mod planner;
pub mod runtime;
pub mod scoring;

mod workers;

pub use agent::{Desire, IntentionKey, Plan, PlanOutcome, Rejection, Role};
pub use api::{
    AgentCommand, AgentSlot, Result, RuntimeError, RuntimeHandle, SensingEvent, SensingFeed,
    Transport,
};
pub use beliefs::{Beliefs, SelfState};
pub use coordination::{Blackboard, DropRecord};
pub use executor::CommandExecutor;
pub use planner::{PlanAction, PlanSolver, PlanStep, plan_and_execute};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig, TeamMode};
pub use workers::BeliefStatus;
