//! Worker tasks that back the runtime orchestration.
//!
//! The belief worker serializes sensing updates and deliberation; command
//! execution happens outside it so transport latency never blocks sensing.

mod beliefs;

pub use beliefs::{BeliefStatus, BeliefWorker, Command};
