//! Public runtime API surface.
//!
//! This module gathers the types exposed to consumers of the runtime crate so
//! other layers can stay focused on orchestration, workers, or deliberation.

pub mod errors;
pub mod events;
pub mod handle;
pub mod transport;

pub use errors::{Result, RuntimeError};
pub use events::{AgentSlot, SensingEvent, SensingFeed};
pub use handle::RuntimeHandle;
pub use transport::{AgentCommand, Transport};
