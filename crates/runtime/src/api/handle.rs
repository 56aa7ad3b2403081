//! Cloneable façade for issuing commands to the runtime.
//!
//! [`RuntimeHandle`] hides channel plumbing and offers async helpers for
//! deliberating, reporting plan outcomes and following each agent's
//! authoritative self state.
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use super::errors::{Result, RuntimeError};
use super::events::{AgentSlot, SensingFeed};
use crate::agent::{Plan, PlanOutcome};
use crate::beliefs::{Beliefs, SelfState};
use crate::workers::{BeliefStatus, Command};

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    feed: SensingFeed,
    self_rxs: Vec<watch::Receiver<Option<SelfState>>>,
}

impl RuntimeHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<Command>,
        feed: SensingFeed,
        self_rxs: Vec<watch::Receiver<Option<SelfState>>>,
    ) -> Self {
        Self {
            command_tx,
            feed,
            self_rxs,
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Run one BDI tick for `slot` and get the commands it wants executed.
    pub async fn deliberate(&self, slot: AgentSlot, now: Instant) -> Result<Plan> {
        self.request(|reply| Command::Deliberate { slot, now, reply })
            .await?
    }

    /// Hand the executed plan back so the agent can settle its intention.
    pub async fn report(&self, slot: AgentSlot, outcome: PlanOutcome) -> Result<()> {
        self.request(|reply| Command::Report {
            slot,
            outcome,
            reply,
        })
        .await?
    }

    pub async fn status(&self) -> Result<BeliefStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Partition spawn tiles among the agents. Idempotent once it has run.
    pub async fn partition(&self) -> Result<bool> {
        self.request(|reply| Command::Partition { reply }).await
    }

    /// Query the current beliefs (read-only snapshot)
    pub async fn snapshot(&self) -> Result<Beliefs> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Sender transports use to push sensing events.
    pub fn feed(&self) -> SensingFeed {
        self.feed.clone()
    }

    /// Watch channel carrying the latest self state of `slot`.
    pub fn self_updates(&self, slot: AgentSlot) -> Result<watch::Receiver<Option<SelfState>>> {
        self.self_rxs
            .get(slot.index())
            .cloned()
            .ok_or(RuntimeError::UnknownSlot(slot))
    }

    /// Number of agent slots served by this runtime.
    pub fn slots(&self) -> usize {
        self.self_rxs.len()
    }
}
