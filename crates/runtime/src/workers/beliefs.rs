//! Belief worker that owns the shared world model and every agent's BDI state.
//!
//! Sensing events and deliberation requests are served one at a time from a
//! single task, so two agents never observe or mutate beliefs concurrently.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use courier_core::AgentId;

use crate::agent::{Agent, Plan, PlanOutcome};
use crate::api::{AgentSlot, Result, RuntimeError, SensingEvent};
use crate::beliefs::{Beliefs, SelfState};

/// Commands that can be sent to the belief worker
pub enum Command {
    /// Run one deliberation for `slot` and return its plan.
    Deliberate {
        slot: AgentSlot,
        now: Instant,
        reply: oneshot::Sender<Result<Plan>>,
    },
    /// Report what happened to the plan last returned for `slot`.
    Report {
        slot: AgentSlot,
        outcome: PlanOutcome,
        reply: oneshot::Sender<Result<()>>,
    },
    Status {
        reply: oneshot::Sender<BeliefStatus>,
    },
    /// Split spawn tiles among the agents; only the first call does work.
    Partition { reply: oneshot::Sender<bool> },
    /// Clone of the current beliefs.
    Snapshot { reply: oneshot::Sender<Beliefs> },
}

/// Summary of the world model, cheap to send across tasks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BeliefStatus {
    /// Map loaded and every agent's identity known.
    pub ready: bool,
    pub partitioned: bool,
    /// Tick period announced by the server.
    pub clock: Duration,
    pub parcels: usize,
    pub rivals: usize,
    pub agents: Vec<AgentId>,
}

pub struct BeliefWorker {
    beliefs: Beliefs,
    agents: Vec<Agent>,
    self_txs: Vec<watch::Sender<Option<SelfState>>>,
    command_rx: mpsc::Receiver<Command>,
    sensing_rx: mpsc::UnboundedReceiver<SensingEvent>,
    partition: Option<bool>,
    rng: StdRng,
}

impl BeliefWorker {
    pub fn new(
        beliefs: Beliefs,
        agents: Vec<Agent>,
        self_txs: Vec<watch::Sender<Option<SelfState>>>,
        command_rx: mpsc::Receiver<Command>,
        sensing_rx: mpsc::UnboundedReceiver<SensingEvent>,
        seed: u64,
    ) -> Self {
        info!(
            agents = agents.len(),
            roles = ?agents.iter().map(|agent| agent.role()).collect::<Vec<_>>(),
            "BeliefWorker initialized"
        );

        Self {
            beliefs,
            agents,
            self_txs,
            command_rx,
            sensing_rx,
            partition: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Main worker loop.
    ///
    /// Pending sensing events are always folded in before the next command,
    /// so deliberation sees everything received so far. Exits once every
    /// handle is dropped.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                Some(event) = self.sensing_rx.recv() => self.handle_sensing(event),
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }
        debug!("BeliefWorker stopped");
    }

    fn handle_sensing(&mut self, event: SensingEvent) {
        if let Some((slot, state)) = self.beliefs.apply(event)
            && let Some(tx) = self.self_txs.get(slot.index())
        {
            tx.send_replace(Some(state));
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Deliberate { slot, now, reply } => {
                let result = self.deliberate(slot, now);
                if reply.send(result).is_err() {
                    debug!("Deliberate reply channel closed (caller dropped)");
                }
            }
            Command::Report {
                slot,
                outcome,
                reply,
            } => {
                let result = self.report(slot, &outcome);
                if reply.send(result).is_err() {
                    debug!("Report reply channel closed (caller dropped)");
                }
            }
            Command::Status { reply } => {
                if reply.send(self.status()).is_err() {
                    debug!("Status reply channel closed (caller dropped)");
                }
            }
            Command::Partition { reply } => {
                let partitioned = self.partition();
                if reply.send(partitioned).is_err() {
                    debug!("Partition reply channel closed (caller dropped)");
                }
            }
            Command::Snapshot { reply } => {
                if reply.send(self.beliefs.clone()).is_err() {
                    debug!("Snapshot reply channel closed (caller dropped)");
                }
            }
        }
    }

    fn deliberate(&mut self, slot: AgentSlot, now: Instant) -> Result<Plan> {
        let agent = self
            .agents
            .get_mut(slot.index())
            .ok_or(RuntimeError::UnknownSlot(slot))?;
        Ok(agent.deliberate(&mut self.beliefs, now))
    }

    fn report(&mut self, slot: AgentSlot, outcome: &PlanOutcome) -> Result<()> {
        let agent = self
            .agents
            .get_mut(slot.index())
            .ok_or(RuntimeError::UnknownSlot(slot))?;
        agent.complete(outcome, &mut self.beliefs);
        Ok(())
    }

    fn status(&self) -> BeliefStatus {
        BeliefStatus {
            ready: self.beliefs.is_ready(),
            partitioned: self.partition.unwrap_or(false),
            clock: self.beliefs.config.clock(),
            parcels: self.beliefs.parcels.len(),
            rivals: self.beliefs.rivals.len(),
            agents: self.beliefs.known_agents(),
        }
    }

    fn partition(&mut self) -> bool {
        if let Some(done) = self.partition {
            return done;
        }
        if !self.beliefs.is_ready() {
            warn!("partition requested before the map and identities are known");
            return false;
        }
        let agents = self.beliefs.known_agents();
        let tuning = self.beliefs.tuning.clone();
        let done = self
            .beliefs
            .grid
            .partition_spawns(&agents, &tuning, &mut self.rng);
        self.partition = Some(done);
        done
    }
}
