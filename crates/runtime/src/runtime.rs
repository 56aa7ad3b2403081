//! High-level runtime orchestrator.
//!
//! The runtime owns the belief worker, one command executor per agent and
//! the tick loop. Each tick every agent deliberates, executes its plan and
//! reports back, concurrently with its teammate.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use courier_core::{AgentTuning, ServerConfig};

use crate::agent::{Agent, PlanOutcome, Role};
use crate::api::{
    AgentSlot, Result, RuntimeError, RuntimeHandle, SensingEvent, SensingFeed, Transport,
};
use crate::beliefs::Beliefs;
use crate::executor::CommandExecutor;
use crate::workers::{BeliefStatus, BeliefWorker};

/// How many of our agents share the map.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TeamMode {
    #[default]
    Solo,
    Duo,
}

impl TeamMode {
    pub fn agents(self) -> usize {
        match self {
            TeamMode::Solo => 1,
            TeamMode::Duo => 2,
        }
    }

    /// Role of the agent in `slot`: the first duo slot leads.
    pub fn role(self, slot: AgentSlot) -> Role {
        match (self, slot.index()) {
            (TeamMode::Solo, _) => Role::Solo,
            (TeamMode::Duo, 0) => Role::Leader,
            (TeamMode::Duo, _) => Role::Follower,
        }
    }
}

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub mode: TeamMode,
    pub tuning: AgentTuning,
    /// Seeds every random choice (partitioning, exploration, jitter).
    pub seed: u64,
    pub command_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: TeamMode::Solo,
            tuning: AgentTuning::default(),
            seed: 0,
            command_buffer_size: 32,
        }
    }
}

/// Main runtime that drives the agents.
///
/// [`RuntimeHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    config: RuntimeConfig,
    handle: RuntimeHandle,
    executors: Vec<Arc<Mutex<CommandExecutor>>>,
    partition_attempted: bool,
    worker_handle: JoinHandle<()>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Executor driving `slot`, shared with the alternate planner.
    pub fn executor(&self, slot: AgentSlot) -> Result<Arc<Mutex<CommandExecutor>>> {
        self.executors
            .get(slot.index())
            .cloned()
            .ok_or(RuntimeError::UnknownSlot(slot))
    }

    /// Runs one tick.
    ///
    /// Does nothing until the map and every identity are known. The first
    /// ready tick of a duo partitions the spawn tiles. Per-agent failures
    /// are logged and do not fail the tick.
    pub async fn tick(&mut self) -> Result<BeliefStatus> {
        let status = self.handle.status().await?;
        if !status.ready {
            debug!("waiting for map and agent identities");
            return Ok(status);
        }

        if self.config.mode == TeamMode::Duo
            && self.config.tuning.use_map_division
            && !self.partition_attempted
        {
            self.partition_attempted = true;
            if !self.handle.partition().await? {
                warn!("spawn partition failed, every agent may use every spawn tile");
            }
        }

        let now = Instant::now();
        let mut agents = JoinSet::new();
        for (index, executor) in self.executors.iter().enumerate() {
            let slot = AgentSlot(index);
            let handle = self.handle.clone();
            let executor = Arc::clone(executor);
            agents.spawn(async move {
                step_agent(&handle, &executor, slot, now)
                    .await
                    .map_err(|error| (slot, error))
            });
        }

        while let Some(joined) = agents.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err((slot, error))) => warn!(%slot, %error, "agent step failed"),
                Err(error) => warn!(error = %RuntimeError::AgentJoin(error), "agent task failed"),
            }
        }

        Ok(status)
    }

    /// Run the tick loop until the belief worker goes away.
    pub async fn run(&mut self) -> Result<()> {
        self.drive(None).await.map(|_| ())
    }

    /// Run at most `ticks` ticks. Returns how many found the world ready.
    pub async fn run_ticks(&mut self, ticks: u64) -> Result<u64> {
        self.drive(Some(ticks)).await
    }

    async fn drive(&mut self, limit: Option<u64>) -> Result<u64> {
        let mut period = ServerConfig::default().clock();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut ticks = 0;
        let mut ready_ticks = 0;
        while limit.is_none_or(|limit| ticks < limit) {
            ticker.tick().await;
            ticks += 1;

            match self.tick().await {
                Ok(status) => {
                    if status.ready {
                        ready_ticks += 1;
                    }
                    if !status.clock.is_zero() && status.clock != period {
                        info!(clock = ?status.clock, "server clock changed, adjusting tick period");
                        period = status.clock;
                        ticker = interval(period);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        ticker.reset();
                    }
                }
                Err(error @ (RuntimeError::CommandChannelClosed
                | RuntimeError::ReplyChannelClosed(_))) => return Err(error),
                Err(error) => warn!(%error, "tick failed"),
            }
        }
        Ok(ready_ticks)
    }

    /// Shutdown the runtime gracefully
    pub async fn shutdown(self) -> Result<()> {
        drop(self.executors);
        drop(self.handle);

        self.worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)?;

        Ok(())
    }
}

async fn step_agent(
    handle: &RuntimeHandle,
    executor: &Mutex<CommandExecutor>,
    slot: AgentSlot,
    now: Instant,
) -> Result<()> {
    let plan = handle.deliberate(slot, now).await?;
    if plan.is_empty() {
        return Ok(());
    }
    let outcome: PlanOutcome = executor.lock().await.execute(&plan).await;
    handle.report(slot, outcome).await
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    feed: SensingFeed,
    sensing_rx: mpsc::UnboundedReceiver<SensingEvent>,
    transports: Vec<(AgentSlot, Arc<dyn Transport>)>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        let (feed, sensing_rx) = SensingFeed::channel();
        Self {
            config: RuntimeConfig::default(),
            feed,
            sensing_rx,
            transports: Vec::new(),
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mode(mut self, mode: TeamMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn tuning(mut self, tuning: AgentTuning) -> Self {
        self.config.tuning = tuning;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Sensing sender to hand to transports before the runtime is built.
    pub fn feed(&self) -> SensingFeed {
        self.feed.clone()
    }

    /// Set the transport carrying `slot`'s commands (required per slot)
    pub fn transport(mut self, slot: AgentSlot, transport: Arc<dyn Transport>) -> Self {
        self.transports.retain(|(existing, _)| *existing != slot);
        self.transports.push((slot, transport));
        self
    }

    /// Build the runtime and spawn the belief worker.
    pub fn build(self) -> Result<Runtime> {
        let slots = self.config.mode.agents();
        let mut transports = Vec::with_capacity(slots);
        for index in 0..slots {
            let slot = AgentSlot(index);
            let transport = self
                .transports
                .iter()
                .find(|(candidate, _)| *candidate == slot)
                .map(|(_, transport)| Arc::clone(transport))
                .ok_or(RuntimeError::MissingTransport(slot))?;
            transports.push(transport);
        }

        let (self_txs, self_rxs): (Vec<_>, Vec<_>) =
            (0..slots).map(|_| watch::channel(None)).unzip();
        let agents = (0..slots)
            .map(|index| {
                let slot = AgentSlot(index);
                Agent::new(slot, self.config.mode.role(slot), self.config.seed + index as u64 + 1)
            })
            .collect();
        let beliefs = Beliefs::new(slots, self.config.tuning.clone());

        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer_size);
        let handle = RuntimeHandle::new(command_tx, self.feed, self_rxs.clone());

        let worker = BeliefWorker::new(
            beliefs,
            agents,
            self_txs,
            command_rx,
            self.sensing_rx,
            self.config.seed,
        );
        let worker_handle = tokio::spawn(async move {
            worker.run().await;
        });

        let executors = transports
            .into_iter()
            .zip(self_rxs)
            .enumerate()
            .map(|(index, (transport, updates))| {
                Arc::new(Mutex::new(CommandExecutor::new(
                    AgentSlot(index),
                    transport,
                    updates,
                    self.config.tuning.move_ack_timeout,
                )))
            })
            .collect();

        info!(mode = %self.config.mode, seed = self.config.seed, "runtime built");

        Ok(Runtime {
            config: self.config,
            handle,
            executors,
            partition_attempted: false,
            worker_handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duo_roles_and_mode_parsing() {
        assert_eq!(TeamMode::Duo.role(AgentSlot::FIRST), Role::Leader);
        assert_eq!(TeamMode::Duo.role(AgentSlot::SECOND), Role::Follower);
        assert_eq!(TeamMode::Solo.role(AgentSlot::FIRST), Role::Solo);
        assert_eq!("DUO".parse::<TeamMode>().ok(), Some(TeamMode::Duo));
        assert_eq!(TeamMode::Solo.to_string(), "solo");
    }

    #[tokio::test]
    async fn build_requires_a_transport_per_slot() {
        let result = Runtime::builder().mode(TeamMode::Duo).build();
        assert!(matches!(
            result,
            Err(RuntimeError::MissingTransport(AgentSlot(0)))
        ));
    }
}
