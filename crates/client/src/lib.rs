//! Composition root for the delivery agents.
//!
//! Loads [`ClientConfig`], installs logging and connects a
//! [`courier_runtime::Runtime`] to an in-process [`Arena`]. The binary is a
//! thin wrapper around [`run`].
pub mod arena;
pub mod config;
pub mod logging;

pub use arena::{Arena, ArenaMap, ArenaSeat};
pub use config::ClientConfig;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use courier_runtime::{AgentSlot, Runtime, RuntimeConfig};

/// Scores reached by each agent when the client stopped.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub ticks: u64,
    pub scores: Vec<f64>,
}

impl Summary {
    pub fn total(&self) -> f64 {
        self.scores.iter().sum()
    }
}

/// Runs the agents against `map` for `config.ticks` ticks, or until the
/// process is interrupted when no bound is set.
pub async fn run(config: &ClientConfig, map: ArenaMap) -> Result<Summary> {
    let builder = Runtime::builder().config(RuntimeConfig {
        mode: config.mode,
        seed: config.seed,
        ..RuntimeConfig::default()
    });
    let agents = config.mode.agents();
    let clock = map.config.clock();
    let arena = Arena::new(map, agents, builder.feed(), config.seed)?;

    let mut builder = builder;
    for index in 0..agents {
        let slot = AgentSlot(index);
        builder = builder.transport(slot, arena.seat(slot));
    }
    let mut runtime = builder.build().context("building runtime")?;

    arena.connect().context("connecting to arena")?;
    let server = spawn_server_clock(Arc::clone(&arena), clock);

    info!(mode = %config.mode, agents, "agents running");
    let ticks = match config.ticks {
        Some(ticks) => runtime.run_ticks(ticks).await?,
        None => {
            tokio::select! {
                result = runtime.run() => result.map(|_| 0)?,
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    0
                }
            }
        }
    };

    server.abort();
    runtime.shutdown().await?;

    let scores: Vec<f64> = (0..agents)
        .map(|index| arena.score(AgentSlot(index)))
        .collect();
    let summary = Summary { ticks, scores };
    info!(total = summary.total(), scores = ?summary.scores, "session over");
    Ok(summary)
}

fn spawn_server_clock(arena: Arc<Arena>, clock: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(clock);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(error) = arena.tick() {
                warn!(%error, "arena tick failed, stopping server clock");
                break;
            }
        }
    })
}
