//! Sends one agent's commands to its transport, one at a time.
//!
//! A move only counts once the agent's self state settles on the destination
//! tile. The executor watches the self-state channel for that instead of
//! trusting the transport's acknowledgement alone.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

use courier_core::{Direction, Position};

use crate::agent::{Plan, PlanOutcome, Rejection};
use crate::api::{AgentCommand, AgentSlot, Result, RuntimeError, Transport};
use crate::beliefs::SelfState;

pub struct CommandExecutor {
    slot: AgentSlot,
    transport: Arc<dyn Transport>,
    updates: watch::Receiver<Option<SelfState>>,
    ack_timeout: Duration,
}

impl CommandExecutor {
    pub fn new(
        slot: AgentSlot,
        transport: Arc<dyn Transport>,
        updates: watch::Receiver<Option<SelfState>>,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            slot,
            transport,
            updates,
            ack_timeout,
        }
    }

    pub fn slot(&self) -> AgentSlot {
        self.slot
    }

    /// Runs `plan` in order and stops at the first failing command.
    pub async fn execute(&mut self, plan: &Plan) -> PlanOutcome {
        let mut outcome = PlanOutcome::default();
        for &command in plan.commands() {
            match self.run(command).await {
                Ok(()) => outcome.executed.push(command),
                Err(error) => {
                    warn!(slot = %self.slot, %command, %error, "command rejected");
                    outcome.rejected = Some(Rejection {
                        command,
                        reason: error.to_string(),
                    });
                    break;
                }
            }
        }
        outcome
    }

    pub async fn run(&mut self, command: AgentCommand) -> Result<()> {
        match command {
            AgentCommand::Move(direction) => {
                self.move_and_wait(direction).await?;
            }
            AgentCommand::Pickup => {
                let picked = self.transport.emit_pickup().await?;
                debug!(slot = %self.slot, parcels = picked.len(), "picked up");
            }
            AgentCommand::Putdown => {
                let dropped = self.transport.emit_putdown().await?;
                debug!(slot = %self.slot, parcels = dropped.len(), "put down");
            }
        }
        Ok(())
    }

    /// Moves one tile and waits for the self state to confirm the landing tile.
    pub async fn move_and_wait(&mut self, direction: Direction) -> Result<Position> {
        let origin = self
            .updates
            .borrow_and_update()
            .as_ref()
            .map(SelfState::tile)
            .ok_or(RuntimeError::SelfUnknown(self.slot))?;
        let expected = origin.step(direction);

        if !self.transport.emit_move(direction).await? {
            return Err(RuntimeError::MoveRefused { direction });
        }

        let actual = timeout(self.ack_timeout, self.settled_away_from(origin))
            .await
            .map_err(|_| RuntimeError::MoveTimeout {
                direction,
                waited: self.ack_timeout,
            })??;

        if actual != expected {
            return Err(RuntimeError::MoveMismatch {
                direction,
                expected,
                actual,
            });
        }
        Ok(actual)
    }

    async fn settled_away_from(&mut self, origin: Position) -> Result<Position> {
        loop {
            let settled = self
                .updates
                .borrow_and_update()
                .as_ref()
                .filter(|state| state.is_on_tile() && state.tile() != origin)
                .map(SelfState::tile);
            if let Some(tile) = settled {
                return Ok(tile);
            }
            self.updates
                .changed()
                .await
                .map_err(|_| RuntimeError::SelfFeedClosed)?;
        }
    }
}
