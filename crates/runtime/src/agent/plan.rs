//! What one deliberation asks the executor to do, and what actually happened.
use courier_core::{AgentId, Position};

use crate::api::AgentCommand;
use crate::beliefs::Beliefs;

/// Ordered commands for a single tick. Empty means stay put.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Plan {
    commands: Vec<AgentCommand>,
}

impl Plan {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn new(commands: Vec<AgentCommand>) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &[AgentCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl FromIterator<AgentCommand> for Plan {
    fn from_iter<I: IntoIterator<Item = AgentCommand>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// First command the environment refused, with the reason.
#[derive(Clone, Debug, PartialEq)]
pub struct Rejection {
    pub command: AgentCommand,
    pub reason: String,
}

/// Result of executing a [`Plan`]: the prefix that succeeded and the
/// command that stopped it, if any.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanOutcome {
    pub executed: Vec<AgentCommand>,
    pub rejected: Option<Rejection>,
}

impl PlanOutcome {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_none()
    }

    pub fn executed(&self, command: AgentCommand) -> bool {
        self.executed.contains(&command)
    }
}

/// Blackboard update that only holds once a given command went through.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PlanEffect {
    /// We left our load on `position` for `picker`.
    RecordHandoff {
        position: Position,
        value: f64,
        quantity: usize,
        picker: AgentId,
    },
    /// We collected the load left for us.
    ReleaseHandoff,
}

impl PlanEffect {
    fn trigger(&self) -> AgentCommand {
        match self {
            PlanEffect::RecordHandoff { .. } => AgentCommand::Putdown,
            PlanEffect::ReleaseHandoff => AgentCommand::Pickup,
        }
    }

    /// Applies the effect if its triggering command was executed.
    pub(crate) fn settle(self, outcome: &PlanOutcome, beliefs: &mut Beliefs) {
        if !outcome.executed(self.trigger()) {
            return;
        }
        match self {
            PlanEffect::RecordHandoff {
                position,
                value,
                quantity,
                picker,
            } => beliefs
                .blackboard
                .set_dropped(position, value, quantity, picker, &beliefs.grid),
            PlanEffect::ReleaseHandoff => beliefs.blackboard.reset_drop(),
        }
    }
}
