//! Alternate decision path backed by an external symbolic planner.
//!
//! Instead of the BDI arbitration, the agent renders the world as a PDDL
//! problem, hands it to a [`PlanSolver`] and walks the returned actions
//! through the same [`CommandExecutor`] used by the tick loop.
pub mod pddl;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use courier_core::{Direction, Obstacles, ParcelId, Position, search};

use crate::agent::{Plan, PlanOutcome};
use crate::api::{AgentCommand, AgentSlot, Result, RuntimeError, RuntimeHandle};
use crate::beliefs::Beliefs;
use crate::executor::CommandExecutor;

/// One step as returned by a solver: action name plus object arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl PlanStep {
    pub fn new(action: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            action: action.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Solver step decoded into coordinates and parcel ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanAction {
    Move { from: Position, to: Position },
    Pickup { parcel: ParcelId, tile: Position },
    Deposit {
        parcel: ParcelId,
        base: Position,
        tile: Position,
    },
}

impl TryFrom<&PlanStep> for PlanAction {
    type Error = RuntimeError;

    /// Arguments follow the domain: the agent always comes first.
    fn try_from(step: &PlanStep) -> Result<Self> {
        let malformed = || RuntimeError::MalformedPlanStep(format!("{step:?}"));
        let tile = |index: usize| {
            step.args
                .get(index)
                .and_then(|name| pddl::parse_position(name))
                .ok_or_else(malformed)
        };
        let parcel = |index: usize| {
            step.args
                .get(index)
                .map(|name| ParcelId::new(name.to_ascii_lowercase()))
                .ok_or_else(malformed)
        };

        match step.action.to_ascii_lowercase().as_str() {
            "move" => Ok(PlanAction::Move {
                from: tile(1)?,
                to: tile(2)?,
            }),
            "pickup" => Ok(PlanAction::Pickup {
                parcel: parcel(1)?,
                tile: tile(2)?,
            }),
            "deposit" => Ok(PlanAction::Deposit {
                parcel: parcel(1)?,
                base: tile(2)?,
                tile: tile(3)?,
            }),
            _ => Err(malformed()),
        }
    }
}

/// Decodes every solver step, failing on the first one that does not parse.
pub fn parse_steps(steps: &[PlanStep]) -> Result<Vec<PlanAction>> {
    steps.iter().map(PlanAction::try_from).collect()
}

/// Off-board planner: takes PDDL text, returns an ordered list of steps.
///
/// An empty plan means the solver found nothing worth doing.
#[async_trait]
pub trait PlanSolver: Send + Sync {
    async fn solve(&self, domain: &str, problem: &str) -> Result<Vec<PlanStep>>;
}

/// Lowers planner actions to executor commands.
///
/// Pickup and putdown act on every parcel at once, so consecutive pickups
/// or deposits collapse into a single command.
pub fn to_plan(actions: &[PlanAction]) -> Result<Plan> {
    let mut commands = Vec::with_capacity(actions.len());
    for action in actions {
        let command = match action {
            PlanAction::Move { from, to } => {
                if !from.is_adjacent(*to) {
                    return Err(RuntimeError::MalformedPlanStep(format!(
                        "move {from} -> {to} is not a single step"
                    )));
                }
                Direction::between(*from, *to)
                    .map(AgentCommand::Move)
                    .ok_or_else(|| RuntimeError::MalformedPlanStep(format!("move {from} -> {to}")))?
            }
            PlanAction::Pickup { .. } => AgentCommand::Pickup,
            PlanAction::Deposit { .. } => AgentCommand::Putdown,
        };
        let repeated = matches!(command, AgentCommand::Pickup | AgentCommand::Putdown)
            && commands.last() == Some(&command);
        if !repeated {
            commands.push(command);
        }
    }
    Ok(Plan::new(commands))
}

/// Runs `actions` through `executor`, stopping at the first failure.
pub async fn execute_plan(
    actions: &[PlanAction],
    executor: &mut CommandExecutor,
) -> Result<PlanOutcome> {
    let plan = to_plan(actions)?;
    Ok(executor.execute(&plan).await)
}

/// One step towards the nearest base, skipping the base we already stand on.
pub fn fallback_step(beliefs: &Beliefs, slot: AgentSlot, obstacles: &Obstacles) -> Option<Direction> {
    let me = beliefs.self_state(slot)?;
    let here = me.tile();
    let mut exclude = BTreeSet::new();
    if beliefs.grid.is_base(here) {
        exclude.insert(here);
    }
    let (base, _) = beliefs.grid.nearest_base_excluding(here, &exclude)?;
    let next = *search(here, base, &beliefs.grid, obstacles).first()?;
    Direction::between(here, next)
}

/// Plans from the current beliefs of `slot`, executes the result and
/// reports the outcome back to the runtime.
///
/// Visible rivals are blanked out of the problem. When the solver returns
/// nothing the agent drifts one step towards a base so the next attempt
/// sees a different world.
pub async fn plan_and_execute(
    handle: &RuntimeHandle,
    executor: &Mutex<CommandExecutor>,
    slot: AgentSlot,
    solver: &dyn PlanSolver,
) -> Result<PlanOutcome> {
    let beliefs = handle.snapshot().await?;
    let me = beliefs
        .self_state(slot)
        .filter(|state| state.is_on_tile())
        .ok_or(RuntimeError::SelfUnknown(slot))?;
    let obstacles: Obstacles = beliefs.visible_rival_tiles(slot).into_iter().collect();

    let problem = pddl::problem(
        &beliefs.grid,
        &beliefs.parcels,
        me.id(),
        me.tile(),
        &obstacles,
    );
    let steps = solver.solve(pddl::domain(), &problem).await?;
    let actions = parse_steps(&steps)?;

    let plan = if actions.is_empty() {
        match fallback_step(&beliefs, slot, &obstacles) {
            Some(direction) => {
                info!(%slot, %direction, "empty plan, moving towards a base");
                Plan::new(vec![AgentCommand::Move(direction)])
            }
            None => {
                warn!(%slot, "empty plan and no base reachable");
                Plan::idle()
            }
        }
    } else {
        debug!(%slot, steps = actions.len(), "executing solver plan");
        to_plan(&actions)?
    };

    let outcome = executor.lock().await.execute(&plan).await;
    handle.report(slot, outcome.clone()).await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_decode_case_insensitively() {
        let steps = vec![
            PlanStep::new("MOVE", ["AGENT_A", "T_1_1", "T_2_1"]),
            PlanStep::new("pickup", ["agent_a", "P1", "t_2_1"]),
            PlanStep::new("Deposit", ["agent_a", "p1", "BASE_2_2", "T_2_2"]),
        ];
        let actions = parse_steps(&steps).expect("valid plan");
        assert_eq!(
            actions,
            vec![
                PlanAction::Move {
                    from: Position::new(1, 1),
                    to: Position::new(2, 1),
                },
                PlanAction::Pickup {
                    parcel: ParcelId::from("p1"),
                    tile: Position::new(2, 1),
                },
                PlanAction::Deposit {
                    parcel: ParcelId::from("p1"),
                    base: Position::new(2, 2),
                    tile: Position::new(2, 2),
                },
            ]
        );
    }

    #[test]
    fn unknown_action_is_rejected() {
        let error = parse_steps(&[PlanStep::new("teleport", ["agent_a", "t_0_0"])]).unwrap_err();
        assert!(matches!(error, RuntimeError::MalformedPlanStep(_)));

        let error = parse_steps(&[PlanStep::new("move", ["agent_a", "t_0_0"])]).unwrap_err();
        assert!(matches!(error, RuntimeError::MalformedPlanStep(_)));
    }

    #[test]
    fn repeated_deposits_collapse_into_one_putdown() {
        let tile = Position::new(0, 0);
        let actions = vec![
            PlanAction::Move {
                from: Position::new(0, 1),
                to: tile,
            },
            PlanAction::Deposit {
                parcel: ParcelId::from("a"),
                base: tile,
                tile,
            },
            PlanAction::Deposit {
                parcel: ParcelId::from("b"),
                base: tile,
                tile,
            },
        ];
        let plan = to_plan(&actions).expect("plan");
        assert_eq!(
            plan.commands(),
            &[AgentCommand::Move(Direction::Down), AgentCommand::Putdown]
        );
    }

    #[test]
    fn non_adjacent_move_is_malformed() {
        let actions = vec![PlanAction::Move {
            from: Position::new(0, 0),
            to: Position::new(2, 0),
        }];
        assert!(matches!(
            to_plan(&actions),
            Err(RuntimeError::MalformedPlanStep(_))
        ));
    }

    #[test]
    fn plan_steps_deserialize_from_solver_json() {
        let steps: Vec<PlanStep> = serde_json::from_str(
            r#"[{"action":"MOVE","args":["AGENT_A","T_0_0","T_0_1"]},{"action":"PICKUP","args":["AGENT_A","P9","T_0_1"]}]"#,
        )
        .expect("json");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].action, "PICKUP");
    }
}
