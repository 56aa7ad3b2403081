use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_core::{
    AgentId, Direction, ParcelId, Position, SelfPayload, SensedParcel, ServerConfig, ServerTime,
    TileKind, TileUpdate,
};
use courier_runtime::planner::{PlanSolver, PlanStep, plan_and_execute};
use courier_runtime::{
    AgentCommand, AgentSlot, Result, Runtime, SensingEvent, SensingFeed, TeamMode, Transport,
};

const ROW: &str = "B....";

/// Single-row field with one agent, simulated in-process.
struct Field {
    feed: SensingFeed,
    state: Mutex<FieldState>,
}

struct FieldState {
    me: Position,
    frame: u64,
    parcels: Vec<(ParcelId, Position, bool, f64)>,
    delivered: f64,
    commands: Vec<AgentCommand>,
}

impl Field {
    fn new(feed: SensingFeed, me: Position, parcels: &[(&str, Position, f64)]) -> Arc<Self> {
        Arc::new(Self {
            feed,
            state: Mutex::new(FieldState {
                me,
                frame: 0,
                parcels: parcels
                    .iter()
                    .map(|(id, position, reward)| (ParcelId::from(*id), *position, false, *reward))
                    .collect(),
                delivered: 0.0,
                commands: Vec::new(),
            }),
        })
    }

    fn connect(&self) {
        self.feed
            .push(SensingEvent::Config(ServerConfig {
                parcels_max: 5,
                agents_obs_distance: 10,
                parcels_obs_distance: 10,
                ..ServerConfig::default()
            }))
            .unwrap();
        let tiles = ROW
            .chars()
            .enumerate()
            .map(|(x, symbol)| {
                let kind = if symbol == 'B' {
                    TileKind::Base
                } else {
                    TileKind::Walkable
                };
                TileUpdate::new(x as i32, 0, kind)
            })
            .collect();
        self.feed
            .push(SensingEvent::Map {
                width: ROW.len() as u32,
                height: 1,
                tiles,
            })
            .unwrap();
    }

    fn announce(&self) {
        let state = self.state.lock().unwrap();
        self.push_state(&state).unwrap();
    }

    fn push_state(&self, state: &FieldState) -> Result<()> {
        self.feed.push(SensingEvent::You {
            slot: AgentSlot::FIRST,
            payload: SelfPayload {
                id: AgentId::from("a"),
                name: "a".to_owned(),
                x: f64::from(state.me.x),
                y: f64::from(state.me.y),
                ..SelfPayload::default()
            },
            time: ServerTime {
                ms: state.frame * 100,
                frame: state.frame,
            },
        })?;
        let parcels = state
            .parcels
            .iter()
            .map(|(id, position, carried, reward)| {
                let position = if *carried { state.me } else { *position };
                SensedParcel {
                    id: id.clone(),
                    x: f64::from(position.x),
                    y: f64::from(position.y),
                    carried_by: carried.then(|| AgentId::from("a")),
                    reward: *reward,
                }
            })
            .collect();
        self.feed.push(SensingEvent::Parcels {
            slot: AgentSlot::FIRST,
            parcels,
        })
    }

    fn delivered(&self) -> f64 {
        self.state.lock().unwrap().delivered
    }

    fn commands(&self) -> Vec<AgentCommand> {
        self.state.lock().unwrap().commands.clone()
    }

    fn carrying(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.parcels.iter().filter(|parcel| parcel.2).count()
    }
}

#[async_trait]
impl Transport for Field {
    async fn emit_move(&self, direction: Direction) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(AgentCommand::Move(direction));
        let target = state.me.step(direction);
        if target.y != 0 || target.x < 0 || target.x >= ROW.len() as i32 {
            return Ok(false);
        }
        state.me = target;
        state.frame += 1;
        self.push_state(&state)?;
        Ok(true)
    }

    async fn emit_pickup(&self) -> Result<Vec<ParcelId>> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(AgentCommand::Pickup);
        let here = state.me;
        let mut picked = Vec::new();
        for parcel in state.parcels.iter_mut() {
            if !parcel.2 && parcel.1 == here {
                parcel.2 = true;
                picked.push(parcel.0.clone());
            }
        }
        self.push_state(&state)?;
        Ok(picked)
    }

    async fn emit_putdown(&self) -> Result<Vec<ParcelId>> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(AgentCommand::Putdown);
        let here = state.me;
        let on_base = here == Position::new(0, 0);
        let mut dropped = Vec::new();
        let mut delivered = 0.0;
        state.parcels.retain_mut(|parcel| {
            if !parcel.2 {
                return true;
            }
            dropped.push(parcel.0.clone());
            if on_base {
                delivered += parcel.3;
                return false;
            }
            parcel.1 = here;
            parcel.2 = false;
            true
        });
        state.delivered += delivered;
        self.push_state(&state)?;
        Ok(dropped)
    }
}

#[tokio::test(start_paused = true)]
async fn solo_agent_fetches_and_delivers_a_parcel() {
    let builder = Runtime::builder().mode(TeamMode::Solo).seed(7);
    let field = Field::new(
        builder.feed(),
        Position::new(4, 0),
        &[("p1", Position::new(2, 0), 10.0)],
    );
    let mut runtime = builder
        .transport(AgentSlot::FIRST, field.clone())
        .build()
        .expect("runtime builds");

    field.connect();
    field.announce();

    let ready = runtime.run_ticks(20).await.expect("ticks run");
    assert_eq!(ready, 20);
    assert_eq!(field.delivered(), 10.0);
    assert_eq!(field.carrying(), 0);
    assert!(field.commands().contains(&AgentCommand::Pickup));

    let status = runtime.handle().status().await.expect("status");
    assert_eq!(status.parcels, 0);
    assert_eq!(status.agents, vec![AgentId::from("a")]);

    runtime.shutdown().await.expect("clean shutdown");
}

#[tokio::test(start_paused = true)]
async fn ticks_wait_for_map_and_identity() {
    let builder = Runtime::builder();
    let field = Field::new(builder.feed(), Position::new(1, 0), &[]);
    let mut runtime = builder
        .transport(AgentSlot::FIRST, field.clone())
        .build()
        .expect("runtime builds");

    field.connect();
    let ready = runtime.run_ticks(3).await.expect("ticks run");
    assert_eq!(ready, 0);
    assert!(field.commands().is_empty());

    field.announce();
    let ready = runtime.run_ticks(1).await.expect("ticks run");
    assert_eq!(ready, 1);

    runtime.shutdown().await.expect("clean shutdown");
}

/// Solver that replays canned steps and records the problem it was given.
struct Canned {
    steps: Vec<PlanStep>,
    problems: Mutex<Vec<String>>,
}

#[async_trait]
impl PlanSolver for Canned {
    async fn solve(&self, _domain: &str, problem: &str) -> Result<Vec<PlanStep>> {
        self.problems.lock().unwrap().push(problem.to_owned());
        Ok(self.steps.clone())
    }
}

#[tokio::test(start_paused = true)]
async fn solver_plan_runs_through_the_executor() {
    let builder = Runtime::builder();
    let field = Field::new(
        builder.feed(),
        Position::new(4, 0),
        &[("p1", Position::new(3, 0), 6.0)],
    );
    let runtime = builder
        .transport(AgentSlot::FIRST, field.clone())
        .build()
        .expect("runtime builds");
    field.connect();
    field.announce();

    let solver = Canned {
        steps: vec![
            PlanStep::new("MOVE", ["AGENT_A", "T_4_0", "T_3_0"]),
            PlanStep::new("PICKUP", ["AGENT_A", "P1", "T_3_0"]),
        ],
        problems: Mutex::new(Vec::new()),
    };
    let executor = runtime.executor(AgentSlot::FIRST).expect("executor");
    let outcome = plan_and_execute(&runtime.handle(), &executor, AgentSlot::FIRST, &solver)
        .await
        .expect("plan executes");

    assert!(outcome.is_complete());
    assert_eq!(
        outcome.executed,
        vec![AgentCommand::Move(Direction::Left), AgentCommand::Pickup]
    );
    assert_eq!(field.carrying(), 1);
    let problems = solver.problems.lock().unwrap();
    assert!(problems[0].contains("(at agent_a t_4_0)"));
    assert!(problems[0].contains("(parcel-at p1 t_3_0)"));
}

#[tokio::test(start_paused = true)]
async fn empty_solver_plan_steps_towards_a_base() {
    let builder = Runtime::builder();
    let field = Field::new(builder.feed(), Position::new(2, 0), &[]);
    let runtime = builder
        .transport(AgentSlot::FIRST, field.clone())
        .build()
        .expect("runtime builds");
    field.connect();
    field.announce();

    let solver = Canned {
        steps: Vec::new(),
        problems: Mutex::new(Vec::new()),
    };
    let executor = runtime.executor(AgentSlot::FIRST).expect("executor");
    let outcome = plan_and_execute(&runtime.handle(), &executor, AgentSlot::FIRST, &solver)
        .await
        .expect("fallback executes");

    assert_eq!(outcome.executed, vec![AgentCommand::Move(Direction::Left)]);
}
