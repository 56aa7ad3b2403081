//! In-process delivery arena.
//!
//! Stands in for the game server: holds the map, every agent and parcel,
//! validates commands and pushes the resulting sensing events through the
//! runtime's [`SensingFeed`]. Each of our agents talks to it through an
//! [`ArenaSeat`], its [`Transport`].
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, bail, ensure};
use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{debug, info};

use courier_core::{
    AgentId, Direction, ParcelId, Position, SelfPayload, SensedAgent, SensedParcel, ServerConfig,
    ServerTime, TileKind, TileUpdate,
};
use courier_runtime::{AgentSlot, Result, RuntimeError, SensingEvent, SensingFeed, Transport};

const DEMO_MAP: &str = include_str!("../maps/demo.json");

#[derive(Clone, Debug, Deserialize)]
pub struct ArenaParcel {
    pub id: ParcelId,
    pub x: i32,
    pub y: i32,
    pub reward: f64,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct StartTile {
    pub x: i32,
    pub y: i32,
}

/// Arena description as stored on disk.
///
/// `tiles[x][y]` holds the wire code of each tile (`0` empty, `1` spawn,
/// `2` base, `3` walkable).
#[derive(Clone, Debug, Deserialize)]
pub struct ArenaMap {
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<Vec<TileKind>>,
    #[serde(default = "arena_config")]
    pub config: ServerConfig,
    #[serde(default)]
    pub starts: Vec<StartTile>,
    /// Parcels present from the first tick.
    #[serde(default)]
    pub parcels: Vec<ArenaParcel>,
}

fn arena_config() -> ServerConfig {
    ServerConfig {
        parcels_max: 5,
        parcel_reward_avg: 20.0,
        agents_obs_distance: 5,
        parcels_obs_distance: 5,
        ..ServerConfig::default()
    }
}

impl ArenaMap {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let map: ArenaMap = serde_json::from_str(json).context("parsing arena map")?;
        map.validate()?;
        Ok(map)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading arena map {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("loading arena map {}", path.display()))
    }

    /// Small built-in field used when no map is configured.
    pub fn demo() -> anyhow::Result<Self> {
        Self::from_json(DEMO_MAP)
    }

    fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.tiles.len() == self.width as usize,
            "expected {} tile columns, found {}",
            self.width,
            self.tiles.len()
        );
        for (x, column) in self.tiles.iter().enumerate() {
            ensure!(
                column.len() == self.height as usize,
                "column {x} has {} tiles, expected {}",
                column.len(),
                self.height
            );
        }
        Ok(())
    }

    pub fn kind(&self, position: Position) -> Option<TileKind> {
        let x = usize::try_from(position.x).ok()?;
        let y = usize::try_from(position.y).ok()?;
        self.tiles.get(x)?.get(y).copied()
    }

    fn is_passable(&self, position: Position) -> bool {
        self.kind(position).is_some_and(TileKind::is_passable)
    }

    fn positions(&self) -> impl Iterator<Item = (Position, TileKind)> + '_ {
        self.tiles.iter().enumerate().flat_map(|(x, column)| {
            column
                .iter()
                .enumerate()
                .map(move |(y, kind)| (Position::new(x as i32, y as i32), *kind))
        })
    }

    fn tile_updates(&self) -> Vec<TileUpdate> {
        self.positions()
            .map(|(position, kind)| TileUpdate::new(position.x, position.y, kind))
            .collect()
    }
}

#[derive(Debug)]
struct Courier {
    id: AgentId,
    position: Position,
    score: f64,
}

#[derive(Debug)]
struct Loose {
    position: Position,
    carried_by: Option<usize>,
    reward: f64,
}

#[derive(Debug)]
struct ArenaState {
    couriers: Vec<Courier>,
    parcels: BTreeMap<ParcelId, Loose>,
    frame: u64,
    spawned: u64,
    rng: StdRng,
}

pub struct Arena {
    map: ArenaMap,
    feed: SensingFeed,
    state: Mutex<ArenaState>,
}

impl Arena {
    /// Places `agents` couriers on the map's start tiles, or on the first
    /// free walkable tiles when fewer starts are listed.
    pub fn new(
        map: ArenaMap,
        agents: usize,
        feed: SensingFeed,
        seed: u64,
    ) -> anyhow::Result<Arc<Self>> {
        let mut starts: Vec<Position> = map
            .starts
            .iter()
            .map(|start| Position::new(start.x, start.y))
            .filter(|position| map.is_passable(*position))
            .collect();
        starts.dedup();
        let extra: Vec<Position> = map
            .positions()
            .filter(|(position, kind)| kind.is_passable() && !starts.contains(position))
            .map(|(position, _)| position)
            .collect();
        starts.extend(extra);
        if starts.len() < agents {
            bail!("arena has room for {} agents, {agents} requested", starts.len());
        }

        let couriers = starts
            .into_iter()
            .take(agents)
            .enumerate()
            .map(|(index, position)| Courier {
                id: AgentId::new(format!("courier-{index}")),
                position,
                score: 0.0,
            })
            .collect();
        let parcels = map
            .parcels
            .iter()
            .map(|parcel| {
                (
                    parcel.id.clone(),
                    Loose {
                        position: Position::new(parcel.x, parcel.y),
                        carried_by: None,
                        reward: parcel.reward,
                    },
                )
            })
            .collect();

        Ok(Arc::new(Self {
            map,
            feed,
            state: Mutex::new(ArenaState {
                couriers,
                parcels,
                frame: 0,
                spawned: 0,
                rng: StdRng::seed_from_u64(seed),
            }),
        }))
    }

    /// Transport for the agent in `slot`.
    pub fn seat(self: &Arc<Self>, slot: AgentSlot) -> Arc<dyn Transport> {
        Arc::new(ArenaSeat {
            arena: Arc::clone(self),
            slot,
        })
    }

    fn state(&self) -> Result<MutexGuard<'_, ArenaState>> {
        self.state
            .lock()
            .map_err(|_| RuntimeError::Transport("arena state poisoned".into()))
    }

    /// Sends what the server sends on connect: configuration, map and a
    /// first round of sensing.
    pub fn connect(&self) -> Result<()> {
        self.feed.push(SensingEvent::Config(self.map.config.clone()))?;
        self.feed.push(SensingEvent::Map {
            width: self.map.width,
            height: self.map.height,
            tiles: self.map.tile_updates(),
        })?;
        let state = self.state()?;
        info!(
            width = self.map.width,
            height = self.map.height,
            agents = state.couriers.len(),
            "arena connected"
        );
        self.sense_all(&state)
    }

    /// Advances one server frame: decays rewards, spawns a parcel when
    /// below the cap, then pushes fresh sensing to every agent.
    pub fn tick(&self) -> Result<()> {
        let mut state = self.state()?;
        state.frame += 1;

        let config = &self.map.config;
        if config.decays() {
            let loss = config.clock_seconds() / config.decay_interval;
            state.parcels.retain(|_, parcel| {
                parcel.reward -= loss;
                parcel.reward > 0.0
            });
        }
        if (state.parcels.len() as u32) < config.parcels_max {
            self.spawn_parcel(&mut state);
        }

        self.sense_all(&state)
    }

    fn spawn_parcel(&self, state: &mut ArenaState) {
        let free: Vec<Position> = self
            .map
            .positions()
            .filter(|(position, kind)| {
                *kind == TileKind::Spawn
                    && !state
                        .parcels
                        .values()
                        .any(|parcel| parcel.carried_by.is_none() && parcel.position == *position)
            })
            .map(|(position, _)| position)
            .collect();
        let Some(&position) = free.choose(&mut state.rng) else {
            return;
        };
        state.spawned += 1;
        let id = ParcelId::new(format!("s{}", state.spawned));
        let reward = self.map.config.parcel_reward_avg.max(1.0);
        debug!(%id, %position, reward, "parcel spawned");
        state.parcels.insert(
            id,
            Loose {
                position,
                carried_by: None,
                reward,
            },
        );
    }

    pub fn score(&self, slot: AgentSlot) -> f64 {
        self.state()
            .ok()
            .and_then(|state| state.couriers.get(slot.index()).map(|courier| courier.score))
            .unwrap_or_default()
    }

    pub fn position(&self, slot: AgentSlot) -> Option<Position> {
        let state = self.state().ok()?;
        state.couriers.get(slot.index()).map(|courier| courier.position)
    }

    pub fn parcel_count(&self) -> usize {
        self.state().map(|state| state.parcels.len()).unwrap_or_default()
    }

    fn sense_all(&self, state: &ArenaState) -> Result<()> {
        (0..state.couriers.len()).try_for_each(|index| self.sense(state, index))
    }

    fn sense(&self, state: &ArenaState, index: usize) -> Result<()> {
        let Some(me) = state.couriers.get(index) else {
            return Ok(());
        };
        let slot = AgentSlot(index);
        let config = &self.map.config;
        let time = ServerTime {
            ms: state.frame * config.clock_ms,
            frame: state.frame,
        };

        self.feed.push(SensingEvent::You {
            slot,
            payload: SelfPayload {
                id: me.id.clone(),
                name: me.id.to_string(),
                x: f64::from(me.position.x),
                y: f64::from(me.position.y),
                score: me.score,
                ..SelfPayload::default()
            },
            time,
        })?;

        let parcels = state
            .parcels
            .iter()
            .filter_map(|(id, parcel)| {
                let carrier = parcel.carried_by.and_then(|owner| state.couriers.get(owner));
                let position = carrier.map_or(parcel.position, |courier| courier.position);
                (position.manhattan(me.position) < config.parcels_obs_distance).then(|| {
                    SensedParcel {
                        id: id.clone(),
                        x: f64::from(position.x),
                        y: f64::from(position.y),
                        carried_by: carrier.map(|courier| courier.id.clone()),
                        reward: parcel.reward,
                    }
                })
            })
            .collect();
        self.feed.push(SensingEvent::Parcels { slot, parcels })?;

        let agents = state
            .couriers
            .iter()
            .enumerate()
            .filter(|(other, courier)| {
                *other != index
                    && courier.position.manhattan(me.position) < config.agents_obs_distance
            })
            .map(|(_, courier)| SensedAgent {
                id: courier.id.clone(),
                name: courier.id.to_string(),
                team_id: None,
                x: f64::from(courier.position.x),
                y: f64::from(courier.position.y),
                score: courier.score,
            })
            .collect();
        self.feed.push(SensingEvent::Agents { slot, agents })
    }

    fn apply_move(&self, index: usize, direction: Direction) -> Result<bool> {
        let mut state = self.state()?;
        let Some(from) = state.couriers.get(index).map(|courier| courier.position) else {
            return Err(RuntimeError::Transport(format!("no courier in seat {index}")));
        };
        let to = from.step(direction);
        let occupied = state.couriers.iter().any(|courier| courier.position == to);
        if !self.map.is_passable(to) || occupied {
            debug!(seat = index, %from, %to, "move blocked");
            return Ok(false);
        }
        if let Some(courier) = state.couriers.get_mut(index) {
            courier.position = to;
        }
        self.sense_all(&state)?;
        Ok(true)
    }

    fn apply_pickup(&self, index: usize) -> Result<Vec<ParcelId>> {
        let mut state = self.state()?;
        let Some(here) = state.couriers.get(index).map(|courier| courier.position) else {
            return Err(RuntimeError::Transport(format!("no courier in seat {index}")));
        };
        let mut picked = Vec::new();
        for (id, parcel) in state.parcels.iter_mut() {
            if parcel.carried_by.is_none() && parcel.position == here {
                parcel.carried_by = Some(index);
                picked.push(id.clone());
            }
        }
        self.sense_all(&state)?;
        Ok(picked)
    }

    fn apply_putdown(&self, index: usize) -> Result<Vec<ParcelId>> {
        let mut state = self.state()?;
        let Some(here) = state.couriers.get(index).map(|courier| courier.position) else {
            return Err(RuntimeError::Transport(format!("no courier in seat {index}")));
        };
        let on_base = self.map.kind(here) == Some(TileKind::Base);

        let mut dropped = Vec::new();
        let mut delivered = 0.0;
        state.parcels.retain(|id, parcel| {
            if parcel.carried_by != Some(index) {
                return true;
            }
            dropped.push(id.clone());
            if on_base {
                delivered += parcel.reward;
                return false;
            }
            parcel.carried_by = None;
            parcel.position = here;
            true
        });
        if let Some(courier) = state.couriers.get_mut(index) {
            courier.score += delivered;
            if delivered > 0.0 {
                info!(courier = %courier.id, delivered, score = courier.score, "parcels delivered");
            }
        }
        self.sense_all(&state)?;
        Ok(dropped)
    }
}

/// One agent's connection to the [`Arena`].
pub struct ArenaSeat {
    arena: Arc<Arena>,
    slot: AgentSlot,
}

#[async_trait]
impl Transport for ArenaSeat {
    async fn emit_move(&self, direction: Direction) -> Result<bool> {
        self.arena.apply_move(self.slot.index(), direction)
    }

    async fn emit_pickup(&self) -> Result<Vec<ParcelId>> {
        self.arena.apply_pickup(self.slot.index())
    }

    async fn emit_putdown(&self) -> Result<Vec<ParcelId>> {
        self.arena.apply_putdown(self.slot.index())
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    const CORRIDOR: &str = r#"{
        "width": 4,
        "height": 1,
        "tiles": [[2], [3], [3], [0]],
        "starts": [{"x": 2, "y": 0}, {"x": 1, "y": 0}],
        "parcels": [{"id": "p1", "x": 2, "y": 0, "reward": 7}]
    }"#;

    fn arena(agents: usize) -> (Arc<Arena>, UnboundedReceiver<SensingEvent>) {
        let map = ArenaMap::from_json(CORRIDOR).expect("valid map");
        let (feed, rx) = SensingFeed::channel();
        (Arena::new(map, agents, feed, 3).expect("arena"), rx)
    }

    #[test]
    fn rejects_ragged_tiles() {
        let error = ArenaMap::from_json(r#"{"width": 2, "height": 1, "tiles": [[3]]}"#)
            .unwrap_err();
        assert!(error.to_string().contains("tile columns"), "{error:#}");
    }

    #[test]
    fn demo_map_loads() {
        let map = ArenaMap::demo().expect("demo map");
        assert!(map.positions().any(|(_, kind)| kind == TileKind::Base));
        assert!(map.positions().any(|(_, kind)| kind == TileKind::Spawn));
    }

    #[tokio::test]
    async fn walls_and_agents_block_moves() {
        let (arena, _rx) = arena(2);
        let seat = arena.seat(AgentSlot::FIRST);
        assert!(!seat.emit_move(Direction::Right).await.unwrap());
        assert!(!seat.emit_move(Direction::Left).await.unwrap());
        assert!(!seat.emit_move(Direction::Up).await.unwrap());
        assert_eq!(arena.position(AgentSlot::FIRST), Some(Position::new(2, 0)));
    }

    #[tokio::test]
    async fn delivering_on_a_base_scores_the_reward() {
        let (arena, mut rx) = arena(1);
        let seat = arena.seat(AgentSlot::FIRST);
        assert_eq!(seat.emit_pickup().await.unwrap(), vec![ParcelId::from("p1")]);
        assert!(seat.emit_move(Direction::Left).await.unwrap());

        // Off base the parcel is just dropped.
        assert_eq!(seat.emit_putdown().await.unwrap().len(), 1);
        assert_eq!(arena.score(AgentSlot::FIRST), 0.0);
        assert_eq!(arena.parcel_count(), 1);

        seat.emit_pickup().await.unwrap();
        assert!(seat.emit_move(Direction::Left).await.unwrap());
        seat.emit_putdown().await.unwrap();
        assert_eq!(arena.score(AgentSlot::FIRST), 7.0);
        assert_eq!(arena.parcel_count(), 0);

        let mut last_score = None;
        while let Ok(event) = rx.try_recv() {
            if let SensingEvent::You { payload, .. } = event {
                last_score = Some(payload.score);
            }
        }
        assert_eq!(last_score, Some(7.0));
    }

    #[test]
    fn too_many_agents_is_an_error() {
        let map = ArenaMap::from_json(CORRIDOR).expect("valid map");
        let (feed, _rx) = SensingFeed::channel();
        assert!(Arena::new(map, 4, feed, 0).is_err());
    }
}
