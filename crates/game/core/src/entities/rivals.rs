//! Registry of other agents seen on the map.
use std::collections::{BTreeMap, BTreeSet};

use crate::config::ServerConfig;
use crate::payload::SensedAgent;
use crate::types::{AgentId, Direction, Position, TeamId};

#[derive(Clone, Debug, PartialEq)]
pub struct Rival {
    pub id: AgentId,
    pub name: String,
    pub team_id: Option<TeamId>,
    pub x: f64,
    pub y: f64,
    pub score: f64,
    /// Last observed heading; `None` when it did not move between sightings.
    pub direction: Option<Direction>,
    pub last_seen_ms: u64,
}

impl Rival {
    pub fn tile(&self) -> Position {
        Position::round(self.x, self.y)
    }

    /// True when continuing along the last heading brings it strictly closer to `target`.
    pub fn is_heading_towards(&self, target: Position) -> bool {
        let Some(direction) = self.direction else {
            return false;
        };
        let here = self.tile();
        here.step(direction).manhattan(target) < here.manhattan(target)
    }
}

/// Who is looking, for visibility queries.
#[derive(Clone, Copy, Debug)]
pub struct Observer<'a> {
    pub id: &'a AgentId,
    pub team_id: Option<&'a TeamId>,
    pub position: Position,
}

#[derive(Clone, Debug, Default)]
pub struct RivalStore {
    agents: BTreeMap<AgentId, Rival>,
    allies: BTreeSet<AgentId>,
}

impl RivalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one of our own agents so it is never reported as a rival.
    pub fn mark_ally(&mut self, id: AgentId) {
        self.allies.insert(id);
    }

    pub fn is_ally(&self, id: &AgentId) -> bool {
        self.allies.contains(id)
    }

    /// Inserts a first sighting or updates a known agent.
    pub fn add_agent(&mut self, sensed: &SensedAgent, timestamp_ms: u64) {
        if self.agents.contains_key(&sensed.id) {
            self.update_agent(sensed, timestamp_ms);
            return;
        }
        self.agents.insert(
            sensed.id.clone(),
            Rival {
                id: sensed.id.clone(),
                name: sensed.name.clone(),
                team_id: sensed.team_id.clone(),
                x: sensed.x,
                y: sensed.y,
                score: sensed.score,
                direction: None,
                last_seen_ms: timestamp_ms,
            },
        );
    }

    /// Moves a known agent, inferring its heading from the coordinate delta.
    pub fn update_agent(&mut self, sensed: &SensedAgent, timestamp_ms: u64) {
        let Some(agent) = self.agents.get_mut(&sensed.id) else {
            return;
        };
        agent.direction = Direction::from_delta(sensed.x - agent.x, sensed.y - agent.y);
        agent.x = sensed.x;
        agent.y = sensed.y;
        agent.score = sensed.score;
        agent.last_seen_ms = timestamp_ms;
        if sensed.team_id.is_some() {
            agent.team_id = sensed.team_id.clone();
        }
    }

    /// Merges one observer's sensing batch.
    ///
    /// Rivals last seen strictly inside the observer's agent radius but
    /// missing from the batch have walked out of view and are forgotten.
    /// Allies and the observer itself are never evicted here.
    pub fn update_all(
        &mut self,
        observer: Observer<'_>,
        sensed: &[SensedAgent],
        timestamp_ms: u64,
        config: &ServerConfig,
    ) {
        let radius = config.agents_obs_distance;
        let allies = &self.allies;
        self.agents.retain(|id, agent| {
            if id == observer.id || allies.contains(id) {
                return true;
            }
            let in_view = agent.tile().manhattan(observer.position) < radius;
            !in_view || sensed.iter().any(|s| &s.id == id)
        });
        for agent in sensed {
            self.add_agent(agent, timestamp_ms);
        }
    }

    pub fn remove(&mut self, id: &AgentId) -> Option<Rival> {
        self.agents.remove(id)
    }

    pub fn get(&self, id: &AgentId) -> Option<&Rival> {
        self.agents.get(id)
    }

    /// Every tracked agent, allies included; feeds the existence estimate.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Rivals within the agent observation radius (Manhattan, strict) of `observer`.
    ///
    /// Excludes the observer, registered allies and anyone sharing its team.
    pub fn visible(&self, observer: Observer<'_>, config: &ServerConfig) -> Vec<&Rival> {
        self.agents
            .values()
            .filter(|agent| &agent.id != observer.id && !self.allies.contains(&agent.id))
            .filter(|agent| match (observer.team_id, agent.team_id.as_ref()) {
                (Some(ours), Some(theirs)) => ours != theirs,
                _ => true,
            })
            .filter(|agent| agent.tile().manhattan(observer.position) < config.agents_obs_distance)
            .collect()
    }

    /// Whether `rival` is moving closer to `target`; unknown agents never are.
    pub fn going_towards(&self, rival: &AgentId, target: Position) -> bool {
        self.agents
            .get(rival)
            .is_some_and(|agent| agent.is_heading_towards(target))
    }
}
