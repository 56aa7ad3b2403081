//! Everything the agents believe about the world.
//!
//! One [`Beliefs`] value is shared by every agent slot and owned by the
//! belief worker, so sensing updates and deliberation never interleave.
use courier_core::{
    AgentId, AgentTuning, GridIndex, Observer, ParcelStore, Position, RivalStore, SelfPayload,
    ServerConfig, ServerTime,
};
use tracing::{debug, info, warn};

use crate::api::{AgentSlot, SensingEvent};
use crate::coordination::Blackboard;

/// Latest authoritative state of one of our agents.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelfState {
    pub payload: SelfPayload,
    pub time: ServerTime,
}

impl SelfState {
    pub fn id(&self) -> &AgentId {
        &self.payload.id
    }

    pub fn tile(&self) -> Position {
        self.payload.tile()
    }

    pub fn is_on_tile(&self) -> bool {
        self.payload.is_on_tile()
    }

    pub fn observer(&self) -> Observer<'_> {
        Observer {
            id: &self.payload.id,
            team_id: self.payload.team_id.as_ref(),
            position: self.tile(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Beliefs {
    pub grid: GridIndex,
    pub parcels: ParcelStore,
    pub rivals: RivalStore,
    pub config: ServerConfig,
    pub tuning: AgentTuning,
    pub blackboard: Blackboard,
    selves: Vec<Option<SelfState>>,
    /// Server ms at which parcel decay was last applied.
    decay_clock_ms: Option<u64>,
    map_loaded: bool,
}

impl Beliefs {
    pub fn new(slots: usize, tuning: AgentTuning) -> Self {
        Self {
            grid: GridIndex::new(),
            parcels: ParcelStore::new(&tuning),
            rivals: RivalStore::new(),
            config: ServerConfig::default(),
            tuning,
            blackboard: Blackboard::new(),
            selves: vec![None; slots],
            decay_clock_ms: None,
            map_loaded: false,
        }
    }

    pub fn slots(&self) -> usize {
        self.selves.len()
    }

    pub fn self_state(&self, slot: AgentSlot) -> Option<&SelfState> {
        self.selves.get(slot.index()).and_then(Option::as_ref)
    }

    /// Ids of every slot whose self state has arrived, in slot order.
    pub fn known_agents(&self) -> Vec<AgentId> {
        self.selves
            .iter()
            .flatten()
            .map(|state| state.id().clone())
            .collect()
    }

    pub fn map_loaded(&self) -> bool {
        self.map_loaded
    }

    /// Map received and every slot's identity known.
    pub fn is_ready(&self) -> bool {
        self.map_loaded && self.selves.iter().all(Option::is_some)
    }

    /// Folds one sensing event into the stores. Returns the updated self
    /// state when the event was an `onYou`.
    pub fn apply(&mut self, event: SensingEvent) -> Option<(AgentSlot, SelfState)> {
        match event {
            SensingEvent::You {
                slot,
                payload,
                time,
            } => {
                let Some(entry) = self.selves.get_mut(slot.index()) else {
                    warn!(%slot, "self update for unknown slot");
                    return None;
                };
                self.rivals.mark_ally(payload.id.clone());
                let state = SelfState { payload, time };
                *entry = Some(state.clone());
                Some((slot, state))
            }
            SensingEvent::Tile(tile) => {
                self.grid.add_tile(tile.position(), tile.kind);
                None
            }
            SensingEvent::Map {
                width,
                height,
                tiles,
            } => {
                match self.grid.load_map(width, height, tiles) {
                    Ok(()) => {
                        self.map_loaded = true;
                        let sparse = self.grid.calculate_sparseness(&self.config, &self.tuning);
                        info!(width, height, sparse, "map loaded");
                    }
                    Err(error) => warn!(%error, "map rejected"),
                }
                None
            }
            SensingEvent::Config(config) => {
                debug!(?config, "server configuration received");
                self.config = config;
                if self.map_loaded {
                    self.grid.calculate_sparseness(&self.config, &self.tuning);
                }
                None
            }
            SensingEvent::Parcels { slot, parcels } => {
                let Some(observer) = self.self_state(slot).cloned() else {
                    debug!(%slot, "parcel sensing before self state, ignored");
                    return None;
                };
                self.parcels.update_all(
                    observer.tile(),
                    &parcels,
                    observer.time.frame,
                    &self.grid,
                    &self.config,
                );
                self.expire_handoff(observer.tile());
                None
            }
            SensingEvent::Agents { slot, agents } => {
                let Some(observer) = self.self_state(slot).cloned() else {
                    debug!(%slot, "agent sensing before self state, ignored");
                    return None;
                };
                self.rivals.update_all(
                    observer.observer(),
                    &agents,
                    observer.time.ms,
                    &self.config,
                );
                None
            }
        }
    }

    /// Applies parcel decay for the time elapsed since the previous call.
    ///
    /// Shared by every slot, so two agents deliberating in the same tick do
    /// not age parcels twice.
    pub fn age_parcels(&mut self, now: ServerTime) {
        let last = self.decay_clock_ms.unwrap_or(now.ms);
        let elapsed_ms = now.ms.saturating_sub(last);
        self.decay_clock_ms = Some(last.max(now.ms));
        self.parcels.update_data(
            elapsed_ms as f64 / 1000.0,
            now.frame,
            self.rivals.len(),
            &self.config,
            &self.tuning,
        );
    }

    /// Clears a hand-off whose tile is in view of `observer` but no longer
    /// holds a loose parcel.
    fn expire_handoff(&mut self, observer: Position) {
        let Some(position) = self.blackboard.dropped().map(|drop| drop.position) else {
            return;
        };
        if position.manhattan(observer) >= self.config.parcels_obs_distance {
            return;
        }
        let stocked = self
            .parcels
            .iter()
            .any(|parcel| !parcel.is_carried() && parcel.position == position);
        if !stocked {
            debug!(%position, "hand-off tile seen empty, record cleared");
            self.blackboard.reset_drop();
        }
    }

    /// Tiles of the rivals `slot` can currently see.
    pub fn visible_rival_tiles(&self, slot: AgentSlot) -> Vec<Position> {
        let Some(me) = self.self_state(slot) else {
            return Vec::new();
        };
        self.rivals
            .visible(me.observer(), &self.config)
            .into_iter()
            .map(|rival| rival.tile())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use courier_core::{ParcelId, SensedParcel, TileKind, TileUpdate};

    use super::*;

    fn you(slot: AgentSlot, id: &str, x: f64, y: f64, ms: u64, frame: u64) -> SensingEvent {
        SensingEvent::You {
            slot,
            payload: SelfPayload {
                id: AgentId::from(id),
                x,
                y,
                ..SelfPayload::default()
            },
            time: ServerTime { ms, frame },
        }
    }

    fn map() -> SensingEvent {
        SensingEvent::Map {
            width: 4,
            height: 1,
            tiles: (0..4)
                .map(|x| {
                    let kind = if x == 0 { TileKind::Base } else { TileKind::Walkable };
                    TileUpdate::new(x, 0, kind)
                })
                .collect(),
        }
    }

    #[test]
    fn readiness_needs_map_and_every_identity() {
        let mut beliefs = Beliefs::new(2, AgentTuning::default());
        assert!(!beliefs.is_ready());
        beliefs.apply(map());
        beliefs.apply(you(AgentSlot::FIRST, "a", 1.0, 0.0, 0, 0));
        assert!(!beliefs.is_ready());
        beliefs.apply(you(AgentSlot::SECOND, "b", 2.0, 0.0, 0, 0));
        assert!(beliefs.is_ready());
        assert_eq!(beliefs.known_agents(), vec![AgentId::from("a"), AgentId::from("b")]);
        assert!(beliefs.rivals.is_ally(&AgentId::from("b")));
    }

    #[test]
    fn second_aging_in_same_instant_is_a_no_op() {
        let mut beliefs = Beliefs::new(1, AgentTuning::default());
        beliefs.config.decay_interval = 1.0;
        beliefs.config.parcels_obs_distance = 1;
        beliefs.apply(map());
        beliefs.apply(you(AgentSlot::FIRST, "a", 0.0, 0.0, 0, 0));
        beliefs.apply(SensingEvent::Parcels {
            slot: AgentSlot::FIRST,
            parcels: vec![SensedParcel {
                id: ParcelId::from("p"),
                x: 3.0,
                y: 0.0,
                carried_by: None,
                reward: 5.0,
            }],
        });

        beliefs.age_parcels(ServerTime { ms: 0, frame: 0 });
        beliefs.age_parcels(ServerTime { ms: 1000, frame: 20 });
        beliefs.age_parcels(ServerTime { ms: 1000, frame: 20 });
        let reward = beliefs.parcels.get(&ParcelId::from("p")).map(|p| p.reward);
        assert_eq!(reward, Some(4.0));
    }

    #[test]
    fn handoff_is_cleared_once_its_tile_is_seen_empty() {
        let mut beliefs = Beliefs::new(1, AgentTuning::default());
        beliefs.config.parcels_obs_distance = 3;
        beliefs.apply(map());
        beliefs.apply(you(AgentSlot::FIRST, "a", 0.0, 0.0, 0, 0));
        let drop = Position::new(2, 0);
        beliefs
            .blackboard
            .set_dropped(drop, 9.0, 1, AgentId::from("b"), &beliefs.grid);

        let loose = SensedParcel {
            id: ParcelId::from("p"),
            x: 2.0,
            y: 0.0,
            carried_by: None,
            reward: 9.0,
        };
        beliefs.apply(SensingEvent::Parcels {
            slot: AgentSlot::FIRST,
            parcels: vec![loose],
        });
        assert!(beliefs.blackboard.is_drop_tile(drop));

        beliefs.apply(SensingEvent::Parcels {
            slot: AgentSlot::FIRST,
            parcels: Vec::new(),
        });
        assert!(beliefs.blackboard.dropped().is_none());
    }
}
