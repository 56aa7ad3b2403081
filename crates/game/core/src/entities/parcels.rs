//! Parcel registry with reward decay and existence estimation.
//!
//! Parcels outside every observer's view are tracked from memory: their
//! reward is decayed at the server's rate and their existence probability
//! falls off with how long they have gone unseen and how many agents are
//! around to take them.
use std::collections::BTreeMap;

use crate::config::{AgentTuning, ServerConfig};
use crate::grid::GridIndex;
use crate::payload::SensedParcel;
use crate::types::{AgentId, ParcelId, Position, frames_to_seconds};

#[derive(Clone, Debug, PartialEq)]
pub struct Parcel {
    pub id: ParcelId,
    pub position: Position,
    pub carried_by: Option<AgentId>,
    pub reward: f64,
    /// Walking distance to the nearest base; infinite while carried.
    pub base_distance: f64,
    pub last_seen_frame: u64,
    pub existence_probability: f64,
}

impl Parcel {
    pub fn is_carried(&self) -> bool {
        self.carried_by.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct ParcelStore {
    parcels: BTreeMap<ParcelId, Parcel>,
    availability_threshold: f64,
}

impl Default for ParcelStore {
    fn default() -> Self {
        Self::new(&AgentTuning::default())
    }
}

impl ParcelStore {
    pub fn new(tuning: &AgentTuning) -> Self {
        Self {
            parcels: BTreeMap::new(),
            availability_threshold: tuning.availability_threshold,
        }
    }

    /// Merges one observer's sensing batch taken at `frame`.
    ///
    /// Parcels the observer should be able to see (Manhattan distance strictly
    /// below the parcel observation radius) but that are missing from the batch
    /// are dropped. Every sensed parcel is inserted or refreshed.
    pub fn update_all(
        &mut self,
        observer: Position,
        sensed: &[SensedParcel],
        frame: u64,
        grid: &GridIndex,
        config: &ServerConfig,
    ) {
        let radius = config.parcels_obs_distance;
        self.parcels.retain(|id, parcel| {
            let in_view = parcel.position.manhattan(observer) < radius;
            !in_view || sensed.iter().any(|s| &s.id == id)
        });

        for incoming in sensed {
            let position = incoming.position();
            let base_distance = match incoming.carried_by {
                Some(_) => f64::INFINITY,
                None => grid
                    .nearest_base(position)
                    .map_or(f64::INFINITY, |(_, distance)| distance),
            };
            self.parcels.insert(
                incoming.id.clone(),
                Parcel {
                    id: incoming.id.clone(),
                    position,
                    carried_by: incoming.carried_by.clone(),
                    reward: incoming.reward,
                    base_distance,
                    last_seen_frame: frame,
                    existence_probability: 1.0,
                },
            );
        }
    }

    /// Ages every parcel not sensed at `frame`.
    ///
    /// Reward drops by `elapsed_seconds / decay_interval` and the existence
    /// probability becomes `exp(-λ · seconds_unseen · active_agents)`.
    /// Parcels whose reward reaches zero are removed.
    pub fn update_data(
        &mut self,
        elapsed_seconds: f64,
        frame: u64,
        active_agents: usize,
        config: &ServerConfig,
        tuning: &AgentTuning,
    ) {
        for parcel in self.parcels.values_mut() {
            if parcel.last_seen_frame == frame {
                parcel.existence_probability = 1.0;
                continue;
            }
            if config.decays() {
                parcel.reward -= elapsed_seconds / config.decay_interval;
            }
            let unseen = frames_to_seconds(frame.saturating_sub(parcel.last_seen_frame));
            parcel.existence_probability =
                (-tuning.parcel_survival_lambda * unseen * active_agents as f64).exp();
        }

        let before = self.parcels.len();
        self.parcels.retain(|_, parcel| parcel.reward > 0.0);
        let expired = before - self.parcels.len();
        if expired > 0 {
            tracing::debug!(expired, "parcels decayed away");
        }
    }

    /// Uncarried parcels we are confident still exist.
    pub fn available(&self) -> impl Iterator<Item = &Parcel> + '_ {
        self.parcels.values().filter(|parcel| {
            !parcel.is_carried() && parcel.existence_probability >= self.availability_threshold
        })
    }

    pub fn carried<'a>(&'a self, agent: &'a AgentId) -> impl Iterator<Item = &'a Parcel> + 'a {
        self.parcels
            .values()
            .filter(move |parcel| parcel.carried_by.as_ref() == Some(agent))
    }

    /// Total reward and count of the parcels `agent` carries.
    pub fn carried_summary(&self, agent: &AgentId) -> (f64, usize) {
        self.carried(agent)
            .fold((0.0, 0), |(value, count), parcel| (value + parcel.reward, count + 1))
    }

    /// Forgets everything `agent` carried; the putdown side effect.
    pub fn remove_carried_by(&mut self, agent: &AgentId) -> Vec<ParcelId> {
        let carried: Vec<ParcelId> = self.carried(agent).map(|p| p.id.clone()).collect();
        for id in &carried {
            self.parcels.remove(id);
        }
        carried
    }

    pub fn remove(&mut self, id: &ParcelId) -> Option<Parcel> {
        self.parcels.remove(id)
    }

    pub fn get(&self, id: &ParcelId) -> Option<&Parcel> {
        self.parcels.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parcel> + '_ {
        self.parcels.values()
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }
}
