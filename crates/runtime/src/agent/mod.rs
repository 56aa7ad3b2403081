//! Belief-desire-intention loop of a single agent.
//!
//! Each tick an [`Agent`] ages its parcel beliefs, generates every candidate
//! goal with a score, ranks them and commits to the first one it is not
//! contending for with a closer rival. The chosen goal becomes a [`Plan`] of
//! transport commands; the outcome is reported back through
//! [`Agent::complete`] so the next tick starts from what really happened.
//!
//! Agent state here is purely about intentions (current path, timers,
//! blacklisted bases). Everything observed about the world lives in
//! [`Beliefs`], which the caller lends for the duration of one deliberation.
mod achieve;
mod desire;
mod movement;
mod plan;

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::Instant;
use tracing::{debug, warn};

use courier_core::{Position, ServerConfig};

use crate::api::{AgentCommand, AgentSlot};
use crate::beliefs::{Beliefs, SelfState};
use crate::scoring::{
    EXCHANGE_PARCELS, FREE_MATE, Load, PICKUP_NEAR_PARCEL, deposit_score, pickup_score,
};

pub use desire::{Desire, IntentionKey, PickupTarget, Role, rank};
pub use plan::{Plan, PlanOutcome, Rejection};

pub(crate) use plan::PlanEffect;

use movement::{Camp, Route};

pub struct Agent {
    slot: AgentSlot,
    role: Role,
    rng: StdRng,
    last_intention: Option<IntentionKey>,
    route: Route,
    moving: bool,
    pending_effect: Option<PlanEffect>,
    colliding_since: Option<Instant>,
    camp: Camp,
    explore_target: Option<Position>,
    deposit_base: Option<Position>,
    deposit_collisions: usize,
    blocked_bases: BTreeMap<Position, Instant>,
}

impl Agent {
    pub fn new(slot: AgentSlot, role: Role, seed: u64) -> Self {
        Self {
            slot,
            role,
            rng: StdRng::seed_from_u64(seed),
            last_intention: None,
            route: Route::default(),
            moving: false,
            pending_effect: None,
            colliding_since: None,
            camp: Camp::default(),
            explore_target: None,
            deposit_base: None,
            deposit_collisions: 0,
            blocked_bases: BTreeMap::new(),
        }
    }

    pub fn slot(&self) -> AgentSlot {
        self.slot
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn last_intention(&self) -> Option<IntentionKey> {
        self.last_intention
    }

    /// Runs one tick of the loop and returns the commands to execute.
    ///
    /// Returns an idle plan while a previous plan is still in flight, while
    /// our identity is unknown or before the map has arrived.
    pub fn deliberate(&mut self, beliefs: &mut Beliefs, now: Instant) -> Plan {
        if self.moving {
            debug!(slot = %self.slot, "previous plan still in flight, skipping tick");
            return Plan::idle();
        }
        let Some(me) = beliefs.self_state(self.slot).cloned() else {
            return Plan::idle();
        };
        if !beliefs.grid.is_ready() || !me.is_on_tile() {
            return Plan::idle();
        }

        self.blocked_bases.retain(|_, until| *until > now);
        beliefs.age_parcels(me.time);
        if let Some(drop) = beliefs.blackboard.handoff_for(me.id())
            && !beliefs.grid.distance(me.tile(), drop.position).is_finite()
        {
            let position = drop.position;
            warn!(slot = %self.slot, %position, "hand-off tile unreachable, record cleared");
            beliefs.blackboard.reset_drop();
        }

        let desires = rank(self.generate_desires(beliefs, &me));
        let plan = self.act(beliefs, &me, desires, now);
        if !plan.is_empty() {
            self.moving = true;
        }
        plan
    }

    /// Folds an executed plan back into the agent and the shared beliefs.
    pub fn complete(&mut self, outcome: &PlanOutcome, beliefs: &mut Beliefs) {
        self.moving = false;

        if let Some(rejection) = &outcome.rejected {
            warn!(
                slot = %self.slot,
                command = %rejection.command,
                reason = %rejection.reason,
                "plan interrupted, intention dropped"
            );
            self.last_intention = None;
            self.route.clear();
        }

        if outcome.executed(AgentCommand::Putdown)
            && let Some(me) = beliefs.self_state(self.slot).map(|state| state.id().clone())
        {
            let delivered = beliefs.parcels.remove_carried_by(&me);
            debug!(slot = %self.slot, parcels = delivered.len(), "load put down");
        }

        if let Some(effect) = self.pending_effect.take() {
            effect.settle(outcome, beliefs);
        }
    }

    fn mate(&self, beliefs: &Beliefs) -> Option<SelfState> {
        if !self.role.has_mate() {
            return None;
        }
        beliefs.self_state(self.slot.mate()).cloned()
    }

    fn generate_desires(&self, beliefs: &Beliefs, me: &SelfState) -> Vec<Desire> {
        let grid = &beliefs.grid;
        let config = &beliefs.config;
        let here = me.tile();
        let load = Load::from(beliefs.parcels.carried_summary(me.id()));
        let mate = self.mate(beliefs);
        let mut desires = Vec::new();

        if let Some(mate) = &mate {
            if beliefs.blackboard.move_away_agent() == Some(me.id()) {
                desires.push(Desire::GoAway { score: FREE_MATE });
            }
            let mate_tile = mate.tile();
            if !load.is_empty() && grid.distance(here, mate_tile) <= 1.0 {
                let mine = base_distance(beliefs, here);
                let theirs = base_distance(beliefs, mate_tile);
                if mine > theirs {
                    desires.push(Desire::DropAndGoAway {
                        score: EXCHANGE_PARCELS,
                    });
                }
            }
        }

        let mate_view = mate.as_ref().map(|mate| {
            (
                mate.tile(),
                Load::from(beliefs.parcels.carried_summary(mate.id())),
            )
        });
        for parcel in beliefs.parcels.available() {
            if beliefs.blackboard.is_drop_tile(parcel.position) || !parcel.base_distance.is_finite()
            {
                continue;
            }
            let distance = grid.distance(here, parcel.position);
            if !distance.is_finite() {
                continue;
            }
            let base = Some(parcel.base_distance);
            let score = parcel_score(distance, load, parcel.reward, 1, base, config);
            if let Some((mate_tile, mate_load)) = mate_view {
                let mate_distance = grid.distance(mate_tile, parcel.position);
                let theirs = if mate_distance.is_finite() {
                    parcel_score(mate_distance, mate_load, parcel.reward, 1, base, config)
                } else {
                    f64::NEG_INFINITY
                };
                if !self.role.claims(score, theirs) {
                    continue;
                }
            }
            desires.push(Desire::Pickup {
                target: PickupTarget::Parcel {
                    id: parcel.id.clone(),
                    position: parcel.position,
                },
                score,
            });
        }

        if let Some(drop) = beliefs.blackboard.handoff_for(me.id()) {
            let distance = grid.distance(here, drop.position);
            if distance.is_finite() {
                let score = parcel_score(
                    distance,
                    load,
                    drop.value,
                    drop.quantity,
                    drop.base_distance,
                    config,
                );
                desires.push(Desire::Pickup {
                    target: PickupTarget::Handoff {
                        position: drop.position,
                    },
                    score,
                });
            }
        }

        if !load.is_empty() {
            let excluded: BTreeSet<Position> = self.blocked_bases.keys().copied().collect();
            if let Some((_, distance)) = grid.nearest_base_excluding(here, &excluded)
                && distance.is_finite()
            {
                desires.push(Desire::Deposit {
                    score: deposit_score(distance, load, config),
                });
            }
        }

        desires.push(Desire::Explore {
            score: beliefs.tuning.explore_score,
        });

        debug!(
            slot = %self.slot,
            role = %self.role,
            candidates = desires.len(),
            carried = load.count,
            "desires generated"
        );
        desires
    }

    fn act(
        &mut self,
        beliefs: &mut Beliefs,
        me: &SelfState,
        desires: Vec<Desire>,
        now: Instant,
    ) -> Plan {
        for desire in desires {
            if let Desire::Pickup { target, .. } = &desire
                && self.is_contested(beliefs, me, target.position())
            {
                debug!(slot = %self.slot, target = %target.position(), "rival is closer, yielding parcel");
                continue;
            }

            let key = desire.key();
            let fresh = self.last_intention != Some(key);
            if fresh {
                self.route.clear();
                self.colliding_since = None;
            }

            let plan = match desire {
                Desire::Pickup { target, .. } => self.achieve_pickup(beliefs, me, target, fresh, now),
                Desire::Deposit { .. } => self.achieve_deposit(beliefs, me, fresh, now),
                Desire::Explore { .. } => Some(self.explore(beliefs, me, fresh, now)),
                Desire::DropAndGoAway { .. } => Some(self.drop_and_go_away(beliefs, me)),
                Desire::GoAway { .. } => Some(self.go_away(beliefs, me)),
            };

            match plan {
                Some(plan) => {
                    debug!(
                        slot = %self.slot,
                        intention = %key,
                        fresh,
                        commands = plan.commands().len(),
                        "intention selected"
                    );
                    self.last_intention = Some(key);
                    return plan;
                }
                None => {
                    warn!(slot = %self.slot, intention = %key, "target unreachable, trying next");
                    self.last_intention = None;
                }
            }
        }
        Plan::idle()
    }

    /// A visible rival strictly closer to `target` that is next to it or
    /// heading for it.
    fn is_contested(&self, beliefs: &Beliefs, me: &SelfState, target: Position) -> bool {
        let grid = &beliefs.grid;
        let mine = grid.distance(me.tile(), target);
        beliefs
            .rivals
            .visible(me.observer(), &beliefs.config)
            .into_iter()
            .any(|rival| {
                let theirs = grid.distance(rival.tile(), target);
                theirs < mine && (theirs <= 1.0 || rival.is_heading_towards(target))
            })
    }
}

fn base_distance(beliefs: &Beliefs, from: Position) -> f64 {
    beliefs
        .grid
        .nearest_base(from)
        .map_or(f64::INFINITY, |(_, distance)| distance)
}

/// Pickup score with the free-pickup override for a parcel under our feet.
fn parcel_score(
    distance: f64,
    load: Load,
    reward: f64,
    quantity: usize,
    base_distance: Option<f64>,
    config: &ServerConfig,
) -> f64 {
    if distance == 0.0 {
        return PICKUP_NEAR_PARCEL;
    }
    pickup_score(distance, load, reward, quantity, base_distance, config)
}
