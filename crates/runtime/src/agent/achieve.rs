//! Turning a committed intention into this tick's commands.
//!
//! Handlers returning `None` could not reach their target; the caller then
//! falls through to the next ranked desire.
use tokio::time::Instant;
use tracing::{debug, info};

use courier_core::Position;

use super::movement::{Camp, Route, Walk};
use super::{Agent, Plan, PlanEffect, PickupTarget};
use crate::api::AgentCommand;
use crate::beliefs::{Beliefs, SelfState};

/// Commands for one walk result, finishing with `finish` once on the goal.
fn walk_plan(walk: Walk, finish: Option<AgentCommand>) -> Option<Plan> {
    match walk {
        Walk::Arrived => Some(finish.into_iter().collect()),
        Walk::Step { direction, arrives } => {
            let mut commands = vec![AgentCommand::Move(direction)];
            if arrives {
                commands.extend(finish);
            }
            Some(Plan::new(commands))
        }
        Walk::Wait => Some(Plan::idle()),
        Walk::Collided | Walk::Unreachable => None,
    }
}

impl Agent {
    pub(super) fn achieve_pickup(
        &mut self,
        beliefs: &Beliefs,
        me: &SelfState,
        target: PickupTarget,
        fresh: bool,
        now: Instant,
    ) -> Option<Plan> {
        let goal = target.position();
        let mut walk = self.walk(beliefs, me, goal, fresh, now);
        if walk == Walk::Collided {
            walk = self.walk(beliefs, me, goal, true, now);
        }
        let plan = walk_plan(walk, Some(AgentCommand::Pickup))?;
        if matches!(target, PickupTarget::Handoff { .. })
            && plan.commands().contains(&AgentCommand::Pickup)
        {
            self.pending_effect = Some(PlanEffect::ReleaseHandoff);
        }
        Some(plan)
    }

    pub(super) fn achieve_deposit(
        &mut self,
        beliefs: &Beliefs,
        me: &SelfState,
        fresh: bool,
        now: Instant,
    ) -> Option<Plan> {
        let here = me.tile();
        if beliefs.grid.is_base(here) {
            self.deposit_base = Some(here);
            return Some(Plan::new(vec![AgentCommand::Putdown]));
        }

        let stale = self
            .deposit_base
            .is_none_or(|base| self.blocked_bases.contains_key(&base));
        if fresh || stale {
            self.retarget_base(beliefs, here, now)?;
        }
        let goal = self.deposit_base?;

        match self.walk(beliefs, me, goal, false, now) {
            Walk::Collided => {
                self.deposit_collisions += 1;
                if self.deposit_collisions >= beliefs.tuning.base_tries {
                    self.block_base(goal, beliefs, now);
                }
                self.retarget_base(beliefs, here, now)?;
                let goal = self.deposit_base?;
                let walk = self.walk(beliefs, me, goal, false, now);
                walk_plan(walk, Some(AgentCommand::Putdown))
            }
            Walk::Unreachable => {
                self.block_base(goal, beliefs, now);
                None
            }
            walk => walk_plan(walk, Some(AgentCommand::Putdown)),
        }
    }

    fn retarget_base(&mut self, beliefs: &Beliefs, from: Position, now: Instant) -> Option<()> {
        let previous = self.deposit_base;
        let Some((base, path)) = self.base_path(beliefs, from, now) else {
            self.deposit_base = None;
            return None;
        };
        if previous != Some(base) {
            debug!(slot = %self.slot, %base, "deposit base selected");
            self.deposit_collisions = 0;
        }
        self.deposit_base = Some(base);
        self.route = Route::new(path);
        Some(())
    }

    /// Wanders between spawn tiles, camping on them when spawns are sparse.
    ///
    /// Never fails: with nowhere to go the agent stays put.
    pub(super) fn explore(
        &mut self,
        beliefs: &Beliefs,
        me: &SelfState,
        mut fresh: bool,
        now: Instant,
    ) -> Plan {
        let here = me.tile();
        let grid = &beliefs.grid;

        if grid.is_spawn_sparse() && grid.is_spawn(here) {
            match self.camp {
                Camp::Camping { tile, since } if tile == here => {
                    if now.duration_since(since) < beliefs.tuning.camp_time {
                        return Plan::idle();
                    }
                    debug!(slot = %self.slot, %tile, "camping session over");
                    self.camp = Camp::Done { tile };
                    self.explore_target = None;
                    fresh = true;
                }
                Camp::Done { tile } if tile == here => {}
                _ => {
                    self.camp = Camp::Camping { tile: here, since: now };
                    debug!(slot = %self.slot, tile = %here, "camping on spawn tile");
                    return match self.jitter_direction(beliefs, here) {
                        Some(direction) => Plan::new(vec![
                            AgentCommand::Move(direction),
                            AgentCommand::Move(direction.opposite()),
                        ]),
                        None => Plan::idle(),
                    };
                }
            }
        } else if matches!(self.camp, Camp::Camping { .. }) {
            self.camp = Camp::Roaming;
        }

        let target = match self.explore_target {
            Some(target) if !fresh && target != here => target,
            _ => {
                let Some(target) = self.pick_explore_target(beliefs, me) else {
                    return Plan::idle();
                };
                fresh = true;
                target
            }
        };

        let mut walk = self.walk(beliefs, me, target, fresh, now);
        if matches!(walk, Walk::Collided | Walk::Unreachable) {
            match self.pick_explore_target(beliefs, me) {
                Some(other) => walk = self.walk(beliefs, me, other, true, now),
                None => return Plan::idle(),
            }
        }
        walk_plan(walk, None).unwrap_or_else(|| {
            self.explore_target = None;
            Plan::idle()
        })
    }

    fn pick_explore_target(&mut self, beliefs: &Beliefs, me: &SelfState) -> Option<Position> {
        let target = beliefs
            .grid
            .random_spawn_tile(Some(me.id()), me.tile(), &mut self.rng);
        self.explore_target = target;
        target
    }

    /// Puts the load down for the adjacent teammate and steps out of its way.
    ///
    /// With no room to step aside, asks the teammate to move instead.
    pub(super) fn drop_and_go_away(&mut self, beliefs: &mut Beliefs, me: &SelfState) -> Plan {
        let Some(mate) = self.mate(beliefs) else {
            return Plan::idle();
        };
        let here = me.tile();
        let steps = self.go_away_steps(beliefs, here, mate.tile());
        self.route.clear();

        if steps.is_empty() {
            info!(slot = %self.slot, mate = %mate.id(), "no room to hand off, asking mate to move");
            beliefs.blackboard.request_move_away(mate.id().clone());
            return Plan::idle();
        }

        let (value, quantity) = beliefs.parcels.carried_summary(me.id());
        info!(slot = %self.slot, mate = %mate.id(), value, quantity, "handing load to mate");
        self.pending_effect = Some(PlanEffect::RecordHandoff {
            position: here,
            value,
            quantity,
            picker: mate.id().clone(),
        });
        std::iter::once(AgentCommand::Putdown)
            .chain(steps.into_iter().map(AgentCommand::Move))
            .collect()
    }

    /// Steps aside at the teammate's request.
    pub(super) fn go_away(&mut self, beliefs: &mut Beliefs, me: &SelfState) -> Plan {
        beliefs.blackboard.clear_move_away();
        self.route.clear();
        let Some(mate) = self.mate(beliefs) else {
            return Plan::idle();
        };
        self.go_away_steps(beliefs, me.tile(), mate.tile())
            .into_iter()
            .map(AgentCommand::Move)
            .collect()
    }
}
