//! Shared blackboard between two cooperating agents.
//!
//! Holds at most one pending hand-off ("I dropped my load here, you pick it
//! up") and at most one step-aside request. Neither agent owns it; both read
//! it while generating desires.
use courier_core::{AgentId, GridIndex, Position};

/// Parcels left on a tile for a designated teammate.
#[derive(Clone, Debug, PartialEq)]
pub struct DropRecord {
    pub position: Position,
    pub value: f64,
    pub quantity: usize,
    /// Distance from the drop tile to its nearest base, if one is reachable.
    pub base_distance: Option<f64>,
    pub picker: AgentId,
}

#[derive(Clone, Debug, Default)]
pub struct Blackboard {
    dropped: Option<DropRecord>,
    move_away: Option<AgentId>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hand-off point and its distance to the nearest base.
    pub fn set_dropped(
        &mut self,
        position: Position,
        value: f64,
        quantity: usize,
        picker: AgentId,
        grid: &GridIndex,
    ) {
        let base_distance = grid.nearest_base(position).map(|(_, distance)| distance);
        tracing::debug!(%position, value, quantity, %picker, "hand-off recorded");
        self.dropped = Some(DropRecord {
            position,
            value,
            quantity,
            base_distance,
            picker,
        });
    }

    pub fn reset_drop(&mut self) {
        self.dropped = None;
    }

    pub fn dropped(&self) -> Option<&DropRecord> {
        self.dropped.as_ref()
    }

    /// The pending hand-off if `agent` is the one meant to collect it.
    pub fn handoff_for(&self, agent: &AgentId) -> Option<&DropRecord> {
        self.dropped
            .as_ref()
            .filter(|drop| &drop.picker == agent && drop.value > 0.0)
    }

    pub fn is_drop_tile(&self, position: Position) -> bool {
        self.dropped
            .as_ref()
            .is_some_and(|drop| drop.position == position)
    }

    /// Asks `agent` to step out of the way.
    pub fn request_move_away(&mut self, agent: AgentId) {
        self.move_away = Some(agent);
    }

    pub fn move_away_agent(&self) -> Option<&AgentId> {
        self.move_away.as_ref()
    }

    pub fn clear_move_away(&mut self) {
        self.move_away = None;
    }
}
