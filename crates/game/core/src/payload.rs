//! Sensing payloads as reported by the environment.
//!
//! These mirror the JSON objects pushed over the transport; with the `serde`
//! feature they decode directly from the server's camelCase fields.
use crate::types::{AgentId, ParcelId, Position, TeamId, TileKind};

/// One tile of the map (`onTile` / entries of `onMap`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileUpdate {
    pub x: i32,
    pub y: i32,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: TileKind,
}

impl TileUpdate {
    pub fn new(x: i32, y: i32, kind: TileKind) -> Self {
        Self { x, y, kind }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// A parcel inside an agent's observation radius.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SensedParcel {
    pub id: ParcelId,
    pub x: f64,
    pub y: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub carried_by: Option<AgentId>,
    pub reward: f64,
}

impl SensedParcel {
    pub fn position(&self) -> Position {
        Position::round(self.x, self.y)
    }
}

/// Another agent inside an agent's observation radius.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SensedAgent {
    pub id: AgentId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub team_id: Option<TeamId>,
    pub x: f64,
    pub y: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub score: f64,
}

/// Authoritative state of one of our own agents (`onYou`).
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SelfPayload {
    pub id: AgentId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub team_id: Option<TeamId>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub team_name: Option<String>,
    pub x: f64,
    pub y: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub score: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub penalty: f64,
}

impl SelfPayload {
    pub fn tile(&self) -> Position {
        Position::round(self.x, self.y)
    }

    /// True once the agent has settled on a tile (no move in flight).
    pub fn is_on_tile(&self) -> bool {
        self.x.fract() == 0.0 && self.y.fract() == 0.0
    }
}

/// Server time attached to every self update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerTime {
    pub ms: u64,
    pub frame: u64,
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_payloads() {
        let tile: TileUpdate = serde_json::from_str(r#"{"x":1,"y":2,"type":2}"#).expect("tile");
        assert_eq!(tile.kind, TileKind::Base);

        let parcel: SensedParcel =
            serde_json::from_str(r#"{"id":"p1","x":3,"y":4,"carriedBy":null,"reward":12}"#)
                .expect("parcel");
        assert_eq!(parcel.position(), Position::new(3, 4));
        assert!(parcel.carried_by.is_none());

        let me: SelfPayload = serde_json::from_str(
            r#"{"id":"a1","name":"one","teamId":"t","teamName":"team","x":1.6,"y":2,"score":0,"penalty":0}"#,
        )
        .expect("self");
        assert!(!me.is_on_tile());
        assert_eq!(me.tile(), Position::new(2, 2));
    }
}
