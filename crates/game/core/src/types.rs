//! Coordinates, movement directions, tile classification and identifiers.
//!
//! Positions are integer tile coordinates. Agents report fractional
//! coordinates while a move is in flight; [`Position::round`] snaps those to
//! the tile the agent is committed to.
use std::fmt;
use std::str::FromStr;

/// Frames emitted by the environment per second of game time.
pub const FRAMES_PER_SECOND: f64 = 20.0;

/// Converts a frame count into seconds of game time.
pub fn frames_to_seconds(frames: u64) -> f64 {
    frames as f64 / FRAMES_PER_SECOND
}

/// Discrete grid position expressed in tile coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Snaps a possibly fractional coordinate to a tile, rounding half away from zero.
    pub fn round(x: f64, y: f64) -> Self {
        Self {
            x: x.round() as i32,
            y: y.round() as i32,
        }
    }

    pub fn manhattan(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn step(self, direction: Direction) -> Position {
        let (dx, dy) = direction.delta();
        Position::new(self.x + dx, self.y + dy)
    }

    /// 4-neighbourhood in [`Direction::ALL`] order.
    pub fn neighbours(self) -> [Position; 4] {
        Direction::ALL.map(|direction| self.step(direction))
    }

    pub fn is_adjacent(self, other: Position) -> bool {
        self.manhattan(other) == 1
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Movement direction accepted by the environment.
///
/// `Up` increases `y`; `Right` increases `x`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Left,
        Direction::Up,
        Direction::Down,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Direction of travel from `from` to `to`, or `None` when they coincide.
    ///
    /// Horizontal movement takes precedence, so the result is always one of
    /// the four cardinal directions even for non-adjacent tiles.
    pub fn between(from: Position, to: Position) -> Option<Direction> {
        Self::from_delta(
            f64::from(to.x - from.x),
            f64::from(to.y - from.y),
        )
    }

    /// Same precedence as [`Direction::between`], applied to raw coordinate deltas.
    pub fn from_delta(dx: f64, dy: f64) -> Option<Direction> {
        if dx > 0.0 {
            Some(Direction::Right)
        } else if dx < 0.0 {
            Some(Direction::Left)
        } else if dy > 0.0 {
            Some(Direction::Up)
        } else if dy < 0.0 {
            Some(Direction::Down)
        } else {
            None
        }
    }
}

/// Tile classification as delivered by the environment.
///
/// Wire codes: `0` empty, `1` spawn, `2` base, `3` walkable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
#[strum(serialize_all = "snake_case")]
pub enum TileKind {
    Empty,
    Spawn,
    Base,
    Walkable,
}

impl TileKind {
    pub fn code(self) -> u8 {
        match self {
            TileKind::Empty => 0,
            TileKind::Spawn => 1,
            TileKind::Base => 2,
            TileKind::Walkable => 3,
        }
    }

    /// Every kind except `Empty` can be stood on.
    pub fn is_passable(self) -> bool {
        !matches!(self, TileKind::Empty)
    }
}

impl TryFrom<u8> for TileKind {
    type Error = UnknownTileCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TileKind::Empty),
            1 => Ok(TileKind::Spawn),
            2 => Ok(TileKind::Base),
            3 => Ok(TileKind::Walkable),
            other => Err(UnknownTileCode(other.to_string())),
        }
    }
}

impl From<TileKind> for u8 {
    fn from(kind: TileKind) -> Self {
        kind.code()
    }
}

/// Accepts either the numeric wire code or the snake_case name.
impl FromStr for TileKind {
    type Err = UnknownTileCode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return TileKind::try_from(code);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "empty" => Ok(TileKind::Empty),
            "spawn" => Ok(TileKind::Spawn),
            "base" => Ok(TileKind::Base),
            "walkable" => Ok(TileKind::Walkable),
            _ => Err(UnknownTileCode(trimmed.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown tile code {0:?}")]
pub struct UnknownTileCode(pub String);

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Environment-assigned agent identifier (ours, the teammate's or a rival's).
    AgentId
);
string_id!(
    /// Environment-assigned parcel identifier.
    ParcelId
);
string_id!(
    /// Team identifier; agents sharing it never treat each other as rivals.
    TeamId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_prefers_horizontal_axis() {
        let from = Position::new(1, 1);
        assert_eq!(Direction::between(from, Position::new(2, 5)), Some(Direction::Right));
        assert_eq!(Direction::between(from, Position::new(0, 0)), Some(Direction::Left));
        assert_eq!(Direction::between(from, Position::new(1, 2)), Some(Direction::Up));
        assert_eq!(Direction::between(from, Position::new(1, 0)), Some(Direction::Down));
        assert_eq!(Direction::between(from, from), None);
    }

    #[test]
    fn step_and_opposite_cancel() {
        let origin = Position::new(3, 3);
        for direction in Direction::ALL {
            let moved = origin.step(direction);
            assert!(origin.is_adjacent(moved));
            assert_eq!(moved.step(direction.opposite()), origin);
            assert_eq!(Direction::between(origin, moved), Some(direction));
        }
    }

    #[test]
    fn rounding_snaps_mid_move_coordinates() {
        assert_eq!(Position::round(2.6, 3.4), Position::new(3, 3));
        assert_eq!(Position::round(2.5, 0.0), Position::new(3, 0));
    }

    #[test]
    fn tile_kind_parses_codes_and_names() {
        assert_eq!("2".parse::<TileKind>(), Ok(TileKind::Base));
        assert_eq!("walkable".parse::<TileKind>(), Ok(TileKind::Walkable));
        assert!("9".parse::<TileKind>().is_err());
        assert_eq!(TileKind::try_from(1), Ok(TileKind::Spawn));
        assert_eq!(u8::from(TileKind::Empty), 0);
    }

    #[test]
    fn frames_convert_at_twenty_per_second() {
        assert_eq!(frames_to_seconds(40), 2.0);
    }
}
