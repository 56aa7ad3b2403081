//! Candidate goals and how they are ranked.
use std::fmt;

use courier_core::{ParcelId, Position};

/// What a pickup desire is reaching for.
#[derive(Clone, Debug, PartialEq)]
pub enum PickupTarget {
    /// A parcel seen on the map.
    Parcel { id: ParcelId, position: Position },
    /// The load a teammate left for us.
    Handoff { position: Position },
}

impl PickupTarget {
    pub fn position(&self) -> Position {
        match self {
            PickupTarget::Parcel { position, .. } | PickupTarget::Handoff { position } => *position,
        }
    }
}

/// One scored candidate goal produced while deliberating.
#[derive(Clone, Debug, PartialEq)]
pub enum Desire {
    Pickup { target: PickupTarget, score: f64 },
    Deposit { score: f64 },
    Explore { score: f64 },
    /// Leave the load to an adjacent teammate closer to a base, then step aside.
    DropAndGoAway { score: f64 },
    /// Step aside because the teammate asked for room.
    GoAway { score: f64 },
}

impl Desire {
    pub fn score(&self) -> f64 {
        match self {
            Desire::Pickup { score, .. }
            | Desire::Deposit { score }
            | Desire::Explore { score }
            | Desire::DropAndGoAway { score }
            | Desire::GoAway { score } => *score,
        }
    }

    /// Identity of the goal regardless of its score, used to detect a change
    /// of intention between ticks.
    pub fn key(&self) -> IntentionKey {
        match self {
            Desire::Pickup { target, .. } => IntentionKey::Pickup(target.position()),
            Desire::Deposit { .. } => IntentionKey::Deposit,
            Desire::Explore { .. } => IntentionKey::Explore,
            Desire::DropAndGoAway { .. } => IntentionKey::DropAndGoAway,
            Desire::GoAway { .. } => IntentionKey::GoAway,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentionKey {
    Pickup(Position),
    Deposit,
    Explore,
    DropAndGoAway,
    GoAway,
}

impl fmt::Display for IntentionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentionKey::Pickup(position) => write!(f, "pickup {position}"),
            IntentionKey::Deposit => f.write_str("deposit"),
            IntentionKey::Explore => f.write_str("explore"),
            IntentionKey::DropAndGoAway => f.write_str("drop and go away"),
            IntentionKey::GoAway => f.write_str("go away"),
        }
    }
}

/// Orders desires by score, highest first.
///
/// The sort is stable: equal scores keep generation order.
pub fn rank(mut desires: Vec<Desire>) -> Vec<Desire> {
    desires.sort_by(|a, b| b.score().total_cmp(&a.score()));
    desires
}

/// How an agent shares parcels with its teammate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Playing alone; every parcel is fair game.
    Solo,
    /// Wins ties against the teammate.
    Leader,
    /// Yields ties to the teammate.
    Follower,
}

impl Role {
    /// Whether a parcel scored `mine` by us and `mate` by the teammate is ours.
    pub fn claims(self, mine: f64, mate: f64) -> bool {
        match self {
            Role::Solo => true,
            Role::Leader => mine >= mate,
            Role::Follower => mine > mate,
        }
    }

    pub fn has_mate(self) -> bool {
        !matches!(self, Role::Solo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pickup(x: i32, score: f64) -> Desire {
        Desire::Pickup {
            target: PickupTarget::Parcel {
                id: ParcelId::from(format!("p{x}")),
                position: Position::new(x, 0),
            },
            score,
        }
    }

    #[test]
    fn rank_is_descending_and_stable() {
        let ranked = rank(vec![
            Desire::Explore { score: 0.0001 },
            pickup(1, 5.0),
            pickup(2, 9.0),
            pickup(3, 5.0),
            Desire::Deposit { score: 7.0 },
        ]);
        let keys: Vec<String> = ranked.iter().map(|d| d.key().to_string()).collect();
        assert_eq!(
            keys,
            vec!["pickup (2, 0)", "deposit", "pickup (1, 0)", "pickup (3, 0)", "explore"]
        );
    }

    #[test]
    fn roles_split_ties() {
        assert!(Role::Leader.claims(4.0, 4.0));
        assert!(!Role::Follower.claims(4.0, 4.0));
        assert!(Role::Follower.claims(4.5, 4.0));
        assert!(Role::Solo.claims(0.0, 100.0));
        assert!(!Role::Solo.has_mate());
    }

    #[test]
    fn intention_key_ignores_score() {
        assert_eq!(pickup(1, 3.0).key(), pickup(1, 8.0).key());
        assert_ne!(pickup(1, 3.0).key(), pickup(2, 3.0).key());
    }
}
