//! Side mapping between the canonical (absolute) and per-viewer (relative) labels.
//!
//! Every participant belongs to an [`AbsoluteSide`] fixed at battle setup.
//! Each peer views the battle through [`RelativeSide`] labels, which invert
//! between host and guest. Anything that crosses the network carries absolute
//! sides only; the relative label is rebuilt locally with
//! [`AbsoluteSide::relative_to`].

use core::fmt;

/// Canonical, viewer-independent side of a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AbsoluteSide {
    Host,
    Guest,
}

impl AbsoluteSide {
    pub const BOTH: [AbsoluteSide; 2] = [AbsoluteSide::Host, AbsoluteSide::Guest];

    /// Absolute side of the local peer.
    pub const fn from_is_host(is_host: bool) -> Self {
        if is_host { Self::Host } else { Self::Guest }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::Host => Self::Guest,
            Self::Guest => Self::Host,
        }
    }

    /// Relative label of this side as seen by `viewer`.
    pub const fn relative_to(self, viewer: AbsoluteSide) -> RelativeSide {
        match (self, viewer) {
            (Self::Host, Self::Host) | (Self::Guest, Self::Guest) => RelativeSide::Player,
            _ => RelativeSide::Opponent,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Guest => "guest",
        }
    }
}

impl fmt::Display for AbsoluteSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Viewer-dependent side label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RelativeSide {
    Player,
    Opponent,
}

impl RelativeSide {
    pub const fn opposite(self) -> Self {
        match self {
            Self::Player => Self::Opponent,
            Self::Opponent => Self::Player,
        }
    }

    /// Absolute side this label refers to for the given viewer.
    pub const fn to_absolute(self, viewer: AbsoluteSide) -> AbsoluteSide {
        match self {
            Self::Player => viewer,
            Self::Opponent => viewer.opposite(),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Opponent => "opponent",
        }
    }
}

impl fmt::Display for RelativeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formation slot of a hero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Position {
    Left,
    Center,
    Right,
}

impl Position {
    /// Slots in canonical iteration order.
    pub const ALL: [Position; 3] = [Position::Left, Position::Center, Position::Right];

    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Center => 1,
            Self::Right => 2,
        }
    }

    /// Slots ordered by proximity to `self`, used for "nearest hero" lookups.
    ///
    /// The facing slot comes first, then the center (if not already taken),
    /// then the remaining flank(s) left before right.
    pub const fn nearest_order(self) -> [Position; 3] {
        match self {
            Self::Left => [Self::Left, Self::Center, Self::Right],
            Self::Center => [Self::Center, Self::Left, Self::Right],
            Self::Right => [Self::Right, Self::Center, Self::Left],
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network-stable identity of a battle entity.
///
/// A creature is identified by its owner's slot and its index in the owner's
/// creature list; names may repeat and are never used for resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum EntityRef {
    Hero {
        side: AbsoluteSide,
        position: Position,
    },
    Creature {
        side: AbsoluteSide,
        position: Position,
        index: usize,
    },
}

impl EntityRef {
    pub const fn hero(side: AbsoluteSide, position: Position) -> Self {
        Self::Hero { side, position }
    }

    pub const fn creature(side: AbsoluteSide, position: Position, index: usize) -> Self {
        Self::Creature {
            side,
            position,
            index,
        }
    }

    pub const fn side(&self) -> AbsoluteSide {
        match *self {
            Self::Hero { side, .. } | Self::Creature { side, .. } => side,
        }
    }

    pub const fn position(&self) -> Position {
        match *self {
            Self::Hero { position, .. } | Self::Creature { position, .. } => position,
        }
    }

    pub const fn creature_index(&self) -> Option<usize> {
        match *self {
            Self::Hero { .. } => None,
            Self::Creature { index, .. } => Some(index),
        }
    }

    pub const fn is_hero(&self) -> bool {
        matches!(self, Self::Hero { .. })
    }

    pub const fn is_creature(&self) -> bool {
        matches!(self, Self::Creature { .. })
    }

    /// The hero that owns this entity (a hero owns itself).
    pub const fn owner(&self) -> EntityRef {
        Self::Hero {
            side: self.side(),
            position: self.position(),
        }
    }

    /// Relative side of this entity for the given viewer.
    pub const fn relative_side(&self, viewer: AbsoluteSide) -> RelativeSide {
        self.side().relative_to(viewer)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hero { side, position } => write!(f, "{side}:{position}"),
            Self::Creature {
                side,
                position,
                index,
            } => write!(f, "{side}:{position}#{index}"),
        }
    }
}
