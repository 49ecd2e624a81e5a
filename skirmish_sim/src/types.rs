// Core types for the simulation: time, player identity, locations.
//
// `SimTime` is integer milliseconds since match start; the scheduler and the
// wire format share it, so it must never be a float. `FOREVER` is the
// "infinitely far in the future" sentinel used when a peer departs.
//
// `PlayerId` is a closed set of `MAX_PLAYERS` values. Per-player data lives
// in `PerPlayer<T>`, a fixed array indexed by `PlayerId`, so per-player
// iteration order is always ascending player index on every peer.
//
// `Location` is the wire identity of a territory (grid row/column).
// `TerritoryId` is the arena index the graph uses internally; it never
// crosses the wire.
//
// See also: `territory.rs` for the graph these IDs index into.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Simulated time in milliseconds since the match began.
pub type SimTime = i64;

/// Sentinel time meaning "never blocks again". A departed peer's
/// ready-until is set to this.
pub const FOREVER: SimTime = SimTime::MAX;

/// Number of player slots in a match.
pub const MAX_PLAYERS: usize = 4;

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// One of the `MAX_PLAYERS` player slots. Construction validates the range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PlayerId(u8);

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("player index {0} is outside 0..4")]
pub struct InvalidPlayer(pub u8);

impl PlayerId {
    /// Every player slot, ascending.
    pub const ALL: [PlayerId; MAX_PLAYERS] = [PlayerId(0), PlayerId(1), PlayerId(2), PlayerId(3)];

    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < MAX_PLAYERS {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PlayerId {
    type Error = InvalidPlayer;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index).ok_or(InvalidPlayer(index))
    }
}

impl From<PlayerId> for u8 {
    fn from(player: PlayerId) -> u8 {
        player.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0 + 1)
    }
}

// ---------------------------------------------------------------------------
// PerPlayer
// ---------------------------------------------------------------------------

/// Dense per-player storage, indexed by `PlayerId`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerPlayer<T>([T; MAX_PLAYERS]);

impl<T> PerPlayer<T> {
    pub fn from_fn(mut f: impl FnMut(PlayerId) -> T) -> Self {
        Self(std::array::from_fn(|i| f(PlayerId::ALL[i])))
    }

    /// `(player, value)` pairs in ascending player order.
    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &T)> {
        PlayerId::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T> Index<PlayerId> for PerPlayer<T> {
    type Output = T;

    fn index(&self, player: PlayerId) -> &T {
        &self.0[player.index()]
    }
}

impl<T> IndexMut<PlayerId> for PerPlayer<T> {
    fn index_mut(&mut self, player: PlayerId) -> &mut T {
        &mut self.0[player.index()]
    }
}

// ---------------------------------------------------------------------------
// Locations and territory IDs
// ---------------------------------------------------------------------------

/// Grid position of a territory; the identity used on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub row: i16,
    pub col: i16,
}

impl Location {
    pub const fn new(row: i16, col: i16) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Arena index into a `TerritoryGraph`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerritoryId(pub u16);

impl TerritoryId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}
