// Territory graph: the board a match is played on.
//
// A `TerritoryGraph` is an arena of `Territory` values addressed by
// `TerritoryId`, plus a `Location -> TerritoryId` index for resolving wire
// commands. Adjacency is stored per territory as an ordered, symmetric
// neighbor list. The graph's shape never changes after construction; only
// ownership, cooldowns and pieces do, and only through `sim.rs`.
//
// `MapBuilder` is the construction surface handed to whatever generates or
// loads maps. It validates as it goes (capacities, duplicate locations,
// self-edges, starting claims) so a built graph is always well-formed.
//
// Pieces carry a recovery countdown. A piece is ready when the countdown is
// zero; moving or attacking resets it to `piece_ready_ms`. Starting pieces
// are ready.
//
// See also: `sim.rs` for every rule that mutates territories, `types.rs` for
// `Location` / `TerritoryId`.
//
// **Critical constraint: determinism.** Territory order (arena index) and
// neighbor order are part of the rules: combat rolls and AI scans iterate in
// that order. The location index is a `BTreeMap`, never a `HashMap`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::{Location, PlayerId, SimTime, TerritoryId};

/// The only legal territory capacities.
pub const CAPACITIES: [u8; 3] = [5, 7, 9];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("two territories at {0}")]
    DuplicateLocation(Location),
    #[error("no territory at {0}")]
    UnknownLocation(Location),
    #[error("capacity {0} is not one of 5, 7 or 9")]
    InvalidCapacity(u8),
    #[error("territory {0} cannot neighbor itself")]
    SelfEdge(Location),
    #[error("{pieces} starting pieces at {location} exceed capacity {capacity}")]
    TooManyPieces { location: Location, pieces: u8, capacity: u8 },
    #[error("starting claim at {0} has no pieces")]
    EmptyClaim(Location),
    #[error("{0} is already claimed")]
    AlreadyClaimed(Location),
    #[error("map is full")]
    TooManyTerritories,
    #[error("a match needs 2..=4 players, got {0}")]
    RosterSize(usize),
    #[error("{0} appears twice in the roster")]
    DuplicatePlayer(PlayerId),
    #[error("{0} owns territory but is not in the roster")]
    UnrosteredOwner(PlayerId),
    #[error("{0} starts without territory")]
    Landless(PlayerId),
}

// ---------------------------------------------------------------------------
// Pieces and territories
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub owner: PlayerId,
    /// Milliseconds until the piece can act again.
    recovery_ms: SimTime,
}

impl Piece {
    /// A piece that can act immediately.
    pub fn ready(owner: PlayerId) -> Self {
        Self {
            owner,
            recovery_ms: 0,
        }
    }

    /// A piece that just arrived and must recover for `ready_ms`.
    pub fn fresh(owner: PlayerId, ready_ms: SimTime) -> Self {
        Self {
            owner,
            recovery_ms: ready_ms,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.recovery_ms == 0
    }

    /// Readiness progress in thousandths, for observers.
    pub fn readiness_permille(&self, ready_ms: SimTime) -> u16 {
        if ready_ms <= 0 || self.recovery_ms <= 0 {
            return 1000;
        }
        let remaining = self.recovery_ms.min(ready_ms);
        ((ready_ms - remaining) * 1000 / ready_ms) as u16
    }

    pub(crate) fn recover(&mut self, elapsed: SimTime) {
        self.recovery_ms = (self.recovery_ms - elapsed).max(0);
    }

    pub(crate) fn exhaust(&mut self, ready_ms: SimTime) {
        self.recovery_ms = ready_ms;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Territory {
    pub location: Location,
    pub capacity: u8,
    pub owner: Option<PlayerId>,
    /// Milliseconds until the territory can act or be acted upon again.
    pub cooldown_ms: SimTime,
    pub neighbors: SmallVec<[TerritoryId; 6]>,
    pub pieces: Vec<Piece>,
}

impl Territory {
    fn new(location: Location, capacity: u8) -> Self {
        Self {
            location,
            capacity,
            owner: None,
            cooldown_ms: 0,
            neighbors: SmallVec::new(),
            pieces: Vec::new(),
        }
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn ready_count(&self) -> usize {
        self.pieces.iter().filter(|p| p.is_ready()).count()
    }

    pub fn free_capacity(&self) -> usize {
        usize::from(self.capacity).saturating_sub(self.pieces.len())
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooldown_ms > 0
    }
}

// ---------------------------------------------------------------------------
// TerritoryGraph
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryGraph {
    territories: Vec<Territory>,
    /// Rebuilt after deserialization (`Location` keys are not JSON strings).
    #[serde(skip)]
    index: BTreeMap<Location, TerritoryId>,
}

impl TerritoryGraph {
    pub fn len(&self) -> usize {
        self.territories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
    }

    pub fn get(&self, id: TerritoryId) -> Option<&Territory> {
        self.territories.get(id.index())
    }

    /// Panics on an ID this graph did not issue.
    pub(crate) fn territory_mut(&mut self, id: TerritoryId) -> &mut Territory {
        &mut self.territories[id.index()]
    }

    pub fn id_of(&self, location: Location) -> Option<TerritoryId> {
        self.index.get(&location).copied()
    }

    pub fn at(&self, location: Location) -> Option<&Territory> {
        self.id_of(location).and_then(|id| self.get(id))
    }

    pub fn are_adjacent(&self, a: TerritoryId, b: TerritoryId) -> bool {
        self.get(a).is_some_and(|t| t.neighbors.contains(&b))
    }

    /// Territories in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (TerritoryId, &Territory)> {
        self.territories
            .iter()
            .enumerate()
            .map(|(i, t)| (TerritoryId(i as u16), t))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Territory> {
        self.territories.iter_mut()
    }

    pub(crate) fn rebuild_index(&mut self) {
        self.index = self
            .territories
            .iter()
            .enumerate()
            .map(|(i, t)| (t.location, TerritoryId(i as u16)))
            .collect();
    }
}

// ---------------------------------------------------------------------------
// MapBuilder
// ---------------------------------------------------------------------------

/// Incremental, validating constructor for a `TerritoryGraph`.
#[derive(Debug, Default)]
pub struct MapBuilder {
    graph: TerritoryGraph,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn territory(&mut self, location: Location, capacity: u8) -> Result<TerritoryId, SetupError> {
        if !CAPACITIES.contains(&capacity) {
            return Err(SetupError::InvalidCapacity(capacity));
        }
        if self.graph.index.contains_key(&location) {
            return Err(SetupError::DuplicateLocation(location));
        }
        let id = u16::try_from(self.graph.territories.len())
            .map(TerritoryId)
            .map_err(|_| SetupError::TooManyTerritories)?;
        self.graph.territories.push(Territory::new(location, capacity));
        self.graph.index.insert(location, id);
        Ok(id)
    }

    /// Make `a` and `b` neighbors. Connecting twice is a no-op.
    pub fn connect(&mut self, a: Location, b: Location) -> Result<(), SetupError> {
        if a == b {
            return Err(SetupError::SelfEdge(a));
        }
        let ia = self.resolve(a)?;
        let ib = self.resolve(b)?;
        if self.graph.are_adjacent(ia, ib) {
            return Ok(());
        }
        self.graph.territories[ia.index()].neighbors.push(ib);
        self.graph.territories[ib.index()].neighbors.push(ia);
        Ok(())
    }

    /// Give `player` the territory at `location` with `pieces` ready pieces.
    pub fn claim(&mut self, location: Location, player: PlayerId, pieces: u8) -> Result<(), SetupError> {
        let id = self.resolve(location)?;
        let territory = &mut self.graph.territories[id.index()];
        if territory.owner.is_some() {
            return Err(SetupError::AlreadyClaimed(location));
        }
        if pieces == 0 {
            return Err(SetupError::EmptyClaim(location));
        }
        if pieces > territory.capacity {
            return Err(SetupError::TooManyPieces {
                location,
                pieces,
                capacity: territory.capacity,
            });
        }
        territory.owner = Some(player);
        territory.pieces = (0..pieces).map(|_| Piece::ready(player)).collect();
        Ok(())
    }

    pub fn build(self) -> TerritoryGraph {
        self.graph
    }

    fn resolve(&self, location: Location) -> Result<TerritoryId, SetupError> {
        self.graph
            .id_of(location)
            .ok_or(SetupError::UnknownLocation(location))
    }
}
