// Observer notifications emitted by the simulation.
//
// The match never calls out to observers. Each mutation appends a `SimEvent`
// to the match's pending list; the owner drains it with `Match::take_events()`
// after the mutation completes (the coordinator does this once per tick).
// Events are informational only: they are not part of the state digest and
// are not serialized with snapshots.
//
// See also: `sim.rs` which emits these, `coordinator.rs` which drains them
// into `TickReport`.

use serde::{Deserialize, Serialize};

use crate::types::{PlayerId, SimTime, TerritoryId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    pub time: SimTime,
    pub kind: SimEventKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEventKind {
    /// The player's available pool grew; `available` is the new size.
    PieceCreated { player: PlayerId, available: u32 },
    PiecePlaced { player: PlayerId, territory: TerritoryId },
    PiecesMoved {
        player: PlayerId,
        from: TerritoryId,
        to: TerritoryId,
        count: u32,
    },
    TerritoryAttacked(AttackReport),
    TerritoryCaptured {
        territory: TerritoryId,
        player: PlayerId,
        previous_owner: Option<PlayerId>,
    },
    PlayerEliminated { player: PlayerId, by: PlayerId },
    MatchEnded { winner: PlayerId },
}

/// What happened to one piece in a battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceOutcome {
    pub roll: u8,
    pub survived: bool,
    /// Attacking pieces only: moved into the captured territory.
    pub moved: bool,
}

/// Full record of a battle between two owned territories.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackReport {
    pub attacker: PlayerId,
    pub defender: PlayerId,
    pub from: TerritoryId,
    pub to: TerritoryId,
    /// Participating attackers, in source-territory order.
    pub attackers: Vec<PieceOutcome>,
    /// Every defending piece, in destination-territory order.
    pub defenders: Vec<PieceOutcome>,
    pub attack_sum: u32,
    pub defend_sum: u32,
    pub succeeded: bool,
}

impl AttackReport {
    pub fn attacker_losses(&self) -> u32 {
        self.attackers.iter().filter(|o| !o.survived).count() as u32
    }

    pub fn defender_losses(&self) -> u32 {
        self.defenders.iter().filter(|o| !o.survived).count() as u32
    }

    pub fn pieces_moved(&self) -> u32 {
        self.attackers.iter().filter(|o| o.moved).count() as u32
    }
}
