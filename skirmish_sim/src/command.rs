// Commands: the only way anything outside the match changes it.
//
// A `Command` carries the simulated time it applies at, the issuing player,
// and an `Action`. Gameplay actions (`Place`, `Move`, `Attack`) name
// territories by `Location`, the identity every peer shares. Synchronization
// actions (`StartSync`, `StepSync`) never touch the match: the step scheduler
// consumes them to track each peer's readiness and compare state digests.
//
// Ordering is `(time, player, action)`. The first two are the protocol's
// total order; comparing the action breaks the rare tie where one player
// issues two commands for the same millisecond, so every peer still agrees.
//
// `LocalCommand` is the local-only sibling: a decision function evaluated
// against the match at its due time (the AI thinking). Whatever it decides
// is issued as an ordinary `Command`. It has no wire encoding and cannot be
// handed to the codec by construction.
//
// The full flow for a player action:
//   input source -> `Coordinator::tick` stamps `now + offset` -> local
//   scheduler and every remote peer -> `StepScheduler` executes it at its
//   time -> `Command::execute` -> `Match` mutation.
//
// See also: `wire.rs` for the byte encoding, `scheduler.rs` for execution,
// `sim.rs` for the rules behind each action.
//
// **Critical constraint: determinism.** Commands are the sole external input
// to the match.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sim::{Match, Refusal};
use crate::types::{Location, PlayerId, SimTime, TerritoryId};

/// A state digest and the simulated time it was sampled at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncStamp {
    pub hash: u64,
    pub hash_time: SimTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Place { at: Location },
    Move { from: Location, to: Location },
    Attack { from: Location, to: Location },
    /// Pre-game digest; the issuer is ready to begin.
    StartSync(SyncStamp),
    /// Digest at the end of a step; the issuer has input up to this
    /// command's time.
    StepSync(SyncStamp),
}

impl Action {
    /// Stable numeric tag, used as the wire kind byte.
    pub const fn kind(&self) -> u8 {
        match self {
            Action::Place { .. } => 1,
            Action::Move { .. } => 2,
            Action::Attack { .. } => 3,
            Action::StartSync(_) => 4,
            Action::StepSync(_) => 5,
        }
    }

    pub fn sync_stamp(&self) -> Option<SyncStamp> {
        match *self {
            Action::StartSync(stamp) | Action::StepSync(stamp) => Some(stamp),
            _ => None,
        }
    }

    pub fn is_sync(&self) -> bool {
        self.sync_stamp().is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Command {
    pub time: SimTime,
    pub player: PlayerId,
    pub action: Action,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("{player} {action:?} rejected: {reason}")]
    Illegal {
        player: PlayerId,
        action: Action,
        reason: Refusal,
    },
    #[error("{0:?} is a synchronization action and cannot be executed")]
    NotExecutable(Action),
}

impl Command {
    /// Apply a gameplay action to `state`. Illegal actions leave the state
    /// untouched and report why.
    pub fn execute(&self, state: &mut Match) -> Result<(), CommandError> {
        let player = self.player;
        let refuse = |reason| CommandError::Illegal {
            player,
            action: self.action,
            reason,
        };
        let resolve = |state: &Match, at: Location| -> Result<TerritoryId, CommandError> {
            state
                .graph()
                .id_of(at)
                .ok_or_else(|| refuse(Refusal::UnknownLocation(at)))
        };

        match self.action {
            Action::Place { at } => {
                let territory = resolve(state, at)?;
                state.check_place(player, territory).map_err(refuse)?;
                state.place_piece(player, territory);
            }
            Action::Move { from, to } => {
                let (src, dst) = (resolve(state, from)?, resolve(state, to)?);
                state.check_move(player, src, dst).map_err(refuse)?;
                state.move_pieces(player, src, dst);
            }
            Action::Attack { from, to } => {
                let (src, dst) = (resolve(state, from)?, resolve(state, to)?);
                state.check_attack(player, src, dst).map_err(refuse)?;
                state.attack(player, src, dst);
            }
            Action::StartSync(_) | Action::StepSync(_) => {
                return Err(CommandError::NotExecutable(self.action));
            }
        }
        Ok(())
    }
}

/// Decides, against the match as it stands, what a player should do.
pub type DecisionFn = fn(&Match, PlayerId) -> Option<Action>;

/// A local-only command: a decision evaluated at `time` on this machine.
#[derive(Clone, Copy)]
pub struct LocalCommand {
    pub time: SimTime,
    pub player: PlayerId,
    pub decide: DecisionFn,
}

impl fmt::Debug for LocalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCommand")
            .field("time", &self.time)
            .field("player", &self.player)
            .finish_non_exhaustive()
    }
}
