// Match state: the replicated simulation every peer runs.
//
// `Match` is the single source of truth for one game: the territory graph,
// per-player records, the current simulated time, the dice PRNG and the
// phase. It is a pure state machine. The step scheduler feeds it
// `update(elapsed)` calls and executes commands against it; nothing else
// mutates it.
//
// ## Rules
//
// - **Placement.** A player spends one available piece to add a fresh (not
//   ready) piece to a territory they own that has free capacity.
// - **Move / attack preconditions.** The source belongs to the actor, holds at
//   least two pieces with at least one ready, neither territory is cooling
//   down, and the two are adjacent. A move needs an owned destination with
//   free capacity; an attack needs a destination the actor does not own.
// - **Moving** transfers up to `min(free capacity, ready pieces, count - 1)`
//   ready pieces. One piece always stays to hold the source.
// - **Attacking an unowned territory** is a move plus a capture.
// - **Battle.** Every ready source piece rolls, then every defending piece.
//   Higher attack sum wins (ties go to the defender). Loss counts come from
//   `combat.rs`; attackers keep one survivor to occupy the prize and, if
//   every source piece fought, a second to hold the source. Both territories
//   cool down for `cooldown_for(attackers + defenders)`.
// - **Creation.** Each living player accumulates progress at
//   `owned * creation_per_territory + creation_base` per ms and gains one
//   available piece per `creation_threshold` crossed, up to the cap.
// - **Elimination.** Losing the last territory eliminates a player; when one
//   player remains the match ends with them as winner.
//
// ## Digest
//
// `state_hash()` packs creation progress, piece count, territory count and
// remaining players into one `u64`. Peers exchange it at every step boundary.
//
// See also: `command.rs` (the commands that call into this), `scheduler.rs`
// (drives `update`), `combat.rs`, `territory.rs`, `event.rs`.
//
// **Critical constraint: determinism.** No `HashMap`, no wall clock, no
// floats outside `combat.rs`, and all randomness from the match's `DiceRng`.
// Player iteration is always ascending `PlayerId`; territory iteration is
// always arena order.

use serde::{Deserialize, Serialize};

use crate::combat;
use crate::config::{ConfigError, GameConfig};
use crate::event::{AttackReport, PieceOutcome, SimEvent, SimEventKind};
use crate::prng::DiceRng;
use crate::territory::{Piece, SetupError, Territory, TerritoryGraph};
use crate::types::{Location, MAX_PLAYERS, PerPlayer, PlayerId, SimTime, TerritoryId};

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Setup(#[from] SetupError),
}

/// Why an action is not legal right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Refusal {
    #[error("the match is over")]
    MatchOver,
    #[error("player is not in this match")]
    NotParticipating,
    #[error("player has been eliminated")]
    Eliminated,
    #[error("no territory at {0}")]
    UnknownLocation(Location),
    #[error("no such territory")]
    UnknownTerritory,
    #[error("source is not owned by the acting player")]
    NotOwner,
    #[error("a territory involved is cooling down")]
    CoolingDown,
    #[error("source needs at least two pieces")]
    TooFewPieces,
    #[error("source has no ready piece")]
    NoReadyPiece,
    #[error("territories are not adjacent")]
    NotAdjacent,
    #[error("destination is not owned by the acting player")]
    ForeignDestination,
    #[error("destination already belongs to the acting player")]
    OwnDestination,
    #[error("destination is full")]
    DestinationFull,
    #[error("no pieces available to place")]
    NoAvailablePieces,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub participating: bool,
    pub eliminated: bool,
    /// Unplaced pieces in the player's pool.
    pub available: u32,
    pub creation_progress: i64,
    pub territories_owned: u32,
}

impl PlayerRecord {
    pub fn is_alive(&self) -> bool {
        self.participating && !self.eliminated
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Running,
    Ended { winner: PlayerId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    time: SimTime,
    config: GameConfig,
    graph: TerritoryGraph,
    players: PerPlayer<PlayerRecord>,
    remaining: u32,
    phase: MatchPhase,
    rng: DiceRng,
    #[serde(skip)]
    events: Vec<SimEvent>,
}

impl Match {
    /// Start a match on `graph` for `roster`. Every roster player must own at
    /// least one territory, and only roster players may own any.
    pub fn new(config: GameConfig, graph: TerritoryGraph, roster: &[PlayerId], seed: u64) -> Result<Self, MatchError> {
        config.validate()?;
        if !(2..=MAX_PLAYERS).contains(&roster.len()) {
            return Err(SetupError::RosterSize(roster.len()).into());
        }

        let mut players: PerPlayer<PlayerRecord> = PerPlayer::default();
        for &player in roster {
            let record = &mut players[player];
            if record.participating {
                return Err(SetupError::DuplicatePlayer(player).into());
            }
            record.participating = true;
            record.available = config.starting_available_pieces;
        }
        for (_, territory) in graph.iter() {
            if let Some(owner) = territory.owner {
                if !players[owner].participating {
                    return Err(SetupError::UnrosteredOwner(owner).into());
                }
                players[owner].territories_owned += 1;
            }
        }
        if let Some(&landless) = roster.iter().find(|&&p| players[p].territories_owned == 0) {
            return Err(SetupError::Landless(landless).into());
        }

        Ok(Self {
            time: 0,
            config,
            graph,
            players,
            remaining: roster.len() as u32,
            phase: MatchPhase::Running,
            rng: DiceRng::from_seed(seed),
            events: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn graph(&self) -> &TerritoryGraph {
        &self.graph
    }

    pub fn territory(&self, id: TerritoryId) -> Option<&Territory> {
        self.graph.get(id)
    }

    pub fn player(&self, player: PlayerId) -> &PlayerRecord {
        &self.players[player]
    }

    /// Participating players in ascending order, eliminated ones included.
    pub fn roster(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|(_, r)| r.participating)
            .map(|(p, _)| p)
            .collect()
    }

    pub fn remaining_players(&self) -> u32 {
        self.remaining
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == MatchPhase::Running
    }

    pub fn winner(&self) -> Option<PlayerId> {
        match self.phase {
            MatchPhase::Running => None,
            MatchPhase::Ended { winner } => Some(winner),
        }
    }

    /// Events emitted since the last drain, oldest first.
    pub fn pending_events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Legality
    // -----------------------------------------------------------------------

    pub fn can_place(&self, player: PlayerId, territory: TerritoryId) -> bool {
        self.check_place(player, territory).is_ok()
    }

    pub fn can_move(&self, player: PlayerId, src: TerritoryId, dst: TerritoryId) -> bool {
        self.check_move(player, src, dst).is_ok()
    }

    pub fn can_attack(&self, player: PlayerId, src: TerritoryId, dst: TerritoryId) -> bool {
        self.check_attack(player, src, dst).is_ok()
    }

    pub fn check_place(&self, player: PlayerId, territory: TerritoryId) -> Result<(), Refusal> {
        self.check_actor(player)?;
        let target = self.graph.get(territory).ok_or(Refusal::UnknownTerritory)?;
        if target.owner != Some(player) {
            return Err(Refusal::NotOwner);
        }
        if self.players[player].available == 0 {
            return Err(Refusal::NoAvailablePieces);
        }
        if target.free_capacity() == 0 {
            return Err(Refusal::DestinationFull);
        }
        Ok(())
    }

    pub fn check_move(&self, player: PlayerId, src: TerritoryId, dst: TerritoryId) -> Result<(), Refusal> {
        let to = self.check_engagement(player, src, dst)?;
        if to.owner != Some(player) {
            return Err(Refusal::ForeignDestination);
        }
        if to.free_capacity() == 0 {
            return Err(Refusal::DestinationFull);
        }
        Ok(())
    }

    pub fn check_attack(&self, player: PlayerId, src: TerritoryId, dst: TerritoryId) -> Result<(), Refusal> {
        let to = self.check_engagement(player, src, dst)?;
        if to.owner == Some(player) {
            return Err(Refusal::OwnDestination);
        }
        Ok(())
    }

    fn check_actor(&self, player: PlayerId) -> Result<(), Refusal> {
        if !self.is_running() {
            return Err(Refusal::MatchOver);
        }
        let record = &self.players[player];
        if !record.participating {
            return Err(Refusal::NotParticipating);
        }
        if record.eliminated {
            return Err(Refusal::Eliminated);
        }
        Ok(())
    }

    /// Preconditions shared by moves and attacks; returns the destination.
    fn check_engagement(&self, player: PlayerId, src: TerritoryId, dst: TerritoryId) -> Result<&Territory, Refusal> {
        self.check_actor(player)?;
        let from = self.graph.get(src).ok_or(Refusal::UnknownTerritory)?;
        let to = self.graph.get(dst).ok_or(Refusal::UnknownTerritory)?;
        if from.owner != Some(player) {
            return Err(Refusal::NotOwner);
        }
        if from.is_cooling_down() || to.is_cooling_down() {
            return Err(Refusal::CoolingDown);
        }
        if from.piece_count() < 2 {
            return Err(Refusal::TooFewPieces);
        }
        if from.ready_count() == 0 {
            return Err(Refusal::NoReadyPiece);
        }
        if !self.graph.are_adjacent(src, dst) {
            return Err(Refusal::NotAdjacent);
        }
        Ok(to)
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Callers must check `can_place` first.
    pub fn place_piece(&mut self, player: PlayerId, territory: TerritoryId) {
        assert!(
            self.can_place(player, territory),
            "place_piece: {player} cannot place on {territory:?}"
        );
        let ready_ms = self.config.piece_ready_ms;
        self.players[player].available -= 1;
        self.graph
            .territory_mut(territory)
            .pieces
            .push(Piece::fresh(player, ready_ms));
        self.emit(SimEventKind::PiecePlaced { player, territory });
    }

    /// Callers must check `can_move` first.
    pub fn move_pieces(&mut self, player: PlayerId, src: TerritoryId, dst: TerritoryId) {
        assert!(
            self.can_move(player, src, dst),
            "move_pieces: {player} cannot move {src:?} -> {dst:?}"
        );
        self.relocate(player, src, dst);
    }

    /// Callers must check `can_attack` first.
    pub fn attack(&mut self, player: PlayerId, src: TerritoryId, dst: TerritoryId) {
        assert!(
            self.can_attack(player, src, dst),
            "attack: {player} cannot attack {src:?} -> {dst:?}"
        );
        match self.graph.get(dst).and_then(|t| t.owner) {
            None => {
                self.relocate(player, src, dst);
                self.transfer_ownership(dst, player);
            }
            Some(defender) => self.battle(player, defender, src, dst),
        }
    }

    /// Shift ready pieces from `src` into `dst` and cool `dst` down.
    fn relocate(&mut self, player: PlayerId, src: TerritoryId, dst: TerritoryId) {
        let ready_ms = self.config.piece_ready_ms;
        let free = self.graph.get(dst).map_or(0, Territory::free_capacity);

        let source = self.graph.territory_mut(src);
        let budget = free
            .min(source.ready_count())
            .min(source.piece_count().saturating_sub(1));
        let mut moving = Vec::with_capacity(budget);
        let mut staying = Vec::with_capacity(source.piece_count() - budget);
        for mut piece in std::mem::take(&mut source.pieces) {
            if moving.len() < budget && piece.is_ready() {
                piece.exhaust(ready_ms);
                moving.push(piece);
            } else {
                staying.push(piece);
            }
        }
        source.pieces = staying;

        let count = moving.len() as u32;
        let cooldown = self.config.cooldown_for(count);
        let target = self.graph.territory_mut(dst);
        target.pieces.extend(moving);
        target.cooldown_ms = cooldown;
        self.emit(SimEventKind::PiecesMoved {
            player,
            from: src,
            to: dst,
            count,
        });
    }

    fn battle(&mut self, attacker: PlayerId, defender: PlayerId, src: TerritoryId, dst: TerritoryId) {
        let ready_ms = self.config.piece_ready_ms;
        let sides = self.config.die_sides;
        let base = self.config.loss_base_permille;

        let source_pieces = std::mem::take(&mut self.graph.territory_mut(src).pieces);
        let defending = std::mem::take(&mut self.graph.territory_mut(dst).pieces);
        let capacity = self.graph.get(dst).map_or(0, |t| u32::from(t.capacity));

        let participants = source_pieces.iter().filter(|p| p.is_ready()).count() as u32;
        let holds_source = participants as usize == source_pieces.len();
        let defenders = defending.len() as u32;

        let attack_rolls: Vec<u8> = (0..participants).map(|_| self.rng.roll(sides)).collect();
        let defend_rolls: Vec<u8> = defending.iter().map(|_| self.rng.roll(sides)).collect();
        let attack_sum: u32 = attack_rolls.iter().map(|&r| u32::from(r)).sum();
        let defend_sum: u32 = defend_rolls.iter().map(|&r| u32::from(r)).sum();
        let succeeded = attack_sum > defend_sum;

        let (attacker_losses, defender_losses, movers) = if succeeded {
            // One survivor occupies; a second holds the source if all fought.
            let reserve = 1 + u32::from(holds_source);
            let raw = if defend_sum == 0 {
                0
            } else {
                combat::attacker_losses_on_success(participants, attack_sum, defend_sum, base)
            };
            let losses = raw.min(participants.saturating_sub(reserve));
            let movers = (participants - losses - u32::from(holds_source)).min(capacity);
            (losses, defenders, movers)
        } else {
            let losses = combat::defender_losses_on_failure(defenders, defend_sum, attack_sum, base);
            (participants - 1, losses, 0)
        };

        let mut attacker_outcomes = Vec::with_capacity(participants as usize);
        let mut staying = Vec::new();
        let mut moving = Vec::new();
        let mut rolls = attack_rolls.iter();
        for mut piece in source_pieces {
            if !piece.is_ready() {
                staying.push(piece);
                continue;
            }
            let ordinal = attacker_outcomes.len() as u32;
            let died = ordinal < attacker_losses;
            let moved = !died && ordinal < attacker_losses + movers;
            attacker_outcomes.push(PieceOutcome {
                roll: rolls.next().copied().unwrap_or_default(),
                survived: !died,
                moved,
            });
            if died {
                continue;
            }
            piece.exhaust(ready_ms);
            if moved {
                moving.push(piece);
            } else {
                staying.push(piece);
            }
        }

        let mut defender_outcomes = Vec::with_capacity(defending.len());
        let mut holding = Vec::new();
        for (i, (mut piece, &roll)) in defending.into_iter().zip(&defend_rolls).enumerate() {
            let died = (i as u32) < defender_losses;
            defender_outcomes.push(PieceOutcome {
                roll,
                survived: !died,
                moved: false,
            });
            if !died {
                piece.exhaust(ready_ms);
                holding.push(piece);
            }
        }

        let cooldown = self.config.cooldown_for(participants + defenders);
        let source = self.graph.territory_mut(src);
        source.pieces = staying;
        source.cooldown_ms = cooldown;
        let target = self.graph.territory_mut(dst);
        target.pieces = if succeeded { moving } else { holding };
        target.cooldown_ms = cooldown;

        self.emit(SimEventKind::TerritoryAttacked(AttackReport {
            attacker,
            defender,
            from: src,
            to: dst,
            attackers: attacker_outcomes,
            defenders: defender_outcomes,
            attack_sum,
            defend_sum,
            succeeded,
        }));
        if succeeded {
            self.transfer_ownership(dst, attacker);
        }
    }

    fn transfer_ownership(&mut self, territory: TerritoryId, new_owner: PlayerId) {
        let previous = self.graph.territory_mut(territory).owner.replace(new_owner);
        self.players[new_owner].territories_owned += 1;
        self.emit(SimEventKind::TerritoryCaptured {
            territory,
            player: new_owner,
            previous_owner: previous,
        });

        if let Some(previous) = previous {
            let record = &mut self.players[previous];
            record.territories_owned = record.territories_owned.saturating_sub(1);
            if record.territories_owned == 0 && !record.eliminated {
                self.eliminate(previous, new_owner);
            }
        }
    }

    fn eliminate(&mut self, player: PlayerId, by: PlayerId) {
        self.players[player].eliminated = true;
        self.remaining = self.remaining.saturating_sub(1);
        self.emit(SimEventKind::PlayerEliminated { player, by });

        if self.remaining == 1 {
            let winner = self
                .players
                .iter()
                .find(|(_, r)| r.is_alive())
                .map_or(by, |(p, _)| p);
            self.phase = MatchPhase::Ended { winner };
            self.emit(SimEventKind::MatchEnded { winner });
        }
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advance the match by `elapsed` ms. Splitting one call into several
    /// smaller ones produces the same state.
    pub fn update(&mut self, elapsed: SimTime) {
        if elapsed <= 0 {
            return;
        }
        self.time += elapsed;
        for territory in self.graph.iter_mut() {
            territory.cooldown_ms = (territory.cooldown_ms - elapsed).max(0);
            for piece in &mut territory.pieces {
                piece.recover(elapsed);
            }
        }
        if self.is_running() {
            self.create_pieces(elapsed);
        }
    }

    fn create_pieces(&mut self, elapsed: SimTime) {
        let cap = self.config.max_available_pieces;
        let threshold = self.config.creation_threshold;
        let per_territory = self.config.creation_per_territory;
        let base = self.config.creation_base;

        for player in PlayerId::ALL {
            let record = &mut self.players[player];
            if !record.is_alive() {
                continue;
            }
            // Progress does not bank while the pool is full.
            if record.available >= cap {
                record.creation_progress = 0;
                continue;
            }
            let before = record.creation_progress;
            let rate = i64::from(record.territories_owned) * per_territory + base;
            record.creation_progress += elapsed * rate;
            let created = record.creation_progress / threshold - before / threshold;
            if created <= 0 {
                continue;
            }
            // Positive and at most `cap`, so it fits.
            let created = created.min(i64::from(cap)) as u32;
            record.available = record.available.saturating_add(created).min(cap);
            if record.available >= cap {
                record.creation_progress = 0;
            }
            let available = record.available;
            self.emit(SimEventKind::PieceCreated { player, available });
        }
    }

    // -----------------------------------------------------------------------
    // Digest and snapshots
    // -----------------------------------------------------------------------

    pub fn state_hash(&self) -> u64 {
        let progress = self
            .players
            .values()
            .fold(0u64, |acc, r| acc.wrapping_add(r.creation_progress as u64));
        let pieces = self
            .graph
            .iter()
            .fold(0u64, |acc, (_, t)| acc.wrapping_add(t.piece_count() as u64));
        let owned = self
            .players
            .values()
            .fold(0u64, |acc, r| acc.wrapping_add(u64::from(r.territories_owned)));
        let remaining = u64::from(self.remaining);

        (progress & 0xFFFF_FFFF)
            | ((pieces & 0xFF) << 32)
            | ((owned & 0xFF) << 40)
            | ((remaining & 0xFF) << 48)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Restore a snapshot; pending events are not part of it.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut state: Match = serde_json::from_str(json)?;
        state.graph.rebuild_index();
        Ok(state)
    }

    fn emit(&mut self, kind: SimEventKind) {
        self.events.push(SimEvent {
            time: self.time,
            kind,
        });
    }
}
