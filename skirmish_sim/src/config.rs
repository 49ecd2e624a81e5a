// Data-driven match configuration.
//
// Every rule constant the simulation and the step scheduler read lives in
// `GameConfig`: piece recovery, cooldowns, the piece-creation economy, dice,
// the combat loss curve, and the lockstep timing. The sim has no magic
// numbers of its own.
//
// Missing JSON fields fall back to the defaults, so a config file only needs
// to name what it changes. `from_json` validates after parsing; `Match::new`
// validates again for configs built in code.
//
// See also: `sim.rs` (owns the config as part of `Match`), `combat.rs`
// (reads the dice and loss parameters), `scheduler.rs` (reads the step
// timing).
//
// **Critical constraint: determinism.** Every peer must run with an
// identical config; a difference shows up as a digest mismatch at the first
// step boundary.

use serde::{Deserialize, Serialize};

use crate::types::SimTime;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Milliseconds a piece needs after arriving before it can act.
    pub piece_ready_ms: SimTime,
    /// Territory cooldown after a move or attack, before the per-piece term.
    pub cooldown_base_ms: SimTime,
    /// Extra cooldown per piece involved in the move or attack.
    pub cooldown_per_piece_ms: SimTime,

    /// Creation progress per millisecond per owned territory.
    pub creation_per_territory: i64,
    /// Creation progress per millisecond regardless of territory count.
    pub creation_base: i64,
    /// Progress needed for one new available piece.
    pub creation_threshold: i64,
    /// Cap on a player's pool of available (unplaced) pieces.
    pub max_available_pieces: u32,
    pub starting_available_pieces: u32,

    pub die_sides: u8,
    /// Base of the combat loss curve, in thousandths (400 = 0.4).
    pub loss_base_permille: u32,

    /// Length of one lockstep step.
    pub step_duration_ms: SimTime,
    /// How far ahead of the issuer's clock a command is scheduled.
    pub scheduling_offset_ms: SimTime,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            piece_ready_ms: 2_000,
            cooldown_base_ms: 1_250,
            cooldown_per_piece_ms: 250,
            creation_per_territory: 1,
            creation_base: 4,
            creation_threshold: 20_000,
            max_available_pieces: 10,
            starting_available_pieces: 2,
            die_sides: 4,
            loss_base_permille: 400,
            step_duration_ms: 100,
            scheduling_offset_ms: 200,
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("piece_ready_ms", self.piece_ready_ms),
            ("creation_threshold", self.creation_threshold),
            ("step_duration_ms", self.step_duration_ms),
        ];
        for (name, value) in positive {
            if value <= 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        let non_negative = [
            ("cooldown_base_ms", self.cooldown_base_ms),
            ("cooldown_per_piece_ms", self.cooldown_per_piece_ms),
            ("creation_per_territory", self.creation_per_territory),
            ("creation_base", self.creation_base),
        ];
        for (name, value) in non_negative {
            if value < 0 {
                return Err(ConfigError::Invalid(format!("{name} must not be negative, got {value}")));
            }
        }
        if self.die_sides == 0 {
            return Err(ConfigError::Invalid("die_sides must be at least 1".into()));
        }
        // The exp/ln series in combat.rs converge over this range.
        if !(100..=900).contains(&self.loss_base_permille) {
            return Err(ConfigError::Invalid(format!(
                "loss_base_permille must be within 100..=900, got {}",
                self.loss_base_permille
            )));
        }
        if self.starting_available_pieces > self.max_available_pieces {
            return Err(ConfigError::Invalid(format!(
                "starting_available_pieces ({}) exceeds max_available_pieces ({})",
                self.starting_available_pieces, self.max_available_pieces
            )));
        }
        // Smaller deadlocks peers one step apart; larger lets a leading peer
        // look too far ahead to a peer that has not ticked yet.
        if self.scheduling_offset_ms != 2 * self.step_duration_ms {
            return Err(ConfigError::Invalid(format!(
                "scheduling_offset_ms ({}) must be exactly twice step_duration_ms ({})",
                self.scheduling_offset_ms, self.step_duration_ms
            )));
        }
        Ok(())
    }

    /// Territory cooldown after an action involving `pieces` pieces.
    pub fn cooldown_for(&self, pieces: u32) -> SimTime {
        self.cooldown_base_ms + self.cooldown_per_piece_ms * SimTime::from(pieces)
    }
}
