// skirmish_sim — deterministic lockstep simulation for a real-time
// territory-conquest game.
//
// Two to four players own territories on a map, grow piece reserves over
// time, place pieces, shuffle them between their own territories, and attack
// neighbors with dice-rolled battles. Every peer runs the same `Match` and
// exchanges only player commands, so the simulation must be bit-for-bit
// reproducible from `(config, map, roster, seed, commands)`.
//
// Module overview:
// - `types.rs`:       SimTime, PlayerId, PerPlayer, Location, TerritoryId.
// - `prng.rs`:        DiceRng, xoshiro256++ with SplitMix64 seeding.
// - `config.rs`:      GameConfig, every tunable rule constant, JSON-loadable.
// - `territory.rs`:   Territory, Piece, TerritoryGraph and the MapBuilder.
// - `combat.rs`:      Battle loss formulas (the only floating-point code).
// - `event.rs`:       SimEvent / AttackReport narrative output.
// - `sim.rs`:         Match: rules, creation, elimination, state digest.
// - `command.rs`:     Command / Action / LocalCommand, the sole inputs.
// - `wire.rs`:        Binary batch codec for commands.
// - `queue.rs`:       Stable ordered CommandQueue.
// - `scheduler.rs`:   StepScheduler, step gating and digest comparison.
// - `coordinator.rs`: Coordinator, per-machine glue between inputs, the
//                     scheduler and a `skirmish_protocol::Transport`.
// - `ai.rs`:          AiInput, a computer player built on local commands.
// - `test_utils.rs`:  Small fixture maps (tests and `test-utils` feature).
//
// The crate has no rendering, audio or wall-clock dependency. The host
// measures real elapsed time and hands it to `Coordinator::tick`.
//
// **Critical constraint: determinism.** All randomness comes from the
// match's seeded `DiceRng`. No `HashMap`, no system time, no OS entropy.
// Use `BTreeMap` for ordered collections.

pub mod ai;
pub mod combat;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod event;
pub mod prng;
pub mod queue;
pub mod scheduler;
pub mod sim;
pub mod territory;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod wire;

pub use command::{Action, Command, CommandError, LocalCommand, SyncStamp};
pub use config::GameConfig;
pub use coordinator::{Coordinator, CoordinatorError, InputSource, Intent, TickReport};
pub use scheduler::{StepScheduler, StepStatus, SyncError};
pub use sim::{Match, MatchError, Refusal};
pub use territory::{MapBuilder, TerritoryGraph};
pub use types::{FOREVER, Location, PlayerId, SimTime};
