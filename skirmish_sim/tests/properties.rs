//! Property-based tests for the match and the step scheduler.
//!
//! Uses proptest to generate command streams, update chunkings and battle
//! setups, then checks the determinism and conservation guarantees every
//! lockstep peer relies on.

use proptest::prelude::*;
use skirmish_sim::ai::choose_action;
use skirmish_sim::command::{Action, Command, SyncStamp};
use skirmish_sim::config::GameConfig;
use skirmish_sim::event::{SimEvent, SimEventKind};
use skirmish_sim::scheduler::StepScheduler;
use skirmish_sim::sim::Match;
use skirmish_sim::territory::MapBuilder;
use skirmish_sim::test_utils::*;
use skirmish_sim::types::{FOREVER, Location, PlayerId, SimTime};

// ===========================================================================
// Generators
// ===========================================================================

const DIRECTIONS: [(i16, i16); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

/// A gameplay command somewhere on (or just off) the 3x3 grid.
fn arb_command(players: usize) -> impl Strategy<Value = Command> {
    (1..2_000i64, 0..players, 0..3u8, 0..3i16, 0..3i16, 0..4usize).prop_map(
        |(time, player, kind, row, col, dir)| {
            let at = Location::new(row, col);
            let (dr, dc) = DIRECTIONS[dir];
            let to = Location::new(row + dr, col + dc);
            let action = match kind {
                0 => Action::Place { at },
                1 => Action::Move { from: at, to },
                _ => Action::Attack { from: at, to },
            };
            Command {
                time,
                player: PlayerId::ALL[player],
                action,
            }
        },
    )
}

fn arb_delivery_orders() -> impl Strategy<Value = (Vec<Command>, Vec<Command>)> {
    proptest::collection::vec(arb_command(2), 1..40)
        .prop_flat_map(|commands| (Just(commands.clone()), Just(commands).prop_shuffle()))
}

/// A scheduler for the 2-player grid with both players released for good,
/// so only command order matters.
fn ungated(seed: u64) -> StepScheduler {
    let mut scheduler = StepScheduler::new(grid_match(&[P0, P1], seed));
    for player in [P0, P1] {
        let departed = Command {
            time: FOREVER,
            player,
            action: Action::StepSync(SyncStamp {
                hash: 0,
                hash_time: FOREVER,
            }),
        };
        scheduler.schedule_command(departed).unwrap();
    }
    scheduler
}

fn run_delivered(commands: &[Command], seed: u64) -> (Match, Vec<SimEvent>) {
    let mut scheduler = ungated(seed);
    for &command in commands {
        scheduler.schedule_command(command).unwrap();
    }
    scheduler.update(2_500);
    let events = scheduler.take_sim_events();
    (scheduler.state().clone(), events)
}

/// A row of four territories: P0 at the head with a full stack, then P1,
/// P2 and P3 holding one territory each with `defenders` pieces.
fn gauntlet_match(defenders: [u8; 3], seed: u64) -> Match {
    let mut map = MapBuilder::new();
    map.territory(loc(0, 0), 9).unwrap();
    for col in 1..4 {
        map.territory(loc(0, col), 5).unwrap();
        map.connect(loc(0, col - 1), loc(0, col)).unwrap();
    }
    map.claim(loc(0, 0), P0, 9).unwrap();
    for (col, (player, pieces)) in [P1, P2, P3].into_iter().zip(defenders).enumerate() {
        map.claim(loc(0, col as i16 + 1), player, pieces).unwrap();
    }
    Match::new(GameConfig::default(), map.build(), &[P0, P1, P2, P3], seed).unwrap()
}

fn total_pieces(state: &Match) -> usize {
    state.graph().iter().map(|(_, t)| t.piece_count()).sum()
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Two peers receiving the same commands in different orders end in the
    /// same state.
    #[test]
    fn delivery_order_does_not_matter((in_order, shuffled) in arb_delivery_orders(), seed in any::<u64>()) {
        let (state_a, events_a) = run_delivered(&in_order, seed);
        let (state_b, events_b) = run_delivered(&shuffled, seed);
        prop_assert_eq!(state_a.state_hash(), state_b.state_hash());
        prop_assert_eq!(events_a, events_b);
        prop_assert_eq!(state_a, state_b);
    }

    /// Splitting time into arbitrary chunks changes nothing observable.
    #[test]
    fn update_chunking_is_invisible(
        chunks in proptest::collection::vec(0..700i64, 1..20),
        seed in any::<u64>(),
    ) {
        let mut whole = frontier_match(6, 3, true, seed);
        let (src, dst) = (
            whole.graph().id_of(loc(0, 0)).unwrap(),
            whole.graph().id_of(loc(0, 1)).unwrap(),
        );
        whole.attack(P0, src, dst);
        let mut pieces = whole.clone();

        let total: SimTime = chunks.iter().sum();
        whole.update(total);
        for &chunk in &chunks {
            pieces.update(chunk);
        }

        prop_assert_eq!(whole.time(), pieces.time());
        prop_assert_eq!(whole.state_hash(), pieces.state_hash());
        prop_assert_eq!(whole.graph(), pieces.graph());
        for player in [P0, P1] {
            prop_assert_eq!(whole.player(player), pieces.player(player));
        }
    }

    /// Battles only destroy what the report says they destroy, and both
    /// territories stay occupied afterwards.
    #[test]
    fn battles_conserve_pieces(
        attackers in 2..=9u8,
        defenders in 1..=9u8,
        defender_has_home in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let mut state = frontier_match(attackers, defenders, defender_has_home, seed);
        let (src, dst) = (
            state.graph().id_of(loc(0, 0)).unwrap(),
            state.graph().id_of(loc(0, 1)).unwrap(),
        );
        let before = total_pieces(&state);
        state.attack(P0, src, dst);

        let report = state
            .take_events()
            .into_iter()
            .find_map(|e| match e.kind {
                SimEventKind::TerritoryAttacked(report) => Some(report),
                _ => None,
            })
            .unwrap();
        let lost = (report.attacker_losses() + report.defender_losses()) as usize;
        prop_assert_eq!(total_pieces(&state), before - lost);

        let from = state.graph().get(src).unwrap();
        let to = state.graph().get(dst).unwrap();
        prop_assert!(from.piece_count() >= 1);
        prop_assert!(to.piece_count() >= 1);
        if report.succeeded {
            prop_assert_eq!(to.owner, Some(P0));
            prop_assert_eq!(to.piece_count(), report.pieces_moved() as usize);
            prop_assert_eq!(report.defender_losses(), u32::from(defenders));
            if !defender_has_home {
                prop_assert_eq!(state.winner(), Some(P0));
            }
        } else {
            prop_assert_eq!(to.owner, Some(P1));
            prop_assert_eq!(report.attacker_losses(), u32::from(attackers) - 1);
        }
    }

    /// Players only ever leave; the match ends exactly when one remains,
    /// and the winner then owns every owned territory.
    #[test]
    fn elimination_is_monotonic(
        steps in proptest::collection::vec((arb_command(4), 0..2_500i64), 1..80),
        seed in any::<u64>(),
    ) {
        let roster = [P0, P1, P2, P3];
        let mut state = grid_match(&roster, seed);
        let mut remaining = state.remaining_players();
        let mut ended = 0;

        for (command, pause) in steps {
            let _ = command.execute(&mut state);
            state.update(pause);
            ended += state
                .take_events()
                .iter()
                .filter(|e| matches!(e.kind, SimEventKind::MatchEnded { .. }))
                .count();

            let now = state.remaining_players();
            prop_assert!(now <= remaining);
            remaining = now;
            let alive = roster.iter().filter(|&&p| state.player(p).is_alive()).count();
            prop_assert_eq!(alive, remaining as usize);
            prop_assert_eq!(ended, usize::from(remaining == 1));

            if let Some(winner) = state.winner() {
                prop_assert_eq!(remaining, 1);
                prop_assert!(state
                    .graph()
                    .iter()
                    .all(|(_, t)| t.owner.is_none() || t.owner == Some(winner)));
            }
        }
    }

    /// A greedy P0 against passive neighbors takes the row one territory at
    /// a time: players drop out in order, one by one, and the match ends
    /// exactly once, when only P0 is left.
    #[test]
    fn a_campaign_eliminates_players_down_to_the_winner(
        defenders in prop::array::uniform3(1..=3u8),
        pauses in proptest::collection::vec(500..3_000i64, 400),
        seed in any::<u64>(),
    ) {
        let mut state = gauntlet_match(defenders, seed);
        let mut remaining = state.remaining_players();
        prop_assert_eq!(remaining, 4);
        let mut eliminated = Vec::new();
        let mut ended = 0;

        for pause in pauses {
            if !state.is_running() {
                break;
            }
            if let Some(action) = choose_action(&state, P0) {
                let command = Command { time: state.time(), player: P0, action };
                prop_assert!(command.execute(&mut state).is_ok(), "illegal choice {:?}", action);
            }
            state.update(pause);
            for event in state.take_events() {
                match event.kind {
                    SimEventKind::PlayerEliminated { player, by } => {
                        prop_assert_eq!(by, P0);
                        eliminated.push(player);
                    }
                    SimEventKind::MatchEnded { winner } => {
                        prop_assert_eq!(winner, P0);
                        ended += 1;
                    }
                    _ => {}
                }
            }

            let now = state.remaining_players();
            prop_assert!(now <= remaining);
            prop_assert!(remaining - now <= 1, "two players fell in one round");
            remaining = now;
            prop_assert_eq!(ended, usize::from(remaining == 1));
        }

        prop_assert_eq!(remaining, 1, "campaign stalled with {} players left", remaining);
        prop_assert_eq!(eliminated, vec![P1, P2, P3]);
        prop_assert_eq!(ended, 1);
        prop_assert_eq!(state.winner(), Some(P0));
    }
}
