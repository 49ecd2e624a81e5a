// Computer player.
//
// `AiInput` is an `InputSource` that thinks every `think_interval_ms` of
// real time. It never reads the match itself: it hands the coordinator a
// decision function, which runs as a local command against the state at its
// due time, and whatever that returns is issued as an ordinary command. Two
// peers hosting the same AI therefore never need to agree on when it
// thinks, only on the commands it ends up sending.
//
// `choose_action` is deliberately greedy:
//   1. the legal attack with the biggest edge (ready attackers minus
//      defending pieces); unowned territories beat any contested one, and
//      contested ones need a positive edge;
//   2. otherwise a placement, frontier territories first;
//   3. otherwise nothing.
// Territories and neighbors are scanned in id order; ties keep the first.

use crate::command::Action;
use crate::coordinator::{InputSource, Intent};
use crate::sim::Match;
use crate::types::{PlayerId, SimTime, TerritoryId};

pub struct AiInput {
    player: PlayerId,
    think_interval_ms: SimTime,
    since_last_think: SimTime,
}

impl AiInput {
    pub fn new(player: PlayerId, think_interval_ms: SimTime) -> Self {
        assert!(think_interval_ms > 0, "AiInput: think interval must be positive");
        Self {
            player,
            think_interval_ms,
            since_last_think: 0,
        }
    }
}

impl InputSource for AiInput {
    fn player(&self) -> PlayerId {
        self.player
    }

    fn update(&mut self, elapsed: SimTime) -> Option<Intent> {
        self.since_last_think += elapsed;
        if self.since_last_think < self.think_interval_ms {
            return None;
        }
        self.since_last_think = 0;
        Some(Intent::Decide(choose_action))
    }
}

/// Best action for `player` against `state`, if any.
pub fn choose_action(state: &Match, player: PlayerId) -> Option<Action> {
    let graph = state.graph();
    let owned: Vec<TerritoryId> = graph
        .iter()
        .filter(|(_, t)| t.owner == Some(player))
        .map(|(id, _)| id)
        .collect();

    // (unowned target, edge)
    let mut best: Option<((bool, i64), Action)> = None;
    for &src in &owned {
        let Some(from) = graph.get(src) else { continue };
        for &dst in &from.neighbors {
            if !state.can_attack(player, src, dst) {
                continue;
            }
            let Some(to) = graph.get(dst) else { continue };
            let unowned = to.owner.is_none();
            let edge = from.ready_count() as i64 - to.piece_count() as i64;
            if !unowned && edge <= 0 {
                continue;
            }
            let score = (unowned, edge);
            if best.as_ref().is_none_or(|(top, _)| score > *top) {
                best = Some((
                    score,
                    Action::Attack {
                        from: from.location,
                        to: to.location,
                    },
                ));
            }
        }
    }
    if let Some((_, action)) = best {
        return Some(action);
    }

    let is_frontier = |id: TerritoryId| {
        graph.get(id).is_some_and(|t| {
            t.neighbors
                .iter()
                .any(|&n| graph.get(n).is_some_and(|nt| nt.owner != Some(player)))
        })
    };
    let placeable: Vec<TerritoryId> = owned.into_iter().filter(|&id| state.can_place(player, id)).collect();
    placeable
        .iter()
        .copied()
        .find(|&id| is_frontier(id))
        .or_else(|| placeable.first().copied())
        .and_then(|id| graph.get(id))
        .map(|t| Action::Place { at: t.location })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn grabs_unowned_land_first() {
        let state = corridor_match(0);
        assert_eq!(
            choose_action(&state, P0),
            Some(Action::Attack {
                from: loc(0, 0),
                to: loc(0, 1)
            })
        );
    }

    #[test]
    fn attacks_only_with_the_upper_hand() {
        let strong = frontier_match(6, 2, true, 0);
        assert_eq!(
            choose_action(&strong, P0),
            Some(Action::Attack {
                from: loc(0, 0),
                to: loc(0, 1)
            })
        );

        let weak = frontier_match(2, 6, true, 0);
        assert_eq!(choose_action(&weak, P0), Some(Action::Place { at: loc(0, 0) }));
    }

    #[test]
    fn prefers_placing_on_the_frontier() {
        // P1 holds (0, 1) and (1, 1); only (0, 1) borders P0, and it is
        // outnumbered there.
        let state = frontier_match(6, 2, true, 0);
        assert_eq!(choose_action(&state, P1), Some(Action::Place { at: loc(0, 1) }));
    }

    #[test]
    fn does_nothing_when_nothing_is_legal() {
        let mut state = frontier_match(2, 6, true, 0);
        // Spend P0's reserve.
        let home = state.graph().id_of(loc(0, 0)).unwrap();
        while state.can_place(P0, home) {
            state.place_piece(P0, home);
        }
        assert_eq!(choose_action(&state, P0), None);
    }

    #[test]
    fn thinks_on_its_interval() {
        let mut ai = AiInput::new(P2, 300);
        assert_eq!(ai.player(), P2);
        assert!(ai.update(100).is_none());
        assert!(ai.update(100).is_none());
        assert!(matches!(ai.update(100), Some(Intent::Decide(_))));
        assert!(ai.update(250).is_none());
        assert!(ai.update(50).is_some());
    }
}
