// Shared fixtures for tests: small maps and ready-made matches.
//
// Compiled for this crate's own tests and, through the `test-utils` feature,
// for `tests/properties.rs` and the `multiplayer_tests` crate. Nothing here
// is reachable from a release build.

use crate::config::GameConfig;
use crate::sim::Match;
use crate::territory::{MapBuilder, TerritoryGraph};
use crate::types::{Location, PlayerId};

pub const P0: PlayerId = PlayerId::ALL[0];
pub const P1: PlayerId = PlayerId::ALL[1];
pub const P2: PlayerId = PlayerId::ALL[2];
pub const P3: PlayerId = PlayerId::ALL[3];

pub fn loc(row: i16, col: i16) -> Location {
    Location::new(row, col)
}

/// Four territories in a row, capacity 5 each except the 7 at (0, 2).
/// P0 holds (0, 0) and P1 holds (0, 3), each with three ready pieces; the
/// middle two are unowned.
pub fn corridor_map() -> TerritoryGraph {
    let mut map = MapBuilder::new();
    for (col, capacity) in [(0, 5), (1, 5), (2, 7), (3, 5)] {
        map.territory(loc(0, col), capacity).unwrap();
    }
    for col in 0..3 {
        map.connect(loc(0, col), loc(0, col + 1)).unwrap();
    }
    map.claim(loc(0, 0), P0, 3).unwrap();
    map.claim(loc(0, 3), P1, 3).unwrap();
    map.build()
}

pub fn corridor_match(seed: u64) -> Match {
    Match::new(GameConfig::default(), corridor_map(), &[P0, P1], seed).unwrap()
}

/// 3x3 grid with 4-neighborhood adjacency. Corners have capacity 5, edges 7,
/// the center 9. Each player in `players` claims one corner (clockwise from
/// the top-left) with `pieces` ready pieces.
pub fn grid_map(players: &[PlayerId], pieces: u8) -> TerritoryGraph {
    let mut map = MapBuilder::new();
    for row in 0..3 {
        for col in 0..3 {
            let capacity = match (row, col) {
                (1, 1) => 9,
                (0 | 2, 0 | 2) => 5,
                _ => 7,
            };
            map.territory(loc(row, col), capacity).unwrap();
        }
    }
    for row in 0..3 {
        for col in 0..3 {
            if col < 2 {
                map.connect(loc(row, col), loc(row, col + 1)).unwrap();
            }
            if row < 2 {
                map.connect(loc(row, col), loc(row + 1, col)).unwrap();
            }
        }
    }
    let corners = [loc(0, 0), loc(0, 2), loc(2, 2), loc(2, 0)];
    for (&player, corner) in players.iter().zip(corners) {
        map.claim(corner, player, pieces).unwrap();
    }
    map.build()
}

pub fn grid_match(players: &[PlayerId], seed: u64) -> Match {
    Match::new(GameConfig::default(), grid_map(players, 4), players, seed).unwrap()
}

/// Two capacity-9 territories facing each other: P0 attacks from (0, 0)
/// with `attackers` ready pieces, P1 defends (0, 1) with `defenders`. When
/// `defender_has_home` is set, P1 also holds (1, 1) so losing the front does
/// not eliminate them.
pub fn frontier_match(attackers: u8, defenders: u8, defender_has_home: bool, seed: u64) -> Match {
    let mut map = MapBuilder::new();
    map.territory(loc(0, 0), 9).unwrap();
    map.territory(loc(0, 1), 9).unwrap();
    map.territory(loc(1, 1), 5).unwrap();
    map.connect(loc(0, 0), loc(0, 1)).unwrap();
    map.connect(loc(0, 1), loc(1, 1)).unwrap();
    map.claim(loc(0, 0), P0, attackers).unwrap();
    map.claim(loc(0, 1), P1, defenders).unwrap();
    if defender_has_home {
        map.claim(loc(1, 1), P1, 1).unwrap();
    }
    Match::new(GameConfig::default(), map.build(), &[P0, P1], seed).unwrap()
}
