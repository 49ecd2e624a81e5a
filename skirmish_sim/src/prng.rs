// Deterministic dice for combat.
//
// xoshiro256++ seeded through SplitMix64, hand-rolled so every peer draws the
// identical sequence from the agreed match seed regardless of platform or
// toolchain. A match owns exactly one `DiceRng`. Combat is its only consumer,
// and draws happen in a fixed order (attacking pieces in territory order,
// then defending pieces).
//
// The generator state is part of the match snapshot, so a restored match
// continues the same stream.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRng {
    state: [u64; 4],
}

impl DiceRng {
    pub fn from_seed(seed: u64) -> Self {
        let mut mix = seed;
        let mut state = [0u64; 4];
        for word in &mut state {
            *word = splitmix64(&mut mix);
        }
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        let s = &mut self.state;
        let result = s[0].wrapping_add(s[3]).rotate_left(23).wrapping_add(s[0]);
        let t = s[1] << 17;
        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];
        s[2] ^= t;
        s[3] = s[3].rotate_left(45);
        result
    }

    /// Uniform `u64` in `[0, bound)` by rejection sampling (no modulo bias).
    ///
    /// Panics if `bound == 0`.
    pub fn range_u64(&mut self, bound: u64) -> u64 {
        assert!(bound > 0, "DiceRng::range_u64: empty range");
        // Values below `zone` would over-represent small remainders.
        let zone = bound.wrapping_neg() % bound;
        loop {
            let r = self.next_u64();
            if r >= zone {
                return r % bound;
            }
        }
    }

    /// Roll one die with faces `1..=sides`.
    pub fn roll(&mut self, sides: u8) -> u8 {
        1 + self.range_u64(u64::from(sides)) as u8
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_sequence() {
        // Pinned outputs: a change here breaks cross-version replays.
        let mut rng = DiceRng::from_seed(42);
        assert_eq!(rng.next_u64(), 0xd076_4d4f_4476_689f);
        assert_eq!(rng.next_u64(), 0x519e_4174_576f_3791);
        assert_eq!(rng.next_u64(), 0xfbe0_7cfb_0c24_ed8c);
    }

    #[test]
    fn dice_sequence_is_pinned() {
        let mut rng = DiceRng::from_seed(7);
        let rolls: Vec<u8> = (0..12).map(|_| rng.roll(4)).collect();
        assert_eq!(rolls, vec![2, 1, 3, 1, 3, 2, 1, 1, 2, 2, 2, 3]);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = DiceRng::from_seed(1);
        let mut b = DiceRng::from_seed(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn rolls_stay_on_the_die() {
        let mut rng = DiceRng::from_seed(99);
        let mut seen = [false; 6];
        for _ in 0..2_000 {
            let face = rng.roll(6);
            assert!((1..=6).contains(&face), "rolled {face}");
            seen[usize::from(face - 1)] = true;
        }
        assert!(seen.iter().all(|&s| s), "every face should come up");
    }

    #[test]
    fn snapshot_resumes_the_same_stream() {
        let mut rng = DiceRng::from_seed(5);
        rng.next_u64();
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: DiceRng = serde_json::from_str(&json).unwrap();
        for _ in 0..10 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
