// Combat arithmetic: how many pieces each side loses.
//
// Both loss formulas share one curve, `base^(ratio - 1)` where `ratio` is the
// winner's roll sum over the loser's (always >= 1). Winning big costs the
// attacker little; a lopsided defense bleeds the attacker while costing the
// defender at least one piece.
//
// The curve is evaluated with `+ - * /` only. The whole part of the exponent
// is repeated multiplication; the fractional part goes through fixed-length
// series for `ln` (atanh form) and `exp`. libm's `powf`/`exp` differ across
// platforms in the last ulp, and a single ulp at a floor boundary changes a
// piece count, which changes the digest.
//
// See also: `sim.rs` (`Match::attack`) which rolls the dice, applies these
// counts and enforces the "someone must stay behind" caps.
//
// **Critical constraint: determinism.** Keep the term counts and evaluation
// order fixed; every peer must compute the same bits.

const LN_TERMS: u32 = 80;
const EXP_TERMS: u32 = 30;

/// `(base_permille / 1000) ^ (numerator / denominator - 1)`.
///
/// Requires `numerator >= denominator > 0`.
pub fn decay(base_permille: u32, numerator: u32, denominator: u32) -> f64 {
    assert!(
        denominator > 0 && numerator >= denominator,
        "decay: ratio {numerator}/{denominator} must be at least 1"
    );
    let base = f64::from(base_permille) / 1000.0;
    let excess = numerator - denominator;
    let whole = excess / denominator;
    let frac = f64::from(excess % denominator) / f64::from(denominator);

    let mut result = 1.0;
    for _ in 0..whole {
        result *= base;
    }
    if frac > 0.0 {
        result *= exp_series(frac * ln_series(base));
    }
    result
}

/// Attacker losses after a successful attack, before placement caps.
pub fn attacker_losses_on_success(participants: u32, attack_sum: u32, defend_sum: u32, base_permille: u32) -> u32 {
    scaled_floor(participants, decay(base_permille, attack_sum, defend_sum))
}

/// Defender losses after a failed attack: at least one, but never the last
/// defender.
pub fn defender_losses_on_failure(defenders: u32, defend_sum: u32, attack_sum: u32, base_permille: u32) -> u32 {
    let raw = scaled_floor(defenders, decay(base_permille, defend_sum, attack_sum));
    raw.max(1).min(defenders.saturating_sub(1))
}

fn scaled_floor(count: u32, factor: f64) -> u32 {
    (f64::from(count) * factor).floor() as u32
}

/// `ln(x)` for `x` in (0, 1] via `2 * atanh((x - 1) / (x + 1))`.
fn ln_series(x: f64) -> f64 {
    let z = (x - 1.0) / (x + 1.0);
    let z2 = z * z;
    let mut power = z;
    let mut sum = 0.0;
    for k in 0..LN_TERMS {
        sum += power / f64::from(2 * k + 1);
        power *= z2;
    }
    2.0 * sum
}

/// `e^y` by Taylor expansion; accurate for the small negative `y` used here.
fn exp_series(y: f64) -> f64 {
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..=EXP_TERMS {
        term *= y / f64::from(k);
        sum += term;
    }
    sum
}
