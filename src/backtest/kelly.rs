//! Kelly criterion sizing for decimal-odds bets.
//!
//! Standard formula:
//!   f* = (b·p − q) / b
//! where
//!   b = decimal odds − 1 (net profit per unit staked)
//!   p = estimated win probability
//!   q = 1 − p
//!
//! A fractional multiplier (0 < multiplier ≤ 1) scales the full-Kelly stake
//! down, trading a little expected growth for much lower variance.

/// Expected value per unit staked: p × odds − 1.
pub fn expected_value(win_prob: f64, decimal_odds: f64) -> f64 {
    win_prob * decimal_odds - 1.0
}

/// Fraction of bankroll to stake. Exactly 0.0 whenever the predicted edge
/// is non-positive (p × odds ≤ 1) or the odds are malformed.
pub fn kelly_fraction(win_prob: f64, decimal_odds: f64, multiplier: f64) -> f64 {
    debug_assert!((0.0..=1.0).contains(&win_prob), "win_prob out of range");
    debug_assert!((0.0..=1.0).contains(&multiplier), "multiplier out of range");

    if decimal_odds <= 1.0 {
        return 0.0;
    }

    let b = decimal_odds - 1.0;
    let p = win_prob;
    let q = 1.0 - p;
    let f = (b * p - q) / b;

    if f <= 0.0 {
        return 0.0; // no edge
    }
    (f * multiplier).clamp(0.0, 1.0)
}
