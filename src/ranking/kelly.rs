/// Kelly sizing and expected value for two-sided sports lines.
///
/// With decimal odds `d` (total return per unit staked, stake included) and
/// win probability `p`, the Kelly fraction is
///   f* = (d·p − 1) / (d − 1)
/// and the expected return per unit staked is
///   EV = p·d − 1.
///
/// Whatever the formula says, the stake is capped at `KELLY_CAP` of bankroll.

/// Bankroll-protection cap on any single Kelly fraction.
pub const KELLY_CAP: f64 = 0.25;

/// Standard two-sided price when a line carries no real odds.
pub const STANDARD_PRICE: i32 = -110;

/// American odds → decimal odds. `-110` → 1.909, `+150` → 2.5.
pub fn american_to_decimal(american: i32) -> f64 {
    if american >= 100 {
        1.0 + american as f64 / 100.0
    } else if american <= -100 {
        1.0 + 100.0 / american.unsigned_abs() as f64
    } else {
        // Not a valid American price; treat as even money.
        2.0
    }
}

/// Break-even probability implied by an American price (vig included).
pub fn implied_probability(american: i32) -> f64 {
    1.0 / american_to_decimal(american)
}

/// Kelly fraction clamped to `[0, KELLY_CAP]`. Returns `0.0` when there is
/// no edge or the odds are degenerate.
pub fn kelly_fraction(win_prob: f64, decimal_odds: f64) -> f64 {
    if decimal_odds <= 1.0 || !win_prob.is_finite() {
        return 0.0;
    }
    let f = (decimal_odds * win_prob - 1.0) / (decimal_odds - 1.0);
    f.clamp(0.0, KELLY_CAP)
}

/// Expected return per unit staked.
///
/// Positive when the estimated probability beats the break-even
/// probability `1 / decimal_odds`.
pub fn expected_value(win_prob: f64, decimal_odds: f64) -> f64 {
    if decimal_odds <= 1.0 {
        return -1.0;
    }
    win_prob * decimal_odds - 1.0
}
