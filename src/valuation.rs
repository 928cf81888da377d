// src/valuation.rs
//
// Pure valuation math. All figures are accumulated unrounded; rounding to cents
// happens once, at the presentation boundary, via `round2`.

/// Absolute move since the previous close. `None` when the previous close is
/// unavailable, which is deliberately distinct from a real 0.0 move.
pub fn day_change(price: f64, previous_close: Option<f64>) -> Option<f64> {
    previous_close.map(|prev| price - prev)
}

/// Percentage move since the previous close, on the same unavailable semantics.
pub fn day_change_percent(price: f64, previous_close: Option<f64>) -> Option<f64> {
    previous_close
        .filter(|prev| *prev != 0.0)
        .map(|prev| (price - prev) / prev * 100.0)
}

/// Market value of a single position.
pub fn position_value(quantity: i64, price: f64) -> f64 {
    quantity as f64 * price
}

/// Cash balance plus the market value of every priced position.
pub fn net_worth(balance: f64, positions: &[(i64, f64)]) -> f64 {
    positions
        .iter()
        .fold(balance, |acc, (qty, price)| acc + position_value(*qty, *price))
}

/// Presentation-boundary rounding to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
