use crate::types::Strength;

/// Steam strength: movement measured in strength units, graded on the shared
/// bands (weak < 1.5x, moderate < 2.5x, strong otherwise).
pub fn steam_strength(movement: f64, unit: f64) -> Strength {
    let unit = if unit > 0.0 { unit } else { 1.0 };
    Strength::from_ratio(movement.abs() / unit)
}

/// RLM strength grows with both how lopsided the public is and how far the
/// line travelled the other way. 70% public with a 1 point move is moderate.
pub fn reverse_line_strength(public_pct: f64, movement: f64) -> Strength {
    let lean = ((public_pct - 50.0) / 10.0).max(0.0);
    Strength::from_ratio(lean * movement.abs())
}

/// Freeze strength depends on how one-sided the public is.
pub fn freeze_strength(public_pct: f64) -> Strength {
    if public_pct >= 80.0 {
        Strength::Strong
    } else if public_pct >= 72.0 {
        Strength::Moderate
    } else {
        Strength::Weak
    }
}

/// Money-vs-public gap in percentage points.
pub fn money_flow_strength(gap: f64) -> Strength {
    if gap >= 30.0 {
        Strength::Strong
    } else if gap >= 20.0 {
        Strength::Moderate
    } else {
        Strength::Weak
    }
}
