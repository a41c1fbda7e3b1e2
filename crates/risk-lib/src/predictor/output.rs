//! Post-processing of raw model outputs

/// Clamp a raw score onto [0, 1]; NaN maps to the top of the range
pub fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return 1.0;
    }
    raw.clamp(0.0, 1.0)
}

/// Logistic transform mapping a margin onto (0, 1)
pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
