//! Score arithmetic: EWMA updates, inactivity decay, direct deltas.
//!
//! Pure computation — no storage, no IO. Tunable fractions (`alpha`,
//! `decay_factor`) are quantized once to parts-per-million and all blending
//! runs in integer arithmetic, so results are bit-for-bit deterministic
//! given their inputs. Every function clamps its result so scores never go
//! below 0.

// ---------------------------------------------------------------------------
// Fixed-point scale
// ---------------------------------------------------------------------------

/// Fixed-point scale for tunable fractions: parts per million.
pub const SCALE_PPM: i128 = 1_000_000;

/// Quantize a fraction to parts-per-million, clamped to `[0, SCALE_PPM]`.
///
/// Callers validate range errors before reaching this point; the clamp keeps
/// the arithmetic total for out-of-range inputs anyway.
///
/// # Examples
///
/// ```
/// use merit_core::scoring::{fraction_to_ppm, SCALE_PPM};
///
/// assert_eq!(fraction_to_ppm(0.2), 200_000);
/// assert_eq!(fraction_to_ppm(0.0), 0);
/// assert_eq!(fraction_to_ppm(1.0), SCALE_PPM);
/// assert_eq!(fraction_to_ppm(7.5), SCALE_PPM); // clamped
/// ```
pub fn fraction_to_ppm(fraction: f64) -> i128 {
    let scaled = (fraction * SCALE_PPM as f64).round();
    if scaled.is_nan() {
        return 0;
    }
    (scaled as i128).clamp(0, SCALE_PPM)
}

// ---------------------------------------------------------------------------
// Score updates
// ---------------------------------------------------------------------------

/// Exponentially-weighted moving average update.
///
/// `new = round(alpha * weight + (1 - alpha) * current)`, clamped at 0.
/// `weight` may be negative (deductions). `alpha` outside `[0, 1]` is
/// clamped; reject it upstream where out-of-range is an error.
///
/// # Examples
///
/// ```
/// use merit_core::scoring::ewma_update;
///
/// // Baseline 1000, weight 50, alpha 0.2 → 0.2*50 + 0.8*1000 = 810.
/// assert_eq!(ewma_update(1000, 50, 0.2), 810);
///
/// // alpha = 0 ignores the activity entirely.
/// assert_eq!(ewma_update(1000, 50, 0.0), 1000);
///
/// // alpha = 1 jumps straight to the weight.
/// assert_eq!(ewma_update(1000, 50, 1.0), 50);
///
/// // Heavily negative weights clamp at 0.
/// assert_eq!(ewma_update(10, -100_000, 0.5), 0);
/// ```
pub fn ewma_update(current: u64, weight: i64, alpha: f64) -> u64 {
    let a = fraction_to_ppm(alpha);
    let blended = a * weight as i128 + (SCALE_PPM - a) * current as i128;
    clamp_score(div_round_half(blended, SCALE_PPM))
}

/// Inactivity decay: `new = round(current * (1 - decay_factor))`.
///
/// Never increases the score for `decay_factor` in `[0, 1]` (values outside
/// that range are clamped).
///
/// # Examples
///
/// ```
/// use merit_core::scoring::decay_score;
///
/// // 810 * 0.95 = 769.5, rounds half away from zero → 770.
/// assert_eq!(decay_score(810, 0.05), 770);
///
/// assert_eq!(decay_score(810, 0.0), 810);
/// assert_eq!(decay_score(810, 1.0), 0);
/// assert_eq!(decay_score(0, 0.5), 0);
/// ```
pub fn decay_score(current: u64, decay_factor: f64) -> u64 {
    let retained = SCALE_PPM - fraction_to_ppm(decay_factor);
    clamp_score(div_round_half(retained * current as i128, SCALE_PPM))
}

/// Direct delta application (admin adjustments, report penalties), clamped
/// at 0. Bypasses the EWMA entirely.
///
/// # Examples
///
/// ```
/// use merit_core::scoring::apply_delta;
///
/// assert_eq!(apply_delta(1000, 250), 1250);
/// assert_eq!(apply_delta(1000, -250), 750);
/// assert_eq!(apply_delta(100, -500), 0);
/// ```
pub fn apply_delta(current: u64, delta: i64) -> u64 {
    clamp_score(current as i128 + delta as i128)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Clamp an i128 intermediate into the valid score range.
fn clamp_score(value: i128) -> u64 {
    value.clamp(0, u64::MAX as i128) as u64
}

/// Divide, rounding half away from zero. `divisor` must be positive.
fn div_round_half(numerator: i128, divisor: i128) -> i128 {
    if numerator >= 0 {
        (numerator + divisor / 2) / divisor
    } else {
        (numerator - divisor / 2) / divisor
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
