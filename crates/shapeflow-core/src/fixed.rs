use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Simulation time in seconds. Accumulated in fixed point so identical `dt`
/// sequences always land on identical timer values.
pub type Seconds = Fixed64;

/// Convert an f64 to Fixed64. Use at the boundary (frame dt, config files).
/// Out-of-range values saturate and NaN becomes zero.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    if v.is_nan() {
        return Fixed64::ZERO;
    }
    Fixed64::saturating_from_num(v)
}

/// Convert an f64 to Fixed64, or `None` if it is NaN or does not fit.
#[inline]
pub fn checked_f64_to_fixed64(v: f64) -> Option<Fixed64> {
    Fixed64::checked_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}
