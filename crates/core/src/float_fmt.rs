//! Fixed-precision float formatting for labels and panels.
//!
//! Tick labels and the results panel always print a fixed number of decimals,
//! independent of the profile scale. Values are scaled and rounded into an
//! `i64` and the integer parts are formatted separately, so `-0.004` prints
//! as `0.00` instead of `-0.00`.

/// Number of decimals used for tick labels and solver results.
pub const LABEL_DECIMALS: usize = 2;

#[inline]
pub fn fmt_label(v: f64) -> String {
    fmt_f64_fixed(v, LABEL_DECIMALS)
}

pub fn fmt_f64_fixed(v: f64, decimals: usize) -> String {
    if !v.is_finite() {
        return if v.is_nan() {
            "NaN".to_string()
        } else if v.is_sign_positive() {
            "Inf".to_string()
        } else {
            "-Inf".to_string()
        };
    }

    let decimals = decimals.min(9);
    let scale_i64 = 10_i64.pow(decimals as u32);
    let scaled = (v * scale_i64 as f64).round();

    // Out of i64 range after scaling.
    if !scaled.is_finite() || scaled.abs() > i64::MAX as f64 {
        return if v.is_sign_negative() {
            "-Inf".to_string()
        } else {
            "Inf".to_string()
        };
    }

    let scaled_i = scaled as i64;
    let abs_i = scaled_i.unsigned_abs();
    let scale_u = scale_i64 as u64;
    let int_part = abs_i / scale_u;
    let frac_part = abs_i % scale_u;

    let mut out = String::new();
    if scaled_i < 0 {
        out.push('-');
    }
    out.push_str(&int_part.to_string());

    if decimals > 0 {
        out.push('.');
        let frac_str = frac_part.to_string();
        for _ in 0..decimals.saturating_sub(frac_str.len()) {
            out.push('0');
        }
        out.push_str(&frac_str);
    }

    out
}

/// Number of decimals needed to represent `step` exactly in the input field.
///
/// `0.01` needs 2, `0.5` needs 1, `10` needs 0. Capped at 6.
pub fn decimals_for_step(step: f64) -> usize {
    let mut decimals = 0;
    let mut scaled = step.abs();
    while decimals < 6 && (scaled - scaled.round()).abs() > 1e-9 {
        scaled *= 10.0;
        decimals += 1;
    }
    decimals
}
