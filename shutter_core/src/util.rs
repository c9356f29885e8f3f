//! Pulse/percent arithmetic shared by the controller, throttle and diagnostics.

/// Position as 0 (open) ..= 100 (closed). 0 when the travel is unknown.
#[inline]
pub fn pulses_to_percent(pulses: i32, max: i32) -> u8 {
    if max <= 0 {
        return 0;
    }
    let p = i64::from(pulses.clamp(0, max)) * 100 / i64::from(max);
    u8::try_from(p).unwrap_or(100)
}

/// Pulse count for `percent` of `max`, clamped to `[0, max]`.
#[inline]
pub fn percent_to_pulses(percent: u8, max: i32) -> i32 {
    let max = max.max(0);
    let t = i64::from(max) * i64::from(percent.min(100)) / 100;
    i32::try_from(t).unwrap_or(max).clamp(0, max)
}

/// Relative deviation of `measured` from `reference`, in percent.
#[inline]
pub fn deviation_pct(measured: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        return 0.0;
    }
    (measured - reference).abs() / reference * 100.0
}
