/// Mean spacing between successive timestamps, in the timestamps' own unit.
///
/// No outlier rejection: a single corrupted timestamp skews the estimate for
/// this call. `NaN` timestamps propagate. `None` below two timestamps.
pub fn estimate_interval(ts: &[f64]) -> Option<f64> {
    if ts.len() < 2 {
        return None;
    }
    let gaps = ts.windows(2).map(|pair| pair[1] - pair[0]);
    Some(gaps.sum::<f64>() / (ts.len() - 1) as f64)
}
/// Sampling rate in hertz for an interval expressed in device ticks.
pub fn rate_hz(interval: f64, seconds_per_tick: f64) -> f64 {
    1.0 / (interval * seconds_per_tick)
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn constant_spacing_is_recovered() {
        let d0 = 1234.5;
        let ts: Vec<f64> = (0..256).map(|k| 1.0e6 + k as f64 * d0).collect();
        let d = estimate_interval(&ts).unwrap();
        assert!((d - d0).abs() < 1e-9 * d0);
        assert!((rate_hz(d, 1e-6) - 1.0e6 / d0).abs() < 1e-6);
    }
    #[test]
    fn single_outlier_shift_is_bounded() {
        let n = 128;
        let d0 = 1000.0;
        let outlier_gap = 51_000.0;
        let mut ts: Vec<f64> = (0..n).map(|k| k as f64 * d0).collect();
        // the gap before n/2 becomes `outlier_gap`, later timestamps shift with it
        for t in ts.iter_mut().skip(n / 2) {
            *t += outlier_gap - d0;
        }
        let d = estimate_interval(&ts).unwrap();
        assert!(d > d0);
        assert!((d - d0 - (outlier_gap - d0) / (n - 1) as f64).abs() < 1e-9);
        assert!(d - d0 <= outlier_gap / n as f64);
    }
    #[test]
    fn too_few_timestamps() {
        assert_eq!(estimate_interval(&[]), None);
        assert_eq!(estimate_interval(&[5.0]), None);
    }
    #[test]
    fn nan_propagates() {
        let d = estimate_interval(&[0.0, f64::NAN, 2.0]).unwrap();
        assert!(d.is_nan());
    }
}
