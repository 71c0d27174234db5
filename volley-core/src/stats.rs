//! Order statistics shared by the live aggregator and the telemetry summary.

/// Value at index `floor(len * quantile)` of an ascending slice.
///
/// No interpolation is performed. An empty slice, or an index that falls past the end (which
/// `quantile = 1.0` always does), yields `0.`.
pub fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() || !quantile.is_finite() || quantile < 0. {
        return 0.;
    }

    let idx = (sorted.len() as f64 * quantile).floor() as usize;
    sorted.get(idx).copied().unwrap_or(0.)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Ascending copy of `values`.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}
