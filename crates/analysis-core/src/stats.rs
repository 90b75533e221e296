//! Small numeric helpers shared by the averaging and scoring code.

/// Arithmetic mean, or `None` for an empty slice.
///
/// An empty input is "no data", never zero: callers rely on this to keep an
/// industry average undefined when no peer reported the metric.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Mean over the finite values of an iterator of optional samples.
/// Returns the mean together with the number of contributing samples.
pub fn mean_present<I>(values: I) -> (Option<f64>, usize)
where
    I: IntoIterator<Item = Option<f64>>,
{
    let present: Vec<f64> = values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect();
    (mean(&present), present.len())
}

/// Drop non-finite values (`NaN`, `±inf`) so they behave like missing data.
pub fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Weighted sum of `(value, weight)` pairs.
pub fn weighted_sum(parts: &[(f64, f64)]) -> f64 {
    parts.iter().map(|(value, weight)| value * weight).sum()
}
