//! Windowed filters and numerical derivatives over sampled series.
//!
//! The edge behavior of each kernel is part of its contract: windowed
//! filters fall back to the input value wherever the full window does not
//! fit, and derivatives switch to one-sided differences at the ends.

use std::cmp::Ordering;

/// Yields, for every index of a series of length `len`, the range covered by
/// a centered window of `window` samples, or `None` if it does not fit.
/// Even windows lean one sample towards the end of the series.
fn centered_windows(len: usize, window: usize) -> impl Iterator<Item = Option<(usize, usize)>> {
    let lead = window.saturating_sub(1) / 2;
    (0..len).map(move |i| {
        let start = i.checked_sub(lead)?;
        let end = start + window;
        (window > 0 && end <= len).then_some((start, end))
    })
}

/// Median of a slice; the mean of the two middle values for even lengths.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    match sorted.len() {
        0 => f64::NAN,
        n if n % 2 == 1 => sorted[mid],
        _ => (sorted[mid - 1] + sorted[mid]) / 2.0,
    }
}

/// Centered rolling median. Indices where the window does not fit keep
/// their input value.
pub fn median_filter(values: &[f64], window: usize) -> Vec<f64> {
    centered_windows(values.len(), window)
        .zip(values)
        .map(|(span, &raw)| match span {
            Some((start, end)) => median(&values[start..end]),
            None => raw,
        })
        .collect()
}

/// Centered rolling mean. Indices where the window does not fit keep their
/// input value.
pub fn centered_mean(values: &[f64], window: usize) -> Vec<f64> {
    centered_windows(values.len(), window)
        .zip(values)
        .map(|(span, &raw)| match span {
            Some((start, end)) => values[start..end].iter().sum::<f64>() / window as f64,
            None => raw,
        })
        .collect()
}

/// Derivative of `values` with respect to `coords`, which may be unevenly
/// spaced. Interior points use the second order central scheme for uneven
/// spacing (the plain central difference when the spacing is uniform), the
/// two ends use one-sided first differences.
///
/// Repeated coordinates divide by zero and yield non-finite values, which
/// are passed through. Fewer than two points yield `NaN`.
pub fn gradient(values: &[f64], coords: &[f64]) -> Vec<f64> {
    assert_eq!(values.len(), coords.len());
    let n = values.len();
    if n < 2 {
        return vec![f64::NAN; n];
    }

    let steps: Vec<f64> = coords.windows(2).map(|w| w[1] - w[0]).collect();
    let uniform = steps.iter().all(|&h| h == steps[0]);

    let mut out = Vec::with_capacity(n);
    out.push((values[1] - values[0]) / steps[0]);
    for i in 1..n - 1 {
        let d = if uniform {
            (values[i + 1] - values[i - 1]) / (2.0 * steps[0])
        } else {
            let (h1, h2) = (steps[i - 1], steps[i]);
            let a = -h2 / (h1 * (h1 + h2));
            let b = (h2 - h1) / (h1 * h2);
            let c = h1 / (h2 * (h1 + h2));
            a * values[i - 1] + b * values[i] + c * values[i + 1]
        };
        out.push(d);
    }
    out.push((values[n - 1] - values[n - 2]) / steps[n - 2]);
    out
}

/// Per-sample increment of `values`: central differences over index in the
/// interior, one-sided at the ends.
pub fn gradient_by_index(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![f64::NAN; n];
    }

    let mut out = Vec::with_capacity(n);
    out.push(values[1] - values[0]);
    out.extend(values.windows(3).map(|w| (w[2] - w[0]) / 2.0));
    out.push(values[n - 1] - values[n - 2]);
    out
}

/// Running sum, starting from the first element.
pub fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, &v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}
