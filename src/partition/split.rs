//! Index splitting primitives shared by the partitioning algorithms.

// Cut points are floor(cumulative fraction * len)
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

/// Splits `items` into `parts` contiguous chunks whose sizes differ by at
/// most one. The first `len % parts` chunks get the extra element.
///
/// `parts == 0` yields no chunks.
#[must_use]
pub fn array_split<T: Clone>(items: &[T], parts: usize) -> Vec<Vec<T>> {
    if parts == 0 {
        return Vec::new();
    }
    let base = items.len() / parts;
    let extra = items.len() % parts;

    let mut chunks = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let size = base + usize::from(i < extra);
        chunks.push(items[start..start + size].to_vec());
        start += size;
    }
    chunks
}

/// Cut points `floor(cumsum(proportions) * len)` without the final total.
///
/// Proportions are normalized first. Points are clamped to be monotone and
/// within `0..=len` so rounding never produces overlapping slices.
#[must_use]
pub fn cut_points(proportions: &[f64], len: usize) -> Vec<usize> {
    let total: f64 = proportions.iter().sum();
    if proportions.len() < 2 || !(total > 0.0) {
        return Vec::new();
    }

    let mut points = Vec::with_capacity(proportions.len() - 1);
    let mut acc = 0.0;
    let mut last = 0;
    for p in &proportions[..proportions.len() - 1] {
        acc += p / total;
        let point = ((acc * len as f64) as usize).clamp(last, len);
        points.push(point);
        last = point;
    }
    points
}

/// Splits `items` at the cut points derived from `proportions`, yielding one
/// chunk per proportion.
///
/// A zero or non-finite proportion total falls back to [`array_split`].
#[must_use]
pub fn split_at_proportions<T: Clone>(items: &[T], proportions: &[f64]) -> Vec<Vec<T>> {
    let total: f64 = proportions.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return array_split(items, proportions.len());
    }
    if proportions.len() == 1 {
        return vec![items.to_vec()];
    }

    let mut chunks = Vec::with_capacity(proportions.len());
    let mut start = 0;
    for point in cut_points(proportions, items.len()) {
        chunks.push(items[start..point].to_vec());
        start = point;
    }
    chunks.push(items[start..].to_vec());
    chunks
}
