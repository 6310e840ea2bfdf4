//! Quantile lookup on sorted data.
//!
//! Uses the R-7 definition (the default in R and NumPy): for `n` sorted
//! values and probability `p`, the position is `h = p * (n - 1)` and the
//! result interpolates linearly between `x[floor(h)]` and `x[floor(h) + 1]`.

/// Computes the `p`-th quantile of a non-decreasing slice.
///
/// Returns `None` if the slice is empty or `p` is outside `[0, 1]`.
pub fn quantile_sorted(sorted: &[u64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 || !(0.0..=1.0).contains(&p) {
        return None;
    }
    if n == 1 {
        return Some(sorted[0] as f64);
    }

    let h = (n - 1) as f64 * p;
    let j = h.floor() as usize;
    let g = h - h.floor();

    if j + 1 >= n {
        Some(sorted[n - 1] as f64)
    } else {
        Some((1.0 - g) * sorted[j] as f64 + g * sorted[j + 1] as f64)
    }
}

/// Computes several quantiles of a non-decreasing slice in one pass.
pub fn quantiles_sorted<const N: usize>(sorted: &[u64], probs: [f64; N]) -> Option<[f64; N]> {
    let mut out = [0.0; N];
    for (slot, p) in out.iter_mut().zip(probs) {
        *slot = quantile_sorted(sorted, p)?;
    }
    Some(out)
}
