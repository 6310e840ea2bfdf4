//! Bucket classification for choropleth coloring.
//!
//! A small number of distinct totals gets one bucket per value; anything
//! larger is cut at the 20/40/60/80th percentiles.

use super::quantile::quantiles_sorted;
use serde::{Deserialize, Serialize};

/// Number of colors in the map palette.
pub const PALETTE_SIZE: usize = 5;

/// Percentiles used as quantile cut points.
pub const QUANTILE_PROBS: [f64; 4] = [0.2, 0.4, 0.6, 0.8];

/// Classification scheme derived from a set of region totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BucketScheme {
    /// No non-zero totals; no buckets are produced.
    Empty,
    /// One bucket per distinct total, ascending.
    Exact { values: Vec<u64> },
    /// Four cut points; `large` adds a fifth open-ended bucket.
    Quantile { cuts: [f64; 4], large: bool },
}

impl BucketScheme {
    /// Number of buckets the scheme produces.
    pub fn bucket_count(&self) -> usize {
        match self {
            BucketScheme::Empty => 0,
            BucketScheme::Exact { values } => values.len(),
            BucketScheme::Quantile { large: true, .. } => QUANTILE_PROBS.len() + 1,
            BucketScheme::Quantile { large: false, .. } => QUANTILE_PROBS.len(),
        }
    }

    /// Inclusive upper boundaries of the closed buckets, non-decreasing.
    pub fn boundaries(&self) -> Vec<f64> {
        match self {
            BucketScheme::Empty => Vec::new(),
            BucketScheme::Exact { values } => values.iter().map(|v| *v as f64).collect(),
            BucketScheme::Quantile { cuts, .. } => cuts.to_vec(),
        }
    }

    /// Bucket index for a region total, or `None` for the empty scheme.
    ///
    /// A total lands in the first bucket whose upper boundary it does not
    /// exceed. Zero therefore always lands in bucket 0.
    pub fn bucket_of(&self, total: u64) -> Option<usize> {
        let last = self.bucket_count().checked_sub(1)?;
        let index = match self {
            BucketScheme::Empty => return None,
            BucketScheme::Exact { values } => values.partition_point(|v| *v < total),
            BucketScheme::Quantile { cuts, .. } => {
                let total = total as f64;
                cuts.iter().position(|cut| total <= *cut).unwrap_or(cuts.len())
            }
        };
        Some(index.min(last))
    }

    /// Short name used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            BucketScheme::Empty => "empty",
            BucketScheme::Exact { .. } => "exact",
            BucketScheme::Quantile { .. } => "quantile",
        }
    }
}

/// Choose a classification scheme for a list of region totals.
///
/// Zero totals are ignored when choosing the scheme; they classify into
/// bucket 0 afterwards.
pub fn classify(totals: &[u64]) -> BucketScheme {
    let mut sorted: Vec<u64> = totals.iter().copied().filter(|t| *t > 0).collect();
    if sorted.is_empty() {
        return BucketScheme::Empty;
    }
    sorted.sort_unstable();

    let mut distinct = sorted.clone();
    distinct.dedup();

    if distinct.len() <= PALETTE_SIZE {
        return BucketScheme::Exact { values: distinct };
    }

    match quantiles_sorted(&sorted, QUANTILE_PROBS) {
        Some(cuts) => BucketScheme::Quantile {
            cuts,
            large: distinct.len() > PALETTE_SIZE,
        },
        None => BucketScheme::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_empty() {
        assert_eq!(classify(&[]), BucketScheme::Empty);
        assert_eq!(classify(&[0, 0, 0]), BucketScheme::Empty);
        assert_eq!(BucketScheme::Empty.bucket_of(0), None);
        assert_eq!(BucketScheme::Empty.bucket_count(), 0);
    }

    #[test]
    fn test_classify_exact_two_values() {
        let scheme = classify(&[15, 100]);
        assert_eq!(scheme, BucketScheme::Exact { values: vec![15, 100] });
        assert_eq!(scheme.bucket_count(), 2);
        assert_eq!(scheme.bucket_of(0), Some(0));
        assert_eq!(scheme.bucket_of(15), Some(0));
        assert_eq!(scheme.bucket_of(100), Some(1));
    }

    #[test]
    fn test_classify_single_value() {
        let scheme = classify(&[42, 0, 42]);
        assert_eq!(scheme, BucketScheme::Exact { values: vec![42] });
        assert_eq!(scheme.bucket_count(), 1);
        assert_eq!(scheme.bucket_of(0), Some(0));
        assert_eq!(scheme.bucket_of(42), Some(0));
    }

    #[test]
    fn test_classify_exact_ties_share_bucket() {
        let scheme = classify(&[5, 3, 5, 1, 3, 9, 7]);
        assert_eq!(scheme, BucketScheme::Exact { values: vec![1, 3, 5, 7, 9] });
        assert_eq!(scheme.bucket_of(3), Some(1));
        assert_eq!(scheme.bucket_of(9), Some(4));
    }

    #[test]
    fn test_classify_quantile_one_to_eight() {
        let scheme = classify(&[8, 1, 7, 2, 6, 3, 5, 4]);
        let BucketScheme::Quantile { cuts, large } = &scheme else {
            panic!("expected quantile scheme, got {:?}", scheme);
        };
        assert!(*large);
        let expected = [2.4, 3.8, 5.2, 6.6];
        for (cut, want) in cuts.iter().zip(expected) {
            assert!((cut - want).abs() < 1e-9, "{} != {}", cut, want);
        }

        let buckets: Vec<usize> = (1..=8).map(|t| scheme.bucket_of(t).unwrap()).collect();
        assert_eq!(buckets, vec![0, 0, 1, 2, 2, 3, 4, 4]);
        assert_eq!(scheme.bucket_count(), 5);
    }

    #[test]
    fn test_quantile_not_large_clamps() {
        let scheme = BucketScheme::Quantile {
            cuts: [1.0, 2.0, 3.0, 4.0],
            large: false,
        };
        assert_eq!(scheme.bucket_count(), 4);
        assert_eq!(scheme.bucket_of(100), Some(3));
    }

    #[test]
    fn test_bucket_monotonicity_and_palette_bound() {
        let totals: Vec<u64> = (0..60).map(|i| (i * i * 7 + 3) % 97).collect();
        let scheme = classify(&totals);

        let mut sorted = totals.clone();
        sorted.sort_unstable();
        let buckets: Vec<usize> = sorted.iter().map(|t| scheme.bucket_of(*t).unwrap()).collect();

        assert!(buckets.windows(2).all(|w| w[0] <= w[1]));
        assert!(buckets.iter().all(|b| *b < PALETTE_SIZE));
        assert!(scheme.bucket_count() <= PALETTE_SIZE);
    }

    #[test]
    fn test_bucket_boundaries_respected() {
        let totals: Vec<u64> = vec![3, 17, 17, 40, 41, 90, 120, 500, 501, 900];
        let scheme = classify(&totals);
        let bounds = scheme.boundaries();
        assert!(bounds.windows(2).all(|w| w[0] <= w[1]));

        for t in &totals {
            let i = scheme.bucket_of(*t).unwrap();
            let t = *t as f64;
            if i > 0 {
                assert!(bounds[i - 1] < t);
            }
            if i < bounds.len() {
                assert!(t <= bounds[i]);
            }
        }
    }

    #[test]
    fn test_classify_order_independent() {
        let a = classify(&[9, 1, 4, 16, 25, 36, 49]);
        let b = classify(&[49, 36, 25, 16, 9, 4, 1]);
        assert_eq!(a, b);
    }
}
