//! Legend labels for a bucket scheme.

use super::classifier::{BucketScheme, PALETTE_SIZE};
use crate::error::ConfigError;
use crate::models::LegendEntry;

/// Default yellow ramp, lightest first.
pub const DEFAULT_COLORS: [&str; PALETTE_SIZE] =
    ["#fff9c4", "#fff176", "#ffeb3b", "#fdd835", "#fbc02d"];

/// Ordered map colors, one per bucket index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<String>,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_COLORS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for Palette {
    type Error = ConfigError;

    fn try_from(colors: Vec<String>) -> Result<Self, Self::Error> {
        if colors.len() != PALETTE_SIZE {
            return Err(ConfigError::PaletteSize {
                expected: PALETTE_SIZE,
                found: colors.len(),
            });
        }
        if let Some(index) = colors.iter().position(|c| c.trim().is_empty()) {
            return Err(ConfigError::EmptyColor(index));
        }
        Ok(Self { colors })
    }
}

impl Palette {
    /// Color for a bucket index.
    pub fn color(&self, bucket: usize) -> &str {
        &self.colors[bucket.min(self.colors.len() - 1)]
    }
}

/// Build legend entries for a scheme, one per bucket.
pub fn labels(scheme: &BucketScheme, palette: &Palette) -> Vec<LegendEntry> {
    let mut texts = match scheme {
        BucketScheme::Empty => Vec::new(),
        BucketScheme::Exact { values } => range_labels(values.iter().copied()),
        BucketScheme::Quantile { cuts, .. } => range_labels(cuts.iter().map(|c| display_int(*c))),
    };

    if let BucketScheme::Quantile { cuts, large: true } = scheme {
        texts.push(format!("> {}", display_int(cuts[cuts.len() - 1])));
    }

    texts
        .into_iter()
        .enumerate()
        .map(|(i, label)| LegendEntry {
            label,
            color: palette.color(i).to_string(),
        })
        .collect()
}

/// `"<= b0"`, `"b0+1 - b1"`, ... over integer boundaries.
fn range_labels(bounds: impl Iterator<Item = u64>) -> Vec<String> {
    let mut prev: Option<u64> = None;
    bounds
        .map(|bound| {
            let label = match prev {
                None => format!("<= {}", bound),
                Some(p) => format!("{} - {}", p.saturating_add(1), bound),
            };
            prev = Some(bound);
            label
        })
        .collect()
}

/// Boundaries are shown truncated toward zero; classification is unaffected.
fn display_int(value: f64) -> u64 {
    value.trunc() as u64
}
