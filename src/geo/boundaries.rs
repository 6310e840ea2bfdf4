//! Region boundary set.
//!
//! The boundary `FeatureCollection` is loaded once and never mutated.
//! Every annotation call works on an owned deep copy, so concurrent or
//! superseded calls cannot observe each other's writes.

use crate::analysis::{BucketScheme, JoinMode, Palette};
use crate::error::BoundaryError;
use crate::models::RegionTotal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

/// Feature property used as the join key.
pub const NAME_PROPERTY: &str = "name";

/// A GeoJSON feature. Unknown members are preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub geometry: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    /// The feature's region name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.properties.as_ref()?.get(NAME_PROPERTY)?.as_str()
    }
}

/// A GeoJSON feature collection. Unknown members are preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Region totals after joining against the boundary set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinOutcome {
    /// Totals whose key matched at least one feature.
    pub matched: HashMap<String, u64>,
    /// Totals whose key matched no feature, sorted by key.
    pub unmatched: BTreeMap<String, u64>,
}

impl JoinOutcome {
    /// Matched totals, one per region key.
    pub fn matched_totals(&self) -> Vec<u64> {
        self.matched.values().copied().collect()
    }
}

/// Styling applied by [`BoundarySet::annotate`].
#[derive(Debug, Clone)]
pub struct AnnotateOptions<'a> {
    pub palette: &'a Palette,
    /// Multiplier from total count to extrusion height.
    pub height_scale: f64,
}

/// An annotated copy of the boundary set.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedRegions {
    pub collection: FeatureCollection,
    /// One row per named feature, in feature order.
    pub regions: Vec<RegionTotal>,
}

/// Immutable reference set of region features.
#[derive(Debug, Clone)]
pub struct BoundarySet {
    collection: FeatureCollection,
    mode: JoinMode,
    /// Join key -> indices of features carrying that key.
    index: HashMap<String, Vec<usize>>,
}

impl BoundarySet {
    /// Build a boundary set from a parsed collection.
    pub fn new(collection: FeatureCollection, mode: JoinMode) -> Self {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, feature) in collection.features.iter().enumerate() {
            match feature.name() {
                Some(name) => index.entry(mode.key(name).into_owned()).or_default().push(i),
                None => warn!("Boundary feature {} has no string '{}' property", i, NAME_PROPERTY),
            }
        }

        debug!(
            "Indexed {} features under {} region keys",
            collection.features.len(),
            index.len()
        );

        Self {
            collection,
            mode,
            index,
        }
    }

    /// Parse a boundary set from GeoJSON text.
    pub fn parse(json: &str, mode: JoinMode) -> Result<Self, BoundaryError> {
        let value: Value = serde_json::from_str(json)?;

        let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
        if kind != "FeatureCollection" {
            return Err(BoundaryError::NotFeatureCollection(kind.to_string()));
        }

        let collection: FeatureCollection = serde_json::from_value(value)?;
        Ok(Self::new(collection, mode))
    }

    /// Load a boundary set from a GeoJSON file.
    pub fn load(path: &Path, mode: JoinMode) -> Result<Self, BoundaryError> {
        let content = std::fs::read_to_string(path).map_err(|source| BoundaryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, mode)
    }

    /// Join mode the index was built with.
    pub fn mode(&self) -> JoinMode {
        self.mode
    }

    /// Number of features in the set.
    pub fn len(&self) -> usize {
        self.collection.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.features.is_empty()
    }

    /// The canonical, unannotated collection.
    pub fn collection(&self) -> &FeatureCollection {
        &self.collection
    }

    /// Whether a join key names a known feature.
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Split aggregated totals into matched and unmatched region keys.
    ///
    /// Keys must have been produced under this set's [`JoinMode`].
    pub fn join(&self, totals: &HashMap<String, u64>) -> JoinOutcome {
        let mut outcome = JoinOutcome::default();

        for (key, total) in totals {
            if self.contains_key(key) {
                outcome.matched.insert(key.clone(), *total);
            } else {
                outcome.unmatched.insert(key.clone(), *total);
            }
        }

        for (key, total) in &outcome.unmatched {
            warn!("Region {:?} matched no boundary feature ({} birds dropped)", key, total);
        }

        outcome
    }

    /// Produce an annotated copy of the set.
    ///
    /// Every feature receives `total_count`, `color`, `bucket_index` and
    /// `extrusion_height`. Features without data get total 0 and bucket 0.
    pub fn annotate(
        &self,
        outcome: &JoinOutcome,
        scheme: &BucketScheme,
        options: &AnnotateOptions<'_>,
    ) -> AnnotatedRegions {
        let mut collection = self.collection.clone();
        let mut regions = Vec::with_capacity(collection.features.len());

        for feature in &mut collection.features {
            let name = feature.name().map(String::from);
            let total = name
                .as_deref()
                .and_then(|n| outcome.matched.get(self.mode.key(n).as_ref()))
                .copied()
                .unwrap_or(0);
            let bucket = scheme.bucket_of(total).unwrap_or(0);
            let color = options.palette.color(bucket).to_string();

            let properties = feature.properties.get_or_insert_with(Map::new);
            properties.insert("total_count".to_string(), Value::from(total));
            properties.insert("color".to_string(), Value::from(color.clone()));
            properties.insert("bucket_index".to_string(), Value::from(bucket));
            properties.insert(
                "extrusion_height".to_string(),
                Value::from(total as f64 * options.height_scale),
            );

            if let Some(name) = name {
                regions.push(RegionTotal {
                    name,
                    total_count: total,
                    bucket_index: bucket,
                    color,
                });
            }
        }

        AnnotatedRegions {
            collection,
            regions,
        }
    }
}
