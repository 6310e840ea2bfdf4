//! Analysis modules.
//!
//! Aggregation, classification and legend derivation for the choropleth,
//! plus the species ranking shown alongside it.

pub mod aggregator;
pub mod classifier;
pub mod legend;
pub mod quantile;
pub mod ranking;

pub use aggregator::*;
pub use classifier::*;
pub use legend::*;
pub use ranking::*;
