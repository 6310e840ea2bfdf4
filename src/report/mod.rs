//! Report output.
//!
//! Markdown and JSON summaries of a choropleth run, plus the annotated
//! GeoJSON itself.

pub mod generator;

pub use generator::*;
