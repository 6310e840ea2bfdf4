//! Region boundary handling.

pub mod boundaries;

pub use boundaries::*;
