//! Input/output helpers.
//!
//! - delimited-table ingest + validation (`ingest`)
//! - dataset and fit exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
