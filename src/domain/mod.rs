//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - the titration dataset (`MeasurementPoint`, `Dataset`, `HostSelector`)
//! - model kinds and input configuration enums (`ModelKind`, `ModelSpec`, `Strategy`)
//! - run configuration (`OptimizerConfig`, `FitConfig`, `GenerateConfig`)

pub mod types;

pub use types::*;
