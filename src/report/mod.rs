//! Reporting: terminal text and the JSON report.

pub mod format;
pub mod json;

pub use format::*;
pub use json::*;
