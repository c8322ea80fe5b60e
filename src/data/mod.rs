//! Dataset sources other than files.

pub mod sample;

pub use sample::*;
