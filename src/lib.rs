//! `titration-fit` library crate.
//!
//! The binary (`tfit`) is a thin wrapper around this library so that:
//!
//! - the equilibrium engine and optimizers are testable without spawning processes
//! - the model layer can be driven by other front-ends (notebooks, GUIs)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
