//! Numerical helpers: polynomial root finders for the mass-action equations.

pub mod roots;

pub use roots::*;
