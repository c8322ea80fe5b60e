//! Binding models.
//!
//! Speciation and signal mixing are small, pure functions per topology
//! (`one_one`, `two_one`, `one_two`) dispatched through `model`.
//! `TitrationModel` owns the parameters and the predicted/residual tables.

pub mod model;
pub mod one_one;
pub mod one_two;
pub mod titration;
pub mod two_one;

pub use model::*;
pub use titration::*;
