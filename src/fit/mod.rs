//! Parameter fitting.
//!
//! Responsibilities:
//!
//! - the optimizer seam (`LeastSquaresProblem`, `Observer`, `Solution`)
//! - coordinate descent and Levenberg-Marquardt on flat parameter vectors
//! - driving either against a `TitrationModel` (`driver`)
//! - holding live models over one dataset and ranking them (`session`)

pub mod descent;
pub mod driver;
pub mod levmar;
pub mod observe;
pub mod problem;
pub mod session;

pub use descent::*;
pub use driver::*;
pub use levmar::*;
pub use observe::*;
pub use problem::*;
pub use session::*;
