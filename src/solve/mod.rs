//! High-level API: options, driver loop, and solution type.

pub mod driver;
pub mod options;
pub mod solution;

// Required exports to use "solve_ode"
pub use driver::solve_ode;
pub use options::{MethodFamily, NonlinearSolver, Options};
pub use solution::Solution;
