//! Convenient prelude: import the most commonly used traits, types, and functions.
//!
//! Bring this into scope with:
//!
//! ```rust
//! use multirate::prelude::*;
//! ```
//!
//! Re-exports included:
//! - Core traits and types: `ODE`, `Dependencies`, `Method`, `MethodKind`, `Status`.
//! - High-level API: `solve_ode`, `Options`, `MethodFamily`, `NonlinearSolver`, `Solution`.
//! - The engine: `TimeSlab`.

pub use crate::core::{
    dependencies::Dependencies,
    method::{Method, MethodKind},
    ode::ODE,
    status::Status,
};
pub use crate::slab::TimeSlab;
pub use crate::solve::{solve_ode, MethodFamily, NonlinearSolver, Options, Solution};
pub use crate::{Error, Float};
