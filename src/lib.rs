//! multirate: multi-adaptive ODE integration with individual time steps.
//!
//! This crate integrates large coupled systems `u' = f(u, t)` in which every
//! scalar component carries its own, individually chosen time step inside a
//! common time interval (a *time slab*). A small subset of fast components no
//! longer forces the whole system onto the smallest step: slow components take
//! large steps and interpolate their fast neighbours where needed.
//!
//! Highlights
//! - Methods: continuous Galerkin cG(q) and discontinuous Galerkin dG(q)
//!   time elements of arbitrary order
//! - Per-component adaptive step control with residual-based acceptance
//! - Nonlinear solvers: fixed-point (default) and Newton
//! - Sampling: solution, step size, and residual queries at any covered time
//!
//! Quick start
//! ```rust,no_run
//! use multirate::prelude::*;
//!
//! struct Decay;
//! impl ODE for Decay {
//!     fn size(&self) -> usize { 1 }
//!     fn endtime(&self) -> Float { 1.0 }
//!     fn u0(&self, _i: usize) -> Float { 1.0 }
//!     fn f(&self, u: &[Float], _t: Float, _i: usize) -> Float { -u[0] }
//! }
//!
//! fn main() {
//!     let opts = Options::builder()
//!         .method(MethodFamily::Mcg)
//!         .order(1)
//!         .tol(1e-6)
//!         .build();
//!
//!     let sol = solve_ode(Decay, opts).unwrap();
//!     for (t, u) in sol.iter() {
//!         println!("t = {:.4}, u = {:?}", t, u);
//!     }
//! }
//! ```
//!
//! The lower-level [`slab::TimeSlab`] type is public for callers that want to
//! drive the build/solve/check/shift cycle themselves.

mod error;
mod matrix;

pub mod core;
pub mod prelude;
pub mod slab;
pub mod solve;
pub mod solver;

pub use error::Error;

// Prevent selecting two incompatible float precision features at once.
#[cfg(all(feature = "f32", feature = "f64"))]
compile_error!(
    "features 'f32' and 'f64' cannot both be enabled; pick exactly one Float precision feature"
);

/// Floating point precision used throughout the crate.
#[cfg(feature = "f32")]
pub type Float = f32;
#[cfg(not(feature = "f32"))]
pub type Float = f64;
