//! User-supplied ODE system.

use crate::core::dependencies::Dependencies;
use crate::Float;

/// User-supplied ODE system `u' = f(u, t)` on `[0, T]`.
///
/// Unlike a vector-valued right-hand side, `f` is evaluated one scalar
/// component at a time: the multi-adaptive solver assembles `u` values from
/// elements on different time steps before each call, and only the
/// components listed in [`ODE::dependencies`] for `i` are guaranteed to be
/// coherent at the evaluation time.
///
/// # Example
///
/// ```ignore
/// struct Harmonic;
/// impl ODE for Harmonic {
///     fn size(&self) -> usize { 2 }
///     fn endtime(&self) -> Float { 10.0 }
///     fn u0(&self, i: usize) -> Float { if i == 0 { 1.0 } else { 0.0 } }
///     fn f(&self, u: &[Float], _t: Float, i: usize) -> Float {
///         if i == 0 { u[1] } else { -u[0] }
///     }
/// }
/// ```
pub trait ODE {
    /// Number of components N.
    fn size(&self) -> usize;

    /// End time T of the integration interval `[0, T]`.
    fn endtime(&self) -> Float;

    /// Initial value of component `i`.
    fn u0(&self, i: usize) -> Float;

    /// Right-hand side of component `i` at time `t`.
    fn f(&self, u: &[Float], t: Float, i: usize) -> Float;

    /// Dependency pattern: which components each `f(·, ·, i)` reads.
    ///
    /// The default is the full pattern, which is always correct but makes
    /// every component a neighbour of every other; sparse systems should
    /// override this.
    fn dependencies(&self) -> Dependencies {
        Dependencies::full(self.size())
    }

    /// Initial time step hint for component `i`, if the problem knows one.
    #[allow(unused_variables)]
    fn timestep(&self, i: usize) -> Option<Float> {
        None
    }

    /// Hook called with the solution at the start of the interval and after
    /// every accepted slab. Returning `false` stops the integration.
    #[allow(unused_variables)]
    fn update(&mut self, u: &[Float], t: Float, end: bool) -> bool {
        true
    }
}
