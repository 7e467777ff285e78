//! Options for the multi-adaptive solver

use bon::Builder;

use crate::core::method::MethodKind;
use crate::error::Error;
use crate::Float;

/// Method family selection. The multi-adaptive variants are the native
/// ones; `Cg` and `Dg` are accepted as aliases for the same element
/// families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodFamily {
    /// Continuous Galerkin cG(q)
    Cg,
    /// Discontinuous Galerkin dG(q)
    Dg,
    /// Multi-adaptive continuous Galerkin mcG(q)
    Mcg,
    /// Multi-adaptive discontinuous Galerkin mdG(q)
    Mdg,
}

impl MethodFamily {
    /// Continuity class of the family.
    pub fn kind(&self) -> MethodKind {
        match self {
            MethodFamily::Cg | MethodFamily::Mcg => MethodKind::Continuous,
            MethodFamily::Dg | MethodFamily::Mdg => MethodKind::Discontinuous,
        }
    }
}

/// Nonlinear solver selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NonlinearSolver {
    FixedPoint,
    Newton,
    /// Let the solver pick (fixed-point).
    Default,
}

#[derive(Builder, Clone, Debug)]
/// Options for solve_ode and for constructing a [`crate::slab::TimeSlab`]
/// directly.
pub struct Options {
    /// Method family. Default: mcG (continuous Galerkin).
    #[builder(default = MethodFamily::Mcg)]
    pub method: MethodFamily,
    /// Polynomial degree q of the elements.
    #[builder(default = 1)]
    pub order: usize,
    /// Whether the ODE is implicit, `M(u) u' = f`. Not supported by the
    /// multi-adaptive solver; requesting it is a fatal validation error.
    #[builder(default = false)]
    pub implicit: bool,
    /// Nonlinear solver over the slab unknowns.
    #[builder(default = NonlinearSolver::Default)]
    pub nonlinear_solver: NonlinearSolver,
    /// Tolerance for the per-component error indicators.
    #[builder(default = 1e-5)]
    pub tol: Float,
    /// Maximum time step. Default: a tenth of the end time.
    pub kmax: Option<Float>,
    /// Initial time step for components without a problem-supplied hint.
    /// Default: a tenth of the maximum step.
    pub k0: Option<Float>,
    /// Keep the initial time steps for the whole integration and accept
    /// every slab.
    #[builder(default = false)]
    pub fixed_time_step: bool,
    /// A sub-slab is shortened to the tolerated step K when
    /// `K < interval_threshold * (b - a)`, and stretched to `b` otherwise.
    #[builder(default = 0.9)]
    pub interval_threshold: Float,
    /// Components within this factor of the largest remaining step share a
    /// sub-slab.
    #[builder(default = 0.1)]
    pub partition_threshold: Float,
    /// Tolerance for interval comparisons on the slab.
    #[builder(default = 1e-14)]
    pub epsilon: Float,
    /// Iteration limit for the nonlinear solver.
    #[builder(default = 100)]
    pub solver_maxiter: usize,
    /// How many rejected builds of the same slab to tolerate before giving
    /// up.
    #[builder(default = 100)]
    pub max_rejections: usize,
    /// Optional sorted time points at which to store the computed solution
    /// instead of the slab end points.
    pub t_eval: Option<Vec<Float>>,
}

impl Options {
    /// Validate the options, collecting all failures.
    pub(crate) fn validate(&self) -> Vec<Error> {
        let mut errors = Vec::new();
        if self.implicit {
            errors.push(Error::ImplicitNotSupported);
        }
        if !(self.tol > 0.0) {
            errors.push(Error::ToleranceMustBePositive(self.tol));
        }
        if let Some(k) = self.kmax {
            if !(k > 0.0) {
                errors.push(Error::InvalidStepSize(k));
            }
        }
        if let Some(k) = self.k0 {
            if !(k > 0.0) {
                errors.push(Error::InvalidStepSize(k));
            }
        }
        if !(self.interval_threshold > 0.0 && self.interval_threshold < 1.0) {
            errors.push(Error::IntervalThresholdOutOfRange(self.interval_threshold));
        }
        if !(self.partition_threshold > 0.0 && self.partition_threshold < 1.0) {
            errors.push(Error::PartitionThresholdOutOfRange(self.partition_threshold));
        }
        if !(self.epsilon > 0.0) {
            errors.push(Error::EpsilonMustBePositive(self.epsilon));
        }
        if self.solver_maxiter == 0 {
            errors.push(Error::MaxIterMustBePositive(self.solver_maxiter));
        }
        errors
    }
}
