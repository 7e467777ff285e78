//! Nonlinear solvers over the packed slab unknowns.

mod fixed_point;
mod newton;

pub use fixed_point::FixedPoint;
pub use newton::Newton;

use crate::core::ode::ODE;
use crate::slab::TimeSlab;
use crate::solve::options::{NonlinearSolver, Options};

/// Nonlinear solver for the system of equations on one time slab.
pub enum Solver {
    FixedPoint(FixedPoint),
    Newton(Newton),
}

impl Default for Solver {
    fn default() -> Self {
        Solver::FixedPoint(FixedPoint::new(100, 1e-12))
    }
}

impl Solver {
    /// Select a solver from the options. `Default` picks fixed-point, the
    /// natural choice for explicitly coupled cG(q)/dG(q) elements.
    pub(crate) fn from_options(options: &Options) -> Solver {
        let tol = (options.tol * 1e-3).max(1e-12);
        match options.nonlinear_solver {
            NonlinearSolver::FixedPoint => {
                log::info!("using multi-adaptive fixed-point solver");
                Solver::FixedPoint(FixedPoint::new(options.solver_maxiter, tol))
            }
            NonlinearSolver::Newton => {
                log::info!("using multi-adaptive Newton solver");
                Solver::Newton(Newton::new(options.solver_maxiter, tol))
            }
            NonlinearSolver::Default => {
                log::info!("using multi-adaptive fixed-point solver (default)");
                Solver::FixedPoint(FixedPoint::new(options.solver_maxiter, tol))
            }
        }
    }

    /// Solve the slab system to fixed point; true on convergence.
    pub fn solve<O: ODE>(&mut self, ts: &mut TimeSlab<O>) -> bool {
        match self {
            Solver::FixedPoint(solver) => solver.solve(ts),
            Solver::Newton(solver) => solver.solve(ts),
        }
    }
}
