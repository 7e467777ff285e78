//! Fixed-point iteration over the slab unknowns.

use crate::core::ode::ODE;
use crate::slab::TimeSlab;
use crate::Float;

/// Gauss-Seidel style fixed-point solver.
///
/// Each iteration sweeps the elements in creation order, advancing the
/// coverage cursors sub-slab by sub-slab so that every `feval` sees the peers
/// it expects, and overwrites each element's dofs with the method update.
/// Elements later in the sweep immediately see the new values of earlier
/// ones, which is what makes the plain iteration converge quickly for
/// non-stiff couplings.
pub struct FixedPoint {
    maxiter: usize,
    tol: Float,
    fbuf: Vec<Float>,
    xbuf: Vec<Float>,
}

impl FixedPoint {
    pub fn new(maxiter: usize, tol: Float) -> FixedPoint {
        FixedPoint {
            maxiter,
            tol,
            fbuf: Vec::new(),
            xbuf: Vec::new(),
        }
    }

    /// Iterate to fixed point; true on convergence.
    pub fn solve<O: ODE>(&mut self, ts: &mut TimeSlab<O>) -> bool {
        self.fbuf.resize(ts.method.qsize(), 0.0);
        self.xbuf.resize(ts.method.nsize(), 0.0);

        let mut d0: Float = 0.0;
        for iter in 0..self.maxiter {
            let d = self.iteration(ts);
            log::trace!("fixed-point iteration {}: increment {:e}", iter, d);

            if !d.is_finite() {
                return false;
            }
            if d < self.tol {
                return true;
            }
            if iter == 0 {
                d0 = d;
            } else if d > 1e4 * d0 {
                // Diverging
                return false;
            }
        }
        false
    }

    /// One sweep over all elements; returns the largest dof increment.
    fn iteration<O: ODE>(&mut self, ts: &mut TimeSlab<O>) -> Float {
        ts.reset_coverage();

        let nsize = ts.method.nsize();
        let mut subslab = None;
        let mut dmax: Float = 0.0;
        let mut j = 0;

        for e in 0..ts.ne {
            subslab = Some(ts.cover_next(subslab, e));

            ts.feval(&mut self.fbuf, e);
            let x0 = ts.element_x0(e);
            let k = ts.element_step(e);
            ts.method.update(x0, &self.fbuf, k, &mut self.xbuf);

            for n in 0..nsize {
                let d = (self.xbuf[n] - ts.jx[j + n]).abs();
                if d > dmax {
                    dmax = d;
                }
                ts.jx[j + n] = self.xbuf[n];
            }
            j += nsize;
        }

        dmax
    }
}
