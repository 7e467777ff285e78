//! Newton iteration over the slab unknowns.

use crate::core::ode::ODE;
use crate::matrix::Matrix;
use crate::slab::TimeSlab;
use crate::Float;

/// Newton solver on the packed dof vector.
///
/// The residual of the slab system is `G(x) = x - Phi(x)`, where `Phi`
/// applies the method update to every element in sweep order. The Jacobian
/// is assembled column by column with finite differences and factorized
/// dense, so this solver is meant for modest systems; the fixed-point solver
/// is the default.
pub struct Newton {
    maxiter: usize,
    tol: Float,
    fbuf: Vec<Float>,
    xbuf: Vec<Float>,
    g: Vec<Float>,
    gp: Vec<Float>,
}

impl Newton {
    pub fn new(maxiter: usize, tol: Float) -> Newton {
        Newton {
            maxiter,
            tol,
            fbuf: Vec::new(),
            xbuf: Vec::new(),
            g: Vec::new(),
            gp: Vec::new(),
        }
    }

    /// Run Newton iterations; true on convergence.
    pub fn solve<O: ODE>(&mut self, ts: &mut TimeSlab<O>) -> bool {
        let nj = ts.nj;
        self.fbuf.resize(ts.method.qsize(), 0.0);
        self.xbuf.resize(ts.method.nsize(), 0.0);
        self.g.resize(nj, 0.0);
        self.gp.resize(nj, 0.0);

        for iter in 0..self.maxiter {
            residual(ts, &mut self.fbuf, &mut self.xbuf, &mut self.g);

            let gnorm = self.g.iter().fold(0.0 as Float, |m, v| m.max(v.abs()));
            log::trace!("newton iteration {}: residual {:e}", iter, gnorm);
            if !gnorm.is_finite() {
                return false;
            }
            if gnorm < self.tol {
                return true;
            }

            // Finite-difference Jacobian of G, one dof column at a time.
            let mut jac = Matrix::zeros(nj, nj);
            for col in 0..nj {
                let xsave = ts.jx[col];
                let delta = 1e-8 * xsave.abs().max(1.0);
                ts.jx[col] = xsave + delta;
                residual(ts, &mut self.fbuf, &mut self.xbuf, &mut self.gp);
                ts.jx[col] = xsave;
                for row in 0..nj {
                    jac[(row, col)] = (self.gp[row] - self.g[row]) / delta;
                }
            }

            // Full Newton step: x <- x - J^{-1} G
            let dx = jac.lin_solve(&self.g);
            for (x, d) in ts.jx[..nj].iter_mut().zip(&dx) {
                *x -= d;
            }
        }
        false
    }
}

/// Residual of the slab system without modifying the dofs.
fn residual<O: ODE>(
    ts: &mut TimeSlab<O>,
    fbuf: &mut [Float],
    xbuf: &mut [Float],
    out: &mut [Float],
) {
    ts.reset_coverage();

    let nsize = ts.method.nsize();
    let mut subslab = None;
    let mut j = 0;

    for e in 0..ts.ne {
        subslab = Some(ts.cover_next(subslab, e));

        ts.feval(fbuf, e);
        let x0 = ts.element_x0(e);
        let k = ts.element_step(e);
        ts.method.update(x0, fbuf, k, xbuf);

        for n in 0..nsize {
            out[j + n] = ts.jx[j + n] - xbuf[n];
        }
        j += nsize;
    }
}
