//! Right-hand-side evaluation at the quadrature points of one element.
//!
//! Before `f(u, t, i0)` can be called at a quadrature time, the scratch
//! vector `u` must hold coherent values for every dependency of `i0` at that
//! time. Peers on the same sub-slab are read straight from the packed dofs;
//! peers with larger steps are interpolated from their covering element; and
//! peers with smaller steps are interpolated from the elements cached in the
//! `de` map, because their coverage cursors have moved past this element by
//! the time the solver sweeps it again. The `de` slots are grouped per
//! quadrature point, so each group is consumed in order.

use crate::core::method::MethodKind;
use crate::core::ode::ODE;
use crate::slab::TimeSlab;
use crate::Float;

impl<O: ODE> TimeSlab<O> {
    /// Evaluate the right-hand side of element `e0` at its quadrature
    /// points, writing `f[m]` for quadrature point `m`.
    ///
    /// Requires the coverage sweep discipline of the solvers: `elast` must
    /// reflect a sweep in creation order up to `e0`'s sub-slab.
    pub(crate) fn feval(&mut self, f: &mut [Float], e0: usize) {
        let s0 = self.es[e0] as usize;
        let i0 = self.ei[e0] as usize;
        let a0 = self.sa[s0];
        let k0 = self.sb[s0] - a0;
        match self.method.kind() {
            MethodKind::Continuous => self.cg_feval(f, s0, e0, i0, a0, k0),
            MethodKind::Discontinuous => self.dg_feval(f, s0, e0, i0, a0, k0),
        }
    }

    fn cg_feval(
        &mut self,
        f: &mut [Float],
        s0: usize,
        e0: usize,
        i0: usize,
        a0: Float,
        k0: Float,
    ) {
        let nn = self.method.nsize();
        let last = nn - 1;

        // First evaluate at the left end point. The value at the slab start
        // is precomputed; elsewhere the peers are read from the elements to
        // the left (the current element's left dof equals its predecessor's
        // last dof).
        if a0 < self.a() + self.eps {
            f[0] = self.f0[i0];
        } else {
            for pos in 0..self.dependencies.row(i0).len() {
                let i1 = self.dependencies.row(i0)[pos] as usize;
                let e1 = match self.elast[i1].get() {
                    Some(e1) => e1,
                    None => {
                        self.u[i1] = self.u0[i1];
                        continue;
                    }
                };

                // Three cases: k1 = k0, k1 < k0, k1 > k0
                let s1 = self.es[e1] as usize;
                if s1 == s0 {
                    self.u[i1] = self.element_x0(e1);
                } else {
                    let b1 = self.sb[s1];
                    if b1 < a0 + self.eps {
                        // Smaller time step: ends exactly at our left edge.
                        self.u[i1] = self.jx[e1 * nn + last];
                    } else {
                        // Larger time step: interpolate at a0.
                        let a1 = self.sa[s1];
                        let tau = (a0 - a1) / (b1 - a1);
                        let x0 = self.element_x0(e1);
                        let j1 = e1 * nn;
                        self.u[i1] = self.method.ueval(x0, &self.jx[j1..j1 + nn], tau);
                    }
                }
            }
            f[0] = self.ode.f(&self.u, a0, i0);
            self.nfev += 1;
        }

        // Small-step dependents are consumed per quadrature point.
        let (dbegin, dend) = self.dep_range(e0);
        let ndep = (dend - dbegin) / nn;
        debug_assert_eq!(ndep * nn, dend - dbegin);
        let mut d = dbegin;

        // Evaluate at all quadrature points but the first.
        for m in 1..self.method.qsize() {
            let t = a0 + k0 * self.method.qpoint(m);

            // Components with larger or equal time steps.
            for pos in 0..self.dependencies.row(i0).len() {
                let i1 = self.dependencies.row(i0)[pos] as usize;
                let e1 = match self.elast[i1].get() {
                    Some(e1) => e1,
                    None => continue,
                };

                // Fast path for elements in the same sub-slab: quadrature
                // point m is nodal point m - 1.
                let s1 = self.es[e1] as usize;
                let j1 = e1 * nn;
                if s1 == s0 {
                    self.u[i1] = self.jx[j1 + m - 1];
                    continue;
                }

                // Skip components with smaller time steps.
                let b1 = self.sb[s1];
                if b1 < a0 + self.eps {
                    continue;
                }

                let a1 = self.sa[s1];
                let tau = (t - a1) / (b1 - a1);
                let x0 = self.element_x0(e1);
                self.u[i1] = self.method.ueval(x0, &self.jx[j1..j1 + nn], tau);
            }

            // Components with smaller time steps, cached in de.
            for _ in 0..ndep {
                let e1 = match self.de[d].get() {
                    Some(e1) => e1,
                    None => panic!("unfilled dependency slot {} of element {}", d, e0),
                };
                d += 1;

                let i1 = self.ei[e1] as usize;
                let s1 = self.es[e1] as usize;
                let a1 = self.sa[s1];
                let k1 = self.sb[s1] - a1;
                let tau = (t - a1) / k1;
                let x0 = self.element_x0(e1);
                let j1 = e1 * nn;
                self.u[i1] = self.method.ueval(x0, &self.jx[j1..j1 + nn], tau);
            }

            f[m] = self.ode.f(&self.u, t, i0);
            self.nfev += 1;
        }
    }

    fn dg_feval(
        &mut self,
        f: &mut [Float],
        s0: usize,
        e0: usize,
        i0: usize,
        a0: Float,
        k0: Float,
    ) {
        let nn = self.method.nsize();

        let (dbegin, dend) = self.dep_range(e0);
        let ndep = (dend - dbegin) / nn;
        debug_assert_eq!(ndep * nn, dend - dbegin);
        let mut d = dbegin;

        // Evaluate at all quadrature points.
        for m in 0..self.method.qsize() {
            let t = a0 + k0 * self.method.qpoint(m);

            // Components with larger or equal time steps.
            for pos in 0..self.dependencies.row(i0).len() {
                let i1 = self.dependencies.row(i0)[pos] as usize;
                let e1 = match self.elast[i1].get() {
                    Some(e1) => e1,
                    None => continue,
                };

                // Fast path for elements in the same sub-slab: quadrature
                // point m is nodal point m.
                let s1 = self.es[e1] as usize;
                let j1 = e1 * nn;
                if s1 == s0 {
                    self.u[i1] = self.jx[j1 + m];
                    continue;
                }

                // Skip components with smaller time steps.
                let b1 = self.sb[s1];
                if b1 < a0 + self.eps {
                    continue;
                }

                let a1 = self.sa[s1];
                let tau = (t - a1) / (b1 - a1);
                self.u[i1] = self.method.ueval(0.0, &self.jx[j1..j1 + nn], tau);
            }

            // Components with smaller time steps, cached in de.
            for _ in 0..ndep {
                let e1 = match self.de[d].get() {
                    Some(e1) => e1,
                    None => panic!("unfilled dependency slot {} of element {}", d, e0),
                };
                d += 1;

                let i1 = self.ei[e1] as usize;
                let s1 = self.es[e1] as usize;
                let a1 = self.sa[s1];
                let k1 = self.sb[s1] - a1;
                let tau = (t - a1) / k1;
                let j1 = e1 * nn;
                self.u[i1] = self.method.ueval(0.0, &self.jx[j1..j1 + nn], tau);
            }

            f[m] = self.ode.f(&self.u, t, i0);
            self.nfev += 1;
        }
    }
}
