//! Galerkin time element methods cG(q) and dG(q).
//!
//! A [`Method`] describes one family of polynomial time elements: the
//! quadrature rule on the reference interval [0,1], the nodal points where
//! the element's unknowns live, and the nodal weight matrix that turns
//! right-hand-side samples into updated nodal values,
//! `x_n = x0 + k * sum_m w[n][m] * f(t_m)`.
//!
//! - cG(q), q >= 1: continuous trial functions of degree q with nodal values
//!   at the Gauss-Lobatto points; the left endpoint is not an unknown (it is
//!   the end value of the previous element), so `nsize = q` and
//!   `qsize = q + 1`.
//! - dG(q), q >= 0: discontinuous trial functions of degree q with nodal
//!   values at the right-Radau points, all of them unknowns:
//!   `nsize = qsize = q + 1`. dG(0) reduces to backward Euler and cG(1) to
//!   the trapezoid rule.
//!
//! Quadrature points and weights are computed at construction from Legendre
//! recurrences; the weight matrix comes from assembling the Galerkin system
//! on the reference interval and solving it with a small dense LU.

use crate::error::Error;
use crate::matrix::Matrix;
use crate::Float;

/// Continuity class of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// cG: trial functions continuous across element boundaries.
    Continuous,
    /// dG: trial functions discontinuous across element boundaries.
    Discontinuous,
}

/// Largest supported polynomial degree.
const QMAX: usize = 10;

/// Quadrature/basis descriptor for one element family.
#[derive(Debug, Clone)]
pub struct Method {
    kind: MethodKind,
    q: usize,
    nsize: usize,
    qsize: usize,
    /// Quadrature points on [0,1], length `qsize`.
    qpoints: Vec<Float>,
    /// Quadrature weights, length `qsize`.
    qweights: Vec<Float>,
    /// Nodal points on (0,1], length `nsize`.
    npoints: Vec<Float>,
    /// Interpolation points of the element polynomial including the initial
    /// value slot at 0: `[0, npoints...]` for cG and for the dG residual.
    trial: Vec<Float>,
    /// Row-major `nsize x qsize` nodal weight matrix.
    nmatrix: Vec<Float>,
    /// Derivative of the trial basis at the right endpoint, length
    /// `nsize + 1` (slot 0 belongs to the initial value).
    derivatives: Vec<Float>,
}

impl Method {
    /// Continuous Galerkin method of degree `q >= 1`.
    pub fn cg(q: usize) -> Result<Method, Error> {
        if q < 1 || q > QMAX {
            return Err(Error::InvalidOrder(q));
        }
        let (points, weights) = lobatto_rule(q + 1);
        let npoints = points[1..].to_vec();
        let trial = points.clone();
        let nmatrix = nodal_weights(MethodKind::Continuous, &points, &weights, &npoints);
        let derivatives = (0..trial.len())
            .map(|j| lagrange_derivative(&trial, j, 1.0))
            .collect();
        Ok(Method {
            kind: MethodKind::Continuous,
            q,
            nsize: q,
            qsize: q + 1,
            qpoints: points,
            qweights: weights,
            npoints,
            trial,
            nmatrix,
            derivatives,
        })
    }

    /// Discontinuous Galerkin method of degree `q >= 0`.
    pub fn dg(q: usize) -> Result<Method, Error> {
        if q > QMAX {
            return Err(Error::InvalidOrder(q));
        }
        let (points, weights) = radau_rule(q + 1);
        let npoints = points.clone();
        // The residual polynomial interpolates the jump at 0 as well.
        let mut trial = Vec::with_capacity(q + 2);
        trial.push(0.0);
        trial.extend_from_slice(&npoints);
        let nmatrix = nodal_weights(MethodKind::Discontinuous, &points, &weights, &npoints);
        let derivatives = (0..trial.len())
            .map(|j| lagrange_derivative(&trial, j, 1.0))
            .collect();
        Ok(Method {
            kind: MethodKind::Discontinuous,
            q,
            nsize: q + 1,
            qsize: q + 1,
            qpoints: points,
            qweights: weights,
            npoints,
            trial,
            nmatrix,
            derivatives,
        })
    }

    /// Continuity class.
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Polynomial degree q.
    pub fn degree(&self) -> usize {
        self.q
    }

    /// Convergence order at the nodes: 2q for cG(q), 2q+1 for dG(q).
    pub fn order(&self) -> usize {
        match self.kind {
            MethodKind::Continuous => 2 * self.q,
            MethodKind::Discontinuous => 2 * self.q + 1,
        }
    }

    /// Number of unknowns per element.
    pub fn nsize(&self) -> usize {
        self.nsize
    }

    /// Number of quadrature points per element.
    pub fn qsize(&self) -> usize {
        self.qsize
    }

    /// Quadrature point `m` on [0,1].
    pub fn qpoint(&self, m: usize) -> Float {
        self.qpoints[m]
    }

    /// Quadrature weight `m`; the weights sum to one.
    pub fn qweight(&self, m: usize) -> Float {
        self.qweights[m]
    }

    /// Nodal point `n` on (0,1].
    pub fn npoint(&self, n: usize) -> Float {
        self.npoints[n]
    }

    /// Evaluate the element polynomial at the normalized coordinate
    /// `tau` in [0,1]. `x0` is the element's initial value; the
    /// discontinuous variant ignores it.
    pub fn ueval(&self, x0: Float, dofs: &[Float], tau: Float) -> Float {
        match self.kind {
            MethodKind::Continuous => {
                let mut value = x0 * lagrange(&self.trial, 0, tau);
                for (n, &x) in dofs.iter().enumerate() {
                    value += x * lagrange(&self.trial, n + 1, tau);
                }
                value
            }
            MethodKind::Discontinuous => {
                let mut value = 0.0;
                for (n, &x) in dofs.iter().enumerate() {
                    value += x * lagrange(&self.npoints, n, tau);
                }
                value
            }
        }
    }

    /// Update the nodal values from right-hand-side samples at the
    /// quadrature points: `dofs[n] = x0 + k * sum_m w[n][m] * f[m]`.
    pub fn update(&self, x0: Float, f: &[Float], k: Float, dofs: &mut [Float]) {
        for n in 0..self.nsize {
            let mut sum = 0.0;
            for m in 0..self.qsize {
                sum += self.nmatrix[n * self.qsize + m] * f[m];
            }
            dofs[n] = x0 + k * sum;
        }
    }

    /// Discrete residual at the right endpoint: `u'(1)/k - f`, where u is
    /// the polynomial through `(0, x0)` and the nodal values. For dG the
    /// initial value contributes the jump, so dG(0) yields
    /// `(x - x0)/k - f`.
    pub fn residual(&self, x0: Float, dofs: &[Float], f: Float, k: Float) -> Float {
        let mut dx = x0 * self.derivatives[0];
        for (n, &x) in dofs.iter().enumerate() {
            dx += x * self.derivatives[n + 1];
        }
        dx / k - f
    }
}

/// Nodal weight matrix for either method, row-major `nsize x qsize`.
///
/// Assembles the Galerkin equations on the reference interval with the
/// element's own quadrature (exact for the integrands involved), using the
/// shifted Legendre polynomials as test basis, and solves one small linear
/// system per quadrature point.
fn nodal_weights(
    kind: MethodKind,
    qpoints: &[Float],
    qweights: &[Float],
    nodal: &[Float],
) -> Vec<Float> {
    let qsize = qpoints.len();
    let (trial, unknowns): (Vec<Float>, usize) = match kind {
        // Trial basis on [0, nodal...]; only the nodal values are unknown.
        MethodKind::Continuous => {
            let mut t = Vec::with_capacity(nodal.len() + 1);
            t.push(0.0);
            t.extend_from_slice(nodal);
            (t, nodal.len())
        }
        MethodKind::Discontinuous => (nodal.to_vec(), nodal.len()),
    };
    let offset = trial.len() - unknowns;

    let mut a = Matrix::zeros(unknowns, unknowns);
    let mut b = vec![0.0; unknowns * qsize];
    for r in 0..unknowns {
        for i in 0..unknowns {
            let mut sum = 0.0;
            for m in 0..qsize {
                sum += qweights[m]
                    * lagrange_derivative(&trial, offset + i, qpoints[m])
                    * legendre_shifted(r, qpoints[m]);
            }
            if kind == MethodKind::Discontinuous {
                // Jump term u(0+) v(0) of the dG bilinear form.
                sum += lagrange(&trial, offset + i, 0.0) * legendre_shifted(r, 0.0);
            }
            a[(r, i)] = sum;
        }
        for m in 0..qsize {
            b[r * qsize + m] = qweights[m] * legendre_shifted(r, qpoints[m]);
        }
    }

    // Solve A y = b column by column; y holds column m of the weight matrix.
    let mut nmatrix = vec![0.0; unknowns * qsize];
    let mut rhs = vec![0.0; unknowns];
    for m in 0..qsize {
        for r in 0..unknowns {
            rhs[r] = b[r * qsize + m];
        }
        let y = a.lin_solve(&rhs);
        for n in 0..unknowns {
            nmatrix[n * qsize + m] = y[n];
        }
    }
    nmatrix
}

// --- Lagrange basis on a point set ---

/// Value of the Lagrange basis polynomial for node `j` at `x`.
fn lagrange(points: &[Float], j: usize, x: Float) -> Float {
    let mut value = 1.0;
    for (l, &p) in points.iter().enumerate() {
        if l != j {
            value *= (x - p) / (points[j] - p);
        }
    }
    value
}

/// Derivative of the Lagrange basis polynomial for node `j` at `x`.
fn lagrange_derivative(points: &[Float], j: usize, x: Float) -> Float {
    let mut sum = 0.0;
    for m in 0..points.len() {
        if m == j {
            continue;
        }
        let mut term = 1.0 / (points[j] - points[m]);
        for (l, &p) in points.iter().enumerate() {
            if l != j && l != m {
                term *= (x - p) / (points[j] - p);
            }
        }
        sum += term;
    }
    sum
}

// --- Legendre polynomials and quadrature rules ---

/// Legendre polynomial P_n and its derivative at `x`, by the three-term
/// recurrence.
fn legendre_and_derivative(n: usize, x: Float) -> (Float, Float) {
    if n == 0 {
        return (1.0, 0.0);
    }
    let mut p0 = 1.0;
    let mut p1 = x;
    for k in 1..n {
        let kf = k as Float;
        let p2 = ((2.0 * kf + 1.0) * x * p1 - kf * p0) / (kf + 1.0);
        p0 = p1;
        p1 = p2;
    }
    // P_n' from P_n and P_{n-1}; at the endpoints use the known values.
    let dp = if (1.0 - x * x).abs() < 1e-12 {
        let nf = n as Float;
        0.5 * nf * (nf + 1.0) * if x > 0.0 { 1.0 } else { (-1.0 as Float).powi(n as i32 + 1) }
    } else {
        (n as Float) * (x * p1 - p0) / (x * x - 1.0)
    };
    (p1, dp)
}

fn legendre(n: usize, x: Float) -> Float {
    legendre_and_derivative(n, x).0
}

/// Shifted Legendre polynomial P_r(2x - 1) on [0,1].
fn legendre_shifted(r: usize, x: Float) -> Float {
    legendre(r, 2.0 * x - 1.0)
}

/// Isolate the roots of `f` inside `(lo, hi)` by a uniform sign scan
/// followed by bisection. `count` is the expected number of roots.
fn scan_roots(f: impl Fn(Float) -> Float, lo: Float, hi: Float, count: usize) -> Vec<Float> {
    let mut roots = Vec::with_capacity(count);
    if count == 0 {
        return roots;
    }
    let samples = 64 * (count + 1);
    let h = (hi - lo) / samples as Float;
    let mut xa = lo;
    let mut fa = f(xa);
    for s in 1..=samples {
        let xb = lo + s as Float * h;
        let fb = f(xb);
        if fa == 0.0 {
            roots.push(xa);
        } else if fa * fb < 0.0 {
            let (mut a, mut b) = (xa, xb);
            let mut va = fa;
            for _ in 0..120 {
                let mid = 0.5 * (a + b);
                let vm = f(mid);
                if va * vm <= 0.0 {
                    b = mid;
                } else {
                    a = mid;
                    va = vm;
                }
            }
            roots.push(0.5 * (a + b));
        }
        xa = xb;
        fa = fb;
    }
    assert_eq!(roots.len(), count, "root isolation failed");
    roots
}

/// Gauss-Lobatto rule with `n >= 2` points, mapped to [0,1].
///
/// On [-1,1] the points are -1, 1 and the roots of P'_{n-1}; the weights are
/// 2 / (n (n-1) P_{n-1}(x)^2).
fn lobatto_rule(n: usize) -> (Vec<Float>, Vec<Float>) {
    assert!(n >= 2);
    let mut points = Vec::with_capacity(n);
    points.push(-1.0);
    points.extend(scan_roots(
        |x| legendre_and_derivative(n - 1, x).1,
        -1.0 + 1e-9,
        1.0 - 1e-9,
        n - 2,
    ));
    points.push(1.0);

    let nf = n as Float;
    let (points, weights): (Vec<Float>, Vec<Float>) = points
        .into_iter()
        .map(|x| {
            let p = legendre(n - 1, x);
            (0.5 * (x + 1.0), 1.0 / (nf * (nf - 1.0) * p * p))
        })
        .unzip();
    (points, weights)
}

/// Right-Radau rule with `n >= 1` points on (0,1], the right endpoint
/// included.
///
/// Obtained by reflecting the left-Radau rule on [-1,1]: the points are -1
/// and the roots of (P_{n-1} + P_n)/(1+x), with weights 2/n^2 at -1 and
/// (1-x) / (n P_{n-1}(x))^2 elsewhere.
fn radau_rule(n: usize) -> (Vec<Float>, Vec<Float>) {
    assert!(n >= 1);
    let nf = n as Float;
    let mut pw: Vec<(Float, Float)> = Vec::with_capacity(n);
    pw.push((-1.0, 2.0 / (nf * nf)));
    for x in scan_roots(
        |x| legendre(n - 1, x) + legendre(n, x),
        -1.0 + 1e-6,
        1.0 - 1e-9,
        n - 1,
    ) {
        let p = legendre(n - 1, x);
        pw.push((x, (1.0 - x) / (nf * nf * p * p)));
    }
    // Reflect onto [0,1] so the fixed endpoint lands at 1, and sort.
    let mut pw: Vec<(Float, Float)> = pw
        .into_iter()
        .map(|(x, w)| (0.5 * (1.0 - x), 0.5 * w))
        .collect();
    pw.sort_by(|a, b| a.0.total_cmp(&b.0));
    pw.into_iter().unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cg1_is_trapezoid() {
        let m = Method::cg(1).unwrap();
        assert_eq!(m.nsize(), 1);
        assert_eq!(m.qsize(), 2);
        assert!((m.qpoint(0) - 0.0).abs() < 1e-14);
        assert!((m.qpoint(1) - 1.0).abs() < 1e-14);
        assert!((m.npoint(0) - 1.0).abs() < 1e-14);
        // x1 = x0 + k (f0 + f1) / 2
        let mut dofs = [0.0];
        m.update(1.0, &[2.0, 4.0], 0.5, &mut dofs);
        assert!((dofs[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn dg0_is_backward_euler() {
        let m = Method::dg(0).unwrap();
        assert_eq!(m.nsize(), 1);
        assert_eq!(m.qsize(), 1);
        assert!((m.qpoint(0) - 1.0).abs() < 1e-14);
        let mut dofs = [0.0];
        m.update(1.0, &[3.0], 0.5, &mut dofs);
        assert!((dofs[0] - 2.5).abs() < 1e-12);
        // residual = (x - x0)/k - f
        let r = m.residual(1.0, &[2.5], 3.0, 0.5);
        assert!(r.abs() < 1e-12);
    }

    #[test]
    fn dg1_matches_radau_iia() {
        let m = Method::dg(1).unwrap();
        assert!((m.qpoint(0) - 1.0 / 3.0).abs() < 1e-12);
        assert!((m.qpoint(1) - 1.0).abs() < 1e-12);
        assert!((m.qweight(0) - 0.75).abs() < 1e-12);
        assert!((m.qweight(1) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn quadrature_weights_sum_to_one() {
        for q in 1..=5 {
            let m = Method::cg(q).unwrap();
            let sum: Float = (0..m.qsize()).map(|j| m.qweight(j)).sum();
            assert!((sum - 1.0).abs() < 1e-12, "cg({}) weight sum {}", q, sum);
            let m = Method::dg(q).unwrap();
            let sum: Float = (0..m.qsize()).map(|j| m.qweight(j)).sum();
            assert!((sum - 1.0).abs() < 1e-12, "dg({}) weight sum {}", q, sum);
        }
    }

    #[test]
    fn update_is_exact_for_polynomials() {
        // u' = 2t on [0,1] with u(0) = 0 gives u(tau) = tau^2, degree 2:
        // exactly representable by cG(2) and dG(2).
        for m in [Method::cg(2).unwrap(), Method::dg(2).unwrap()] {
            let f: Vec<Float> = (0..m.qsize()).map(|j| 2.0 * m.qpoint(j)).collect();
            let mut dofs = vec![0.0; m.nsize()];
            m.update(0.0, &f, 1.0, &mut dofs);
            for n in 0..m.nsize() {
                let tau = m.npoint(n);
                assert!(
                    (dofs[n] - tau * tau).abs() < 1e-12,
                    "{:?} node {} value {} expected {}",
                    m.kind(),
                    n,
                    dofs[n],
                    tau * tau
                );
            }
            // ueval reproduces the same polynomial anywhere.
            let v = m.ueval(0.0, &dofs, 0.37);
            assert!((v - 0.37 * 0.37).abs() < 1e-12);
        }
    }

    #[test]
    fn invalid_orders_are_rejected() {
        assert!(matches!(Method::cg(0), Err(Error::InvalidOrder(0))));
        assert!(Method::dg(0).is_ok());
        assert!(matches!(Method::cg(42), Err(Error::InvalidOrder(42))));
    }
}
