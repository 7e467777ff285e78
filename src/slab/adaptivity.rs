//! Per-component step size control.

use crate::core::method::Method;
use crate::core::ode::ODE;
use crate::solve::options::Options;
use crate::Float;

const SAFETY: Float = 0.9;
const TINY: Float = 1e-30;

/// Per-component time steps, residual memory, and the acceptance predicate.
///
/// Steps are controlled from the end-time residual of each component's last
/// element: the error indicator is `e = k * |r|`, a step is proposed from
/// `e` and the method order, and harmonic smoothing damps step oscillation
/// after the first update. A slab is accepted when every indicator is within
/// tolerance.
#[derive(Debug, Clone)]
pub struct Adaptivity {
    timesteps: Vec<Float>,
    residuals: Vec<Float>,
    /// Step actually used by each component's last element.
    kelem: Vec<Float>,
    tol: Float,
    kmax: Float,
    threshold: Float,
    kfixed: bool,
    /// Controller exponent: the method's convergence order.
    order: Float,
    accepted: bool,
}

impl Adaptivity {
    pub(crate) fn new<O: ODE>(ode: &O, method: &Method, options: &Options) -> Adaptivity {
        let n = ode.size();
        let endtime = ode.endtime();
        let kmax = options.kmax.unwrap_or(endtime / 10.0).min(endtime);
        let kdefault = options.k0.unwrap_or(kmax / 10.0).min(kmax);
        let timesteps: Vec<Float> = (0..n)
            .map(|i| ode.timestep(i).unwrap_or(kdefault).min(kmax))
            .collect();
        Adaptivity {
            kelem: timesteps.clone(),
            timesteps,
            residuals: vec![0.0; n],
            tol: options.tol,
            kmax,
            threshold: options.interval_threshold,
            kfixed: options.fixed_time_step,
            order: method.order().max(1) as Float,
            accepted: false,
        }
    }

    /// Upper bound on any time step.
    pub fn kmax(&self) -> Float {
        self.kmax
    }

    /// Interval threshold: a sub-slab is shortened to the tolerated step `K`
    /// when `K < threshold * (b - a)`, and stretched to `b` otherwise.
    pub fn threshold(&self) -> Float {
        self.threshold
    }

    /// Current time step of component `i`.
    pub fn timestep(&self, i: usize) -> Float {
        self.timesteps[i]
    }

    /// Last computed residual of component `i`.
    pub fn residual(&self, i: usize) -> Float {
        self.residuals[i]
    }

    /// Record the end-time residual of component `i` and the step its last
    /// element used.
    pub(crate) fn set_residual(&mut self, i: usize, r: Float, k: Float) {
        self.residuals[i] = r;
        self.kelem[i] = k;
    }

    /// Recompute all time steps from the recorded residuals.
    pub(crate) fn update(&mut self, first: bool) {
        if self.kfixed {
            self.accepted = true;
            return;
        }
        let mut ok = true;
        for i in 0..self.timesteps.len() {
            let k = self.kelem[i];
            let e = k * self.residuals[i].abs();
            if e > self.tol {
                ok = false;
            }
            let mut knew = if e > TINY {
                k * (SAFETY * self.tol / e).powf(1.0 / self.order)
            } else {
                self.kmax
            };
            if !first {
                // Harmonic mean with the previous step damps oscillation.
                knew = 2.0 * k * knew / (k + knew);
            }
            self.timesteps[i] = knew.min(self.kmax);
        }
        self.accepted = ok;
    }

    /// True iff the last update found every component within tolerance.
    pub fn accept(&self) -> bool {
        self.accepted
    }

    /// Scale all steps down, used when the nonlinear solver fails.
    pub(crate) fn reduce(&mut self, factor: Float) {
        for k in &mut self.timesteps {
            *k *= factor;
        }
    }

    #[cfg(test)]
    pub(crate) fn set_timestep(&mut self, i: usize, k: Float) {
        self.timesteps[i] = k;
    }
}
