//! Shared test problems.

#![allow(dead_code)]

use multirate::prelude::*;

/// u' = -u, u(0) = 1 on [0, 1]; u(1) = 1/e.
pub struct Decay;

impl ODE for Decay {
    fn size(&self) -> usize {
        1
    }
    fn endtime(&self) -> Float {
        1.0
    }
    fn u0(&self, _i: usize) -> Float {
        1.0
    }
    fn f(&self, u: &[Float], _t: Float, _i: usize) -> Float {
        -u[0]
    }
}

/// u0' = u1, u1' = -u0 with u(0) = (1, 0) on [0, pi/2]; u(pi/2) = (0, 1).
pub struct Harmonic;

impl ODE for Harmonic {
    fn size(&self) -> usize {
        2
    }
    fn endtime(&self) -> Float {
        std::f64::consts::FRAC_PI_2 as Float
    }
    fn u0(&self, i: usize) -> Float {
        if i == 0 {
            1.0
        } else {
            0.0
        }
    }
    fn f(&self, u: &[Float], _t: Float, i: usize) -> Float {
        if i == 0 {
            u[1]
        } else {
            -u[0]
        }
    }
}

/// Fast decay driving a slow relaxation on [0, 0.2]:
/// u0' = -50 u0, u1' = u0 - u1, u(0) = (1, 0).
///
/// Exact: u0 = e^{-50 t}, u1 = (e^{-t} - e^{-50 t}) / 49.
pub struct FastSlow {
    pub kfast: Option<Float>,
    pub kslow: Option<Float>,
}

impl FastSlow {
    pub fn exact(t: Float) -> (Float, Float) {
        let u0 = (-50.0 * t).exp();
        let u1 = ((-t).exp() - (-50.0 * t).exp()) / 49.0;
        (u0, u1)
    }
}

impl ODE for FastSlow {
    fn size(&self) -> usize {
        2
    }
    fn endtime(&self) -> Float {
        0.2
    }
    fn u0(&self, i: usize) -> Float {
        if i == 0 {
            1.0
        } else {
            0.0
        }
    }
    fn f(&self, u: &[Float], _t: Float, i: usize) -> Float {
        if i == 0 {
            -50.0 * u[0]
        } else {
            u[0] - u[1]
        }
    }
    fn timestep(&self, i: usize) -> Option<Float> {
        if i == 0 {
            self.kfast
        } else {
            self.kslow
        }
    }
}

/// Decay problem whose update hook stops the integration at a given time.
pub struct Stopper {
    pub stop_at: Float,
}

impl ODE for Stopper {
    fn size(&self) -> usize {
        1
    }
    fn endtime(&self) -> Float {
        1.0
    }
    fn u0(&self, _i: usize) -> Float {
        1.0
    }
    fn f(&self, u: &[Float], _t: Float, _i: usize) -> Float {
        -u[0]
    }
    fn update(&mut self, _u: &[Float], t: Float, _end: bool) -> bool {
        t < self.stop_at
    }
}

/// Fixed-step options with the given method family and step.
pub fn fixed_opts(method: MethodFamily, k: Float) -> Options {
    Options::builder()
        .method(method)
        .fixed_time_step(true)
        .k0(k)
        .kmax(k)
        .build()
}
