//! Outer time-stepping loop: build, solve, check, shift until the end time.

use crate::core::ode::ODE;
use crate::core::status::Status;
use crate::error::Error;
use crate::slab::TimeSlab;
use crate::solve::options::Options;
use crate::solve::solution::Solution;
use crate::Float;

/// Solve an ODE on `[0, T]` with multi-adaptive time stepping.
///
/// Each outer iteration builds a slab on the remaining interval, solves the
/// slab system, checks the residuals, and shifts on acceptance. A rejected
/// slab is rebuilt with the freshly shrunk steps; a failing nonlinear solve
/// is treated the same way after halving all steps. The user's
/// [`ODE::update`] hook can stop the integration cooperatively.
pub fn solve_ode<O: ODE>(ode: O, options: Options) -> Result<Solution, Vec<Error>> {
    let mut ts = TimeSlab::new(ode, &options)?;
    let endtime = ts.endtime();
    let eps = ts.epsilon();
    let n = ts.size();

    let mut sol_t: Vec<Float> = Vec::new();
    let mut sol_y: Vec<Vec<Float>> = Vec::new();
    let mut teval_pos = 0;
    if options.t_eval.is_none() {
        sol_t.push(0.0);
        sol_y.push(ts.initial_values().to_vec());
    }

    let mut nslab = 0;
    let mut naccpt = 0;
    let mut nrejct = 0;
    let mut kmin = Float::INFINITY;
    let mut status = Status::Success;

    let mut t = 0.0;
    let mut first = true;

    // --- Main time-stepping loop ---
    while t < endtime - eps {
        // Build and solve, retrying with smaller steps on rejection.
        let mut accepted = false;
        for _ in 0..=options.max_rejections {
            ts.build(t, endtime);
            nslab += 1;

            if !ts.solve() {
                log::debug!(
                    "nonlinear solver did not converge on [{}, {}], reducing steps",
                    ts.a(),
                    ts.b()
                );
                ts.reset();
                ts.reduce_steps(0.5);
                nrejct += 1;
                continue;
            }

            if ts.check(first) {
                accepted = true;
                break;
            }
            nrejct += 1;
        }
        if !accepted {
            status = Status::TooManyRejections;
            break;
        }
        first = false;
        naccpt += 1;
        kmin = kmin.min(ts.kmin());

        // Store requested sample points inside the accepted slab before the
        // initial values move on.
        if let Some(t_eval) = &options.t_eval {
            while teval_pos < t_eval.len() && t_eval[teval_pos] <= ts.b() + eps {
                let tq = t_eval[teval_pos];
                teval_pos += 1;
                if tq < eps {
                    sol_t.push(tq);
                    sol_y.push(ts.initial_values().to_vec());
                    continue;
                }
                ts.sample(tq);
                sol_t.push(tq);
                sol_y.push((0..n).map(|i| ts.usample(i, tq)).collect());
            }
        }

        let end = ts.b() >= endtime - eps;
        if !ts.shift(end) {
            status = Status::Interrupted;
            break;
        }
        if options.t_eval.is_none() {
            sol_t.push(ts.b());
            sol_y.push(ts.initial_values().to_vec());
        }
        t = ts.b();
    }

    if !kmin.is_finite() {
        kmin = 0.0;
    }

    Ok(Solution {
        t: sol_t,
        y: sol_y,
        nfev: ts.nfev(),
        nslab,
        naccpt,
        nrejct,
        kmin,
        status,
    })
}
