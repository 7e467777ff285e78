//! Multi-adaptive time slab: arena, build recursion, coverage, sampling.
//!
//! A [`TimeSlab`] covers one interval `[a, b]` of the integration. Inside it,
//! components are grouped into *sub-slabs* by tolerated time step: the
//! components with the largest steps span the whole slab with one *element*
//! each, and the remaining components are handled by recursively building
//! shorter sub-slabs until every component is covered. All structure lives in
//! parallel arrays indexed by dense integers (the arena); elements refer to
//! earlier elements and sub-slabs by index only.
//!
//! The life cycle per outer iteration is `build -> solve -> check -> shift`:
//! `build` lays out sub-slabs, elements, dofs, and the small-step dependency
//! map for `[a, b]`; `solve` runs the nonlinear solver over the packed dofs;
//! `check` recomputes residuals and step sizes and decides acceptance; and
//! `shift` advances the initial values to the end of the slab. The arrays are
//! reused between builds and only ever grow.

mod adaptivity;
mod alloc;
mod feval;
mod partition;

pub use adaptivity::Adaptivity;
pub use partition::Partition;

use std::fmt;

use crate::core::dependencies::Dependencies;
use crate::core::method::{Method, MethodKind};
use crate::core::ode::ODE;
use crate::error::Error;
use crate::solve::options::Options;
use crate::solver::Solver;
use crate::Float;

use self::alloc::Alloc;

/// Index of an element in the arena, with an explicit "no element" state.
///
/// Stored as a signed integer with -1 for the empty state so the arena
/// arrays stay dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementRef(i32);

impl ElementRef {
    /// No element.
    pub const NONE: ElementRef = ElementRef(-1);

    #[inline]
    pub fn new(e: usize) -> ElementRef {
        ElementRef(e as i32)
    }

    /// The element index, or `None` for the empty state.
    #[inline]
    pub fn get(self) -> Option<usize> {
        if self.0 < 0 {
            None
        } else {
            Some(self.0 as usize)
        }
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 < 0
    }

    /// Raw signed value, -1 for the empty state.
    #[inline]
    pub fn raw(self) -> i32 {
        self.0
    }
}

/// Multi-adaptive time slab over one interval of the integration.
pub struct TimeSlab<O: ODE> {
    // Problem and collaborators
    pub(crate) ode: O,
    pub(crate) method: Method,
    dependencies: Dependencies,
    transpose: Dependencies,
    partition: Partition,
    pub(crate) adaptivity: Adaptivity,
    solver: Solver,
    n: usize,
    eps: Float,

    // Sub-slabs: left and right end points
    pub(crate) sa: Vec<Float>,
    pub(crate) sb: Vec<Float>,

    // Elements: component index, sub-slab index, previous element of the
    // same component, and the start of the small-step dependency range
    pub(crate) ei: Vec<u32>,
    pub(crate) es: Vec<u32>,
    pub(crate) ee: Vec<ElementRef>,
    pub(crate) ed: Vec<u32>,

    // Packed nodal unknowns: element e occupies [e*nsize, (e+1)*nsize)
    pub(crate) jx: Vec<Float>,

    // Small-step elements depended on by each large-step element, grouped
    // nodal-point-major within each element's range
    pub(crate) de: Vec<ElementRef>,

    // Allocation bookkeeping and current sizes
    size_s: Alloc,
    size_e: Alloc,
    size_j: Alloc,
    size_d: Alloc,
    pub(crate) ns: usize,
    pub(crate) ne: usize,
    pub(crate) nj: usize,
    pub(crate) nd: usize,

    // Most recent element per component, for construction and coverage
    pub(crate) elast: Vec<ElementRef>,

    // Scratch values, slab initial values, left end-point rhs (cG only)
    pub(crate) u: Vec<Float>,
    pub(crate) u0: Vec<Float>,
    pub(crate) f0: Vec<Float>,

    // Current interval, coverage cursor, smallest step in the slab
    ta: Float,
    tb: Float,
    emax: usize,
    kmin: Float,

    // Right-hand-side evaluation count
    pub(crate) nfev: usize,
}

impl<O: ODE> TimeSlab<O> {
    /// Create a time slab for `ode` with the given options.
    ///
    /// Validates the options (collecting all failures) and precomputes the
    /// transpose of the dependency pattern.
    pub fn new(ode: O, options: &Options) -> Result<TimeSlab<O>, Vec<Error>> {
        let mut errors = options.validate();
        if !(ode.endtime() > 0.0) {
            errors.push(Error::EndTimeMustBePositive(ode.endtime()));
        }
        let method = match options.method.kind() {
            MethodKind::Continuous => Method::cg(options.order),
            MethodKind::Discontinuous => Method::dg(options.order),
        };
        let method = match method {
            Ok(m) => m,
            Err(e) => {
                errors.push(e);
                return Err(errors);
            }
        };
        if !errors.is_empty() {
            return Err(errors);
        }

        let n = ode.size();
        let dependencies = ode.dependencies();
        log::debug!("computing transpose (inverse) of dependency pattern");
        let transpose = dependencies.transpose();
        let u0: Vec<Float> = (0..n).map(|i| ode.u0(i)).collect();
        let adaptivity = Adaptivity::new(&ode, &method, options);
        let partition = Partition::new(n, options.partition_threshold);
        let solver = Solver::from_options(options);
        let endtime = ode.endtime();

        Ok(TimeSlab {
            ode,
            method,
            dependencies,
            transpose,
            partition,
            adaptivity,
            solver,
            n,
            eps: options.epsilon,
            sa: Vec::new(),
            sb: Vec::new(),
            ei: Vec::new(),
            es: Vec::new(),
            ee: Vec::new(),
            ed: Vec::new(),
            jx: Vec::new(),
            de: Vec::new(),
            size_s: Alloc::new(),
            size_e: Alloc::new(),
            size_j: Alloc::new(),
            size_d: Alloc::new(),
            ns: 0,
            ne: 0,
            nj: 0,
            nd: 0,
            elast: vec![ElementRef::NONE; n],
            u: vec![0.0; n],
            u0,
            f0: vec![0.0; n],
            ta: 0.0,
            tb: 0.0,
            emax: 0,
            kmin: endtime,
            nfev: 0,
        })
    }

    // --- Accessors ---

    /// Number of components.
    pub fn size(&self) -> usize {
        self.n
    }

    /// End time of the problem.
    pub fn endtime(&self) -> Float {
        self.ode.endtime()
    }

    /// Left end point of the current slab.
    pub fn a(&self) -> Float {
        self.ta
    }

    /// Right end point of the current slab.
    pub fn b(&self) -> Float {
        self.tb
    }

    /// Smallest sub-slab length in the current slab.
    pub fn kmin(&self) -> Float {
        self.kmin
    }

    /// Interval comparison tolerance.
    pub fn epsilon(&self) -> Float {
        self.eps
    }

    /// Right-hand-side evaluation count so far.
    pub fn nfev(&self) -> usize {
        self.nfev
    }

    /// Initial values of the current slab.
    pub fn initial_values(&self) -> &[Float] {
        &self.u0
    }

    /// Step size controller.
    pub fn adaptivity(&self) -> &Adaptivity {
        &self.adaptivity
    }

    pub(crate) fn reduce_steps(&mut self, factor: Float) {
        self.adaptivity.reduce(factor);
    }

    // --- Build ---

    /// Build the slab on `[a, b]`, returning the actual right end point
    /// `b' <= b` (shortened when the tolerated steps do not reach `b`).
    pub fn build(&mut self, a: Float, b: Float) -> Float {
        debug_assert!(b > a);

        self.alloc_data(a, b);

        for i in 0..self.n {
            self.elast[i] = ElementRef::NONE;
        }

        self.kmin = self.ode.endtime();
        let b = self.create_time_slab(a, b, 0);

        self.ta = a;
        self.tb = b;

        // Let the user see the initial data at the start of the interval.
        if a < self.eps {
            self.ode.update(&self.u0, a, false);
        }

        b
    }

    /// Dry-run the build recursion to size the arena, then allocate and
    /// reset it.
    fn alloc_data(&mut self, a: Float, b: Float) {
        // The scratch vector tracks the latest time reached per component
        // during the dry run.
        for i in 0..self.n {
            self.u[i] = a;
        }

        self.ns = 0;
        self.ne = 0;
        self.nj = 0;
        self.nd = 0;
        self.compute_data_size(a, b, 0);

        self.alloc_s(self.ns);
        self.alloc_e(self.ne);
        self.alloc_j(self.nj);
        self.alloc_d(self.nd);

        for d in 0..self.nd {
            self.de[d] = ElementRef::NONE;
        }
    }

    fn alloc_s(&mut self, newsize: usize) {
        self.size_s.next = 0;
        if newsize <= self.size_s.size {
            return;
        }
        let cap = self.size_s.grown(newsize);
        self.sa.resize(cap, 0.0);
        self.sb.resize(cap, 0.0);
        self.size_s.size = cap;
    }

    fn alloc_e(&mut self, newsize: usize) {
        self.size_e.next = 0;
        if newsize <= self.size_e.size {
            return;
        }
        let cap = self.size_e.grown(newsize);
        self.ei.resize(cap, 0);
        self.es.resize(cap, 0);
        self.ee.resize(cap, ElementRef::NONE);
        self.ed.resize(cap, 0);
        self.size_e.size = cap;
    }

    fn alloc_j(&mut self, newsize: usize) {
        self.size_j.next = 0;
        if newsize <= self.size_j.size {
            return;
        }
        let cap = self.size_j.grown(newsize);
        self.jx.resize(cap, 0.0);
        self.size_j.size = cap;
    }

    fn alloc_d(&mut self, newsize: usize) {
        self.size_d.next = 0;
        if newsize <= self.size_d.size {
            return;
        }
        let cap = self.size_d.grown(newsize);
        self.de.resize(cap, ElementRef::NONE);
        self.size_d.size = cap;
    }

    /// Mirror of the build recursion that only accumulates `ns`, `ne`,
    /// `nj`, `nd`.
    fn compute_data_size(&mut self, a: Float, b: Float, offset: usize) -> Float {
        let (b, end) = self.compute_end_time(a, b, offset);

        for pos in offset..end {
            self.u[self.partition.index(pos)] = b;
        }

        self.ns += 1;
        self.ne += end - offset;
        self.nj += self.method.nsize() * (end - offset);
        for pos in offset..end {
            self.nd += self.count_dependencies_dry(self.partition.index(pos));
        }

        let mut t = a;
        while t < b && end < self.partition.size() {
            t = self.compute_data_size(t, b, end);
        }

        b
    }

    /// End time of the sub-slab starting at `a` for the components at
    /// partition positions `offset..`; returns `(b', end)`.
    fn compute_end_time(&mut self, a: Float, b: Float, offset: usize) -> (Float, usize) {
        let k = self.adaptivity.kmax().min(b - a);
        let (k, end) = self.partition.update(offset, &self.adaptivity, k);

        // Shorten the sub-slab when the tolerated step is noticeably
        // smaller than the remaining interval; stretch to b otherwise.
        let b = if k < self.adaptivity.threshold() * (b - a) {
            a + k
        } else {
            b
        };

        self.kmin = self.kmin.min(b - a);
        (b, end)
    }

    /// Recursively create sub-slabs on `[a, b]` for the components at
    /// partition positions `offset..`.
    fn create_time_slab(&mut self, a: Float, b: Float, offset: usize) -> Float {
        let (b, end) = self.compute_end_time(a, b, offset);

        self.create_s(a, b, offset, end);

        // Components with smaller time steps tile the same interval with
        // shorter sub-slabs.
        let mut t = a;
        while t < b && end < self.partition.size() {
            t = self.create_time_slab(t, b, end);
        }

        b
    }

    /// Create one sub-slab on `[a0, b0]` with one element per component at
    /// partition positions `offset..end`, then assign the elements'
    /// dependency ranges.
    fn create_s(&mut self, a0: Float, b0: Float, offset: usize, end: usize) {
        assert!(self.size_s.next < self.size_s.size);
        let pos = self.size_s.next;
        self.size_s.next += 1;

        self.sa[pos] = a0;
        self.sb[pos] = b0;

        for n in offset..end {
            self.create_e(self.partition.index(n), pos, a0, b0);
        }

        // Assign the cumulative dependency offsets now that the elements of
        // this sub-slab exist.
        for n in offset..end {
            let index = self.partition.index(n);
            let element = match self.elast[index].get() {
                Some(e) => e,
                None => unreachable!("element just created for component {}", index),
            };

            self.size_d.next += self.count_dependencies(index, b0);

            if element == 0 {
                self.ed[0] = 0;
            }
            if element + 1 < self.ne {
                self.ed[element + 1] = self.size_d.next as u32;
            }
        }
    }

    /// Append one element for component `index` on the given sub-slab.
    fn create_e(&mut self, index: usize, subslab: usize, a: Float, b: Float) {
        assert!(self.size_e.next < self.size_e.size);
        let pos = self.size_e.next;
        self.size_e.next += 1;

        self.ei[pos] = index as u32;
        self.es[pos] = subslab as u32;
        self.ee[pos] = self.elast[index];

        self.create_j(index);
        self.create_d(index, pos, subslab, a, b);

        self.elast[index] = ElementRef::new(pos);
    }

    /// Allocate the element's dofs, initialized to the slab initial value.
    fn create_j(&mut self, index: usize) {
        let nsize = self.method.nsize();
        assert!(self.size_j.next + nsize <= self.size_j.size);
        let pos = self.size_j.next;
        self.size_j.next += nsize;

        for n in 0..nsize {
            self.jx[pos + n] = self.u0[index];
        }
    }

    /// Enter the new element `e0` of component `i0` into the dependency
    /// slots of every already-created larger-step element that depends on
    /// `i0` and whose nodal points fall inside `[a0, b0]`.
    fn create_d(&mut self, i0: usize, e0: usize, s0: usize, a0: Float, b0: Float) {
        let nsize = self.method.nsize();

        for pos in 0..self.transpose.row(i0).len() {
            let i1 = self.transpose.row(i0)[pos] as usize;

            // Components without an element yet use smaller time steps and
            // are handled the other way around.
            let e1 = match self.elast[i1].get() {
                Some(e1) => e1,
                None => continue,
            };

            let s1 = self.es[e1] as usize;
            let a1 = self.sa[s1];
            let b1 = self.sb[s1];
            let k1 = b1 - a1;

            // Only elements with strictly larger time steps cache their
            // small-step dependents.
            if !self.contained(a0, b0, a1, b1) || s0 == s1 {
                continue;
            }

            let (dbegin, dend) = self.dep_range(e1);
            let ndep = (dend - dbegin) / nsize;

            for n in 0..nsize {
                let t = a1 + k1 * self.method.npoint(n);
                if !self.within(t, a0, b0) {
                    continue;
                }

                // Slots are grouped per nodal point so that the m-th group
                // feeds the m-th quadrature evaluation directly.
                let base = dbegin + n * ndep;
                let mut found = false;
                for d in base..base + ndep {
                    if self.de[d].is_none() {
                        self.de[d] = ElementRef::new(e0);
                        found = true;
                        break;
                    }
                }
                assert!(
                    found,
                    "dependency slot overflow for element {} at nodal point {}",
                    e1, n
                );
            }
        }
    }

    /// Dry-run count: `nsize` slots for every dependency of `i0` that lags
    /// behind in time (and will therefore use smaller steps). Uses the
    /// scratch vector as the per-component latest time.
    fn count_dependencies_dry(&self, i0: usize) -> usize {
        let mut n = 0;
        for pos in 0..self.dependencies.row(i0).len() {
            let i1 = self.dependencies.row(i0)[pos] as usize;
            if self.u[i0] > self.u[i1] + self.eps {
                n += self.method.nsize();
            }
        }
        n
    }

    /// Creation-time count: `nsize` slots for every dependency of `i0`
    /// whose latest element has not reached `b0`.
    fn count_dependencies(&self, i0: usize, b0: Float) -> usize {
        let mut n = 0;
        for pos in 0..self.dependencies.row(i0).len() {
            let i1 = self.dependencies.row(i0)[pos] as usize;
            match self.elast[i1].get() {
                None => n += self.method.nsize(),
                Some(e1) => {
                    let b1 = self.sb[self.es[e1] as usize];
                    if b1 < b0 - self.eps {
                        n += self.method.nsize();
                    }
                }
            }
        }
        n
    }

    // --- Interval predicates (epsilon-tolerant, left-open right-closed) ---

    /// True if `t` lies within `(a, b]`, preferring the left interval at a
    /// shared boundary.
    fn within(&self, t: Float, a: Float, b: Float) -> bool {
        a + self.eps < t && t <= b + self.eps
    }

    /// True if `[a0, b0]` is contained in `[a1, b1]`.
    fn contained(&self, a0: Float, b0: Float, a1: Float, b1: Float) -> bool {
        a1 <= a0 + self.eps && b0 - self.eps <= b1
    }

    // --- Element helpers ---

    /// Dependency slot range of element `e` in `de`.
    pub(crate) fn dep_range(&self, e: usize) -> (usize, usize) {
        let begin = self.ed[e] as usize;
        let end = if e + 1 < self.ne {
            self.ed[e + 1] as usize
        } else {
            self.nd
        };
        (begin, end)
    }

    /// Initial value of element `e`: the end value of the previous element
    /// of the same component, or the slab initial value.
    pub(crate) fn element_x0(&self, e: usize) -> Float {
        let nsize = self.method.nsize();
        match self.ee[e].get() {
            Some(ep) => self.jx[ep * nsize + nsize - 1],
            None => self.u0[self.ei[e] as usize],
        }
    }

    /// Step size of element `e`.
    pub(crate) fn element_step(&self, e: usize) -> Float {
        let s = self.es[e] as usize;
        self.sb[s] - self.sa[s]
    }

    /// Last element of component `i`; aborts if the component is not
    /// covered.
    fn last_element(&self, i: usize) -> usize {
        match self.elast[i].get() {
            Some(e) => e,
            None => panic!("component {} has no covered element", i),
        }
    }

    // --- Solve / check / shift / reset ---

    /// Solve the system of equations on the slab.
    pub fn solve(&mut self) -> bool {
        // Start from the initial values; feval fills in the rest as long as
        // the dependency pattern is correct.
        for i in 0..self.n {
            self.u[i] = self.u0[i];
        }

        // Precompute f at the left end point for cG.
        if self.method.kind() == MethodKind::Continuous {
            for i in 0..self.n {
                self.f0[i] = self.ode.f(&self.u0, self.ta, i);
            }
            self.nfev += self.n;
        }

        let mut solver = std::mem::take(&mut self.solver);
        let converged = solver.solve(self);
        self.solver = solver;
        converged
    }

    /// Recompute residuals and time steps; true iff the slab is accepted.
    pub fn check(&mut self, first: bool) -> bool {
        self.compute_residuals();
        self.adaptivity.update(first);
        self.adaptivity.accept()
    }

    /// End-time residual of every component's last element.
    fn compute_residuals(&mut self) {
        self.cover_time(self.tb);

        let nsize = self.method.nsize();
        for i in 0..self.n {
            let e = self.last_element(i);
            self.u[i] = self.jx[e * nsize + nsize - 1];
        }

        for i in 0..self.n {
            let e = self.last_element(i);
            debug_assert!((self.sb[self.es[e] as usize] - self.tb).abs() <= self.eps);
            let k = self.element_step(e);
            let x0 = self.element_x0(e);
            let f = self.ode.f(&self.u, self.tb, i);
            let j = e * nsize;
            let r = self
                .method
                .residual(x0, &self.jx[j..j + nsize], f, k);
            self.adaptivity.set_residual(i, r, k);
        }
        self.nfev += self.n;
    }

    /// Advance the initial values to the end of the slab. Returns `false`
    /// without touching the initial values when the user hook vetoes.
    pub fn shift(&mut self, end: bool) -> bool {
        self.cover_time(self.tb);

        let nsize = self.method.nsize();
        for i in 0..self.n {
            let e = self.last_element(i);
            debug_assert!((self.sb[self.es[e] as usize] - self.tb).abs() <= self.eps);
            self.u[i] = self.jx[e * nsize + nsize - 1];
        }

        if !self.ode.update(&self.u, self.tb, end) {
            return false;
        }

        for i in 0..self.n {
            self.u0[i] = self.u[i];
        }

        true
    }

    /// Overwrite all dofs with the slab initial values.
    pub fn reset(&mut self) {
        let nsize = self.method.nsize();
        let mut j = 0;
        for e in 0..self.ne {
            let i = self.ei[e] as usize;
            for n in 0..nsize {
                self.jx[j + n] = self.u0[i];
            }
            j += nsize;
        }
    }

    // --- Sampling ---

    /// Move the coverage cursors so that `elast[i]` holds the element of
    /// `i` containing `t`, for every component.
    pub fn sample(&mut self, t: Float) {
        self.cover_time(t);
    }

    /// Solution value of component `i` at the covered time `t`.
    pub fn usample(&self, i: usize, t: Float) -> Float {
        let e = self.last_element(i);
        let s = self.es[e] as usize;
        let a = self.sa[s];
        let k = self.sb[s] - a;
        let x0 = self.element_x0(e);
        let nsize = self.method.nsize();
        let j = e * nsize;
        let tau = (t - a) / k;
        self.method.ueval(x0, &self.jx[j..j + nsize], tau)
    }

    /// Step size of component `i` at the covered time `t`.
    pub fn ksample(&self, i: usize, _t: Float) -> Float {
        self.element_step(self.last_element(i))
    }

    /// Residual of component `i`, as last computed over the slab.
    pub fn rsample(&self, i: usize, _t: Float) -> Float {
        self.adaptivity.residual(i)
    }

    // --- Coverage ---

    /// Forget all coverage; used by the solvers before a sweep in creation
    /// order.
    pub(crate) fn reset_coverage(&mut self) {
        for i in 0..self.n {
            self.elast[i] = ElementRef::NONE;
        }
    }

    /// Cover all elements of `subslab` starting at element `e0`; returns
    /// the first element past the sub-slab.
    pub(crate) fn cover_slab(&mut self, subslab: usize, e0: usize) -> usize {
        let mut e = e0;
        while e < self.ne {
            if self.es[e] as usize != subslab {
                break;
            }
            self.elast[self.ei[e] as usize] = ElementRef::new(e);
            e += 1;
        }
        e
    }

    /// Advance coverage across a sub-slab boundary at `element`; returns
    /// the sub-slab `element` belongs to.
    pub(crate) fn cover_next(&mut self, subslab: Option<usize>, element: usize) -> usize {
        let s = self.es[element] as usize;
        if subslab == Some(s) {
            return s;
        }
        self.cover_slab(s, element);
        s
    }

    /// Ensure `elast[i]` points at the element of component `i` containing
    /// `t`, sweeping forward from the last covered position (or from the
    /// start after a rewind).
    fn cover_time(&mut self, t: Float) {
        // Quick accept when every component already covers t.
        let mut ok = true;
        for i in 0..self.n {
            match self.elast[i].get() {
                None => {
                    self.emax = 0;
                    ok = false;
                    break;
                }
                Some(e) => {
                    let s = self.es[e] as usize;
                    if t < self.sa[s] + self.eps {
                        self.emax = 0;
                        ok = false;
                        break;
                    }
                    if t > self.sb[s] + self.eps {
                        ok = false;
                        break;
                    }
                }
            }
        }
        if ok {
            return;
        }

        // Rewind if the cursor is past t.
        if self.emax >= self.ne {
            self.emax = 0;
        } else {
            let s = self.es[self.emax] as usize;
            if t < self.sa[s] + self.eps {
                self.emax = 0;
            }
        }

        // Sweep forward until t is covered for all components. Sub-slabs at
        // the very start of the slab are always covered.
        for e in self.emax..self.ne {
            let s = self.es[e] as usize;
            let a = self.sa[s];
            if t < a + self.eps && self.ta < a - self.eps {
                break;
            }
            self.elast[self.ei[e] as usize] = ElementRef::new(e);
            self.emax = e;
        }
    }

    /// Log a dump of the arena.
    pub fn disp(&self) {
        log::info!("{}", self);
    }
}

impl<O: ODE> fmt::Display for TimeSlab<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "time slab [{}, {}]", self.ta, self.tb)?;
        writeln!(f, "s: size = {} alloc = {}", self.ns, self.size_s.size)?;
        writeln!(f, "e: size = {} alloc = {}", self.ne, self.size_e.size)?;
        writeln!(f, "j: size = {} alloc = {}", self.nj, self.size_j.size)?;
        writeln!(f, "d: size = {} alloc = {}", self.nd, self.size_d.size)?;
        writeln!(f, "sa = {:?}", &self.sa[..self.ns])?;
        writeln!(f, "sb = {:?}", &self.sb[..self.ns])?;
        writeln!(f, "ei = {:?}", &self.ei[..self.ne])?;
        writeln!(f, "es = {:?}", &self.es[..self.ne])?;
        let ee: Vec<i32> = self.ee[..self.ne].iter().map(|e| e.raw()).collect();
        writeln!(f, "ee = {:?}", ee)?;
        writeln!(f, "ed = {:?}", &self.ed[..self.ne])?;
        writeln!(f, "jx = {:?}", &self.jx[..self.nj])?;
        let de: Vec<i32> = self.de[..self.nd].iter().map(|e| e.raw()).collect();
        write!(f, "de = {:?}", de)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solve::options::Options;

    /// Fast decay driving a slow relaxation, with per-component step hints
    /// twenty times apart so the two components land on different sub-slab
    /// levels.
    struct FastSlow {
        kfast: Float,
        kslow: Float,
    }

    impl ODE for FastSlow {
        fn size(&self) -> usize {
            2
        }
        fn endtime(&self) -> Float {
            0.1
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
                -10.0 * u[0]
            } else {
                u[0] - u[1]
            }
        }
        fn timestep(&self, i: usize) -> Option<Float> {
            Some(if i == 0 { self.kfast } else { self.kslow })
        }
    }

    struct Single;

    impl ODE for Single {
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
        fn timestep(&self, _i: usize) -> Option<Float> {
            Some(0.01)
        }
    }

    struct Vetoing;

    impl ODE for Vetoing {
        fn size(&self) -> usize {
            1
        }
        fn endtime(&self) -> Float {
            0.1
        }
        fn u0(&self, _i: usize) -> Float {
            1.0
        }
        fn f(&self, u: &[Float], _t: Float, _i: usize) -> Float {
            -u[0]
        }
        fn update(&mut self, _u: &[Float], t: Float, _end: bool) -> bool {
            t <= 0.0
        }
    }

    fn fixed_options() -> Options {
        Options::builder().fixed_time_step(true).kmax(0.1).build()
    }

    fn fastslow_slab() -> TimeSlab<FastSlow> {
        TimeSlab::new(
            FastSlow {
                kfast: 0.005,
                kslow: 0.1,
            },
            &fixed_options(),
        )
        .unwrap()
    }

    /// Check the arena invariants that must hold after every build.
    fn check_arena<O: ODE>(ts: &TimeSlab<O>) {
        let nsize = ts.method.nsize();
        assert!(ts.ns > 0);
        assert_eq!(ts.nj, ts.ne * nsize);

        for s in 0..ts.ns {
            assert!(ts.sa[s] < ts.sb[s], "degenerate sub-slab {}", s);
        }
        assert!((ts.sa[0] - ts.ta).abs() <= ts.eps);

        for e in 0..ts.ne {
            assert!((ts.ei[e] as usize) < ts.n);
            assert!((ts.es[e] as usize) < ts.ns);
            if let Some(ep) = ts.ee[e].get() {
                assert!(ep < e, "ee[{}] = {} not earlier", e, ep);
                assert_eq!(ts.ei[ep], ts.ei[e], "ee crosses components");
                let gap = ts.sb[ts.es[ep] as usize] - ts.sa[ts.es[e] as usize];
                assert!(gap.abs() <= ts.eps, "component {} not contiguous", ts.ei[e]);
            }
        }

        // Exactly one last element per component, ending at the slab end.
        for i in 0..ts.n {
            let count = (0..ts.ne)
                .filter(|&e| {
                    ts.ei[e] as usize == i && (ts.sb[ts.es[e] as usize] - ts.tb).abs() <= ts.eps
                })
                .count();
            assert_eq!(count, 1, "component {} has {} end elements", i, count);
        }

        // Dependency ranges are monotone and completely filled.
        for e in 0..ts.ne {
            let (dbegin, dend) = ts.dep_range(e);
            assert!(dbegin <= dend);
            for d in dbegin..dend {
                assert!(!ts.de[d].is_none(), "unfilled slot {} of element {}", d, e);
            }
        }

        // Dry-run sizes match what the recursion produced.
        assert_eq!(ts.ns, ts.size_s.next);
        assert_eq!(ts.ne, ts.size_e.next);
        assert_eq!(ts.nj, ts.size_j.next);
        assert_eq!(ts.nd, ts.size_d.next);
    }

    #[test]
    fn build_creates_nested_subslabs() {
        let mut ts = fastslow_slab();
        let b = ts.build(0.0, 0.1);
        assert!((b - 0.1).abs() < 1e-12);
        check_arena(&ts);

        // One slow sub-slab spanning the slab, twenty fast ones inside it.
        assert_eq!(ts.ns, 21);
        assert_eq!(ts.ne, 21);
        assert_eq!(ts.nd, 1);
        assert_eq!(ts.ei[0], 1);
        assert!((ts.sa[0] - 0.0).abs() < 1e-12);
        assert!((ts.sb[0] - 0.1).abs() < 1e-12);

        // The fast component's last element comes after the slow one.
        let efast = ts.elast[0].get().unwrap();
        let eslow = ts.elast[1].get().unwrap();
        assert!(efast > eslow);
        assert_eq!(eslow, 0);

        // The slow element's dependency slot holds the fast element that
        // contains its single nodal point t = 0.1.
        let (dbegin, dend) = ts.dep_range(0);
        assert_eq!(dend - dbegin, 1);
        let e1 = ts.de[dbegin].get().unwrap();
        assert_eq!(ts.ei[e1], 0);
        assert!((ts.sb[ts.es[e1] as usize] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn dependents_are_contained_in_their_owner() {
        let mut ts = fastslow_slab();
        ts.build(0.0, 0.1);
        for e0 in 0..ts.ne {
            let s0 = ts.es[e0] as usize;
            let (dbegin, dend) = ts.dep_range(e0);
            for d in dbegin..dend {
                let e1 = ts.de[d].get().unwrap();
                let s1 = ts.es[e1] as usize;
                assert!(ts.sa[s0] <= ts.sa[s1] + ts.eps);
                assert!(ts.sb[s1] <= ts.sb[s0] + ts.eps);
                assert_ne!(s0, s1);
            }
        }
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut ts = fastslow_slab();
        ts.build(0.0, 0.1);
        let sa = ts.sa.clone();
        let ei = ts.ei.clone();
        let es = ts.es.clone();
        let ee = ts.ee.clone();
        let ed = ts.ed.clone();
        let de = ts.de.clone();
        let jx = ts.jx.clone();
        let (ns, ne, nj, nd) = (ts.ns, ts.ne, ts.nj, ts.nd);

        ts.build(0.0, 0.1);
        assert_eq!((ts.ns, ts.ne, ts.nj, ts.nd), (ns, ne, nj, nd));
        assert_eq!(ts.sa, sa);
        assert_eq!(ts.ei, ei);
        assert_eq!(ts.es, es);
        assert_eq!(ts.ee, ee);
        assert_eq!(ts.ed, ed);
        assert_eq!(ts.de, de);
        assert_eq!(ts.jx, jx);
    }

    #[test]
    fn equal_steps_share_one_subslab_without_dependencies() {
        let mut ts = TimeSlab::new(
            FastSlow {
                kfast: 0.025,
                kslow: 0.025,
            },
            &fixed_options(),
        )
        .unwrap();
        // With every component on the same step the slab is one sub-slab
        // long and is shortened to that step.
        let b = ts.build(0.0, 0.1);
        assert!((b - 0.025).abs() < 1e-12);
        check_arena(&ts);
        assert_eq!(ts.ns, 1);
        assert_eq!(ts.ne, 2);
        assert_eq!(ts.nd, 0);
    }

    #[test]
    fn short_tolerated_step_shortens_the_slab() {
        let mut ts = TimeSlab::new(Single, &Options::builder().fixed_time_step(true).build())
            .unwrap();
        let b = ts.build(0.0, 1.0);
        assert!((b - 0.01).abs() < 1e-12);
        assert!((ts.b() - ts.a() - 0.01).abs() < 1e-12);
        assert!((ts.kmin() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn solve_shift_advances_initial_values() {
        let mut ts = fastslow_slab();
        ts.build(0.0, 0.1);
        assert!(ts.solve());

        // Shift round trip: the new initial values equal the element
        // polynomials evaluated at the right end point.
        ts.sample(ts.b());
        let expected: Vec<Float> = (0..ts.n)
            .map(|i| {
                let e = ts.elast[i].get().unwrap();
                let nsize = ts.method.nsize();
                let x0 = ts.element_x0(e);
                ts.method.ueval(x0, &ts.jx[e * nsize..(e + 1) * nsize], 1.0)
            })
            .collect();
        assert!(ts.shift(false));
        for i in 0..ts.n {
            assert!((ts.u0[i] - expected[i]).abs() < 1e-14);
        }

        // The fast decay should have dropped by roughly e^{-1}.
        assert!((ts.u0[0] - (-1.0 as Float).exp()).abs() < 1e-3);
    }

    #[test]
    fn usample_evaluates_the_covering_element() {
        let mut ts = fastslow_slab();
        ts.build(0.0, 0.1);
        assert!(ts.solve());

        // Fast component at a nodal time: the right-end dof of the element
        // covering (0.045, 0.05].
        ts.sample(0.05);
        let e = ts.elast[0].get().unwrap();
        assert!((ts.sb[ts.es[e] as usize] - 0.05).abs() < 1e-12);
        assert!((ts.usample(0, 0.05) - ts.jx[e]).abs() < 1e-12);
        assert!((ts.ksample(0, 0.05) - 0.005).abs() < 1e-12);

        // Slow component mid-element: linear interpolation between the slab
        // initial value and its single dof.
        let mid = 0.5 * (ts.u0[1] + ts.jx[0]);
        assert!((ts.usample(1, 0.05) - mid).abs() < 1e-14);
        assert!((ts.ksample(1, 0.05) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn coverage_rewinds_for_earlier_samples() {
        let mut ts = fastslow_slab();
        ts.build(0.0, 0.1);
        assert!(ts.solve());

        ts.sample(0.09);
        let late = ts.elast[0].get().unwrap();
        ts.sample(0.01);
        let early = ts.elast[0].get().unwrap();
        assert!(early < late);
        assert!((ts.sb[ts.es[early] as usize] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn reset_restores_initial_dofs() {
        let mut ts = fastslow_slab();
        ts.build(0.0, 0.1);
        assert!(ts.solve());
        ts.reset();
        let nsize = ts.method.nsize();
        for e in 0..ts.ne {
            for n in 0..nsize {
                assert_eq!(ts.jx[e * nsize + n], ts.u0[ts.ei[e] as usize]);
            }
        }
    }

    #[test]
    fn vetoed_shift_leaves_initial_values_untouched() {
        let mut ts = TimeSlab::new(
            Vetoing,
            &Options::builder().fixed_time_step(true).k0(0.05).kmax(0.05).build(),
        )
        .unwrap();
        ts.build(0.0, 0.1);
        assert!(ts.solve());
        assert!(!ts.shift(true));
        assert_eq!(ts.u0[0], 1.0);
    }

    #[test]
    fn check_records_residuals_for_rsample() {
        let mut ts = fastslow_slab();
        ts.build(0.0, 0.1);
        assert!(ts.solve());
        assert!(ts.check(true));
        // Fixed steps always accept, but residuals are still recorded.
        let r = ts.rsample(0, 0.1);
        assert!(r.is_finite());
        assert_eq!(r, ts.adaptivity().residual(0));
    }

    #[test]
    fn adaptive_check_rejects_coarse_first_slab() {
        let opts = Options::builder().tol(1e-10).k0(0.1).kmax(0.1).build();
        let mut ts = TimeSlab::new(
            FastSlow {
                kfast: 0.1,
                kslow: 0.1,
            },
            &opts,
        )
        .unwrap();
        let b0 = ts.build(0.0, 0.1);
        assert!(ts.solve());
        assert!(!ts.check(true));

        // Rejection shrinks the steps; the rebuilt slab is shorter and the
        // dry-run sizes stay consistent.
        let b1 = ts.build(0.0, 0.1);
        assert!(b1 < b0);
        check_arena(&ts);
    }
}
