//! Shared fixtures for the `gridop` tests and benchmarks.
use gridop::nalgebra::DMatrix;
use gridop::operator::{
    Capabilities, ElementGeometry, InstationaryOperator, IntersectionGeometry, LocalOperator, LocalSide,
    LocalSparsityPattern, SkeletonBlocks,
};
use gridop::space::LocalFunctionSpace;
use gridop::Real;
use std::cell::RefCell;

/// Number of invocations of each local operator method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub pre_assembly: usize,
    pub post_assembly: usize,
    pub bind_element: usize,
    pub unbind_element: usize,
    pub bind_neighbor: usize,
    pub unbind_neighbor: usize,
    pub pattern_volume: usize,
    pub pattern_skeleton: usize,
    pub alpha_volume: usize,
    pub lambda_volume: usize,
    pub alpha_skeleton: usize,
    pub lambda_skeleton: usize,
    pub alpha_boundary: usize,
    pub lambda_boundary: usize,
    pub jacobian_volume: usize,
    pub jacobian_skeleton: usize,
    pub jacobian_boundary: usize,
    pub jacobian_apply_volume: usize,
    pub jacobian_apply_skeleton: usize,
    pub jacobian_apply_boundary: usize,
}

impl CallCounts {
    /// Calls of any skeleton or boundary kernel.
    pub fn face_kernels(&self) -> usize {
        self.alpha_skeleton
            + self.lambda_skeleton
            + self.alpha_boundary
            + self.lambda_boundary
            + self.jacobian_skeleton
            + self.jacobian_boundary
            + self.jacobian_apply_skeleton
            + self.jacobian_apply_boundary
    }

    pub fn volume_kernels(&self) -> usize {
        self.alpha_volume + self.lambda_volume + self.jacobian_volume + self.jacobian_apply_volume
    }
}

/// Wraps a local operator and records how it is called.
///
/// All calls are forwarded to the wrapped operator.
#[derive(Debug)]
pub struct SpyOperator<T, LO> {
    inner: LO,
    counts: RefCell<CallCounts>,
    skeleton_faces: RefCell<Vec<(usize, usize)>>,
    times: Vec<T>,
    weights: Vec<T>,
}

impl<T, LO> SpyOperator<T, LO> {
    pub fn new(inner: LO) -> Self {
        Self {
            inner,
            counts: RefCell::new(CallCounts::default()),
            skeleton_faces: RefCell::new(Vec::new()),
            times: Vec::new(),
            weights: Vec::new(),
        }
    }

    pub fn inner(&self) -> &LO {
        &self.inner
    }

    pub fn counts(&self) -> CallCounts {
        self.counts.borrow().clone()
    }

    pub fn reset(&mut self) {
        *self.counts.get_mut() = CallCounts::default();
        self.skeleton_faces.get_mut().clear();
        self.times.clear();
        self.weights.clear();
    }

    /// `(inside, outside)` pairs of every `alpha_skeleton` call.
    pub fn skeleton_faces(&self) -> Vec<(usize, usize)> {
        self.skeleton_faces.borrow().clone()
    }

    /// Every time passed to `set_time`, in order.
    pub fn times(&self) -> &[T] {
        &self.times
    }

    /// Every weight passed to `set_weight`, in order.
    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    fn record(&self, update: impl FnOnce(&mut CallCounts)) {
        update(&mut *self.counts.borrow_mut());
    }
}

impl<T: Real, LO: LocalOperator<T>> LocalOperator<T> for SpyOperator<T, LO> {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    fn pre_assembly(&mut self) -> eyre::Result<()> {
        self.counts.get_mut().pre_assembly += 1;
        self.inner.pre_assembly()
    }

    fn post_assembly(&mut self) -> eyre::Result<()> {
        self.counts.get_mut().post_assembly += 1;
        self.inner.post_assembly()
    }

    fn on_bind_element(&mut self, eg: &ElementGeometry, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace) {
        self.counts.get_mut().bind_element += 1;
        self.inner.on_bind_element(eg, lfsu, lfsv);
    }

    fn on_unbind_element(&mut self, eg: &ElementGeometry, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace) {
        self.counts.get_mut().unbind_element += 1;
        self.inner.on_unbind_element(eg, lfsu, lfsv);
    }

    fn on_bind_neighbor(&mut self, ig: &IntersectionGeometry, lfsu_n: &LocalFunctionSpace, lfsv_n: &LocalFunctionSpace) {
        self.counts.get_mut().bind_neighbor += 1;
        self.inner.on_bind_neighbor(ig, lfsu_n, lfsv_n);
    }

    fn on_unbind_neighbor(
        &mut self,
        ig: &IntersectionGeometry,
        lfsu_n: &LocalFunctionSpace,
        lfsv_n: &LocalFunctionSpace,
    ) {
        self.counts.get_mut().unbind_neighbor += 1;
        self.inner.on_unbind_neighbor(ig, lfsu_n, lfsv_n);
    }

    fn pattern_volume(&self, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace, pattern: &mut LocalSparsityPattern) {
        self.record(|c| c.pattern_volume += 1);
        self.inner.pattern_volume(lfsu, lfsv, pattern)
    }

    fn pattern_skeleton(
        &self,
        lfsu_s: &LocalFunctionSpace,
        lfsv_s: &LocalFunctionSpace,
        lfsu_n: &LocalFunctionSpace,
        lfsv_n: &LocalFunctionSpace,
        pattern_sn: &mut LocalSparsityPattern,
        pattern_ns: &mut LocalSparsityPattern,
    ) {
        self.record(|c| c.pattern_skeleton += 1);
        self.inner
            .pattern_skeleton(lfsu_s, lfsv_s, lfsu_n, lfsv_n, pattern_sn, pattern_ns)
    }

    fn alpha_volume(&self, eg: &ElementGeometry, side: &LocalSide<T>, r: &mut [T]) -> eyre::Result<()> {
        self.record(|c| c.alpha_volume += 1);
        self.inner.alpha_volume(eg, side, r)
    }

    fn lambda_volume(&self, eg: &ElementGeometry, lfsv: &LocalFunctionSpace, r: &mut [T]) -> eyre::Result<()> {
        self.record(|c| c.lambda_volume += 1);
        self.inner.lambda_volume(eg, lfsv, r)
    }

    fn alpha_skeleton(
        &self,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
        r_s: &mut [T],
        r_n: &mut [T],
    ) -> eyre::Result<()> {
        self.record(|c| c.alpha_skeleton += 1);
        if let Some(outside_element) = ig.outside {
            self.skeleton_faces
                .borrow_mut()
                .push((ig.inside, outside_element));
        }
        self.inner.alpha_skeleton(ig, inside, outside, r_s, r_n)
    }

    fn lambda_skeleton(
        &self,
        ig: &IntersectionGeometry,
        lfsv_s: &LocalFunctionSpace,
        lfsv_n: &LocalFunctionSpace,
        r_s: &mut [T],
        r_n: &mut [T],
    ) -> eyre::Result<()> {
        self.record(|c| c.lambda_skeleton += 1);
        self.inner.lambda_skeleton(ig, lfsv_s, lfsv_n, r_s, r_n)
    }

    fn alpha_boundary(&self, ig: &IntersectionGeometry, inside: &LocalSide<T>, r: &mut [T]) -> eyre::Result<()> {
        self.record(|c| c.alpha_boundary += 1);
        self.inner.alpha_boundary(ig, inside, r)
    }

    fn lambda_boundary(&self, ig: &IntersectionGeometry, lfsv: &LocalFunctionSpace, r: &mut [T]) -> eyre::Result<()> {
        self.record(|c| c.lambda_boundary += 1);
        self.inner.lambda_boundary(ig, lfsv, r)
    }

    fn jacobian_volume(&self, eg: &ElementGeometry, side: &LocalSide<T>, a: &mut DMatrix<T>) -> eyre::Result<()> {
        self.record(|c| c.jacobian_volume += 1);
        self.inner.jacobian_volume(eg, side, a)
    }

    fn jacobian_skeleton(
        &self,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
        blocks: &mut SkeletonBlocks<T>,
    ) -> eyre::Result<()> {
        self.record(|c| c.jacobian_skeleton += 1);
        self.inner.jacobian_skeleton(ig, inside, outside, blocks)
    }

    fn jacobian_boundary(&self, ig: &IntersectionGeometry, inside: &LocalSide<T>, a: &mut DMatrix<T>) -> eyre::Result<()> {
        self.record(|c| c.jacobian_boundary += 1);
        self.inner.jacobian_boundary(ig, inside, a)
    }

    fn jacobian_apply_volume(&self, eg: &ElementGeometry, side: &LocalSide<T>, y: &mut [T]) -> eyre::Result<()> {
        self.record(|c| c.jacobian_apply_volume += 1);
        self.inner.jacobian_apply_volume(eg, side, y)
    }

    fn jacobian_apply_skeleton(
        &self,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
        y_s: &mut [T],
        y_n: &mut [T],
    ) -> eyre::Result<()> {
        self.record(|c| c.jacobian_apply_skeleton += 1);
        self.inner
            .jacobian_apply_skeleton(ig, inside, outside, y_s, y_n)
    }

    fn jacobian_apply_boundary(&self, ig: &IntersectionGeometry, inside: &LocalSide<T>, y: &mut [T]) -> eyre::Result<()> {
        self.record(|c| c.jacobian_apply_boundary += 1);
        self.inner.jacobian_apply_boundary(ig, inside, y)
    }
}

impl<T: Real, LO: InstationaryOperator<T>> InstationaryOperator<T> for SpyOperator<T, LO> {
    fn set_time(&mut self, time: T) {
        self.times.push(time);
        self.inner.set_time(time);
    }

    fn set_weight(&mut self, weight: T) {
        self.weights.push(weight);
        self.inner.set_weight(weight);
    }
}
