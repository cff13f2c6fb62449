//! Ready-made local operators.
use crate::backend::PatternBackend;
use crate::operator::{
    Capabilities, Capability, ElementGeometry, InstationaryOperator, IntersectionGeometry, LocalOperator, LocalSide,
    LocalSparsityPattern, SkeletonBlocks,
};
use crate::space::LocalFunctionSpace;
use crate::Real;
use eyre::bail;
use itertools::izip;
use nalgebra::{DMatrix, DVector};

/// Couples every local test function with every local trial function of an element.
pub fn full_volume_pattern(lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace, pattern: &mut impl PatternBackend) {
    for i in 0..lfsv.size() {
        for j in 0..lfsu.size() {
            pattern.add_link(i, j);
        }
    }
}

/// Couples every local test function on one side of a face with every trial function on the other.
pub fn full_skeleton_pattern(
    lfsu_s: &LocalFunctionSpace,
    lfsv_s: &LocalFunctionSpace,
    lfsu_n: &LocalFunctionSpace,
    lfsv_n: &LocalFunctionSpace,
    pattern_sn: &mut impl PatternBackend,
    pattern_ns: &mut impl PatternBackend,
) {
    full_volume_pattern(lfsu_n, lfsv_s, pattern_sn);
    full_volume_pattern(lfsu_s, lfsv_n, pattern_ns);
}

#[derive(Debug, Clone, PartialEq)]
struct SkeletonStencil<T: Real> {
    inside_inside: DMatrix<T>,
    inside_outside: DMatrix<T>,
    outside_inside: DMatrix<T>,
    outside_outside: DMatrix<T>,
}

/// A linear local operator defined by constant local blocks.
///
/// Every configured block is applied on every element (volume), every interior face (skeleton)
/// or every boundary face (boundary), scaled by the current weight. Blocks have as many rows as
/// the local test space and as many columns as the local trial space. Evaluating a kernel on
/// local spaces of a different size is an error.
///
/// The residual is `weight * (A x + f)`, the Jacobian is `weight * A` and the Jacobian-vector
/// product is `weight * A z`, with `A` and `f` assembled from the blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct StencilOperator<T: Real> {
    volume: Option<DMatrix<T>>,
    source: Option<DVector<T>>,
    skeleton: Option<SkeletonStencil<T>>,
    boundary: Option<DMatrix<T>>,
    boundary_source: Option<DVector<T>>,
    weight: T,
    time: T,
}

impl<T: Real> Default for StencilOperator<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_shape<T: Real>(name: &str, block: &DMatrix<T>, rows: usize, cols: usize) -> eyre::Result<()> {
    if block.shape() != (rows, cols) {
        bail!(
            "{} block has shape {:?}, but the local spaces require {:?}",
            name,
            block.shape(),
            (rows, cols)
        );
    }
    Ok(())
}

fn check_len<T: Real>(name: &str, vector: &DVector<T>, len: usize) -> eyre::Result<()> {
    if vector.len() != len {
        bail!(
            "{} vector has length {}, but the local test space has size {}",
            name,
            vector.len(),
            len
        );
    }
    Ok(())
}

/// `y += weight * block * x`
fn add_block_product<T: Real>(weight: T, block: &DMatrix<T>, x: &[T], y: &mut [T]) {
    for (i, y_i) in y.iter_mut().enumerate() {
        let mut sum = T::zero();
        for (j, &x_j) in x.iter().enumerate() {
            sum += block[(i, j)] * x_j;
        }
        *y_i += weight * sum;
    }
}

fn add_scaled<T: Real>(weight: T, vector: &DVector<T>, y: &mut [T]) {
    for (y_i, &v_i) in izip!(y.iter_mut(), vector.iter()) {
        *y_i += weight * v_i;
    }
}

impl<T: Real> StencilOperator<T> {
    /// An operator without any blocks, weight one and time zero.
    pub fn new() -> Self {
        Self {
            volume: None,
            source: None,
            skeleton: None,
            boundary: None,
            boundary_source: None,
            weight: T::one(),
            time: T::zero(),
        }
    }

    #[must_use]
    pub fn with_volume(mut self, block: DMatrix<T>) -> Self {
        self.volume = Some(block);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: DVector<T>) -> Self {
        self.source = Some(source);
        self
    }

    /// Blocks on interior faces, named (test side, trial side).
    #[must_use]
    pub fn with_skeleton(
        mut self,
        inside_inside: DMatrix<T>,
        inside_outside: DMatrix<T>,
        outside_inside: DMatrix<T>,
        outside_outside: DMatrix<T>,
    ) -> Self {
        self.skeleton = Some(SkeletonStencil {
            inside_inside,
            inside_outside,
            outside_inside,
            outside_outside,
        });
        self
    }

    #[must_use]
    pub fn with_boundary(mut self, block: DMatrix<T>) -> Self {
        self.boundary = Some(block);
        self
    }

    #[must_use]
    pub fn with_boundary_source(mut self, source: DVector<T>) -> Self {
        self.boundary_source = Some(source);
        self
    }

    pub fn weight(&self) -> T {
        self.weight
    }

    /// The time most recently set through [`InstationaryOperator::set_time`].
    pub fn time(&self) -> T {
        self.time
    }

    fn check_skeleton(&self, stencil: &SkeletonStencil<T>, inside: &LocalSide<T>, outside: &LocalSide<T>) -> eyre::Result<()> {
        let (vs, us) = (inside.lfsv.size(), inside.lfsu.size());
        let (vn, un) = (outside.lfsv.size(), outside.lfsu.size());
        check_shape("inside-inside skeleton", &stencil.inside_inside, vs, us)?;
        check_shape("inside-outside skeleton", &stencil.inside_outside, vs, un)?;
        check_shape("outside-inside skeleton", &stencil.outside_inside, vn, us)?;
        check_shape("outside-outside skeleton", &stencil.outside_outside, vn, un)
    }

    fn apply_skeleton(&self, inside: &LocalSide<T>, outside: &LocalSide<T>, y_s: &mut [T], y_n: &mut [T]) -> eyre::Result<()> {
        if let Some(stencil) = &self.skeleton {
            self.check_skeleton(stencil, inside, outside)?;
            add_block_product(self.weight, &stencil.inside_inside, inside.x, y_s);
            add_block_product(self.weight, &stencil.inside_outside, outside.x, y_s);
            add_block_product(self.weight, &stencil.outside_inside, inside.x, y_n);
            add_block_product(self.weight, &stencil.outside_outside, outside.x, y_n);
        }
        Ok(())
    }

    fn apply_block(name: &str, weight: T, block: &Option<DMatrix<T>>, side: &LocalSide<T>, y: &mut [T]) -> eyre::Result<()> {
        if let Some(block) = block {
            check_shape(name, block, side.lfsv.size(), side.lfsu.size())?;
            add_block_product(weight, block, side.x, y);
        }
        Ok(())
    }

    fn add_block(name: &str, weight: T, block: &Option<DMatrix<T>>, side: &LocalSide<T>, a: &mut DMatrix<T>) -> eyre::Result<()> {
        if let Some(block) = block {
            check_shape(name, block, side.lfsv.size(), side.lfsu.size())?;
            *a += block * weight;
        }
        Ok(())
    }

    fn add_vector(name: &str, weight: T, vector: &Option<DVector<T>>, lfsv: &LocalFunctionSpace, r: &mut [T]) -> eyre::Result<()> {
        if let Some(vector) = vector {
            check_len(name, vector, lfsv.size())?;
            add_scaled(weight, vector, r);
        }
        Ok(())
    }
}

impl<T: Real> LocalOperator<T> for StencilOperator<T> {
    fn capabilities(&self) -> Capabilities {
        let mut capabilities = Capabilities::empty();
        if self.volume.is_some() {
            capabilities = capabilities | Capability::AlphaVolume | Capability::PatternVolume;
        }
        if self.source.is_some() {
            capabilities = capabilities | Capability::LambdaVolume;
        }
        if self.skeleton.is_some() {
            capabilities = capabilities | Capability::AlphaSkeleton | Capability::PatternVolume | Capability::PatternSkeleton;
        }
        if self.boundary.is_some() {
            capabilities = capabilities | Capability::AlphaBoundary | Capability::PatternVolume;
        }
        if self.boundary_source.is_some() {
            capabilities = capabilities | Capability::LambdaBoundary;
        }
        capabilities
    }

    fn pattern_volume(&self, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace, pattern: &mut LocalSparsityPattern) {
        full_volume_pattern(lfsu, lfsv, pattern);
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
        full_skeleton_pattern(lfsu_s, lfsv_s, lfsu_n, lfsv_n, pattern_sn, pattern_ns);
    }

    fn alpha_volume(&self, _eg: &ElementGeometry, side: &LocalSide<T>, r: &mut [T]) -> eyre::Result<()> {
        Self::apply_block("volume", self.weight, &self.volume, side, r)
    }

    fn lambda_volume(&self, _eg: &ElementGeometry, lfsv: &LocalFunctionSpace, r: &mut [T]) -> eyre::Result<()> {
        Self::add_vector("source", self.weight, &self.source, lfsv, r)
    }

    fn alpha_skeleton(
        &self,
        _ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
        r_s: &mut [T],
        r_n: &mut [T],
    ) -> eyre::Result<()> {
        self.apply_skeleton(inside, outside, r_s, r_n)
    }

    fn alpha_boundary(&self, _ig: &IntersectionGeometry, inside: &LocalSide<T>, r: &mut [T]) -> eyre::Result<()> {
        Self::apply_block("boundary", self.weight, &self.boundary, inside, r)
    }

    fn lambda_boundary(&self, _ig: &IntersectionGeometry, lfsv: &LocalFunctionSpace, r: &mut [T]) -> eyre::Result<()> {
        Self::add_vector("boundary source", self.weight, &self.boundary_source, lfsv, r)
    }

    fn jacobian_volume(&self, _eg: &ElementGeometry, side: &LocalSide<T>, a: &mut DMatrix<T>) -> eyre::Result<()> {
        Self::add_block("volume", self.weight, &self.volume, side, a)
    }

    fn jacobian_skeleton(
        &self,
        _ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
        blocks: &mut SkeletonBlocks<T>,
    ) -> eyre::Result<()> {
        if let Some(stencil) = &self.skeleton {
            self.check_skeleton(stencil, inside, outside)?;
            *blocks.inside_inside += &stencil.inside_inside * self.weight;
            *blocks.inside_outside += &stencil.inside_outside * self.weight;
            *blocks.outside_inside += &stencil.outside_inside * self.weight;
            *blocks.outside_outside += &stencil.outside_outside * self.weight;
        }
        Ok(())
    }

    fn jacobian_boundary(&self, _ig: &IntersectionGeometry, inside: &LocalSide<T>, a: &mut DMatrix<T>) -> eyre::Result<()> {
        Self::add_block("boundary", self.weight, &self.boundary, inside, a)
    }

    fn jacobian_apply_volume(&self, _eg: &ElementGeometry, side: &LocalSide<T>, y: &mut [T]) -> eyre::Result<()> {
        Self::apply_block("volume", self.weight, &self.volume, side, y)
    }

    fn jacobian_apply_skeleton(
        &self,
        _ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
        y_s: &mut [T],
        y_n: &mut [T],
    ) -> eyre::Result<()> {
        self.apply_skeleton(inside, outside, y_s, y_n)
    }

    fn jacobian_apply_boundary(&self, _ig: &IntersectionGeometry, inside: &LocalSide<T>, y: &mut [T]) -> eyre::Result<()> {
        Self::apply_block("boundary", self.weight, &self.boundary, inside, y)
    }
}

impl<T: Real> InstationaryOperator<T> for StencilOperator<T> {
    fn set_time(&mut self, time: T) {
        self.time = time;
    }

    fn set_weight(&mut self, weight: T) {
        self.weight = weight;
    }
}
