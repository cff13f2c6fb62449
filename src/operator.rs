//! The protocol between the assemblers and user-supplied local operators.
//!
//! A [`LocalOperator`] declares which kernels it implements through a [`Capabilities`] set. The
//! assemblers only invoke kernels whose capability is present, so an operator that, say, has no
//! face terms causes no face traversal at all. All kernels have no-op default implementations.
use crate::backend::PatternBackend;
use crate::mesh::GeometryType;
use crate::space::LocalFunctionSpace;
use crate::Real;
use nalgebra::DMatrix;
use std::fmt;
use std::fmt::Formatter;
use std::ops::BitOr;

/// A single kernel family a local operator may implement.
///
/// "Alpha" kernels depend on the trial coefficients, "lambda" kernels are source terms that do
/// not.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    AlphaVolume,
    LambdaVolume,
    AlphaSkeleton,
    LambdaSkeleton,
    AlphaBoundary,
    LambdaBoundary,
    PatternVolume,
    PatternSkeleton,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::AlphaVolume,
        Capability::LambdaVolume,
        Capability::AlphaSkeleton,
        Capability::LambdaSkeleton,
        Capability::AlphaBoundary,
        Capability::LambdaBoundary,
        Capability::PatternVolume,
        Capability::PatternSkeleton,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// A set of [`Capability`] values.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u16);

impl Capabilities {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    #[must_use]
    pub fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    #[must_use]
    pub fn without(self, capability: Capability) -> Self {
        Self(self.0 & !capability.bit())
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn contains_any(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().any(|&c| self.contains(c))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|&c| self.contains(c))
    }

    /// Whether any skeleton kernel producing values is present.
    pub fn requires_skeleton(&self) -> bool {
        self.contains_any(&[Capability::AlphaSkeleton, Capability::LambdaSkeleton])
    }

    /// Whether any boundary kernel producing values is present.
    pub fn requires_boundary(&self) -> bool {
        self.contains_any(&[Capability::AlphaBoundary, Capability::LambdaBoundary])
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl BitOr<Capability> for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capability) -> Self::Output {
        self.with(rhs)
    }
}

impl BitOr for Capability {
    type Output = Capabilities;

    fn bitor(self, rhs: Self) -> Self::Output {
        Capabilities::from(self).with(rhs)
    }
}

impl From<Capability> for Capabilities {
    fn from(capability: Capability) -> Self {
        Self::empty().with(capability)
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, capability| set.with(capability))
    }
}

/// The element a local operator is evaluated on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ElementGeometry {
    /// Position of the element in the grid.
    pub element: usize,
    pub geometry_type: GeometryType,
    /// Index of the element among elements of the same geometry type.
    pub index: usize,
}

/// The face a skeleton or boundary kernel is evaluated on, seen from the inside element.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IntersectionGeometry {
    pub inside: usize,
    /// `None` on the domain boundary.
    pub outside: Option<usize>,
    pub local_face: usize,
}

impl IntersectionGeometry {
    pub fn is_boundary(&self) -> bool {
        self.outside.is_none()
    }
}

/// Local spaces and local coefficients on one side of a face, or of an element.
#[derive(Debug, Copy, Clone)]
pub struct LocalSide<'a, T> {
    pub lfsu: &'a LocalFunctionSpace,
    pub lfsv: &'a LocalFunctionSpace,
    /// Trial coefficients, indexed by the local indices of `lfsu`.
    pub x: &'a [T],
}

/// The four local matrices produced on an interior face.
///
/// The first index names the test side and the second the trial side, so that `inside_outside`
/// couples test functions of the inside element to trial functions of the outside element.
#[derive(Debug)]
pub struct SkeletonBlocks<'a, T> {
    pub inside_inside: &'a mut DMatrix<T>,
    pub inside_outside: &'a mut DMatrix<T>,
    pub outside_inside: &'a mut DMatrix<T>,
    pub outside_outside: &'a mut DMatrix<T>,
}

/// Local `(test, trial)` index pairs requested by a pattern kernel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSparsityPattern {
    links: Vec<(usize, usize)>,
}

impl LocalSparsityPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.links.clear();
    }

    pub fn links(&self) -> &[(usize, usize)] {
        &self.links
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl PatternBackend for LocalSparsityPattern {
    fn add_link(&mut self, row: usize, col: usize) {
        self.links.push((row, col));
    }
}

/// Local contributions of a discretized operator.
///
/// Residual kernels accumulate into their output buffers with `+=`, Jacobian kernels accumulate
/// into the local matrices. Output buffers are sized by the caller to the local test space
/// (rows) and local trial space (columns).
///
/// The binding hooks are called around the evaluation of each element and each processed
/// neighbor, in the order `on_bind_element`, (`on_bind_neighbor`, skeleton kernels,
/// `on_unbind_neighbor`)*, `on_unbind_element`.
#[allow(unused_variables)]
pub trait LocalOperator<T: Real> {
    fn capabilities(&self) -> Capabilities;

    /// Called once at the start of every assembly pass, before capabilities are queried.
    fn pre_assembly(&mut self) -> eyre::Result<()> {
        Ok(())
    }

    fn post_assembly(&mut self) -> eyre::Result<()> {
        Ok(())
    }

    fn on_bind_element(&mut self, eg: &ElementGeometry, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace) {}

    fn on_unbind_element(&mut self, eg: &ElementGeometry, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace) {}

    fn on_bind_neighbor(
        &mut self,
        ig: &IntersectionGeometry,
        lfsu_n: &LocalFunctionSpace,
        lfsv_n: &LocalFunctionSpace,
    ) {
    }

    fn on_unbind_neighbor(
        &mut self,
        ig: &IntersectionGeometry,
        lfsu_n: &LocalFunctionSpace,
        lfsv_n: &LocalFunctionSpace,
    ) {
    }

    fn pattern_volume(&self, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace, pattern: &mut LocalSparsityPattern) {}

    /// Couplings across an interior face.
    ///
    /// `pattern_sn` receives (inside test, outside trial) pairs and `pattern_ns` receives
    /// (outside test, inside trial) pairs.
    fn pattern_skeleton(
        &self,
        lfsu_s: &LocalFunctionSpace,
        lfsv_s: &LocalFunctionSpace,
        lfsu_n: &LocalFunctionSpace,
        lfsv_n: &LocalFunctionSpace,
        pattern_sn: &mut LocalSparsityPattern,
        pattern_ns: &mut LocalSparsityPattern,
    ) {
    }

    fn alpha_volume(&self, eg: &ElementGeometry, side: &LocalSide<T>, r: &mut [T]) -> eyre::Result<()> {
        Ok(())
    }

    fn lambda_volume(&self, eg: &ElementGeometry, lfsv: &LocalFunctionSpace, r: &mut [T]) -> eyre::Result<()> {
        Ok(())
    }

    fn alpha_skeleton(
        &self,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
        r_s: &mut [T],
        r_n: &mut [T],
    ) -> eyre::Result<()> {
        Ok(())
    }

    fn lambda_skeleton(
        &self,
        ig: &IntersectionGeometry,
        lfsv_s: &LocalFunctionSpace,
        lfsv_n: &LocalFunctionSpace,
        r_s: &mut [T],
        r_n: &mut [T],
    ) -> eyre::Result<()> {
        Ok(())
    }

    fn alpha_boundary(&self, ig: &IntersectionGeometry, inside: &LocalSide<T>, r: &mut [T]) -> eyre::Result<()> {
        Ok(())
    }

    fn lambda_boundary(&self, ig: &IntersectionGeometry, lfsv: &LocalFunctionSpace, r: &mut [T]) -> eyre::Result<()> {
        Ok(())
    }

    fn jacobian_volume(&self, eg: &ElementGeometry, side: &LocalSide<T>, a: &mut DMatrix<T>) -> eyre::Result<()> {
        Ok(())
    }

    fn jacobian_skeleton(
        &self,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
        blocks: &mut SkeletonBlocks<T>,
    ) -> eyre::Result<()> {
        Ok(())
    }

    fn jacobian_boundary(
        &self,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        a: &mut DMatrix<T>,
    ) -> eyre::Result<()> {
        Ok(())
    }

    /// Applies the local Jacobian to the direction stored in `side.x`.
    fn jacobian_apply_volume(&self, eg: &ElementGeometry, side: &LocalSide<T>, y: &mut [T]) -> eyre::Result<()> {
        Ok(())
    }

    fn jacobian_apply_skeleton(
        &self,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
        y_s: &mut [T],
        y_n: &mut [T],
    ) -> eyre::Result<()> {
        Ok(())
    }

    fn jacobian_apply_boundary(
        &self,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        y: &mut [T],
    ) -> eyre::Result<()> {
        Ok(())
    }
}

/// A local operator whose contributions depend on time and carry a scalar weight.
pub trait InstationaryOperator<T: Real>: LocalOperator<T> {
    fn set_time(&mut self, time: T);

    /// Sets the factor all subsequent contributions are multiplied with.
    fn set_weight(&mut self, weight: T);
}
