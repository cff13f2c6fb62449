//! Global assembly of residuals, Jacobians and Jacobian-vector products.
//!
//! All three operations share the same traversal. Every element is bound once, and every interior
//! face is processed from exactly one side, namely from the element with the larger visitation id
//! (see [`VisitationIds`]). Contributions to the neighbor side of a face are scattered immediately,
//! contributions to the element itself are accumulated locally and scattered once all its faces
//! have been processed.
//!
//! Matrix contributions pass through the constraint algebra on their way into the global matrix,
//! see [`add_transformed_local_matrix`].
use crate::backend::{MatrixBackend, PatternBackend, SparsityPatternBuilder};
use crate::constraints::{self, AffineConstraints};
use crate::mesh::{GeometryType, Grid};
use crate::operator::{
    Capabilities, Capability, ElementGeometry, IntersectionGeometry, LocalOperator, LocalSide, LocalSparsityPattern,
    SkeletonBlocks,
};
use crate::space::{FunctionSpace, LocalFunctionSpace};
use crate::Real;
use eyre::bail;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use rustc_hash::FxHashMap;
use std::borrow::Cow;

/// Number of visitation ids reserved for each geometry type.
pub const VISITATION_BUCKET_SIZE: usize = 1 << 28;

/// Strict total order over the elements of a (possibly mixed) grid.
///
/// Each geometry type is assigned a disjoint bucket of ids the first time it is seen, and the id
/// of an element is its per-type index plus the offset of its bucket.
#[derive(Debug, Clone, Default)]
pub struct VisitationIds {
    offsets: FxHashMap<GeometryType, usize>,
}

impl VisitationIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visitation_id(&mut self, geometry_type: GeometryType, index: usize) -> usize {
        debug_assert!(index < VISITATION_BUCKET_SIZE, "Element index exceeds visitation bucket size");
        let next_offset = self.offsets.len() * VISITATION_BUCKET_SIZE;
        let offset = *self.offsets.entry(geometry_type).or_insert(next_offset);
        offset + index
    }
}

/// Inserts the links of a raw `(gi, gj)` pair after expansion through the constraint maps.
///
/// If `gi == gj`, the diagonal link is always inserted first. Then `gi` is expanded through the
/// test constraints `cv` and `gj` through the trial constraints `cu`, and all combinations are
/// inserted. A Dirichlet constraint expands to nothing.
pub fn add_constrained_link<T: Real>(
    pattern: &mut (impl PatternBackend + ?Sized),
    gi: usize,
    gj: usize,
    cv: &AffineConstraints<T>,
    cu: &AffineConstraints<T>,
) {
    if gi == gj {
        pattern.add_link(gi, gj);
    }

    for (row, _) in cv.expand(gi) {
        for (col, _) in cu.expand(gj) {
            pattern.add_link(row, col);
        }
    }
}

/// Computes `J += S_V m S_U^T` entry by entry.
///
/// `local` has one row per local test function in `lfsv` and one column per local trial function
/// in `lfsu`. Each entry is added at every expanded `(row, col)` pair, scaled by the product of
/// the row and column expansion weights.
pub fn add_transformed_local_matrix<T: Real>(
    global: &mut (impl MatrixBackend<T> + ?Sized),
    local: &DMatrix<T>,
    lfsv: &LocalFunctionSpace,
    lfsu: &LocalFunctionSpace,
    cv: &AffineConstraints<T>,
    cu: &AffineConstraints<T>,
) -> eyre::Result<()> {
    debug_assert_eq!(local.shape(), (lfsv.size(), lfsu.size()));
    for i in 0..lfsv.size() {
        let gi = lfsv.global_index(i);
        for j in 0..lfsu.size() {
            let gj = lfsu.global_index(j);
            let value = local[(i, j)];
            for (row, v_weight) in cv.expand(gi) {
                for (col, u_weight) in cu.expand(gj) {
                    global.add_to_entry(row, col, value * u_weight * v_weight)?;
                }
            }
        }
    }
    Ok(())
}

/// Replaces every constrained row by the corresponding row of the identity matrix.
pub fn set_trivial_rows<T: Real>(
    matrix: &mut (impl MatrixBackend<T> + ?Sized),
    cv: &AffineConstraints<T>,
) -> eyre::Result<()> {
    for row in cv.constrained_indices() {
        matrix.clear_row(row);
        matrix.set_entry(row, row, T::one())?;
    }
    Ok(())
}

/// Assembles a local operator over a grid, with trial space `SU` and test space `SV`.
///
/// Without explicit constraints, both constraint maps are empty and no transformation takes
/// place.
#[derive(Debug)]
pub struct GridOperator<'a, T: Real, G: ?Sized, SU, SV, LO> {
    grid: &'a G,
    trial_space: SU,
    test_space: SV,
    trial_constraints: Cow<'a, AffineConstraints<T>>,
    test_constraints: Cow<'a, AffineConstraints<T>>,
    operator: LO,
}

impl<'a, T, G, SU, SV, LO> GridOperator<'a, T, G, SU, SV, LO>
where
    T: Real,
    G: ?Sized + Grid,
    SU: FunctionSpace,
    SV: FunctionSpace,
    LO: LocalOperator<T>,
{
    pub fn new(grid: &'a G, trial_space: SU, test_space: SV, operator: LO) -> Self {
        Self {
            grid,
            trial_space,
            test_space,
            trial_constraints: Cow::Owned(AffineConstraints::default()),
            test_constraints: Cow::Owned(AffineConstraints::default()),
            operator,
        }
    }

    /// Sets the constraints of the trial space (`cu`) and of the test space (`cv`).
    #[must_use]
    pub fn with_constraints(mut self, cu: &'a AffineConstraints<T>, cv: &'a AffineConstraints<T>) -> Self {
        for (name, constraints) in [("trial", cu), ("test", cv)] {
            let chained = constraints.chained_constraints();
            if let Some(first) = chained.first() {
                warn!(
                    "{} constraints contain {} constrained degrees of freedom with constrained contributors \
                     (first: {}). Chained constraints are not resolved.",
                    name,
                    chained.len(),
                    first
                );
            }
        }
        self.trial_constraints = Cow::Borrowed(cu);
        self.test_constraints = Cow::Borrowed(cv);
        self
    }

    pub fn grid(&self) -> &G {
        self.grid
    }

    pub fn trial_space(&self) -> &SU {
        &self.trial_space
    }

    pub fn test_space(&self) -> &SV {
        &self.test_space
    }

    pub fn trial_constraints(&self) -> &AffineConstraints<T> {
        &self.trial_constraints
    }

    pub fn test_constraints(&self) -> &AffineConstraints<T> {
        &self.test_constraints
    }

    pub fn global_size_u(&self) -> usize {
        self.trial_space.global_size()
    }

    pub fn global_size_v(&self) -> usize {
        self.test_space.global_size()
    }

    pub fn operator(&self) -> &LO {
        &self.operator
    }

    pub fn operator_mut(&mut self) -> &mut LO {
        &mut self.operator
    }

    pub fn into_operator(self) -> LO {
        self.operator
    }

    /// Inserts every link that assembly of the Jacobian can write to.
    ///
    /// Interior faces are visited from both sides. Additionally, the diagonal link of every
    /// constrained test row is inserted, since the Jacobian is given a trivial row there.
    pub fn fill_pattern(&self, pattern: &mut (impl PatternBackend + ?Sized)) {
        let capabilities = self.operator.capabilities();
        let cu = &*self.trial_constraints;
        let cv = &*self.test_constraints;

        let mut lfsu_s = LocalFunctionSpace::new();
        let mut lfsv_s = LocalFunctionSpace::new();
        let mut lfsu_n = LocalFunctionSpace::new();
        let mut lfsv_n = LocalFunctionSpace::new();
        let mut local_pattern = LocalSparsityPattern::new();
        let mut local_pattern_ns = LocalSparsityPattern::new();

        for element in 0..self.grid.num_elements() {
            lfsu_s.bind(&self.trial_space, element);
            lfsv_s.bind(&self.test_space, element);

            if capabilities.contains(Capability::PatternVolume) {
                local_pattern.clear();
                self.operator.pattern_volume(&lfsu_s, &lfsv_s, &mut local_pattern);
                for &(i, j) in local_pattern.links() {
                    add_constrained_link(pattern, lfsv_s.global_index(i), lfsu_s.global_index(j), cv, cu);
                }
            }

            if capabilities.contains(Capability::PatternSkeleton) {
                for local_face in 0..self.grid.num_faces(element) {
                    let intersection = self.grid.intersection(element, local_face);
                    if let Some(neighbor) = intersection.neighbor {
                        lfsu_n.bind(&self.trial_space, neighbor);
                        lfsv_n.bind(&self.test_space, neighbor);

                        local_pattern.clear();
                        local_pattern_ns.clear();
                        self.operator.pattern_skeleton(
                            &lfsu_s,
                            &lfsv_s,
                            &lfsu_n,
                            &lfsv_n,
                            &mut local_pattern,
                            &mut local_pattern_ns,
                        );
                        for &(i, j) in local_pattern.links() {
                            add_constrained_link(pattern, lfsv_s.global_index(i), lfsu_n.global_index(j), cv, cu);
                        }
                        for &(i, j) in local_pattern_ns.links() {
                            add_constrained_link(pattern, lfsv_n.global_index(i), lfsu_s.global_index(j), cv, cu);
                        }
                    }
                }
            }
        }

        let global_size_u = self.global_size_u();
        for row in cv.constrained_indices().filter(|&i| i < global_size_u) {
            pattern.add_link(row, row);
        }
    }

    /// A pattern builder of the correct dimensions, filled by [`fill_pattern`](Self::fill_pattern).
    pub fn create_pattern(&self) -> SparsityPatternBuilder {
        let mut pattern = SparsityPatternBuilder::new(self.global_size_v(), self.global_size_u());
        self.fill_pattern(&mut pattern);
        pattern
    }

    /// A zero CSR matrix whose pattern holds every entry the Jacobian assembly writes to.
    pub fn create_csr_jacobian(&self) -> eyre::Result<CsrMatrix<T>> {
        self.create_pattern().build_csr()
    }

    /// Accumulates the residual at `x` into `r`.
    ///
    /// Constrained entries of `r` are zeroed afterwards. `r` is not cleared beforehand.
    pub fn residual(&mut self, x: &DVector<T>, r: &mut DVector<T>) -> eyre::Result<()> {
        self.check_vector_sizes(x, r)?;
        let mut engine = VectorEngine::new(VectorPass::Residual, r);
        traverse(
            self.grid,
            &self.trial_space,
            &self.test_space,
            &mut self.operator,
            x,
            &mut engine,
        )?;
        constraints::constrain_residual(&*self.test_constraints, r);
        Ok(())
    }

    /// Accumulates the Jacobian at `x` into `a`.
    ///
    /// Every constrained row is replaced by an identity row afterwards. `a` is not cleared
    /// beforehand, and a sparse `a` must hold every entry of [`fill_pattern`](Self::fill_pattern).
    pub fn jacobian<M>(&mut self, x: &DVector<T>, a: &mut M) -> eyre::Result<()>
    where
        M: ?Sized + MatrixBackend<T>,
    {
        if x.len() != self.global_size_u() {
            bail!(
                "solution has length {}, but the trial space has size {}",
                x.len(),
                self.global_size_u()
            );
        }
        if (a.nrows(), a.ncols()) != (self.global_size_v(), self.global_size_u()) {
            bail!(
                "Jacobian has shape {}x{}, expected {}x{}",
                a.nrows(),
                a.ncols(),
                self.global_size_v(),
                self.global_size_u()
            );
        }

        let mut engine = JacobianEngine::new(a, &*self.trial_constraints, &*self.test_constraints);
        traverse(
            self.grid,
            &self.trial_space,
            &self.test_space,
            &mut self.operator,
            x,
            &mut engine,
        )?;
        set_trivial_rows(a, &*self.test_constraints)
    }

    /// Accumulates the product of the Jacobian with `z` into `y`.
    ///
    /// The constrained entries of `z` are copied into `y` afterwards, matching the identity rows
    /// of the assembled Jacobian.
    pub fn jacobian_apply(&mut self, z: &DVector<T>, y: &mut DVector<T>) -> eyre::Result<()> {
        self.check_vector_sizes(z, y)?;
        let mut engine = VectorEngine::new(VectorPass::JacobianApply, y);
        traverse(
            self.grid,
            &self.trial_space,
            &self.test_space,
            &mut self.operator,
            z,
            &mut engine,
        )?;
        constraints::copy_constrained_dofs(&*self.trial_constraints, z, y);
        Ok(())
    }

    /// Distributes constrained entries of `x` onto their contributors, using the test constraints.
    pub fn forward_transform(&self, x: &mut DVector<T>, post_restrict: bool) {
        constraints::forward_transform(&*self.test_constraints, x, post_restrict);
    }

    /// Reconstructs constrained entries of `x` from their contributors, using the test constraints.
    pub fn back_transform(&self, x: &mut DVector<T>, pre_restrict: bool) {
        constraints::back_transform(&*self.test_constraints, x, pre_restrict);
    }

    fn check_vector_sizes(&self, u: &DVector<T>, v: &DVector<T>) -> eyre::Result<()> {
        if u.len() != self.global_size_u() {
            bail!(
                "input vector has length {}, but the trial space has size {}",
                u.len(),
                self.global_size_u()
            );
        }
        if v.len() != self.global_size_v() {
            bail!(
                "output vector has length {}, but the test space has size {}",
                v.len(),
                self.global_size_v()
            );
        }
        Ok(())
    }
}

/// What a traversal computes on each element and face.
trait AssemblyEngine<T: Real> {
    fn name(&self) -> &'static str;

    fn volume_required(&self, capabilities: Capabilities) -> bool;

    fn skeleton_required(&self, capabilities: Capabilities) -> bool;

    fn boundary_required(&self, capabilities: Capabilities) -> bool;

    fn begin_element(&mut self, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace);

    fn volume<LO: LocalOperator<T> + ?Sized>(
        &mut self,
        operator: &LO,
        capabilities: Capabilities,
        eg: &ElementGeometry,
        side: &LocalSide<T>,
    ) -> eyre::Result<()>;

    /// Evaluates an interior face and scatters the neighbor-side contribution.
    fn skeleton<LO: LocalOperator<T> + ?Sized>(
        &mut self,
        operator: &LO,
        capabilities: Capabilities,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
    ) -> eyre::Result<()>;

    fn boundary<LO: LocalOperator<T> + ?Sized>(
        &mut self,
        operator: &LO,
        capabilities: Capabilities,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
    ) -> eyre::Result<()>;

    /// Scatters the accumulated contribution of the element itself.
    fn finish_element(&mut self, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace) -> eyre::Result<()>;
}

#[derive(Debug, Default)]
struct TraversalStats {
    elements: usize,
    interior_faces: usize,
    boundary_faces: usize,
}

fn traverse<T, G, SU, SV, LO, E>(
    grid: &G,
    trial_space: &SU,
    test_space: &SV,
    operator: &mut LO,
    x: &DVector<T>,
    engine: &mut E,
) -> eyre::Result<()>
where
    T: Real,
    G: ?Sized + Grid,
    SU: FunctionSpace,
    SV: FunctionSpace,
    LO: LocalOperator<T>,
    E: AssemblyEngine<T>,
{
    operator.pre_assembly()?;
    let capabilities = operator.capabilities();
    let do_volume = engine.volume_required(capabilities);
    let do_skeleton = engine.skeleton_required(capabilities);
    let do_boundary = engine.boundary_required(capabilities);

    let mut ids = VisitationIds::new();
    let mut stats = TraversalStats::default();
    let mut lfsu_s = LocalFunctionSpace::new();
    let mut lfsv_s = LocalFunctionSpace::new();
    let mut lfsu_n = LocalFunctionSpace::new();
    let mut lfsv_n = LocalFunctionSpace::new();
    let mut x_s = Vec::new();
    let mut x_n = Vec::new();

    for element in 0..grid.num_elements() {
        let eg = ElementGeometry {
            element,
            geometry_type: grid.geometry_type(element),
            index: grid.element_index(element),
        };
        let id = ids.visitation_id(eg.geometry_type, eg.index);

        lfsu_s.bind(trial_space, element);
        lfsv_s.bind(test_space, element);
        operator.on_bind_element(&eg, &lfsu_s, &lfsv_s);
        lfsu_s.read(x, &mut x_s);
        engine.begin_element(&lfsu_s, &lfsv_s);

        let inside = LocalSide {
            lfsu: &lfsu_s,
            lfsv: &lfsv_s,
            x: &x_s,
        };

        if do_volume {
            engine.volume(operator, capabilities, &eg, &inside)?;
        }

        if do_skeleton || do_boundary {
            for local_face in 0..grid.num_faces(element) {
                let intersection = grid.intersection(element, local_face);
                let ig = IntersectionGeometry {
                    inside: element,
                    outside: intersection.neighbor,
                    local_face,
                };
                match intersection.neighbor {
                    Some(neighbor) if do_skeleton => {
                        let neighbor_id = ids.visitation_id(grid.geometry_type(neighbor), grid.element_index(neighbor));
                        if id <= neighbor_id {
                            continue;
                        }

                        lfsu_n.bind(trial_space, neighbor);
                        lfsv_n.bind(test_space, neighbor);
                        operator.on_bind_neighbor(&ig, &lfsu_n, &lfsv_n);
                        lfsu_n.read(x, &mut x_n);
                        let outside = LocalSide {
                            lfsu: &lfsu_n,
                            lfsv: &lfsv_n,
                            x: &x_n,
                        };
                        engine.skeleton(operator, capabilities, &ig, &inside, &outside)?;
                        operator.on_unbind_neighbor(&ig, &lfsu_n, &lfsv_n);
                        stats.interior_faces += 1;
                    }
                    None if do_boundary => {
                        engine.boundary(operator, capabilities, &ig, &inside)?;
                        stats.boundary_faces += 1;
                    }
                    _ => {}
                }
            }
        }

        engine.finish_element(&lfsu_s, &lfsv_s)?;
        operator.on_unbind_element(&eg, &lfsu_s, &lfsv_s);
        stats.elements += 1;
    }

    operator.post_assembly()?;
    debug!(
        "{} assembly: {} elements, {} interior faces, {} boundary faces",
        engine.name(),
        stats.elements,
        stats.interior_faces,
        stats.boundary_faces
    );
    Ok(())
}

fn reset_vector<T: Real>(vector: &mut Vec<T>, len: usize) {
    vector.clear();
    vector.resize(len, T::zero());
}

fn reset_matrix<T: Real>(matrix: &mut DMatrix<T>, nrows: usize, ncols: usize) {
    matrix.resize_mut(nrows, ncols, T::zero());
    matrix.fill(T::zero());
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum VectorPass {
    Residual,
    JacobianApply,
}

/// Residual and Jacobian-vector product assembly.
struct VectorEngine<'r, T: Real> {
    pass: VectorPass,
    target: &'r mut DVector<T>,
    y_s: Vec<T>,
    y_n: Vec<T>,
}

impl<'r, T: Real> VectorEngine<'r, T> {
    fn new(pass: VectorPass, target: &'r mut DVector<T>) -> Self {
        Self {
            pass,
            target,
            y_s: Vec::new(),
            y_n: Vec::new(),
        }
    }
}

impl<'r, T: Real> AssemblyEngine<T> for VectorEngine<'r, T> {
    fn name(&self) -> &'static str {
        match self.pass {
            VectorPass::Residual => "residual",
            VectorPass::JacobianApply => "Jacobian-vector product",
        }
    }

    fn volume_required(&self, capabilities: Capabilities) -> bool {
        match self.pass {
            VectorPass::Residual => capabilities.contains_any(&[Capability::AlphaVolume, Capability::LambdaVolume]),
            VectorPass::JacobianApply => capabilities.contains(Capability::AlphaVolume),
        }
    }

    fn skeleton_required(&self, capabilities: Capabilities) -> bool {
        match self.pass {
            VectorPass::Residual => capabilities.requires_skeleton(),
            VectorPass::JacobianApply => capabilities.contains(Capability::AlphaSkeleton),
        }
    }

    fn boundary_required(&self, capabilities: Capabilities) -> bool {
        match self.pass {
            VectorPass::Residual => capabilities.requires_boundary(),
            VectorPass::JacobianApply => capabilities.contains(Capability::AlphaBoundary),
        }
    }

    fn begin_element(&mut self, _lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace) {
        reset_vector(&mut self.y_s, lfsv.size());
    }

    fn volume<LO: LocalOperator<T> + ?Sized>(
        &mut self,
        operator: &LO,
        capabilities: Capabilities,
        eg: &ElementGeometry,
        side: &LocalSide<T>,
    ) -> eyre::Result<()> {
        match self.pass {
            VectorPass::Residual => {
                if capabilities.contains(Capability::AlphaVolume) {
                    operator.alpha_volume(eg, side, &mut self.y_s)?;
                }
                if capabilities.contains(Capability::LambdaVolume) {
                    operator.lambda_volume(eg, side.lfsv, &mut self.y_s)?;
                }
            }
            VectorPass::JacobianApply => operator.jacobian_apply_volume(eg, side, &mut self.y_s)?,
        }
        Ok(())
    }

    fn skeleton<LO: LocalOperator<T> + ?Sized>(
        &mut self,
        operator: &LO,
        capabilities: Capabilities,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
    ) -> eyre::Result<()> {
        reset_vector(&mut self.y_n, outside.lfsv.size());
        match self.pass {
            VectorPass::Residual => {
                if capabilities.contains(Capability::AlphaSkeleton) {
                    operator.alpha_skeleton(ig, inside, outside, &mut self.y_s, &mut self.y_n)?;
                }
                if capabilities.contains(Capability::LambdaSkeleton) {
                    operator.lambda_skeleton(ig, inside.lfsv, outside.lfsv, &mut self.y_s, &mut self.y_n)?;
                }
            }
            VectorPass::JacobianApply => {
                operator.jacobian_apply_skeleton(ig, inside, outside, &mut self.y_s, &mut self.y_n)?
            }
        }
        outside.lfsv.add(&self.y_n, &mut *self.target);
        Ok(())
    }

    fn boundary<LO: LocalOperator<T> + ?Sized>(
        &mut self,
        operator: &LO,
        capabilities: Capabilities,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
    ) -> eyre::Result<()> {
        match self.pass {
            VectorPass::Residual => {
                if capabilities.contains(Capability::AlphaBoundary) {
                    operator.alpha_boundary(ig, inside, &mut self.y_s)?;
                }
                if capabilities.contains(Capability::LambdaBoundary) {
                    operator.lambda_boundary(ig, inside.lfsv, &mut self.y_s)?;
                }
            }
            VectorPass::JacobianApply => operator.jacobian_apply_boundary(ig, inside, &mut self.y_s)?,
        }
        Ok(())
    }

    fn finish_element(&mut self, _lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace) -> eyre::Result<()> {
        lfsv.add(&self.y_s, &mut *self.target);
        Ok(())
    }
}

/// Jacobian assembly through the constraint algebra.
struct JacobianEngine<'m, 'c, T: Real, M: ?Sized> {
    target: &'m mut M,
    cu: &'c AffineConstraints<T>,
    cv: &'c AffineConstraints<T>,
    a_ss: DMatrix<T>,
    a_sn: DMatrix<T>,
    a_ns: DMatrix<T>,
    a_nn: DMatrix<T>,
}

impl<'m, 'c, T: Real, M: ?Sized + MatrixBackend<T>> JacobianEngine<'m, 'c, T, M> {
    fn new(target: &'m mut M, cu: &'c AffineConstraints<T>, cv: &'c AffineConstraints<T>) -> Self {
        Self {
            target,
            cu,
            cv,
            a_ss: DMatrix::zeros(0, 0),
            a_sn: DMatrix::zeros(0, 0),
            a_ns: DMatrix::zeros(0, 0),
            a_nn: DMatrix::zeros(0, 0),
        }
    }
}

impl<'m, 'c, T: Real, M: ?Sized + MatrixBackend<T>> AssemblyEngine<T> for JacobianEngine<'m, 'c, T, M> {
    fn name(&self) -> &'static str {
        "Jacobian"
    }

    fn volume_required(&self, capabilities: Capabilities) -> bool {
        capabilities.contains(Capability::AlphaVolume)
    }

    fn skeleton_required(&self, capabilities: Capabilities) -> bool {
        capabilities.contains(Capability::AlphaSkeleton)
    }

    fn boundary_required(&self, capabilities: Capabilities) -> bool {
        capabilities.contains(Capability::AlphaBoundary)
    }

    fn begin_element(&mut self, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace) {
        reset_matrix(&mut self.a_ss, lfsv.size(), lfsu.size());
    }

    fn volume<LO: LocalOperator<T> + ?Sized>(
        &mut self,
        operator: &LO,
        _capabilities: Capabilities,
        eg: &ElementGeometry,
        side: &LocalSide<T>,
    ) -> eyre::Result<()> {
        operator.jacobian_volume(eg, side, &mut self.a_ss)
    }

    fn skeleton<LO: LocalOperator<T> + ?Sized>(
        &mut self,
        operator: &LO,
        _capabilities: Capabilities,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
    ) -> eyre::Result<()> {
        reset_matrix(&mut self.a_sn, inside.lfsv.size(), outside.lfsu.size());
        reset_matrix(&mut self.a_ns, outside.lfsv.size(), inside.lfsu.size());
        reset_matrix(&mut self.a_nn, outside.lfsv.size(), outside.lfsu.size());

        let mut blocks = SkeletonBlocks {
            inside_inside: &mut self.a_ss,
            inside_outside: &mut self.a_sn,
            outside_inside: &mut self.a_ns,
            outside_outside: &mut self.a_nn,
        };
        operator.jacobian_skeleton(ig, inside, outside, &mut blocks)?;

        add_transformed_local_matrix(&mut *self.target, &self.a_sn, inside.lfsv, outside.lfsu, self.cv, self.cu)?;
        add_transformed_local_matrix(&mut *self.target, &self.a_ns, outside.lfsv, inside.lfsu, self.cv, self.cu)?;
        add_transformed_local_matrix(&mut *self.target, &self.a_nn, outside.lfsv, outside.lfsu, self.cv, self.cu)
    }

    fn boundary<LO: LocalOperator<T> + ?Sized>(
        &mut self,
        operator: &LO,
        _capabilities: Capabilities,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
    ) -> eyre::Result<()> {
        operator.jacobian_boundary(ig, inside, &mut self.a_ss)
    }

    fn finish_element(&mut self, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace) -> eyre::Result<()> {
        add_transformed_local_matrix(&mut *self.target, &self.a_ss, lfsv, lfsu, self.cv, self.cu)
    }
}
