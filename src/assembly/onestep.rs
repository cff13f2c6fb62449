//! Composition of a spatial and a temporal local operator into one stage of a one-step scheme.
//!
//! [`OneStepLocalOperator`] is itself a [`LocalOperator`], so it is assembled with an ordinary
//! [`GridOperator`](crate::assembly::global::GridOperator). Each assembly pass evaluates stage `r`
//! of the scheme: the spatial operator contributes with weight `b(r, r) * dt` and only if the stage
//! is implicit, the temporal operator contributes its volume terms with weight one.
//!
//! The contributions of the previous stages (the constant part of the stage equation) are not
//! assembled here.
use crate::operator::{
    Capabilities, Capability, ElementGeometry, InstationaryOperator, IntersectionGeometry, LocalOperator, LocalSide,
    LocalSparsityPattern, SkeletonBlocks,
};
use crate::space::LocalFunctionSpace;
use crate::timestepping::{Tableau, TimeSteppingParameters, TimeSteppingScheme};
use crate::Real;
use eyre::{bail, eyre};
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// A stage is implicit if `|b(r, r)|` exceeds this threshold.
pub const IMPLICIT_THRESHOLD: f64 = 1e-6;

/// Coefficients of the active stage `r`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StageCoefficients<T> {
    /// `b(r, r)`
    pub b_rr: T,
    /// `d(r)`
    pub d_r: T,
    pub implicit: bool,
}

impl<T: Real> StageCoefficients<T> {
    pub fn from_method<M: TimeSteppingParameters<T> + ?Sized>(method: &M, stage: usize) -> Self {
        let b_rr = method.b(stage, stage);
        let threshold = T::from_f64(IMPLICIT_THRESHOLD).expect("Literal must fit in T");
        Self {
            b_rr,
            d_r: method.d(stage),
            implicit: b_rr.abs() > threshold,
        }
    }
}

/// How the time step size enters the weights of the two operators.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneStepSettings {
    /// If set, the temporal operator is scaled by `1 / dt` instead of scaling the spatial operator
    /// by `dt`.
    #[serde(default)]
    pub divide_by_dt: bool,
}

impl OneStepSettings {
    /// Returns `(dt_factor0, dt_factor1)`, the factors of the spatial and temporal operator.
    pub fn dt_factors<T: Real>(&self, dt: T) -> (T, T) {
        if self.divide_by_dt {
            (T::one(), T::one() / dt)
        } else {
            (dt, T::one())
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneStepConfig {
    pub scheme: TimeSteppingScheme,
    #[serde(default)]
    pub settings: OneStepSettings,
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct StageState<T> {
    stage: usize,
    time: T,
    dt: T,
}

/// The stage operator of a one-step scheme.
///
/// `LO0` is the spatial operator, evaluated on implicit stages only, including its face and
/// boundary terms. `LO1` is the temporal (mass-like) operator, of which only the volume terms are
/// evaluated, on every stage. Binding hooks and pattern kernels are forwarded to both.
///
/// A stage must be set with [`set_stage`](Self::set_stage) before assembling. The stage
/// coefficients are recomputed at the start of every assembly pass.
#[derive(Debug, Clone)]
pub struct OneStepLocalOperator<T: Real, LO0, LO1, M = Tableau<T>> {
    spatial: LO0,
    temporal: LO1,
    method: M,
    settings: OneStepSettings,
    stage: Option<StageState<T>>,
    coefficients: Option<StageCoefficients<T>>,
}

impl<T, LO0, LO1> OneStepLocalOperator<T, LO0, LO1, Tableau<T>>
where
    T: Real,
{
    pub fn from_config(spatial: LO0, temporal: LO1, config: &OneStepConfig) -> eyre::Result<Self> {
        let method = config.scheme.tableau()?;
        Ok(Self::new(spatial, temporal, method).with_settings(config.settings))
    }
}

impl<T, LO0, LO1, M> OneStepLocalOperator<T, LO0, LO1, M>
where
    T: Real,
{
    pub fn new(spatial: LO0, temporal: LO1, method: M) -> Self {
        Self {
            spatial,
            temporal,
            method,
            settings: OneStepSettings::default(),
            stage: None,
            coefficients: None,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: OneStepSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &OneStepSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: OneStepSettings) {
        self.settings = settings;
    }

    pub fn method(&self) -> &M {
        &self.method
    }

    /// Replaces the scheme. The current stage is cleared.
    pub fn set_method(&mut self, method: M) {
        self.method = method;
        self.stage = None;
        self.coefficients = None;
    }

    pub fn spatial(&self) -> &LO0 {
        &self.spatial
    }

    pub fn spatial_mut(&mut self) -> &mut LO0 {
        &mut self.spatial
    }

    pub fn temporal(&self) -> &LO1 {
        &self.temporal
    }

    pub fn temporal_mut(&mut self) -> &mut LO1 {
        &mut self.temporal
    }

    pub fn into_parts(self) -> (LO0, LO1, M) {
        (self.spatial, self.temporal, self.method)
    }

    /// The active stage, if any.
    pub fn stage(&self) -> Option<usize> {
        self.stage.map(|state| state.stage)
    }
}

impl<T, LO0, LO1, M> OneStepLocalOperator<T, LO0, LO1, M>
where
    T: Real,
    M: TimeSteppingParameters<T>,
{
    /// Selects stage `stage` (counted from one) of the step from `time` to `time + dt`.
    pub fn set_stage(&mut self, stage: usize, time: T, dt: T) -> eyre::Result<()> {
        let stages = self.method.stages();
        if stage == 0 || stage > stages {
            bail!(
                "stage {} is out of range, the scheme {} has stages 1 to {}",
                stage,
                self.method.name(),
                stages
            );
        }
        if self.settings.divide_by_dt && dt == T::zero() {
            bail!("time step must be nonzero when dividing by the time step");
        }
        self.stage = Some(StageState { stage, time, dt });
        self.coefficients = None;
        Ok(())
    }

    /// Coefficients of the active stage.
    ///
    /// Returns an error if no stage has been set.
    pub fn stage_coefficients(&self) -> eyre::Result<StageCoefficients<T>> {
        let state = self
            .stage
            .ok_or_else(|| eyre!("no stage has been set for the one-step operator"))?;
        Ok(StageCoefficients::from_method(&self.method, state.stage))
    }

    pub fn is_implicit(&self) -> eyre::Result<bool> {
        self.stage_coefficients()
            .map(|coefficients| coefficients.implicit)
    }

    /// Coefficients computed by the current assembly pass.
    fn pass_coefficients(&self) -> eyre::Result<StageCoefficients<T>> {
        self.coefficients
            .ok_or_else(|| eyre!("one-step operator evaluated outside of an assembly pass"))
    }
}

impl<T, LO0, LO1, M> LocalOperator<T> for OneStepLocalOperator<T, LO0, LO1, M>
where
    T: Real,
    LO0: InstationaryOperator<T>,
    LO1: InstationaryOperator<T>,
    M: TimeSteppingParameters<T>,
{
    /// The union of the capabilities of both operators.
    ///
    /// On an explicit stage, skeleton kernels are removed so that no face traversal is requested
    /// on behalf of the spatial operator.
    fn capabilities(&self) -> Capabilities {
        let capabilities = self.spatial.capabilities() | self.temporal.capabilities();
        let implicit = self
            .coefficients
            .map(|coefficients| coefficients.implicit)
            .or_else(|| self.is_implicit().ok())
            .unwrap_or(true);
        if implicit {
            capabilities
        } else {
            capabilities
                .without(Capability::AlphaSkeleton)
                .without(Capability::LambdaSkeleton)
        }
    }

    fn pre_assembly(&mut self) -> eyre::Result<()> {
        self.spatial.pre_assembly()?;
        self.temporal.pre_assembly()?;

        let state = self
            .stage
            .ok_or_else(|| eyre!("cannot assemble the one-step operator before a stage has been set"))?;
        let coefficients = StageCoefficients::from_method(&self.method, state.stage);
        let stage_time = state.time + coefficients.d_r * state.dt;
        let (dt_factor0, dt_factor1) = self.settings.dt_factors(state.dt);

        self.spatial.set_time(stage_time);
        self.temporal.set_time(stage_time);
        self.spatial.set_weight(coefficients.b_rr * dt_factor0);
        self.temporal.set_weight(dt_factor1);
        self.coefficients = Some(coefficients);

        debug!(
            "{} stage {}: b_rr = {}, d_r = {}, implicit = {}, stage time = {}",
            self.method.name(),
            state.stage,
            coefficients.b_rr,
            coefficients.d_r,
            coefficients.implicit,
            stage_time
        );
        Ok(())
    }

    fn post_assembly(&mut self) -> eyre::Result<()> {
        self.spatial.post_assembly()?;
        self.temporal.post_assembly()
    }

    fn on_bind_element(&mut self, eg: &ElementGeometry, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace) {
        self.spatial.on_bind_element(eg, lfsu, lfsv);
        self.temporal.on_bind_element(eg, lfsu, lfsv);
    }

    fn on_unbind_element(&mut self, eg: &ElementGeometry, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace) {
        self.spatial.on_unbind_element(eg, lfsu, lfsv);
        self.temporal.on_unbind_element(eg, lfsu, lfsv);
    }

    fn on_bind_neighbor(
        &mut self,
        ig: &IntersectionGeometry,
        lfsu_n: &LocalFunctionSpace,
        lfsv_n: &LocalFunctionSpace,
    ) {
        self.spatial.on_bind_neighbor(ig, lfsu_n, lfsv_n);
        self.temporal.on_bind_neighbor(ig, lfsu_n, lfsv_n);
    }

    fn on_unbind_neighbor(
        &mut self,
        ig: &IntersectionGeometry,
        lfsu_n: &LocalFunctionSpace,
        lfsv_n: &LocalFunctionSpace,
    ) {
        self.spatial.on_unbind_neighbor(ig, lfsu_n, lfsv_n);
        self.temporal.on_unbind_neighbor(ig, lfsu_n, lfsv_n);
    }

    fn pattern_volume(&self, lfsu: &LocalFunctionSpace, lfsv: &LocalFunctionSpace, pattern: &mut LocalSparsityPattern) {
        if self.spatial.capabilities().contains(Capability::PatternVolume) {
            self.spatial.pattern_volume(lfsu, lfsv, pattern);
        }
        if self.temporal.capabilities().contains(Capability::PatternVolume) {
            self.temporal.pattern_volume(lfsu, lfsv, pattern);
        }
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
        if self.spatial.capabilities().contains(Capability::PatternSkeleton) {
            self.spatial
                .pattern_skeleton(lfsu_s, lfsv_s, lfsu_n, lfsv_n, pattern_sn, pattern_ns);
        }
        if self.temporal.capabilities().contains(Capability::PatternSkeleton) {
            self.temporal
                .pattern_skeleton(lfsu_s, lfsv_s, lfsu_n, lfsv_n, pattern_sn, pattern_ns);
        }
    }

    fn alpha_volume(&self, eg: &ElementGeometry, side: &LocalSide<T>, r: &mut [T]) -> eyre::Result<()> {
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::AlphaVolume) {
            self.spatial.alpha_volume(eg, side, r)?;
        }
        if self.temporal.capabilities().contains(Capability::AlphaVolume) {
            self.temporal.alpha_volume(eg, side, r)?;
        }
        Ok(())
    }

    fn lambda_volume(&self, eg: &ElementGeometry, lfsv: &LocalFunctionSpace, r: &mut [T]) -> eyre::Result<()> {
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::LambdaVolume) {
            self.spatial.lambda_volume(eg, lfsv, r)?;
        }
        if self.temporal.capabilities().contains(Capability::LambdaVolume) {
            self.temporal.lambda_volume(eg, lfsv, r)?;
        }
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
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::AlphaSkeleton) {
            self.spatial.alpha_skeleton(ig, inside, outside, r_s, r_n)?;
        }
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
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::LambdaSkeleton) {
            self.spatial.lambda_skeleton(ig, lfsv_s, lfsv_n, r_s, r_n)?;
        }
        Ok(())
    }

    fn alpha_boundary(&self, ig: &IntersectionGeometry, inside: &LocalSide<T>, r: &mut [T]) -> eyre::Result<()> {
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::AlphaBoundary) {
            self.spatial.alpha_boundary(ig, inside, r)?;
        }
        Ok(())
    }

    fn lambda_boundary(&self, ig: &IntersectionGeometry, lfsv: &LocalFunctionSpace, r: &mut [T]) -> eyre::Result<()> {
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::LambdaBoundary) {
            self.spatial.lambda_boundary(ig, lfsv, r)?;
        }
        Ok(())
    }

    fn jacobian_volume(&self, eg: &ElementGeometry, side: &LocalSide<T>, a: &mut DMatrix<T>) -> eyre::Result<()> {
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::AlphaVolume) {
            self.spatial.jacobian_volume(eg, side, a)?;
        }
        if self.temporal.capabilities().contains(Capability::AlphaVolume) {
            self.temporal.jacobian_volume(eg, side, a)?;
        }
        Ok(())
    }

    fn jacobian_skeleton(
        &self,
        ig: &IntersectionGeometry,
        inside: &LocalSide<T>,
        outside: &LocalSide<T>,
        blocks: &mut SkeletonBlocks<T>,
    ) -> eyre::Result<()> {
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::AlphaSkeleton) {
            self.spatial.jacobian_skeleton(ig, inside, outside, blocks)?;
        }
        Ok(())
    }

    fn jacobian_boundary(&self, ig: &IntersectionGeometry, inside: &LocalSide<T>, a: &mut DMatrix<T>) -> eyre::Result<()> {
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::AlphaBoundary) {
            self.spatial.jacobian_boundary(ig, inside, a)?;
        }
        Ok(())
    }

    fn jacobian_apply_volume(&self, eg: &ElementGeometry, side: &LocalSide<T>, y: &mut [T]) -> eyre::Result<()> {
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::AlphaVolume) {
            self.spatial.jacobian_apply_volume(eg, side, y)?;
        }
        if self.temporal.capabilities().contains(Capability::AlphaVolume) {
            self.temporal.jacobian_apply_volume(eg, side, y)?;
        }
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
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::AlphaSkeleton) {
            self.spatial
                .jacobian_apply_skeleton(ig, inside, outside, y_s, y_n)?;
        }
        Ok(())
    }

    fn jacobian_apply_boundary(&self, ig: &IntersectionGeometry, inside: &LocalSide<T>, y: &mut [T]) -> eyre::Result<()> {
        if self.pass_coefficients()?.implicit && self.spatial.capabilities().contains(Capability::AlphaBoundary) {
            self.spatial.jacobian_apply_boundary(ig, inside, y)?;
        }
        Ok(())
    }
}
