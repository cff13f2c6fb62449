use crate::csr_to_dense;
use gridop::assembly::global::GridOperator;
use gridop::assembly::onestep::{OneStepConfig, OneStepLocalOperator, OneStepSettings, StageCoefficients};
use gridop::mesh::{create_uniform_interval_grid, GeometryType};
use gridop::nalgebra::{DMatrix, DVector};
use gridop::operator::{Capability, ElementGeometry, LocalOperator, LocalSide};
use gridop::operators::StencilOperator;
use gridop::space::{DiscontinuousSpace, LocalFunctionSpace};
use gridop::timestepping::{Tableau, TimeSteppingParameters, TimeSteppingScheme};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use util::SpyOperator;

type Spy = SpyOperator<f64, StencilOperator<f64>>;

/// Volume, jump and boundary terms on a DG space with one dof per element.
fn spatial_operator() -> Spy {
    let one = DMatrix::from_element(1, 1, 1.0);
    let minus_one = DMatrix::from_element(1, 1, -1.0);
    let stencil = StencilOperator::new()
        .with_volume(DMatrix::from_element(1, 1, 2.0))
        .with_skeleton(one.clone(), minus_one.clone(), minus_one, one.clone())
        .with_boundary(one);
    SpyOperator::new(stencil)
}

/// A mass term, plus a boundary term that must never be evaluated.
fn temporal_operator() -> Spy {
    let stencil = StencilOperator::new()
        .with_volume(DMatrix::from_element(1, 1, 1.0))
        .with_boundary(DMatrix::from_element(1, 1, 5.0));
    SpyOperator::new(stencil)
}

fn one_step(method: Tableau<f64>) -> OneStepLocalOperator<f64, Spy, Spy> {
    OneStepLocalOperator::new(spatial_operator(), temporal_operator(), method)
}

#[test]
fn explicit_stage_evaluates_only_temporal_volume_terms() {
    let grid = create_uniform_interval_grid(3);
    let space = DiscontinuousSpace::new(3, 1);
    let mut local_operator = one_step(Tableau::explicit_euler());
    local_operator.set_stage(1, 0.0, 0.1).unwrap();
    let mut operator = GridOperator::new(&grid, space, space, local_operator);

    let x = DVector::from_column_slice(&[1.0, 2.0, 4.0]);
    let mut r = DVector::zeros(3);
    operator.residual(&x, &mut r).unwrap();
    assert_eq!(r, x);

    let mut a = DMatrix::<f64>::zeros(3, 3);
    operator.jacobian(&x, &mut a).unwrap();
    assert_eq!(a, DMatrix::identity(3, 3));

    let mut y = DVector::zeros(3);
    operator.jacobian_apply(&x, &mut y).unwrap();
    assert_eq!(y, x);

    let spatial = operator.operator().spatial().counts();
    let temporal = operator.operator().temporal().counts();
    assert_eq!(spatial.volume_kernels(), 0);
    assert_eq!(spatial.face_kernels(), 0);
    assert_eq!(spatial.bind_neighbor, 0);
    assert_eq!(temporal.bind_neighbor, 0);
    assert_eq!(temporal.face_kernels(), 0);
    assert_eq!(temporal.alpha_volume, 3);
    assert_eq!(temporal.jacobian_volume, 3);
    assert_eq!(temporal.jacobian_apply_volume, 3);

    // Hooks reach both operators on every pass
    assert_eq!(spatial.pre_assembly, 3);
    assert_eq!(temporal.pre_assembly, 3);
    assert_eq!(spatial.bind_element, 9);
    assert_eq!(temporal.bind_element, 9);
    assert_eq!(spatial.unbind_element, 9);
    assert_eq!(spatial.post_assembly, 3);
}

#[test]
fn implicit_euler_stage_matrix() {
    let grid = create_uniform_interval_grid(3);
    let space = DiscontinuousSpace::new(3, 1);
    let mut local_operator = one_step(Tableau::implicit_euler());
    local_operator.set_stage(1, 0.0, 0.5).unwrap();
    let mut operator = GridOperator::new(&grid, space, space, local_operator);

    // M + dt * K, with K = [4 -1 0; -1 4 -1; 0 -1 4]
    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(3, 3, &[
        3.0, -0.5, 0.0,
        -0.5, 3.0, -0.5,
        0.0, -0.5, 3.0,
    ]);

    let x = DVector::from_column_slice(&[1.0, 2.0, 4.0]);
    let mut a = DMatrix::<f64>::zeros(3, 3);
    operator.jacobian(&x, &mut a).unwrap();
    assert_matrix_eq!(a, expected, comp = abs, tol = 1e-14);

    let mut csr = operator.create_csr_jacobian().unwrap();
    operator.jacobian(&x, &mut csr).unwrap();
    assert_matrix_eq!(csr_to_dense(&csr), expected, comp = abs, tol = 1e-14);

    let spatial = operator.operator().spatial().counts();
    let temporal = operator.operator().temporal().counts();
    assert_eq!(spatial.jacobian_volume, 6);
    assert_eq!(spatial.jacobian_skeleton, 4);
    assert_eq!(spatial.jacobian_boundary, 4);
    assert_eq!(temporal.jacobian_volume, 6);
    assert_eq!(temporal.face_kernels(), 0);
    assert_eq!(temporal.bind_neighbor, 4);

    let mut r = DVector::zeros(3);
    operator.residual(&x, &mut r).unwrap();
    assert_matrix_eq!(r, DVector::from_column_slice(&[2.0, 3.5, 11.0]), comp = abs, tol = 1e-14);

    let mut y = DVector::zeros(3);
    operator.jacobian_apply(&x, &mut y).unwrap();
    assert_matrix_eq!(y, &expected * &x, comp = abs, tol = 1e-14);
}

#[test]
fn stage_time_and_weights_are_forwarded() {
    let grid = create_uniform_interval_grid(2);
    let space = DiscontinuousSpace::new(2, 1);
    let x = DVector::zeros(2);

    let mut local_operator = one_step(Tableau::implicit_euler());
    local_operator.set_stage(1, 1.0, 0.5).unwrap();
    let mut operator = GridOperator::new(&grid, space, space, local_operator);
    operator.residual(&x, &mut DVector::zeros(2)).unwrap();
    let stage_operator = operator.operator();
    assert_eq!(stage_operator.spatial().times(), &[1.5]);
    assert_eq!(stage_operator.temporal().times(), &[1.5]);
    assert_eq!(stage_operator.spatial().weights(), &[0.5]);
    assert_eq!(stage_operator.temporal().weights(), &[1.0]);
    assert_eq!(stage_operator.spatial().inner().time(), 1.5);
    assert_eq!(stage_operator.spatial().inner().weight(), 0.5);

    let mut local_operator =
        one_step(Tableau::implicit_euler()).with_settings(OneStepSettings { divide_by_dt: true });
    local_operator.set_stage(1, 1.0, 0.5).unwrap();
    let mut operator = GridOperator::new(&grid, space, space, local_operator);
    operator.residual(&x, &mut DVector::zeros(2)).unwrap();
    assert_eq!(operator.operator().spatial().weights(), &[1.0]);
    assert_eq!(operator.operator().temporal().weights(), &[2.0]);

    let alpha = 1.0 - 2.0_f64.sqrt() / 2.0;
    let mut local_operator = one_step(Tableau::alexander2());
    local_operator.set_stage(1, 0.0, 1.0).unwrap();
    let mut operator = GridOperator::new(&grid, space, space, local_operator);
    operator.residual(&x, &mut DVector::zeros(2)).unwrap();
    assert_scalar_eq!(operator.operator().spatial().weights()[0], alpha, comp = abs, tol = 1e-14);
    assert_scalar_eq!(operator.operator().spatial().times()[0], alpha, comp = abs, tol = 1e-14);

    operator.operator_mut().set_stage(2, 0.0, 2.0).unwrap();
    operator.residual(&x, &mut DVector::zeros(2)).unwrap();
    assert_scalar_eq!(operator.operator().spatial().weights()[1], 2.0 * alpha, comp = abs, tol = 1e-14);
    assert_eq!(operator.operator().spatial().times()[1], 2.0);
}

#[test]
fn capabilities_drop_skeleton_on_explicit_stages() {
    let mut local_operator = one_step(Tableau::heun());
    // Without a stage, the operator cannot rule out face terms
    assert!(local_operator
        .capabilities()
        .contains(Capability::AlphaSkeleton));

    local_operator.set_stage(1, 0.0, 1.0).unwrap();
    let capabilities = local_operator.capabilities();
    assert!(!capabilities.contains(Capability::AlphaSkeleton));
    assert!(!capabilities.requires_skeleton());
    assert!(capabilities.contains(Capability::AlphaVolume));
    assert!(capabilities.contains(Capability::AlphaBoundary));
    assert!(capabilities.contains(Capability::PatternSkeleton));

    let mut local_operator = one_step(Tableau::crank_nicolson());
    local_operator.set_stage(1, 0.0, 1.0).unwrap();
    let expected = local_operator.spatial().capabilities() | local_operator.temporal().capabilities();
    assert_eq!(local_operator.capabilities(), expected);
}

#[test]
fn pattern_includes_skeleton_links_on_explicit_stages() {
    let grid = create_uniform_interval_grid(3);
    let space = DiscontinuousSpace::new(3, 1);
    let mut local_operator = one_step(Tableau::explicit_euler());
    local_operator.set_stage(1, 0.0, 1.0).unwrap();
    let operator = GridOperator::new(&grid, space, space, local_operator);

    let pattern = operator.create_pattern();
    assert!(pattern.contains(0, 1));
    assert!(pattern.contains(1, 0));
    assert!(pattern.contains(2, 1));
    assert_eq!(pattern.nnz(), 7);

    let spatial = operator.operator().spatial().counts();
    let temporal = operator.operator().temporal().counts();
    assert_eq!(spatial.pattern_volume, 3);
    assert_eq!(spatial.pattern_skeleton, 4);
    assert_eq!(temporal.pattern_volume, 3);
    assert_eq!(temporal.pattern_skeleton, 0);
}

#[test]
fn explicit_schemes_never_evaluate_spatial_faces() {
    let grid = create_uniform_interval_grid(4);
    let space = DiscontinuousSpace::new(4, 1);
    let x = DVector::from_column_slice(&[1.0, -1.0, 2.0, 0.5]);

    for method in [Tableau::heun(), Tableau::shu3()] {
        let stages = method.stages();
        let mut operator = GridOperator::new(&grid, space, space, one_step(method));
        for stage in 1..=stages {
            operator
                .operator_mut()
                .set_stage(stage, 0.0, 0.1)
                .unwrap();
            assert!(!operator.operator().is_implicit().unwrap());
            operator.residual(&x, &mut DVector::zeros(4)).unwrap();
        }
        let spatial = operator.operator().spatial().counts();
        assert_eq!(spatial.face_kernels(), 0);
        assert_eq!(spatial.volume_kernels(), 0);
        assert_eq!(spatial.bind_element, 4 * stages);
    }
}

#[test]
fn stage_coefficients() {
    let tableau = Tableau::<f64>::alexander2();
    let alpha = 1.0 - 2.0_f64.sqrt() / 2.0;
    let coefficients = StageCoefficients::from_method(&tableau, 2);
    assert_scalar_eq!(coefficients.b_rr, alpha, comp = abs, tol = 1e-14);
    assert_eq!(coefficients.d_r, 1.0);
    assert!(coefficients.implicit);

    let coefficients = StageCoefficients::from_method(&Tableau::<f64>::heun(), 2);
    assert_eq!(coefficients.b_rr, 0.0);
    assert!(!coefficients.implicit);

    for stage in 1..=3 {
        assert!(StageCoefficients::from_method(&Tableau::<f64>::fractional_step(), stage).implicit);
    }

    // Below the threshold, a stage counts as explicit
    assert!(!StageCoefficients::from_method(&Tableau::<f64>::one_step_theta(1e-8), 1).implicit);
}

#[test]
fn stage_selection_errors() {
    let mut local_operator = one_step(Tableau::implicit_euler());
    assert!(local_operator.stage().is_none());
    assert!(local_operator.stage_coefficients().is_err());
    assert!(local_operator.is_implicit().is_err());
    assert!(local_operator.set_stage(0, 0.0, 1.0).is_err());
    assert!(local_operator.set_stage(2, 0.0, 1.0).is_err());

    local_operator.set_stage(1, 0.0, 1.0).unwrap();
    assert_eq!(local_operator.stage(), Some(1));
    assert!(local_operator.is_implicit().unwrap());

    local_operator.set_method(Tableau::alexander2());
    assert!(local_operator.stage().is_none());
    local_operator.set_stage(2, 0.0, 1.0).unwrap();

    local_operator.set_settings(OneStepSettings { divide_by_dt: true });
    assert!(local_operator.set_stage(1, 0.0, 0.0).is_err());
}

#[test]
fn assembly_without_stage_is_an_error() {
    let grid = create_uniform_interval_grid(2);
    let space = DiscontinuousSpace::new(2, 1);
    let mut operator = GridOperator::new(&grid, space, space, one_step(Tableau::implicit_euler()));

    let x = DVector::zeros(2);
    assert!(operator.residual(&x, &mut DVector::zeros(2)).is_err());
    assert!(operator
        .jacobian(&x, &mut DMatrix::<f64>::zeros(2, 2))
        .is_err());
}

#[test]
fn kernels_outside_assembly_pass_are_errors() {
    let space = DiscontinuousSpace::new(1, 1);
    let mut lfs = LocalFunctionSpace::new();
    lfs.bind(&space, 0);
    let eg = ElementGeometry {
        element: 0,
        geometry_type: GeometryType::Line,
        index: 0,
    };
    let side = LocalSide {
        lfsu: &lfs,
        lfsv: &lfs,
        x: &[1.0],
    };

    let mut local_operator = one_step(Tableau::implicit_euler());
    local_operator.set_stage(1, 0.0, 1.0).unwrap();
    let mut r = [0.0];
    assert!(local_operator.alpha_volume(&eg, &side, &mut r).is_err());

    local_operator.pre_assembly().unwrap();
    local_operator.alpha_volume(&eg, &side, &mut r).unwrap();
    // Mass 1 plus dt * 2
    assert_eq!(r, [3.0]);
}

#[test]
fn construction_from_config() {
    let json = r#"{ "scheme": { "scheme": "crank_nicolson" }, "settings": { "divide_by_dt": true } }"#;
    let config: OneStepConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.scheme, TimeSteppingScheme::CrankNicolson);
    assert!(config.settings.divide_by_dt);

    let local_operator =
        OneStepLocalOperator::<f64, _, _>::from_config(spatial_operator(), temporal_operator(), &config).unwrap();
    assert_eq!(local_operator.method().name(), "Crank-Nicolson");
    assert!(local_operator.settings().divide_by_dt);

    let config: OneStepConfig = serde_json::from_str(r#"{ "scheme": { "scheme": "heun" } }"#).unwrap();
    assert_eq!(config.settings, OneStepSettings::default());

    let config = OneStepConfig::default();
    let roundtrip: OneStepConfig = serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
    assert_eq!(roundtrip, config);

    let invalid = OneStepConfig {
        scheme: TimeSteppingScheme::OneStepTheta { theta: 2.0 },
        settings: OneStepSettings::default(),
    };
    assert!(OneStepLocalOperator::<f64, _, _>::from_config(spatial_operator(), temporal_operator(), &invalid).is_err());
}

#[test]
fn into_parts_returns_components() {
    let local_operator = one_step(Tableau::shu3());
    let (spatial, temporal, method) = local_operator.into_parts();
    assert_eq!(spatial.counts(), Default::default());
    assert_eq!(temporal.inner().weight(), 1.0);
    assert_eq!(method.name(), "Shu (order 3)");
}
