use gridop::constraints::{
    back_transform, constrain_residual, copy_constrained_dofs, forward_transform, set_constrained_dofs,
    set_nonconstrained_dofs, AffineConstraints,
};
use gridop::nalgebra::DVector;
use gridop::proptest::single_level_constraints;
use proptest::collection::vec;
use proptest::prelude::*;

/// Dof 1 is the hanging midpoint of dofs 0 and 2.
fn hanging_node_constraints() -> AffineConstraints<f64> {
    let mut constraints = AffineConstraints::new();
    constraints.add_constraint(1, [(0, 0.5), (2, 0.5)]);
    constraints
}

#[test]
fn expansion_of_free_dirichlet_and_constrained_indices() {
    let mut constraints = hanging_node_constraints();
    constraints.add_dirichlet(4);

    assert_eq!(constraints.expand(3).collect::<Vec<_>>(), vec![(3, 1.0)]);
    assert_eq!(constraints.expand(4).count(), 0);
    assert_eq!(constraints.expand(1).collect::<Vec<_>>(), vec![(0, 0.5), (2, 0.5)]);

    assert!(constraints.is_constrained(1));
    assert!(constraints.is_constrained(4));
    assert!(!constraints.is_constrained(0));
    assert_eq!(constraints.len(), 2);
    assert_eq!(constraints.get(4), Some(&[][..]));
    assert_eq!(constraints.constrained_indices().collect::<Vec<_>>(), vec![1, 4]);
}

#[test]
fn later_constraint_replaces_earlier() {
    let mut constraints = hanging_node_constraints();
    constraints.add_dirichlet(1);
    assert_eq!(constraints.len(), 1);
    assert_eq!(constraints.expand(1).count(), 0);
}

#[test]
fn dirichlet_nodes_constrain_all_components() {
    let constraints = AffineConstraints::<f64>::from_dirichlet_nodes([0, 3], 2);
    assert_eq!(constraints.constrained_indices().collect::<Vec<_>>(), vec![0, 1, 6, 7]);
    assert!(constraints.iter().all(|(_, contributors)| contributors.is_empty()));
}

#[test]
fn chained_constraints_are_detected() {
    let mut constraints = AffineConstraints::new();
    constraints.add_constraint(2, [(1, 0.5), (3, 0.5)]);
    constraints.add_constraint(1, [(0, 1.0)]);
    assert_eq!(constraints.chained_constraints(), vec![2]);
    assert!(hanging_node_constraints().chained_constraints().is_empty());
}

#[test]
fn forward_transform_distributes_onto_contributors() {
    let constraints = hanging_node_constraints();

    let mut x = DVector::from_column_slice(&[1.0, 2.0, 3.0]);
    forward_transform(&constraints, &mut x, false);
    assert_eq!(x.as_slice(), &[2.0, 2.0, 4.0]);

    let mut x = DVector::from_column_slice(&[1.0, 2.0, 3.0]);
    forward_transform(&constraints, &mut x, true);
    assert_eq!(x.as_slice(), &[2.0, 0.0, 4.0]);
}

#[test]
fn back_transform_reconstructs_constrained_values() {
    let constraints = hanging_node_constraints();

    let mut x = DVector::from_column_slice(&[1.0, 10.0, 3.0]);
    back_transform(&constraints, &mut x, true);
    assert_eq!(x.as_slice(), &[1.0, 2.0, 3.0]);

    let mut x = DVector::from_column_slice(&[1.0, 10.0, 3.0]);
    back_transform(&constraints, &mut x, false);
    assert_eq!(x.as_slice(), &[1.0, 12.0, 3.0]);
}

#[test]
fn dirichlet_transforms() {
    let constraints = AffineConstraints::<f64>::from_dirichlet_nodes([1], 1);

    let mut x = DVector::from_column_slice(&[1.0, 2.0, 3.0]);
    forward_transform(&constraints, &mut x, false);
    assert_eq!(x.as_slice(), &[1.0, 2.0, 3.0]);
    forward_transform(&constraints, &mut x, true);
    assert_eq!(x.as_slice(), &[1.0, 0.0, 3.0]);

    let mut x = DVector::from_column_slice(&[1.0, 2.0, 3.0]);
    back_transform(&constraints, &mut x, true);
    assert_eq!(x.as_slice(), &[1.0, 0.0, 3.0]);
}

#[test]
fn vector_helpers() {
    let mut constraints = hanging_node_constraints();
    constraints.add_dirichlet(3);

    let mut r = DVector::from_column_slice(&[1.0, 2.0, 3.0, 4.0]);
    constrain_residual(&constraints, &mut r);
    assert_eq!(r.as_slice(), &[1.0, 0.0, 3.0, 0.0]);

    let x = DVector::from_column_slice(&[5.0, 6.0, 7.0, 8.0]);
    let mut y = DVector::zeros(4);
    copy_constrained_dofs(&constraints, &x, &mut y);
    assert_eq!(y.as_slice(), &[0.0, 6.0, 0.0, 8.0]);

    let mut x = DVector::zeros(4);
    set_constrained_dofs(&constraints, 9.0, &mut x);
    assert_eq!(x.as_slice(), &[0.0, 9.0, 0.0, 9.0]);

    set_nonconstrained_dofs(&constraints, -1.0, &mut x);
    assert_eq!(x.as_slice(), &[-1.0, 9.0, -1.0, 9.0]);
}

#[test]
fn constraints_serde_roundtrip() {
    let mut constraints = hanging_node_constraints();
    constraints.add_dirichlet(5);
    let json = serde_json::to_string(&constraints).unwrap();
    let deserialized: AffineConstraints<f64> = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, constraints);
}

proptest! {
    #[test]
    fn empty_constraints_leave_vectors_untouched(values in vec(-10.0..10.0, 0..10)) {
        let constraints = AffineConstraints::new();
        let original = DVector::from_vec(values);

        let mut x = original.clone();
        forward_transform(&constraints, &mut x, true);
        prop_assert_eq!(&x, &original);
        back_transform(&constraints, &mut x, true);
        prop_assert_eq!(&x, &original);
        constrain_residual(&constraints, &mut x);
        prop_assert_eq!(&x, &original);
    }

    #[test]
    fn restricted_forward_transform_zeroes_constrained_entries(
        (constraints, values) in (1..8usize).prop_flat_map(|n| (single_level_constraints(n), vec(-10.0..10.0, n)))
    ) {
        let mut x = DVector::from_vec(values);
        forward_transform(&constraints, &mut x, true);
        for index in constraints.constrained_indices() {
            prop_assert_eq!(x[index], 0.0);
        }
    }

    #[test]
    fn back_transform_satisfies_constraints(
        (constraints, values) in (1..8usize).prop_flat_map(|n| (single_level_constraints(n), vec(-10.0..10.0, n)))
    ) {
        let mut x = DVector::from_vec(values);
        back_transform(&constraints, &mut x, true);
        for (index, contributors) in constraints.iter() {
            let expected: f64 = contributors.iter().map(|&(k, w)| w * x[k]).sum();
            prop_assert!((x[index] - expected).abs() <= 1e-12);
        }
    }
}
