use gridop::mesh::create_uniform_interval_grid;
use gridop::nalgebra::DVector;
use gridop::space::{ContinuousSpace, DiscontinuousSpace, DofTableSpace, FunctionSpace, LocalFunctionSpace};

fn element_dofs<S: FunctionSpace>(space: &S, element: usize) -> Vec<usize> {
    let mut dofs = vec![0; space.element_dof_count(element)];
    space.populate_element_dofs(&mut dofs, element);
    dofs
}

#[test]
fn discontinuous_space_blocks() {
    let space = DiscontinuousSpace::qk(4, 1, 2);
    assert_eq!(space.dofs_per_element(), 4);
    assert_eq!(space.global_size(), 16);
    assert_eq!(element_dofs(&space, 2), vec![8, 9, 10, 11]);

    assert_eq!(DiscontinuousSpace::qk(3, 2, 1).dofs_per_element(), 3);
    assert_eq!(DiscontinuousSpace::qk(3, 0, 3).dofs_per_element(), 1);
    assert_eq!(DiscontinuousSpace::qk(1, 2, 3).global_size(), 27);
}

#[test]
fn continuous_space_interleaves_components() {
    let grid = create_uniform_interval_grid(3);
    let space = ContinuousSpace::new(&grid, 2);
    assert_eq!(space.global_size(), 8);
    assert_eq!(space.element_dof_count(1), 4);
    assert_eq!(element_dofs(&space, 1), vec![2, 3, 4, 5]);

    let scalar = ContinuousSpace::new(&grid, 1);
    assert_eq!(element_dofs(&scalar, 2), vec![2, 3]);
}

#[test]
fn dof_table_space() {
    let space = DofTableSpace::try_new(3, vec![vec![0, 1], vec![2]]).unwrap();
    assert_eq!(space.global_size(), 3);
    assert_eq!(element_dofs(&space, 0), vec![0, 1]);
    assert_eq!(element_dofs(&space, 1), vec![2]);

    assert!(DofTableSpace::try_new(2, vec![vec![0, 2]]).is_err());
}

#[test]
fn local_function_space_bind_read_add() {
    let space = DofTableSpace::try_new(4, vec![vec![3, 1], vec![0]]).unwrap();
    let mut lfs = LocalFunctionSpace::new();
    assert!(!lfs.is_bound());
    assert_eq!(lfs.size(), 0);

    lfs.bind(&space, 0);
    assert_eq!(lfs.element(), Some(0));
    assert_eq!(lfs.size(), 2);
    assert_eq!(lfs.global_index(0), 3);
    assert_eq!(lfs.global_indices(), &[3, 1]);

    let x = DVector::from_column_slice(&[10.0, 11.0, 12.0, 13.0]);
    let mut local = vec![99.0; 5];
    lfs.read(&x, &mut local);
    assert_eq!(local, vec![13.0, 11.0]);

    let mut y = DVector::from_element(4, 1.0);
    lfs.add(&[2.0, 3.0], &mut y);
    assert_eq!(y.as_slice(), &[1.0, 4.0, 1.0, 3.0]);

    // Rebinding replaces the previous element
    lfs.bind(&space, 1);
    assert_eq!(lfs.global_indices(), &[0]);

    lfs.unbind();
    assert!(!lfs.is_bound());
    assert_eq!(lfs.size(), 0);
}

#[test]
#[should_panic]
fn local_function_space_add_rejects_wrong_size() {
    let space = DiscontinuousSpace::new(2, 2);
    let mut lfs = LocalFunctionSpace::new();
    lfs.bind(&space, 1);
    let mut y = DVector::zeros(4);
    lfs.add(&[1.0], &mut y);
}
