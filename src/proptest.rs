//! Strategies for property-based testing with `proptest`.
use crate::constraints::AffineConstraints;
use crate::mesh::{create_rectangular_quad_grid, create_uniform_interval_grid, AdjacencyGrid};
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use nalgebra::DMatrix;

pub fn interval_grid(max_cells: usize) -> impl Strategy<Value = AdjacencyGrid> {
    (0..=max_cells).prop_map(create_uniform_interval_grid)
}

/// Rectangular quadrilateral grids with at most `max_cells_per_dim` cells in each direction.
pub fn rectangular_quad_grid(max_cells_per_dim: usize) -> impl Strategy<Value = AdjacencyGrid> {
    (0..=max_cells_per_dim, 0..=max_cells_per_dim).prop_map(|(nx, ny)| create_rectangular_quad_grid(nx, ny))
}

/// Dense matrices with entries in `[-10, 10)`.
pub fn local_matrix(rows: usize, cols: usize) -> impl Strategy<Value = DMatrix<f64>> {
    nalgebra::proptest::matrix(-10.0..10.0, rows, cols)
}

/// Constraint maps on `num_dofs` degrees of freedom in which no contributor is itself constrained.
///
/// Each degree of freedom is either free, a Dirichlet degree of freedom, or constrained to a
/// weighted sum of up to three free degrees of freedom.
pub fn single_level_constraints(num_dofs: usize) -> impl Strategy<Value = AffineConstraints<f64>> {
    let index_range = 0..num_dofs.max(1);
    let contributors = vec((index_range, -2.0..2.0), 1..=3);
    vec((0..3usize, contributors), num_dofs).prop_map(|choices| {
        let is_free = |k: usize| choices.get(k).map_or(false, |(kind, _)| *kind == 0);
        let mut constraints = AffineConstraints::new();
        for (index, (kind, candidates)) in choices.iter().enumerate() {
            match kind {
                0 => {}
                1 => constraints.add_dirichlet(index),
                _ => {
                    let contributors: Vec<_> = candidates
                        .iter()
                        .copied()
                        .filter(|&(k, _)| is_free(k))
                        .collect();
                    constraints.add_constraint(index, contributors);
                }
            }
        }
        constraints
    })
}
