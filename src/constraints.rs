//! Affine constraints on degrees of freedom.
//!
//! A constrained degree of freedom `c` is expressed as a weighted sum of contributors,
//! `x[c] = sum_k w_k * x[k]`. An empty contributor list denotes a homogeneous Dirichlet
//! condition. Expansion is single-level: contributors that are themselves constrained are not
//! resolved further.
use crate::Real;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from constrained global indices to weighted contributor lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineConstraints<T> {
    map: BTreeMap<usize, Vec<(usize, T)>>,
}

impl<T> Default for AffineConstraints<T> {
    fn default() -> Self {
        Self { map: BTreeMap::new() }
    }
}

impl<T: Real> AffineConstraints<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrains `index` to zero.
    ///
    /// Replaces any previous constraint on `index`.
    pub fn add_dirichlet(&mut self, index: usize) {
        self.map.insert(index, Vec::new());
    }

    /// Constrains `index` to the weighted sum of its contributors.
    ///
    /// Replaces any previous constraint on `index`.
    pub fn add_constraint(&mut self, index: usize, contributors: impl IntoIterator<Item = (usize, T)>) {
        self.map.insert(index, contributors.into_iter().collect());
    }

    /// Dirichlet constraints on every component of the given nodes.
    ///
    /// Node `n` owns the global indices `solution_dim * n .. solution_dim * (n + 1)`, matching
    /// [`ContinuousSpace`](crate::space::ContinuousSpace).
    pub fn from_dirichlet_nodes(nodes: impl IntoIterator<Item = usize>, solution_dim: usize) -> Self {
        let mut constraints = Self::new();
        for node in nodes {
            for component in 0..solution_dim {
                constraints.add_dirichlet(solution_dim * node + component);
            }
        }
        constraints
    }

    pub fn get(&self, index: usize) -> Option<&[(usize, T)]> {
        self.map.get(&index).map(Vec::as_slice)
    }

    pub fn is_constrained(&self, index: usize) -> bool {
        self.map.contains_key(&index)
    }

    /// Number of constrained degrees of freedom.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Constrained indices and their contributors, in increasing order of the constrained index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[(usize, T)])> {
        self.map
            .iter()
            .map(|(&index, contributors)| (index, contributors.as_slice()))
    }

    pub fn constrained_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.map.keys().copied()
    }

    /// Expands a global index into the indices it stands for, with weights.
    ///
    /// An unconstrained index yields itself with weight one. A constrained index yields its
    /// contributors, which is nothing at all for a Dirichlet constraint.
    pub fn expand(&self, index: usize) -> Expansion<'_, T> {
        match self.map.get(&index) {
            Some(contributors) => Expansion::Constrained(contributors.iter()),
            None => Expansion::Unconstrained(Some(index)),
        }
    }

    /// Returns the constrained indices that have at least one constrained contributor.
    ///
    /// Such chains are not resolved by [`expand`](Self::expand).
    pub fn chained_constraints(&self) -> Vec<usize> {
        self.map
            .iter()
            .filter(|(_, contributors)| contributors.iter().any(|(k, _)| self.map.contains_key(k)))
            .map(|(&index, _)| index)
            .collect()
    }
}

/// Iterator over the weighted expansion of a single global index.
#[derive(Debug, Clone)]
pub enum Expansion<'a, T> {
    Unconstrained(Option<usize>),
    Constrained(std::slice::Iter<'a, (usize, T)>),
}

impl<'a, T: Real> Iterator for Expansion<'a, T> {
    type Item = (usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Unconstrained(index) => index.take().map(|i| (i, T::one())),
            Self::Constrained(contributors) => contributors.next().copied(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Self::Unconstrained(index) => {
                let n = usize::from(index.is_some());
                (n, Some(n))
            }
            Self::Constrained(contributors) => contributors.size_hint(),
        }
    }
}

/// Zeroes every constrained entry of a residual vector.
pub fn constrain_residual<T: Real>(constraints: &AffineConstraints<T>, residual: &mut DVector<T>) {
    for index in constraints.constrained_indices() {
        residual[index] = T::zero();
    }
}

/// Copies the constrained entries of `x` into `y`.
pub fn copy_constrained_dofs<T: Real>(constraints: &AffineConstraints<T>, x: &DVector<T>, y: &mut DVector<T>) {
    for index in constraints.constrained_indices() {
        y[index] = x[index];
    }
}

pub fn set_constrained_dofs<T: Real>(constraints: &AffineConstraints<T>, value: T, x: &mut DVector<T>) {
    for index in constraints.constrained_indices() {
        x[index] = value;
    }
}

pub fn set_nonconstrained_dofs<T: Real>(constraints: &AffineConstraints<T>, value: T, x: &mut DVector<T>) {
    for (i, entry) in x.iter_mut().enumerate() {
        if !constraints.is_constrained(i) {
            *entry = value;
        }
    }
}

/// Distributes constrained entries onto their contributors.
///
/// For every constrained index `c` with contributors `(k, w)`, adds `w * x[c]` to `x[k]`. If
/// `post_restrict` is set, all constrained entries are zeroed afterwards.
pub fn forward_transform<T: Real>(constraints: &AffineConstraints<T>, x: &mut DVector<T>, post_restrict: bool) {
    for (c, contributors) in constraints.iter() {
        for &(k, w) in contributors {
            let value = x[c];
            x[k] += w * value;
        }
    }

    if post_restrict {
        set_constrained_dofs(constraints, T::zero(), x);
    }
}

/// Reconstructs constrained entries from their contributors.
///
/// For every constrained index `c` with contributors `(k, w)`, adds `w * x[k]` to `x[c]`. If
/// `pre_restrict` is set, `x[c]` is zeroed before accumulating.
pub fn back_transform<T: Real>(constraints: &AffineConstraints<T>, x: &mut DVector<T>, pre_restrict: bool) {
    for (c, contributors) in constraints.iter() {
        if pre_restrict {
            x[c] = T::zero();
        }
        for &(k, w) in contributors {
            let value = x[k];
            x[c] += w * value;
        }
    }
}
