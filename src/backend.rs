//! Global containers addressed by point access.
//!
//! The assemblers never assume a storage layout. Matrices are accessed through
//! [`MatrixBackend`], sparsity patterns are accumulated through [`PatternBackend`].
use crate::Real;
use eyre::{bail, eyre};
use nalgebra::DMatrix;
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::{CsrMatrix, SparseEntry, SparseEntryMut};
use std::collections::BTreeSet;

/// Point access to a global matrix.
pub trait MatrixBackend<T> {
    fn nrows(&self) -> usize;

    fn ncols(&self) -> usize;

    /// Returns the value at `(row, col)`, which is zero for entries outside the storage.
    fn get(&self, row: usize, col: usize) -> T;

    /// Adds `value` to the entry at `(row, col)`.
    ///
    /// Returns an error if the entry has no storage, as happens when a sparse matrix was allocated
    /// with a pattern that does not contain `(row, col)`.
    fn add_to_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()>;

    fn set_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()>;

    /// Sets all stored entries in the given row to zero.
    fn clear_row(&mut self, row: usize);
}

impl<T: Real> MatrixBackend<T> for DMatrix<T> {
    fn nrows(&self) -> usize {
        self.shape().0
    }

    fn ncols(&self) -> usize {
        self.shape().1
    }

    fn get(&self, row: usize, col: usize) -> T {
        self[(row, col)]
    }

    fn add_to_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()> {
        self[(row, col)] += value;
        Ok(())
    }

    fn set_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()> {
        self[(row, col)] = value;
        Ok(())
    }

    fn clear_row(&mut self, row: usize) {
        self.row_mut(row).fill(T::zero());
    }
}

fn csr_entry_mut<T>(matrix: &mut CsrMatrix<T>, row: usize, col: usize) -> eyre::Result<&mut T> {
    let (nrows, ncols) = (matrix.nrows(), matrix.ncols());
    match matrix.get_entry_mut(row, col) {
        Some(SparseEntryMut::NonZero(value)) => Ok(value),
        Some(SparseEntryMut::Zero) => Err(eyre!(
            "entry ({}, {}) is not part of the sparsity pattern of the matrix",
            row,
            col
        )),
        None => Err(eyre!(
            "entry ({}, {}) is out of bounds for a {}x{} matrix",
            row,
            col,
            nrows,
            ncols
        )),
    }
}

impl<T: Real> MatrixBackend<T> for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        CsrMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        CsrMatrix::ncols(self)
    }

    fn get(&self, row: usize, col: usize) -> T {
        match self.get_entry(row, col) {
            Some(SparseEntry::NonZero(value)) => *value,
            Some(SparseEntry::Zero) => T::zero(),
            None => panic!(
                "entry ({}, {}) is out of bounds for a {}x{} matrix",
                row,
                col,
                self.nrows(),
                self.ncols()
            ),
        }
    }

    fn add_to_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()> {
        *csr_entry_mut(self, row, col)? += value;
        Ok(())
    }

    fn set_entry(&mut self, row: usize, col: usize, value: T) -> eyre::Result<()> {
        *csr_entry_mut(self, row, col)? = value;
        Ok(())
    }

    fn clear_row(&mut self, row: usize) {
        self.row_mut(row).values_mut().fill(T::zero());
    }
}

/// Accumulates the `(row, col)` links of a global sparsity pattern.
pub trait PatternBackend {
    /// Inserts a link. Inserting a link that is already present has no effect.
    fn add_link(&mut self, row: usize, col: usize);
}

/// Builds a CSR sparsity pattern from individually inserted links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparsityPatternBuilder {
    nrows: usize,
    ncols: usize,
    links: BTreeSet<(usize, usize)>,
}

impl SparsityPatternBuilder {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            links: BTreeSet::new(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.links.contains(&(row, col))
    }

    /// Number of distinct links.
    pub fn nnz(&self) -> usize {
        self.links.len()
    }

    /// Links in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.links.iter().copied()
    }

    /// Returns an error if any link lies outside the `nrows x ncols` bounds.
    pub fn build(&self) -> eyre::Result<SparsityPattern> {
        let mut offsets = Vec::with_capacity(self.nrows + 1);
        let mut column_indices = Vec::with_capacity(self.links.len());
        offsets.push(0);

        let mut current_row = 0;
        for &(i, j) in &self.links {
            if i >= self.nrows || j >= self.ncols {
                bail!(
                    "link ({}, {}) is out of bounds for a {}x{} pattern",
                    i,
                    j,
                    self.nrows,
                    self.ncols
                );
            }

            while i > current_row {
                offsets.push(column_indices.len());
                current_row += 1;
            }
            // Links are sorted and unique, so columns within a row are strictly increasing
            column_indices.push(j);
        }

        // Fill out offsets for remaining empty rows
        while offsets.len() < self.nrows + 1 {
            offsets.push(column_indices.len());
        }

        SparsityPattern::try_from_offsets_and_indices(self.nrows, self.ncols, offsets, column_indices)
            .map_err(|err| eyre!("failed to construct sparsity pattern: {}", err))
    }

    /// Allocates a CSR matrix with explicitly stored zeros at every link.
    pub fn build_csr<T: Real>(&self) -> eyre::Result<CsrMatrix<T>> {
        let pattern = self.build()?;
        let nnz = pattern.nnz();
        CsrMatrix::try_from_pattern_and_values(pattern, vec![T::zero(); nnz])
            .map_err(|err| eyre!("failed to construct CSR matrix: {}", err))
    }
}

impl PatternBackend for SparsityPatternBuilder {
    fn add_link(&mut self, row: usize, col: usize) {
        self.links.insert((row, col));
    }
}

impl PatternBackend for BTreeSet<(usize, usize)> {
    fn add_link(&mut self, row: usize, col: usize) {
        self.insert((row, col));
    }
}
