//! Assembly of constrained finite element grid operators.
//!
//! A [`GridOperator`](assembly::global::GridOperator) traverses a [`Grid`](mesh::Grid), binds local
//! function spaces to each element and each interior face, hands local coefficients to a user
//! supplied [`LocalOperator`](operator::LocalOperator) and scatters the local contributions into
//! global containers. Affine constraints (Dirichlet conditions, hanging nodes) are eliminated
//! while scattering, so the assembled system only acts on unconstrained degrees of freedom.
//!
//! Two local operators can be composed into a single one-step time integration operator with
//! [`OneStepLocalOperator`](assembly::onestep::OneStepLocalOperator), driven by the coefficients
//! of a [`Tableau`](timestepping::Tableau).
use nalgebra::RealField;

pub mod assembly;
pub mod backend;
pub mod constraints;
pub mod mesh;
pub mod operator;
pub mod operators;
pub mod space;
pub mod timestepping;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

/// Scalar type used throughout assembly.
///
/// Used as a trait alias for the traits frequently needed by generic `gridop` routines.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
