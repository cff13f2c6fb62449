//! Global traversal, constraint elimination and one-step composition.
pub mod global;
pub mod onestep;
