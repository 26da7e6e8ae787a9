//! Assignment algorithms
pub mod hungarian;
