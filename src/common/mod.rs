//! Common utilities shared by the pipeline stages.
//!
//! This module contains the assignment solver, linear algebra helpers and
//! synthetic scenario generation used by tests and benchmarks.

pub mod association;
pub mod ground_truth;
pub mod linalg;
