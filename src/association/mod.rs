//! Data association
//!
//! This module provides:
//! - [`gating`] - Detection screening and gated cost matrices
//! - [`associator`] - Per-frame global-nearest-neighbour association
//! - [`hungarian`] - Hungarian algorithm for assignment

pub mod associator;
pub mod gating;

pub use crate::common::association::hungarian;

pub use associator::{AssociationOutcome, Associator, Match, Rejection};
pub use gating::RejectReason;
