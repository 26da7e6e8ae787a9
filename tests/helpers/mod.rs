//! Shared setup and assertion helpers for the tracker integration tests

#![allow(dead_code)]

pub mod assertions;
pub mod setup;
