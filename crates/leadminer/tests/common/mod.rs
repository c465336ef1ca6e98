//! Shared test utilities for leadminer integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring an engine to a scripted provider and a store
//! - Builders for jobs and candidate companies

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
