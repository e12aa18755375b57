//! Shared test utilities for svgpng integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated sessions backed by temp directories
//! - Builders for configurations and SVG documents

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
