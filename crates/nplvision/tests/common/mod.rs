//! Shared test utilities for nplvision integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated batch runs with temp directories
//! - Stub rasterizer, recording content store and scripted recognition
//!   service standing in for poppler and the remote endpoints

pub mod harness;
pub mod stubs;

pub use harness::TestHarness;
pub use stubs::*;
