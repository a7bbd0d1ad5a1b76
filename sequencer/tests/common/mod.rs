//! Common test utilities and infrastructure
//!
//! Shared fixtures, scripted collaborators and a builder used across the
//! sequencer test suites.

#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::TestFixtures;
pub use helpers::{SequencerBuilder, TestHandles, TestHelpers};
