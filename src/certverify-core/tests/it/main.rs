//! Consolidated integration tests for certverify-core.
//!
//! One test binary keeps proptest suites from running as parallel
//! processes.

mod common;
mod persistence;
mod pipeline;
mod scoring_properties;
