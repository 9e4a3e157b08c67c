//! # betakit-proto
//!
//! Shared types, error definitions, and traits for the Betakit engine.
//!
//! This crate provides the foundational abstractions used across all Betakit
//! crates, including:
//! - The common error taxonomy
//! - Target descriptors and test/benchmark result shapes
//! - The [`Adapter`] capability trait every target integration implements

mod adapter;
mod error;
mod outcome;
mod target;

pub use adapter::{Adapter, Scenario, ScenarioStep};
pub use error::{Error, Result};
pub use outcome::{BenchmarkSample, ResourceMetrics, TestResult, TestStatus};
pub use target::{Category, TargetDescriptor};
