//! Test doubles for deterministic engine testing.
//!
//! Production code never depends on this module; it exists so the runner,
//! registry, and report paths can be exercised without a real automation
//! backend.

mod mock_adapter;

pub use mock_adapter::{MockAdapter, MockOutcome};
