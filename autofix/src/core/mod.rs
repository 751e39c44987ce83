//! Deterministic, pure logic shared by the self-healing engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod extract;
pub mod remediation;
pub mod safety;
pub mod types;
