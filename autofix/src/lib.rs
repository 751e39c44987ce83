//! Self-healing command execution.
//!
//! `autofix` runs a shell command, and when it fails, classifies the failure,
//! proposes a remediation (deterministic rule first, suggestion backend
//! second), gates it through a safety validator and operator confirmation,
//! applies it, and retries a bounded number of times. The architecture keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (classification, rule fixes,
//!   safety verdicts, JSON extraction). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (process execution, environment
//!   probing, config files, the HTTP backend, terminal prompts). Each sits
//!   behind a trait so tests can substitute scripted doubles.
//!
//! [`heal`] drives the loop; [`resolve`] picks a candidate for one failure.

pub mod core;
pub mod exit_codes;
pub mod heal;
pub mod io;
pub mod logging;
pub mod resolve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
