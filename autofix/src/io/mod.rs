//! Side-effecting collaborators of the healing loop.

pub mod backend;
pub mod config;
pub mod confirm;
pub mod environment;
pub mod process;
pub mod prompt;
