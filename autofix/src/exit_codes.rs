//! Stable exit codes for the `autofix` CLI.
//!
//! A failed run that is not blocked exits with the final command's own exit
//! code, so only the codes autofix itself decides are listed here.

/// The command succeeded, possibly after fixes; or a subcommand completed.
pub const OK: i32 = 0;
/// Autofix could not run: bad config, unreadable terminal, spawn failure.
pub const ERROR: i32 = 1;
/// The command or a proposed fix matched the destructive-command block list.
pub const BLOCKED: i32 = 2;
