//! Stable exit codes for the `data-pipeline` CLI.

/// Command succeeded.
pub const OK: i32 = 0;
/// Project directory missing, invalid configuration, or a failed action.
pub const INVALID: i32 = 1;
/// Project directory exists but has not been set up (`--setup`).
pub const NOT_SET_UP: i32 = 2;
