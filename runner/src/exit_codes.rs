//! Stable exit codes for workflow-runner commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Bootstrap, plan, config, or node invocation failed.
pub const FAILED: i32 = 1;
/// `workflow-runner check` found resources that do not resolve.
pub const MISSING_RESOURCES: i32 = 2;
