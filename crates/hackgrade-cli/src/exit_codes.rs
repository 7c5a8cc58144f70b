//! Process exit codes of the `hackgrade` binary.

pub const SUCCESS: i32 = 0;
/// A submission could not be graded, or a question id is unknown.
pub const GRADING_FAILED: i32 = 1;
/// Invalid configuration, unreadable questions file, or I/O failure.
pub const CONFIG_ERROR: i32 = 2;
/// The model backend or the response parser gave up.
pub const BACKEND_FAILED: i32 = 3;
