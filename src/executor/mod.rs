//! Subprocess execution.

mod subprocess;

pub use subprocess::{as_user_spec, CommandRunner, CommandSpec, RunOutput, SystemRunner};
