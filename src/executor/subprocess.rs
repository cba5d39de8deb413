//! Command specification and execution.
//!
//! Commands are described as explicit argument vectors ([`CommandSpec::Exec`])
//! wherever no shell features are needed. The handful of operations that
//! genuinely pipe or background (key import, detached service launches) use
//! the isolated [`CommandSpec::ShellPipeline`] form, which runs the given
//! string under `bash -c`.

use std::process::{Command, Stdio};
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::{CommandErrorKind, SetupError};

/// A command to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// Direct exec with an argument vector; no shell interpretation.
    Exec {
        program: String,
        args: Vec<String>,
        capture: bool,
        sensitive: bool,
    },
    /// A shell pipeline run as `bash -c <command>`.
    ShellPipeline {
        command: String,
        capture: bool,
        sensitive: bool,
    },
}

impl CommandSpec {
    /// Build a direct-exec spec.
    pub fn exec<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Exec {
            program: program.to_string(),
            args: args.into_iter().map(|a| a.as_ref().to_string()).collect(),
            capture: false,
            sensitive: false,
        }
    }

    /// Build a shell pipeline spec.
    pub fn pipeline(command: &str) -> Self {
        Self::ShellPipeline {
            command: command.to_string(),
            capture: false,
            sensitive: false,
        }
    }

    /// Capture stdout/stderr instead of inheriting the console.
    pub fn capture_output(mut self) -> Self {
        match &mut self {
            Self::Exec { capture, .. } | Self::ShellPipeline { capture, .. } => *capture = true,
        }
        self
    }

    /// Mark as containing secrets; arguments are not logged.
    pub fn sensitive(mut self) -> Self {
        match &mut self {
            Self::Exec { sensitive, .. } | Self::ShellPipeline { sensitive, .. } => {
                *sensitive = true
            }
        }
        self
    }

    /// Program name for diagnostics.
    pub fn program(&self) -> &str {
        match self {
            Self::Exec { program, .. } => program,
            Self::ShellPipeline { .. } => "bash",
        }
    }

    fn is_capture(&self) -> bool {
        match self {
            Self::Exec { capture, .. } | Self::ShellPipeline { capture, .. } => *capture,
        }
    }

    fn is_sensitive(&self) -> bool {
        match self {
            Self::Exec { sensitive, .. } | Self::ShellPipeline { sensitive, .. } => *sensitive,
        }
    }
}

/// Result of a completed subprocess.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Whether the command exited with status 0.
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Captured stdout; empty unless capture was requested.
    pub stdout: String,
    /// Captured stderr; empty unless capture was requested.
    pub stderr: String,
}

impl RunOutput {
    /// An all-default successful output, useful in tests.
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            ..Self::default()
        }
    }
}

/// The subprocess seam.
///
/// Controllers and installers go through this trait so tests can substitute
/// a scripted runner; [`SystemRunner`] is the production implementation.
pub trait CommandRunner {
    /// Run a command to completion.
    ///
    /// Returns `Ok` even when the command exits non-zero (`success` is
    /// false); `Err` only when the process could not be spawned at all.
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput, SetupError>;

    /// Whether a named executable exists on the search path.
    fn command_exists(&self, name: &str) -> bool;

    /// Run a command, mapping a non-zero exit to an error.
    fn run_checked(&self, spec: &CommandSpec) -> Result<RunOutput, SetupError> {
        let output = self.run(spec)?;
        if !output.success {
            return Err(SetupError::Command {
                kind: CommandErrorKind::NonZeroExit {
                    program: spec.program().to_string(),
                    code: output.exit_code,
                    stderr: output.stderr.trim().to_string(),
                },
            });
        }
        Ok(output)
    }
}

/// Production runner backed by `std::process::Command`.
///
/// Blocking throughout: every command runs to child exit before returning.
/// There is deliberately no timeout here; only the polling loops bound
/// waiting.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput, SetupError> {
        let mut cmd = match spec {
            CommandSpec::Exec { program, args, .. } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            CommandSpec::ShellPipeline { command, .. } => {
                let mut cmd = Command::new("bash");
                cmd.arg("-c").arg(command);
                cmd
            }
        };

        if spec.is_sensitive() {
            debug!(program = spec.program(), args = "[REDACTED]", "executing subprocess");
        } else {
            debug!(program = spec.program(), spec = ?spec, "executing subprocess");
        }

        let start = Instant::now();
        let result = if spec.is_capture() {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            cmd.output().map(|output| RunOutput {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        } else {
            cmd.status().map(|status| RunOutput {
                success: status.success(),
                exit_code: status.code(),
                stdout: String::new(),
                stderr: String::new(),
            })
        };

        match result {
            Ok(output) => {
                debug!(
                    success = output.success,
                    exit_code = ?output.exit_code,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "subprocess completed"
                );
                Ok(output)
            }
            Err(e) => {
                warn!(program = spec.program(), error = %e, "failed to spawn subprocess");
                Err(SetupError::Command {
                    kind: CommandErrorKind::SpawnFailed {
                        program: spec.program().to_string(),
                        message: e.to_string(),
                    },
                })
            }
        }
    }

    fn command_exists(&self, name: &str) -> bool {
        let Some(paths) = std::env::var_os("PATH") else {
            return false;
        };
        std::env::split_paths(&paths).any(|dir| {
            let candidate = dir.join(name);
            is_executable_file(&candidate)
        })
    }
}

#[cfg(unix)]
fn is_executable_file(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &std::path::Path) -> bool {
    path.is_file()
}

/// Build a run-as-user spec.
///
/// Prefers `runuser -u <user> -- <argv...>`; when runuser is unavailable,
/// falls back to `su - <user> -c "<shell_form>"`, where `shell_form` is the
/// caller-provided single-string rendering of the same command.
pub fn as_user_spec(
    runner: &dyn CommandRunner,
    user: &str,
    argv: Vec<String>,
    shell_form: &str,
) -> CommandSpec {
    if runner.command_exists("runuser") {
        let mut args = vec!["-u".to_string(), user.to_string(), "--".to_string()];
        args.extend(argv);
        CommandSpec::Exec {
            program: "runuser".to_string(),
            args,
            capture: false,
            sensitive: false,
        }
    } else {
        CommandSpec::Exec {
            program: "su".to_string(),
            args: vec![
                "-".to_string(),
                user.to_string(),
                "-c".to_string(),
                shell_form.to_string(),
            ],
            capture: false,
            sensitive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_true() {
        let runner = SystemRunner::new();
        let output = runner.run(&CommandSpec::exec("true", [] as [&str; 0])).unwrap();
        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
    }

    #[test]
    fn test_run_false_is_ok_but_unsuccessful() {
        let runner = SystemRunner::new();
        let output = runner.run(&CommandSpec::exec("false", [] as [&str; 0])).unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(1));
    }

    #[test]
    fn test_run_checked_maps_non_zero_exit() {
        let runner = SystemRunner::new();
        let err = runner
            .run_checked(&CommandSpec::exec("false", [] as [&str; 0]))
            .unwrap_err();
        assert!(matches!(
            err,
            SetupError::Command {
                kind: CommandErrorKind::NonZeroExit { .. }
            }
        ));
    }

    #[test]
    fn test_capture_output() {
        let runner = SystemRunner::new();
        let output = runner
            .run(&CommandSpec::exec("echo", ["hello", "world"]).capture_output())
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello world");
    }

    #[test]
    fn test_pipeline_runs_under_bash() {
        let runner = SystemRunner::new();
        let output = runner
            .run(&CommandSpec::pipeline("echo a | tr a b").capture_output())
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "b");
    }

    #[test]
    fn test_nonexistent_command_is_spawn_error() {
        let runner = SystemRunner::new();
        let err = runner
            .run(&CommandSpec::exec("prootctl-test-nonexistent-cmd", [] as [&str; 0]))
            .unwrap_err();
        assert!(matches!(
            err,
            SetupError::Command {
                kind: CommandErrorKind::SpawnFailed { .. }
            }
        ));
    }

    #[test]
    fn test_command_exists() {
        let runner = SystemRunner::new();
        assert!(runner.command_exists("sh"));
        assert!(!runner.command_exists("prootctl-test-nonexistent-cmd"));
    }

    struct FixedRunner {
        has_runuser: bool,
    }

    impl CommandRunner for FixedRunner {
        fn run(&self, _spec: &CommandSpec) -> Result<RunOutput, SetupError> {
            Ok(RunOutput::ok())
        }

        fn command_exists(&self, name: &str) -> bool {
            name == "runuser" && self.has_runuser
        }
    }

    #[test]
    fn test_as_user_prefers_runuser() {
        let runner = FixedRunner { has_runuser: true };
        let spec = as_user_spec(
            &runner,
            "postgres",
            vec!["pg_ctl".to_string(), "stop".to_string()],
            "'pg_ctl' stop",
        );
        match spec {
            CommandSpec::Exec { program, args, .. } => {
                assert_eq!(program, "runuser");
                assert_eq!(args, vec!["-u", "postgres", "--", "pg_ctl", "stop"]);
            }
            _ => panic!("expected exec spec"),
        }
    }

    #[test]
    fn test_as_user_falls_back_to_su() {
        let runner = FixedRunner { has_runuser: false };
        let spec = as_user_spec(
            &runner,
            "redis",
            vec!["bash".to_string(), "-c".to_string(), "cmd".to_string()],
            "cmd",
        );
        match spec {
            CommandSpec::Exec { program, args, .. } => {
                assert_eq!(program, "su");
                assert_eq!(args, vec!["-", "redis", "-c", "cmd"]);
            }
            _ => panic!("expected exec spec"),
        }
    }
}
