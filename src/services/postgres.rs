//! PostgreSQL controller and installer.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::config::{EnvSnapshot, PostgresConfig};
use crate::error::SetupError;
use crate::executor::{as_user_spec, CommandRunner, CommandSpec};
use crate::output;
use crate::probe::{wait_for, Probe};

use super::{StartOutcome, StopOutcome, POLL_INTERVAL, START_ATTEMPTS, STOP_ATTEMPTS};

/// Locate the bin directory of the newest installed PostgreSQL version.
///
/// Scans the versioned tree (`<root>/<N>/bin`) and takes the highest
/// numeric directory; `None` when no versioned directory exists.
pub fn postgres_bin_dir(root: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(root).ok()?;
    let mut best: Option<u32> = None;
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        if let Ok(version) = entry.file_name().to_string_lossy().parse::<u32>() {
            best = Some(best.map_or(version, |b| b.max(version)));
        }
    }
    best.map(|v| root.join(v.to_string()).join("bin"))
}

/// Status report for `manage postgres status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresStatus {
    pub up: bool,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    pub port: u16,
    /// Connection URL with a redacted password placeholder; only when up.
    pub connection: Option<String>,
}

impl PostgresStatus {
    pub fn print(&self) {
        let state = if self.up { "UP" } else { "DOWN" };
        output::line(&format!("  Status: {}", state));
        output::line(&format!("  Data Dir: {}", self.data_dir.display()));
        output::line(&format!("  Log File: {}", self.log_file.display()));
        output::line(&format!("  Port: {}", self.port));
        if let Some(connection) = &self.connection {
            output::line(&format!("  Connection: {}", connection));
        }
    }
}

/// Lifecycle controller for an already-installed PostgreSQL.
pub struct PostgresController<'a> {
    config: &'a PostgresConfig,
    runner: &'a dyn CommandRunner,
    probe: &'a dyn Probe,
    poll_interval: Duration,
}

impl<'a> PostgresController<'a> {
    pub fn new(
        config: &'a PostgresConfig,
        runner: &'a dyn CommandRunner,
        probe: &'a dyn Probe,
    ) -> Self {
        Self {
            config,
            runner,
            probe,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Override the poll interval (tests).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn is_running(&self) -> bool {
        self.probe.is_open(&self.config.host, self.config.port)
    }

    fn bin_dir(&self) -> Result<PathBuf, SetupError> {
        postgres_bin_dir(&self.config.bin_root).ok_or_else(|| SetupError::Environment {
            message: "PostgreSQL binaries not found. Is it installed?".to_string(),
        })
    }

    pub fn start(&self) -> Result<StartOutcome, SetupError> {
        let bin = self.bin_dir()?;

        if self.is_running() {
            output::success("PostgreSQL is already running (port open).");
            return Ok(StartOutcome::AlreadyRunning);
        }

        output::info(&format!(
            "Starting PostgreSQL from {}...",
            self.config.data_dir.display()
        ));
        let pg_ctl = bin.join("pg_ctl");
        let data = self.config.data_dir.display().to_string();
        let log = self.config.log_file.display().to_string();
        let argv = vec![
            pg_ctl.display().to_string(),
            "-D".to_string(),
            data.clone(),
            "-l".to_string(),
            log.clone(),
            "start".to_string(),
        ];
        let shell_form = format!("'{}' -D '{}' -l '{}' start", pg_ctl.display(), data, log);
        let spec = as_user_spec(self.runner, &self.config.admin_user, argv, &shell_form);
        self.runner.run_checked(&spec)?;

        if wait_for(|| self.is_running(), self.poll_interval, START_ATTEMPTS) {
            output::success("PostgreSQL started successfully.");
            Ok(StartOutcome::Started)
        } else {
            output::failure("PostgreSQL failed to start (timeout). Check logs.");
            Ok(StartOutcome::TimedOut)
        }
    }

    pub fn stop(&self) -> Result<StopOutcome, SetupError> {
        let bin = self.bin_dir()?;

        if !self.is_running() {
            output::success("PostgreSQL is already stopped.");
            return Ok(StopOutcome::AlreadyStopped);
        }

        output::info("Stopping PostgreSQL...");
        let pg_ctl = bin.join("pg_ctl");
        let data = self.config.data_dir.display().to_string();
        let argv = vec![
            pg_ctl.display().to_string(),
            "-D".to_string(),
            data.clone(),
            "stop".to_string(),
        ];
        let shell_form = format!("'{}' -D '{}' stop", pg_ctl.display(), data);
        let spec = as_user_spec(self.runner, &self.config.admin_user, argv, &shell_form);

        // No kill escalation for the database: a forced kill risks data
        // corruption, so a failed pg_ctl stop stays a warning.
        let graceful_ok = match self.runner.run(&spec) {
            Ok(result) => result.success,
            Err(_) => false,
        };
        if !graceful_ok {
            output::warning("pg_ctl stop failed.");
            return Ok(StopOutcome::CommandFailed);
        }

        if wait_for(|| !self.is_running(), self.poll_interval, STOP_ATTEMPTS) {
            output::success("PostgreSQL stopped.");
            Ok(StopOutcome::Stopped)
        } else {
            output::warning("Graceful stop failed or timed out.");
            Ok(StopOutcome::TimedOut)
        }
    }

    pub fn restart(&self) -> Result<StartOutcome, SetupError> {
        // A stop failure must not block the start attempt.
        if let Err(e) = self.stop() {
            output::warning(&format!("Stop failed: {e}"));
        }
        if !self.poll_interval.is_zero() {
            std::thread::sleep(self.poll_interval);
        }
        self.start()
    }

    pub fn status(&self) -> PostgresStatus {
        let up = self.is_running();
        PostgresStatus {
            up,
            data_dir: self.config.data_dir.clone(),
            log_file: self.config.log_file.clone(),
            port: self.config.port,
            connection: up.then(|| {
                format!(
                    "postgresql://{}:<PASS>@{}:{}/postgres",
                    self.config.admin_user, self.config.host, self.config.port
                )
            }),
        }
    }
}

/// One-time installation steps for PostgreSQL.
pub struct PostgresInstaller<'a> {
    config: &'a PostgresConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> PostgresInstaller<'a> {
    pub fn new(config: &'a PostgresConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    pub fn install_packages(&self) -> Result<(), SetupError> {
        if !self.runner.command_exists("apt") {
            return Err(SetupError::Environment {
                message: "apt not found. Ensure you are inside an Ubuntu/Debian proot-distro."
                    .to_string(),
            });
        }

        output::info("Checking/Installing PostgreSQL packages...");
        let _ = self.runner.run(&CommandSpec::exec("apt", ["update"]));
        self.runner
            .run_checked(&CommandSpec::exec(
                "apt",
                ["install", "-y", "postgresql", "postgresql-contrib", "util-linux"],
            ))
            .map_err(|_| SetupError::Install {
                message: "Failed to install PostgreSQL packages via apt.".to_string(),
            })?;
        Ok(())
    }

    /// Create the postgres system account when it does not already exist.
    ///
    /// Best effort: creation failures are tolerated, a missing user will
    /// surface when the first `runuser` invocation fails.
    pub fn ensure_user(&self) {
        output::info(&format!(
            "Ensuring '{}' user exists...",
            self.config.admin_user
        ));
        let check = CommandSpec::exec("id", [self.config.admin_user.as_str()]).capture_output();
        if matches!(self.runner.run(&check), Ok(result) if result.success) {
            debug!(user = %self.config.admin_user, "system user already present");
            return;
        }

        if self.runner.command_exists("adduser") {
            let _ = self.runner.run(&CommandSpec::exec(
                "adduser",
                [
                    "--system",
                    "--group",
                    "--home",
                    "/var/lib/postgresql",
                    "--shell",
                    "/bin/bash",
                    "--no-create-home",
                    self.config.admin_user.as_str(),
                ],
            ));
        } else if self.runner.command_exists("useradd") {
            let _ = self.runner.run(&CommandSpec::exec(
                "useradd",
                [
                    "-r",
                    "-d",
                    "/var/lib/postgresql",
                    "-s",
                    "/bin/bash",
                    "-U",
                    self.config.admin_user.as_str(),
                ],
            ));
        } else {
            output::warning("Could not create postgres user. Proceeding if user exists.");
        }
    }

    /// Prepare data/log directories and run initdb once.
    pub fn init_db(&self, bin: &Path) -> Result<(), SetupError> {
        fs::create_dir_all(&self.config.data_dir)?;
        if let Some(parent) = self.config.log_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let owner = format!("{0}:{0}", self.config.admin_user);
        let data = self.config.data_dir.display().to_string();
        self.runner
            .run_checked(&CommandSpec::exec("chown", ["-R", owner.as_str(), data.as_str()]))?;
        if let Some(parent) = self.config.log_file.parent() {
            let log_dir = parent.display().to_string();
            self.runner.run_checked(&CommandSpec::exec(
                "chown",
                ["-R", owner.as_str(), log_dir.as_str()],
            ))?;
        }

        if self.config.data_dir.join("PG_VERSION").exists() {
            output::info(&format!(
                "Database already initialized at {}",
                self.config.data_dir.display()
            ));
            return Ok(());
        }

        output::info(&format!(
            "Initializing database at {}...",
            self.config.data_dir.display()
        ));
        let initdb = bin.join("initdb");
        let data = self.config.data_dir.display().to_string();
        let argv = vec![
            initdb.display().to_string(),
            "-D".to_string(),
            data.clone(),
        ];
        let shell_form = format!("'{}' -D '{}'", initdb.display(), data);
        let spec = as_user_spec(self.runner, &self.config.admin_user, argv, &shell_form);
        self.runner
            .run_checked(&spec)
            .map_err(|_| SetupError::Install {
                message: "initdb failed.".to_string(),
            })?;
        output::success("initdb finished.");
        Ok(())
    }

    /// Create a superuser role and a database owned by it. Best effort:
    /// both already existing is the common re-run case.
    pub fn create_role_and_db(&self, bin: &Path, role: &str, db: &str) {
        output::info(&format!(
            "Creating DB user '{}' and database '{}'...",
            role, db
        ));
        let createuser = bin.join("createuser");
        let argv = vec![
            createuser.display().to_string(),
            "-s".to_string(),
            role.to_string(),
        ];
        let shell_form = format!("'{}' -s {}", createuser.display(), role);
        let spec = as_user_spec(self.runner, &self.config.admin_user, argv, &shell_form);
        let _ = self.runner.run(&spec);

        let createdb = bin.join("createdb");
        let argv = vec![
            createdb.display().to_string(),
            "-O".to_string(),
            role.to_string(),
            db.to_string(),
        ];
        let shell_form = format!("'{}' -O {} {}", createdb.display(), role, db);
        let spec = as_user_spec(self.runner, &self.config.admin_user, argv, &shell_form);
        let _ = self.runner.run(&spec);
    }
}

/// Full `setup postgres` sequence.
pub fn run_setup(
    config: &PostgresConfig,
    runner: &dyn CommandRunner,
    probe: &dyn Probe,
    env: &EnvSnapshot,
) -> Result<(), SetupError> {
    let installer = PostgresInstaller::new(config, runner);

    installer.install_packages()?;

    let bin = postgres_bin_dir(&config.bin_root).ok_or_else(|| SetupError::Environment {
        message: "Failed to detect PostgreSQL installation after apt install.".to_string(),
    })?;
    let version = bin
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    output::info(&format!("Detected PostgreSQL version: {}", version));

    installer.ensure_user();
    installer.init_db(&bin)?;

    let controller = PostgresController::new(config, runner, probe);
    controller.start()?;

    let fallback = env.get("USER").unwrap_or("root");
    let role = env.get("PG_USER").unwrap_or(fallback).to_string();
    let db = env.get("PG_DB").unwrap_or(&role).to_string();
    installer.create_role_and_db(&bin, &role, &db);

    output::step("Summary");
    output::line(&format!("  Version: {}", version));
    output::line(&format!("  Data Dir: {}", config.data_dir.display()));
    output::line(&format!(
        "  Connection: postgresql://{}:<PASSWORD>@{}:{}/{}",
        role, config.host, config.port, db
    ));
    Ok(())
}
