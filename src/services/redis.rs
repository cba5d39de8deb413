//! Redis controller and installer.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::config::RedisConfig;
use crate::error::SetupError;
use crate::executor::{as_user_spec, CommandRunner, CommandSpec};
use crate::output;
use crate::probe::{wait_for, Probe};

use super::{StartOutcome, StopOutcome, POLL_INTERVAL, START_ATTEMPTS, STOP_ATTEMPTS};

/// Render the generated redis.conf content.
pub fn render_config(config: &RedisConfig) -> String {
    let mut content = format!(
        "# Minimal redis.conf generated by prootctl\n\
         bind {bind}\n\
         protected-mode yes\n\
         port {port}\n\
         tcp-backlog 511\n\
         timeout 0\n\
         tcp-keepalive 300\n\
         daemonize no\n\
         supervised no\n\
         pidfile /var/run/redis.pid\n\
         loglevel notice\n\
         logfile {logfile}\n\
         databases 16\n\
         save 900 1\n\
         save 300 10\n\
         save 60 10000\n\
         stop-writes-on-bgsave-error yes\n\
         rdbcompression yes\n\
         rdbchecksum yes\n\
         dir {dir}\n\
         appendonly {appendonly}\n\
         appendfilename \"appendonly.aof\"\n",
        bind = config.host,
        port = config.port,
        logfile = config.log_file.display(),
        dir = config.data_dir.display(),
        appendonly = config.append_only,
    );
    if let Some(password) = &config.password {
        content.push_str(&format!("requirepass {}\n", password));
    }
    content
}

/// Protocol-level health as reported by `redis-cli ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedisHealth {
    Healthy,
    Unresponsive,
    CheckFailed,
}

/// Status report for `manage redis status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisStatus {
    pub up: bool,
    pub conf_path: PathBuf,
    pub port: u16,
    /// Secondary health signal, reported separately from up/down; only
    /// checked when the port is open.
    pub health: Option<RedisHealth>,
    pub url: Option<String>,
}

impl RedisStatus {
    pub fn print(&self) {
        let state = if self.up { "UP" } else { "DOWN" };
        output::line(&format!("  Status: {}", state));
        output::line(&format!("  Config: {}", self.conf_path.display()));
        output::line(&format!("  Port: {}", self.port));
        if let Some(health) = self.health {
            let text = match health {
                RedisHealth::Healthy => "Healthy (PONG)",
                RedisHealth::Unresponsive => "Unresponsive",
                RedisHealth::CheckFailed => "Check Failed",
            };
            output::line(&format!("  Health: {}", text));
        }
        if let Some(url) = &self.url {
            output::line(&format!("  URL: {}", url));
        }
    }
}

/// Lifecycle controller for an already-installed Redis.
pub struct RedisController<'a> {
    config: &'a RedisConfig,
    runner: &'a dyn CommandRunner,
    probe: &'a dyn Probe,
    poll_interval: Duration,
}

impl<'a> RedisController<'a> {
    pub fn new(
        config: &'a RedisConfig,
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

    /// `redis-cli` invocation with port and optional auth.
    fn cli_spec(&self, subcommand: &str) -> CommandSpec {
        let mut args = vec!["-p".to_string(), self.config.port.to_string()];
        let mut sensitive = false;
        if let Some(password) = &self.config.password {
            args.push("-a".to_string());
            args.push(password.clone());
            sensitive = true;
        }
        args.push(subcommand.to_string());
        let spec = CommandSpec::exec("redis-cli", args).capture_output();
        if sensitive {
            spec.sensitive()
        } else {
            spec
        }
    }

    /// Protocol-level readiness: `redis-cli ping` answered PONG.
    fn ping_ok(&self) -> bool {
        match self.runner.run(&self.cli_spec("ping")) {
            Ok(result) => result.success && result.stdout.contains("PONG"),
            Err(_) => false,
        }
    }

    pub fn start(&self) -> Result<StartOutcome, SetupError> {
        if self.is_running() {
            output::success(&format!(
                "Redis is already running on port {}.",
                self.config.port
            ));
            return Ok(StartOutcome::AlreadyRunning);
        }

        if !self.config.conf_path.exists() {
            return Err(SetupError::Install {
                message: format!(
                    "Config file {} not found. Run 'prootctl setup redis' first.",
                    self.config.conf_path.display()
                ),
            });
        }

        output::info(&format!(
            "Starting Redis using {}...",
            self.config.conf_path.display()
        ));
        let pipeline = format!(
            "nohup redis-server '{}' >/dev/null 2>&1 &",
            self.config.conf_path.display()
        );
        let argv = vec!["bash".to_string(), "-c".to_string(), pipeline.clone()];
        let spec = as_user_spec(self.runner, &self.config.run_user, argv, &pipeline);
        self.runner.run_checked(&spec)?;

        if wait_for(|| self.ping_ok(), self.poll_interval, START_ATTEMPTS) {
            output::success("Redis started successfully.");
            Ok(StartOutcome::Started)
        } else {
            output::failure("Redis failed to start (timeout).");
            Ok(StartOutcome::TimedOut)
        }
    }

    pub fn stop(&self) -> Result<StopOutcome, SetupError> {
        if !self.is_running() {
            output::success("Redis is already stopped.");
            return Ok(StopOutcome::AlreadyStopped);
        }

        output::info("Stopping Redis...");
        let mut forced = false;
        match self.runner.run(&self.cli_spec("shutdown")) {
            Ok(result) if result.success => {}
            Ok(result) => {
                output::warning(&format!("Shutdown failed: {}", result.stderr.trim()));
                output::warning("Attempting force kill...");
                let _ = self.runner.run(&CommandSpec::exec("pkill", ["redis-server"]));
                forced = true;
            }
            Err(e) => {
                debug!(error = %e, "redis-cli shutdown could not be spawned");
                output::warning(&format!("Shutdown failed: {e}"));
                output::warning("Attempting force kill...");
                let _ = self.runner.run(&CommandSpec::exec("pkill", ["redis-server"]));
                forced = true;
            }
        }

        if wait_for(|| !self.is_running(), self.poll_interval, STOP_ATTEMPTS) {
            output::success("Redis stopped.");
            Ok(if forced {
                StopOutcome::Forced
            } else {
                StopOutcome::Stopped
            })
        } else {
            output::warning("Graceful stop failed.");
            Ok(StopOutcome::TimedOut)
        }
    }

    pub fn restart(&self) -> Result<StartOutcome, SetupError> {
        if let Err(e) = self.stop() {
            output::warning(&format!("Stop failed: {e}"));
        }
        if !self.poll_interval.is_zero() {
            std::thread::sleep(self.poll_interval);
        }
        self.start()
    }

    pub fn status(&self) -> RedisStatus {
        let up = self.is_running();
        let health = up.then(|| match self.runner.run(&self.cli_spec("ping")) {
            Ok(result) if result.success && result.stdout.contains("PONG") => RedisHealth::Healthy,
            Ok(_) => RedisHealth::Unresponsive,
            Err(_) => RedisHealth::CheckFailed,
        });
        let url = up.then(|| match &self.config.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/0",
                password, self.config.host, self.config.port
            ),
            None => format!("redis://{}:{}/0", self.config.host, self.config.port),
        });
        RedisStatus {
            up,
            conf_path: self.config.conf_path.clone(),
            port: self.config.port,
            health,
            url,
        }
    }
}

/// One-time installation steps for Redis.
pub struct RedisInstaller<'a> {
    config: &'a RedisConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> RedisInstaller<'a> {
    pub fn new(config: &'a RedisConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Install redis-server when its binary is absent.
    pub fn ensure_packages(&self) -> Result<(), SetupError> {
        if self.runner.command_exists("redis-server") {
            output::info("redis-server is already installed.");
            return Ok(());
        }

        output::info("redis-server not found. Installing via apt...");
        let _ = self.runner.run(&CommandSpec::exec("apt", ["update"]));
        self.runner
            .run_checked(&CommandSpec::exec("apt", ["install", "-y", "redis-server"]))
            .map_err(|_| SetupError::Install {
                message: "Failed to install redis-server via apt.".to_string(),
            })?;
        Ok(())
    }

    /// Create the redis system account when it does not already exist.
    pub fn ensure_user(&self) {
        output::info(&format!("Ensuring '{}' user exists...", self.config.run_user));
        let check = CommandSpec::exec("id", [self.config.run_user.as_str()]).capture_output();
        if matches!(self.runner.run(&check), Ok(result) if result.success) {
            return;
        }

        if self.runner.command_exists("adduser") {
            let home = self.config.data_dir.display().to_string();
            let _ = self.runner.run(&CommandSpec::exec(
                "adduser",
                [
                    "--system",
                    "--group",
                    "--home",
                    home.as_str(),
                    self.config.run_user.as_str(),
                ],
            ));
        } else {
            output::warning("Could not create redis user (adduser not found).");
        }
    }

    /// Create the data directory (0700, chowned) and the config directory.
    pub fn prepare_directories(&self) -> Result<(), SetupError> {
        output::info(&format!(
            "Setting up data directory: {}",
            self.config.data_dir.display()
        ));
        fs::create_dir_all(&self.config.data_dir)?;
        let owner = format!("{0}:{0}", self.config.run_user);
        let data = self.config.data_dir.display().to_string();
        let _ = self
            .runner
            .run(&CommandSpec::exec("chown", ["-R", owner.as_str(), data.as_str()]));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.config.data_dir, fs::Permissions::from_mode(0o700))?;
        }
        if let Some(parent) = self.config.conf_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Generate the config file, backing up a pre-existing one to
    /// `<conf>.orig` the first time.
    pub fn write_config(&self) -> Result<(), SetupError> {
        let conf = &self.config.conf_path;
        let backup = PathBuf::from(format!("{}.orig", conf.display()));
        if conf.exists() && !backup.exists() {
            fs::copy(conf, &backup)?;
            debug!(backup = %backup.display(), "backed up existing config");
        }

        output::info(&format!("Generating Redis config at {}...", conf.display()));
        fs::write(conf, render_config(self.config)).map_err(|e| SetupError::Install {
            message: format!("Failed to write config file: {e}"),
        })?;
        Ok(())
    }

    /// Create the log directory and hand it to the redis user.
    pub fn prepare_log_dir(&self) -> Result<(), SetupError> {
        if let Some(parent) = self.config.log_file.parent() {
            fs::create_dir_all(parent)?;
            let owner = format!("{0}:{0}", self.config.run_user);
            let log_dir = parent.display().to_string();
            let _ = self.runner.run(&CommandSpec::exec(
                "chown",
                ["-R", owner.as_str(), log_dir.as_str()],
            ));
        }
        Ok(())
    }
}

/// Full `setup redis` sequence.
pub fn run_setup(
    config: &RedisConfig,
    runner: &dyn CommandRunner,
    probe: &dyn Probe,
) -> Result<(), SetupError> {
    let installer = RedisInstaller::new(config, runner);
    installer.ensure_packages()?;
    installer.ensure_user();
    installer.prepare_directories()?;
    installer.write_config()?;
    installer.prepare_log_dir()?;

    let controller = RedisController::new(config, runner, probe);
    controller.start()?;
    Ok(())
}
