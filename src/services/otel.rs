//! OpenTelemetry Collector controller and installer.
//!
//! The collector ships no distribution package, so setup fetches a
//! versioned release archive itself: download, optional checksum, extract,
//! install, generate the pipeline config, validate it with the binary, and
//! drop a bootstrap marker to make re-runs no-ops.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::artifact;
use crate::config::OtelConfig;
use crate::error::{ArtifactErrorKind, SetupError};
use crate::executor::{CommandRunner, CommandSpec};
use crate::output;
use crate::probe::{wait_for, Probe};

use super::{SetupOutcome, StartOutcome, StopOutcome, POLL_INTERVAL, START_ATTEMPTS, STOP_ATTEMPTS};

/// Platform identifier used when the architecture is unknown.
pub const FALLBACK_PLATFORM: &str = "linux_amd64";

/// Map a CPU architecture string to a release platform identifier.
pub fn map_architecture(machine: &str) -> Option<&'static str> {
    match machine {
        "x86_64" | "amd64" => Some("linux_amd64"),
        "aarch64" | "arm64" => Some("linux_arm64"),
        "armv7l" | "armv7" => Some("linux_armv7"),
        "i686" | "i386" => Some("linux_386"),
        _ => None,
    }
}

/// Fixed pipeline configuration: otlp receiver, batch processor, debug
/// exporter, diagnostic extensions, and a prometheus self-metrics reader.
const PIPELINE_CONFIG: &str = "\
receivers:
  otlp:
    protocols:
      grpc:
      http:

processors:
  batch:

exporters:
  debug:
    verbosity: detailed

extensions:
  health_check:
  pprof:
  zpages:

service:
  extensions: [health_check, pprof, zpages]
  pipelines:
    traces:
      receivers: [otlp]
      processors: [batch]
      exporters: [debug]
    metrics:
      receivers: [otlp]
      processors: [batch]
      exporters: [debug]
    logs:
      receivers: [otlp]
      processors: [batch]
      exporters: [debug]
  telemetry:
    metrics:
      level: detailed
      readers:
        - pull:
            exporter:
              prometheus:
                host: 0.0.0.0
                port: 8888
";

/// Status report for `manage otel status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtelStatus {
    /// Metrics port open AND binary present.
    pub up: bool,
    pub binary_present: bool,
    pub binary_path: PathBuf,
    pub config_path: PathBuf,
    pub port: u16,
}

impl OtelStatus {
    pub fn print(&self) {
        let state = if self.up { "UP" } else { "DOWN" };
        output::line(&format!("  Status: {}", state));
        output::line(&format!(
            "  Binary: {} ({})",
            self.binary_path.display(),
            if self.binary_present { "present" } else { "missing" }
        ));
        output::line(&format!("  Config: {}", self.config_path.display()));
        output::line(&format!("  Metrics Port: {}", self.port));
    }
}

/// Lifecycle controller for an installed collector.
pub struct OtelController<'a> {
    config: &'a OtelConfig,
    runner: &'a dyn CommandRunner,
    probe: &'a dyn Probe,
    poll_interval: Duration,
}

impl<'a> OtelController<'a> {
    pub fn new(config: &'a OtelConfig, runner: &'a dyn CommandRunner, probe: &'a dyn Probe) -> Self {
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

    fn port_open(&self) -> bool {
        self.probe.is_open(&self.config.host, self.config.metrics_port)
    }

    /// Running means the metrics port answers AND the binary is present.
    fn is_running(&self) -> bool {
        self.port_open() && self.config.binary_path.exists()
    }

    pub fn start(&self) -> Result<StartOutcome, SetupError> {
        if self.is_running() {
            output::success(&format!(
                "Collector is already running on port {}.",
                self.config.metrics_port
            ));
            return Ok(StartOutcome::AlreadyRunning);
        }

        if !self.config.binary_path.exists() {
            return Err(SetupError::Install {
                message: format!(
                    "Collector binary not found at {}. Run 'prootctl setup otel' first.",
                    self.config.binary_path.display()
                ),
            });
        }
        if !self.config.config_path.exists() {
            return Err(SetupError::Install {
                message: format!(
                    "Collector config not found at {}. Run 'prootctl setup otel' first.",
                    self.config.config_path.display()
                ),
            });
        }

        output::info(&format!(
            "Starting collector using {}...",
            self.config.config_path.display()
        ));
        let pipeline = format!(
            "nohup '{}' --config '{}' >/dev/null 2>&1 &",
            self.config.binary_path.display(),
            self.config.config_path.display()
        );
        self.runner.run_checked(&CommandSpec::pipeline(&pipeline))?;

        if wait_for(|| self.port_open(), self.poll_interval, START_ATTEMPTS) {
            output::success("Collector started successfully.");
            Ok(StartOutcome::Started)
        } else {
            output::failure("Collector failed to start (timeout). Check the metrics port.");
            Ok(StartOutcome::TimedOut)
        }
    }

    pub fn stop(&self) -> Result<StopOutcome, SetupError> {
        if !self.port_open() {
            output::success("Collector is already stopped.");
            return Ok(StopOutcome::AlreadyStopped);
        }

        output::info("Stopping collector...");
        let graceful = CommandSpec::exec("pkill", [self.config.binary_name.as_str()]);
        let mut forced = false;
        let graceful_ok = match self.runner.run(&graceful) {
            Ok(result) => result.success,
            Err(_) => false,
        };
        if !graceful_ok {
            output::warning("Graceful shutdown failed. Attempting force kill...");
            let _ = self.runner.run(&CommandSpec::exec(
                "pkill",
                ["-9", self.config.binary_name.as_str()],
            ));
            forced = true;
        }

        if wait_for(|| !self.port_open(), self.poll_interval, STOP_ATTEMPTS) {
            if forced {
                output::success("Collector stopped (forced).");
                Ok(StopOutcome::Forced)
            } else {
                output::success("Collector stopped.");
                Ok(StopOutcome::Stopped)
            }
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

    pub fn status(&self) -> OtelStatus {
        let binary_present = self.config.binary_path.exists();
        OtelStatus {
            up: self.port_open() && binary_present,
            binary_present,
            binary_path: self.config.binary_path.clone(),
            config_path: self.config.config_path.clone(),
            port: self.config.metrics_port,
        }
    }
}

/// One-time installation of the collector.
pub struct OtelInstaller<'a> {
    config: &'a OtelConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> OtelInstaller<'a> {
    pub fn new(config: &'a OtelConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Run the full installer sequence.
    pub fn run(&self) -> Result<SetupOutcome, SetupError> {
        if self.config.marker_path.exists() && !self.config.force_update {
            output::success("Bootstrap already done (use OTEL_FORCE_UPDATE=1 to force).");
            return Ok(SetupOutcome::AlreadyDone);
        }

        if !self.runner.command_exists("apt") {
            return Err(SetupError::Environment {
                message: "apt not found. Ensure you are inside an Ubuntu/Debian proot-distro."
                    .to_string(),
            });
        }

        self.install_dependencies()?;
        let platform = self.resolve_platform();
        self.ensure_binary(&platform)?;
        self.write_pipeline_config()?;
        self.validate_config()?;

        fs::File::create(&self.config.marker_path)?;
        debug!(marker = %self.config.marker_path.display(), "bootstrap marker created");

        output::step("Summary");
        output::line(&format!("  Binary: {}", self.config.binary_path.display()));
        output::line(&format!("  Config: {}", self.config.config_path.display()));
        output::line("  To start, run: prootctl manage otel start");
        Ok(SetupOutcome::Completed)
    }

    /// Install OS-level download/archive dependencies.
    pub fn install_dependencies(&self) -> Result<(), SetupError> {
        output::info("Updating apt and installing dependencies...");
        let _ = self.runner.run(&CommandSpec::exec("apt", ["update"]));
        self.runner
            .run_checked(&CommandSpec::exec(
                "apt",
                ["install", "-y", "wget", "curl", "tar", "ca-certificates", "coreutils"],
            ))
            .map_err(|_| SetupError::Install {
                message: "Failed to install dependencies.".to_string(),
            })?;
        Ok(())
    }

    /// Resolve the release platform identifier for the configured machine,
    /// falling back with a single warning on unknown architectures.
    pub fn resolve_platform(&self) -> String {
        match map_architecture(&self.config.machine) {
            Some(platform) => platform.to_string(),
            None => {
                output::warning(&format!(
                    "Unknown arch '{}' - defaulting to {}",
                    self.config.machine, FALLBACK_PLATFORM
                ));
                FALLBACK_PLATFORM.to_string()
            }
        }
    }

    /// Release archive URL for a platform identifier.
    pub fn release_url(&self, platform: &str) -> String {
        format!(
            "https://github.com/open-telemetry/opentelemetry-collector-releases/releases/download/v{version}/otelcol-contrib_{version}_{platform}.tar.gz",
            version = self.config.version,
            platform = platform,
        )
    }

    /// Download and install the collector binary unless it is already in
    /// place and no update was forced.
    pub fn ensure_binary(&self, platform: &str) -> Result<(), SetupError> {
        if self.config.binary_path.exists() && !self.config.force_update {
            output::info(&format!(
                "Existing binary found at {}",
                self.config.binary_path.display()
            ));
            return Ok(());
        }

        let url = self.release_url(platform);
        output::info(&format!("Downloading {}...", url));
        let bytes = artifact::download(&url)?;

        let staging = tempfile::tempdir()?;
        self.install_payload(&bytes, staging.path())?;
        output::success(&format!(
            "Installed collector binary -> {}",
            self.config.binary_path.display()
        ));
        Ok(())
    }

    /// Verify, extract, locate, and install a downloaded archive payload.
    ///
    /// A checksum mismatch aborts before any extraction happens.
    pub fn install_payload(
        &self,
        bytes: &[u8],
        staging: &std::path::Path,
    ) -> Result<PathBuf, SetupError> {
        if let Some(expected) = &self.config.expected_sha256 {
            output::info("Verifying SHA256 checksum...");
            artifact::verify_sha256(bytes, expected)?;
            output::success("Checksum OK.");
        }

        output::info("Extracting archive...");
        artifact::extract_tar_gz(bytes, staging)?;

        let found = artifact::find_file(staging, &self.config.binary_name).ok_or_else(|| {
            SetupError::Artifact {
                kind: ArtifactErrorKind::BinaryNotFound {
                    name: self.config.binary_name.clone(),
                },
            }
        })?;
        artifact::install_binary(&found, &self.config.binary_path)?;
        Ok(self.config.binary_path.clone())
    }

    /// Write the fixed pipeline configuration.
    pub fn write_pipeline_config(&self) -> Result<(), SetupError> {
        output::info(&format!(
            "Generating config at {}...",
            self.config.config_path.display()
        ));
        fs::write(&self.config.config_path, PIPELINE_CONFIG)?;
        Ok(())
    }

    /// Run the binary's built-in validate mode against the generated config.
    pub fn validate_config(&self) -> Result<(), SetupError> {
        output::info("Validating config...");
        let binary = self.config.binary_path.display().to_string();
        let conf = self.config.config_path.display().to_string();
        let spec = CommandSpec::exec(&binary, ["--config", conf.as_str(), "validate"]);
        match self.runner.run(&spec) {
            Ok(result) if result.success => {
                output::success("Config validated OK");
                Ok(())
            }
            _ => Err(SetupError::Artifact {
                kind: ArtifactErrorKind::CollectorConfigRejected,
            }),
        }
    }
}
