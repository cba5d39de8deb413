//! Service controllers, installers, and facade entry points.
//!
//! One module per service. Each facade composes the operation lock,
//! configuration resolution, and an installer or controller; calls are
//! independent of each other.

pub mod gcloud;
pub mod otel;
pub mod postgres;
pub mod redis;

use std::time::Duration;

use crate::cli::Action;
use crate::config::{EnvSnapshot, GcloudConfig, OtelConfig, PostgresConfig, RedisConfig};
use crate::error::SetupError;
use crate::executor::SystemRunner;
use crate::lock::ProcessLock;
use crate::output;
use crate::probe::TcpProbe;

/// Readiness poll budget after a start command.
pub const START_ATTEMPTS: u32 = 15;
/// Shutdown poll budget after a stop command.
pub const STOP_ATTEMPTS: u32 = 10;
/// Interval between poll attempts; also the pause inside restart.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The probe already reported the service listening; nothing launched.
    AlreadyRunning,
    /// Launched and confirmed listening within the poll budget.
    Started,
    /// Launched but the poll budget ran out; reported, not fatal.
    TimedOut,
}

/// Outcome of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The probe already reported the service down; nothing issued.
    AlreadyStopped,
    /// Graceful stop confirmed within the poll budget.
    Stopped,
    /// Stopped only after escalating to a forced kill.
    Forced,
    /// Stop was issued but the port never closed within budget.
    TimedOut,
    /// The graceful stop command itself failed; no escalation was attempted.
    CommandFailed,
}

/// Outcome of an installer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// A bootstrap marker suppressed the run.
    AlreadyDone,
    Completed,
}

pub fn setup_postgres(env: &EnvSnapshot) -> Result<(), SetupError> {
    let _lock = ProcessLock::acquire("postgres_setup")?;
    output::step("PostgreSQL Setup");
    let config = PostgresConfig::resolve_setup(env)?;
    let runner = SystemRunner::new();
    let probe = TcpProbe::default();
    postgres::run_setup(&config, &runner, &probe, env)
}

pub fn manage_postgres(env: &EnvSnapshot, action: Action) -> Result<(), SetupError> {
    let _lock = ProcessLock::acquire("postgres_manage")?;
    output::step(&format!("PostgreSQL {}", action.title()));
    let config = PostgresConfig::resolve(env)?;
    let runner = SystemRunner::new();
    let probe = TcpProbe::default();
    let controller = postgres::PostgresController::new(&config, &runner, &probe);
    match action {
        Action::Start => {
            controller.start()?;
        }
        Action::Stop => {
            controller.stop()?;
        }
        Action::Restart => {
            controller.restart()?;
        }
        Action::Status => controller.status().print(),
    }
    Ok(())
}

pub fn setup_redis(env: &EnvSnapshot) -> Result<(), SetupError> {
    let _lock = ProcessLock::acquire("redis_setup")?;
    output::step("Redis Setup");
    let config = RedisConfig::resolve(env)?;
    let runner = SystemRunner::new();
    let probe = TcpProbe::default();
    redis::run_setup(&config, &runner, &probe)
}

pub fn manage_redis(env: &EnvSnapshot, action: Action) -> Result<(), SetupError> {
    let _lock = ProcessLock::acquire("redis_manage")?;
    output::step(&format!("Redis {}", action.title()));
    let config = RedisConfig::resolve(env)?;
    let runner = SystemRunner::new();
    let probe = TcpProbe::default();
    let controller = redis::RedisController::new(&config, &runner, &probe);
    match action {
        Action::Start => {
            controller.start()?;
        }
        Action::Stop => {
            controller.stop()?;
        }
        Action::Restart => {
            controller.restart()?;
        }
        Action::Status => controller.status().print(),
    }
    Ok(())
}

pub fn setup_otel(env: &EnvSnapshot) -> Result<(), SetupError> {
    let _lock = ProcessLock::acquire("otel_setup")?;
    output::step("OpenTelemetry Collector Setup");
    let config = OtelConfig::resolve(env)?;
    let runner = SystemRunner::new();
    let installer = otel::OtelInstaller::new(&config, &runner);
    installer.run()?;
    Ok(())
}

pub fn manage_otel(env: &EnvSnapshot, action: Action) -> Result<(), SetupError> {
    let _lock = ProcessLock::acquire("otel_manage")?;
    output::step(&format!("OpenTelemetry Collector {}", action.title()));
    let config = OtelConfig::resolve(env)?;
    let runner = SystemRunner::new();
    let probe = TcpProbe::default();
    let controller = otel::OtelController::new(&config, &runner, &probe);
    match action {
        Action::Start => {
            controller.start()?;
        }
        Action::Stop => {
            controller.stop()?;
        }
        Action::Restart => {
            controller.restart()?;
        }
        Action::Status => controller.status().print(),
    }
    Ok(())
}

pub fn setup_gcloud(env: &EnvSnapshot) -> Result<(), SetupError> {
    let _lock = ProcessLock::acquire("gcloud_setup")?;
    output::step("Google Cloud CLI Setup");
    let config = GcloudConfig::resolve(env)?;
    let runner = SystemRunner::new();
    let installer = gcloud::GcloudInstaller::new(&config, &runner);
    installer.install()
}
