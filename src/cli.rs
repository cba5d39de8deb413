//! CLI argument parsing using clap derive API.
//!
//! Purely declarative; dispatch lives in `main`.

use clap::{Parser, Subcommand, ValueEnum};

/// prootctl -- provision services inside a proot/chroot terminal environment.
///
/// Use `prootctl <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "prootctl", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install and configure services.
    Setup {
        #[command(subcommand)]
        service: SetupService,
    },

    /// Start/stop/status services.
    Manage {
        #[command(subcommand)]
        service: ManageService,
    },
}

#[derive(Subcommand, Debug)]
pub enum SetupService {
    /// Install and configure PostgreSQL.
    Postgres,
    /// Install and configure Redis.
    Redis,
    /// Install the OpenTelemetry Collector.
    Otel,
    /// Install the Google Cloud CLI.
    Gcloud,
}

#[derive(Subcommand, Debug)]
pub enum ManageService {
    /// Manage PostgreSQL.
    Postgres {
        #[arg(value_enum)]
        action: Action,
    },
    /// Manage Redis.
    Redis {
        #[arg(value_enum)]
        action: Action,
    },
    /// Manage the OpenTelemetry Collector.
    Otel {
        #[arg(value_enum)]
        action: Action,
    },
}

/// Lifecycle action to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    Start,
    Stop,
    Restart,
    Status,
}

impl Action {
    /// Capitalized form for section headers.
    pub fn title(&self) -> &'static str {
        match self {
            Action::Start => "Start",
            Action::Stop => "Stop",
            Action::Restart => "Restart",
            Action::Status => "Status",
        }
    }
}
