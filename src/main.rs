//! prootctl -- provision services inside a proot/chroot terminal environment.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use prootctl::cli::{Cli, Commands, ManageService, SetupService};
use prootctl::config::EnvSnapshot;
use prootctl::{output, services};

fn main() -> ExitCode {
    // Diagnostics only; user-facing output goes through the output module.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let env = EnvSnapshot::capture();

    let result = match cli.command {
        Commands::Setup { service } => match service {
            SetupService::Postgres => services::setup_postgres(&env),
            SetupService::Redis => services::setup_redis(&env),
            SetupService::Otel => services::setup_otel(&env),
            SetupService::Gcloud => services::setup_gcloud(&env),
        },
        Commands::Manage { service } => match service {
            ManageService::Postgres { action } => services::manage_postgres(&env, action),
            ManageService::Redis { action } => services::manage_redis(&env, action),
            ManageService::Otel { action } => services::manage_otel(&env, action),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::failure(&err.to_string());
            // Reserved codes distinguish collector install failure classes.
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
