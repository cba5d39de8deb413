//! PostgreSQL controller lifecycle scenarios against scripted seams.

mod common;

use std::fs;
use std::time::Duration;

use common::{RecordingRunner, ScriptedProbe};
use prootctl::config::{EnvSnapshot, PostgresConfig};
use prootctl::executor::CommandSpec;
use prootctl::services::postgres::PostgresController;
use prootctl::services::{StartOutcome, StopOutcome};
use tempfile::TempDir;

/// Config with a real versioned bin tree under a temp dir.
fn config_with_bin_tree(version: &str) -> (PostgresConfig, TempDir) {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(version).join("bin")).unwrap();
    let mut config = PostgresConfig::resolve(&EnvSnapshot::default()).unwrap();
    config.bin_root = dir.path().to_path_buf();
    (config, dir)
}

#[test]
fn start_is_idempotent_when_already_running() {
    let (config, _bin) = config_with_bin_tree("16");
    let runner = RecordingRunner::new();
    let probe = ScriptedProbe::fixed(true);
    let controller =
        PostgresController::new(&config, &runner, &probe).with_poll_interval(Duration::ZERO);

    let outcome = controller.start().unwrap();

    assert_eq!(outcome, StartOutcome::AlreadyRunning);
    assert_eq!(runner.call_count(), 0, "no launch command may be issued");
}

#[test]
fn stop_is_idempotent_when_already_stopped() {
    let (config, _bin) = config_with_bin_tree("16");
    let runner = RecordingRunner::new();
    let probe = ScriptedProbe::fixed(false);
    let controller =
        PostgresController::new(&config, &runner, &probe).with_poll_interval(Duration::ZERO);

    let outcome = controller.stop().unwrap();

    assert_eq!(outcome, StopOutcome::AlreadyStopped);
    assert_eq!(runner.call_count(), 0, "no shutdown command may be issued");
}

#[test]
fn start_fails_without_versioned_bin_dir() {
    let dir = TempDir::new().unwrap();
    let mut config = PostgresConfig::resolve(&EnvSnapshot::default()).unwrap();
    config.bin_root = dir.path().join("missing");
    let runner = RecordingRunner::new();
    let probe = ScriptedProbe::fixed(false);
    let controller =
        PostgresController::new(&config, &runner, &probe).with_poll_interval(Duration::ZERO);

    assert!(controller.start().is_err());
    assert_eq!(runner.call_count(), 0);
}

#[test]
fn start_launches_as_postgres_and_polls_to_success() {
    let (config, bin) = config_with_bin_tree("16");
    let runner = RecordingRunner::new();
    // Not listening at entry, listening on the first poll.
    let probe = ScriptedProbe::new([false, true]);
    let controller =
        PostgresController::new(&config, &runner, &probe).with_poll_interval(Duration::ZERO);

    let outcome = controller.start().unwrap();

    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(runner.call_count(), 1);
    let calls = runner.calls.borrow();
    match &calls[0] {
        CommandSpec::Exec { program, args, .. } => {
            assert_eq!(program, "runuser");
            assert_eq!(args[..3], ["-u", "postgres", "--"]);
            let pg_ctl = bin.path().join("16").join("bin").join("pg_ctl");
            assert_eq!(args[3], pg_ctl.display().to_string());
            assert!(args.contains(&"start".to_string()));
        }
        other => panic!("unexpected launch spec: {other:?}"),
    }
}

#[test]
fn start_reports_timeout_without_failing() {
    let (config, _bin) = config_with_bin_tree("15");
    let runner = RecordingRunner::new();
    let probe = ScriptedProbe::fixed(false);
    let controller =
        PostgresController::new(&config, &runner, &probe).with_poll_interval(Duration::ZERO);

    let outcome = controller.start().unwrap();

    assert_eq!(outcome, StartOutcome::TimedOut);
}

#[test]
fn stop_graceful_failure_warns_and_never_escalates() {
    let (config, _bin) = config_with_bin_tree("16");
    let runner = RecordingRunner::new();
    runner.push_failure("server did not shut down");
    // Port stays open the whole time.
    let probe = ScriptedProbe::fixed(true);
    let controller =
        PostgresController::new(&config, &runner, &probe).with_poll_interval(Duration::ZERO);

    let outcome = controller.stop().unwrap();

    assert_eq!(outcome, StopOutcome::CommandFailed);
    assert_eq!(runner.call_count(), 1, "only the pg_ctl stop attempt");
    assert!(!runner.ran_program("pkill"), "the database has no kill escalation");
}

#[test]
fn stop_polls_port_closed() {
    let (config, _bin) = config_with_bin_tree("16");
    let runner = RecordingRunner::new();
    // Open at entry, closed on the first poll after the stop command.
    let probe = ScriptedProbe::new([true, false]);
    let controller =
        PostgresController::new(&config, &runner, &probe).with_poll_interval(Duration::ZERO);

    let outcome = controller.stop().unwrap();

    assert_eq!(outcome, StopOutcome::Stopped);
    assert_eq!(runner.call_count(), 1);
}

#[test]
fn status_reports_config_and_redacted_connection() {
    let (config, _bin) = config_with_bin_tree("16");
    let runner = RecordingRunner::new();
    let probe = ScriptedProbe::fixed(true);
    let controller = PostgresController::new(&config, &runner, &probe);

    let status = controller.status();

    assert!(status.up);
    assert_eq!(status.port, 5432);
    assert_eq!(status.data_dir, config.data_dir);
    let connection = status.connection.expect("connection string when up");
    assert_eq!(connection, "postgresql://postgres:<PASS>@127.0.0.1:5432/postgres");
}

#[test]
fn status_omits_connection_when_down() {
    let (config, _bin) = config_with_bin_tree("16");
    let runner = RecordingRunner::new();
    let probe = ScriptedProbe::fixed(false);
    let controller = PostgresController::new(&config, &runner, &probe);

    let status = controller.status();

    assert!(!status.up);
    assert!(status.connection.is_none());
}

#[test]
fn start_falls_back_to_su_without_runuser() {
    let (config, _bin) = config_with_bin_tree("16");
    let runner = RecordingRunner::new().with_commands([]);
    let probe = ScriptedProbe::new([false, true]);
    let controller =
        PostgresController::new(&config, &runner, &probe).with_poll_interval(Duration::ZERO);

    controller.start().unwrap();

    let calls = runner.calls.borrow();
    match &calls[0] {
        CommandSpec::Exec { program, args, .. } => {
            assert_eq!(program, "su");
            assert_eq!(args[..3], ["-", "postgres", "-c"]);
            assert!(args[3].contains("pg_ctl"));
            assert!(args[3].ends_with("start"));
        }
        other => panic!("unexpected launch spec: {other:?}"),
    }
}
