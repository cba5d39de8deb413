//! Console status output.
//!
//! Glyph-prefixed message helpers for user-facing output. Diagnostics go
//! through `tracing`; these lines are the tool's actual interface.

use colored::Colorize;

/// Print a section header.
pub fn step(title: &str) {
    let header = format!("== {} ==", title);
    println!("\n{}", header.as_str().cyan().bold());
}

/// Print an informational message.
pub fn info(msg: &str) {
    println!("{}  {}", "ℹ".blue(), msg);
}

/// Print a success message.
pub fn success(msg: &str) {
    println!("{}  {}", "✔".green(), msg);
}

/// Print a warning. The calling operation continues.
pub fn warning(msg: &str) {
    let line = format!("⚠  {}", msg);
    println!("{}", line.as_str().yellow());
}

/// Print a failure message without terminating.
///
/// Used for operation outcomes that did not achieve their goal (poll
/// timeouts) and by `main` for fatal errors just before exiting.
pub fn failure(msg: &str) {
    let line = format!("✖  {}", msg);
    println!("{}", line.as_str().red());
}

/// Print a plain line (status detail rows, summaries).
pub fn line(msg: &str) {
    println!("{}", msg);
}
