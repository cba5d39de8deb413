//! Shared test doubles for lifecycle scenario tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;

use prootctl::error::SetupError;
use prootctl::executor::{CommandRunner, CommandSpec, RunOutput};
use prootctl::probe::Probe;

/// A runner that records every spec it is asked to run and replays
/// pre-scripted responses in order. Runs out of script -> succeeds.
pub struct RecordingRunner {
    pub calls: RefCell<Vec<CommandSpec>>,
    responses: RefCell<VecDeque<RunOutput>>,
    existing: Vec<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            responses: RefCell::new(VecDeque::new()),
            existing: vec!["runuser".to_string()],
        }
    }

    /// Set which executables `command_exists` reports as present.
    pub fn with_commands<I: IntoIterator<Item = &'static str>>(mut self, names: I) -> Self {
        self.existing = names.into_iter().map(str::to_string).collect();
        self
    }

    /// Queue the next response.
    pub fn push_response(&self, output: RunOutput) {
        self.responses.borrow_mut().push_back(output);
    }

    /// Queue a failing response with the given stderr.
    pub fn push_failure(&self, stderr: &str) {
        self.push_response(RunOutput {
            success: false,
            exit_code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        });
    }

    /// Queue a successful response with the given stdout.
    pub fn push_stdout(&self, stdout: &str) {
        self.push_response(RunOutput {
            success: true,
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        });
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Whether any recorded call ran the given program.
    pub fn ran_program(&self, program: &str) -> bool {
        self.calls.borrow().iter().any(|spec| match spec {
            CommandSpec::Exec { program: p, .. } => p == program,
            CommandSpec::ShellPipeline { .. } => program == "bash",
        })
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput, SetupError> {
        self.calls.borrow_mut().push(spec.clone());
        Ok(self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(RunOutput::ok))
    }

    fn command_exists(&self, name: &str) -> bool {
        self.existing.iter().any(|n| n == name)
    }
}

/// A probe that replays a scripted sequence of states, then holds the last.
pub struct ScriptedProbe {
    states: RefCell<VecDeque<bool>>,
    last: RefCell<bool>,
}

impl ScriptedProbe {
    pub fn new<I: IntoIterator<Item = bool>>(states: I) -> Self {
        let states: VecDeque<bool> = states.into_iter().collect();
        let last = states.back().copied().unwrap_or(false);
        Self {
            states: RefCell::new(states),
            last: RefCell::new(last),
        }
    }

    /// A probe that always reports the same state.
    pub fn fixed(state: bool) -> Self {
        Self::new([state])
    }
}

impl Probe for ScriptedProbe {
    fn is_open(&self, _host: &str, _port: u16) -> bool {
        match self.states.borrow_mut().pop_front() {
            Some(state) => {
                *self.last.borrow_mut() = state;
                state
            }
            None => *self.last.borrow(),
        }
    }
}
