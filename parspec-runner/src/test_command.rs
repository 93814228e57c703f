// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Invoking the external spec runner for a single case.

use crate::errors::TestCommandError;
use std::{collections::BTreeMap, fmt};
use tracing::{debug, trace};

/// Environment overrides applied to one worker's invocations, merged over the
/// process environment with override values winning on collision.
pub type EnvOverrides = BTreeMap<String, String>;

/// The external runner command, invoked once per case as
/// `<runner> --color <location>`.
#[derive(Clone, Debug)]
pub struct TestCommand {
    program: String,
    args: Vec<String>,
}

impl TestCommand {
    /// Parses a shell-style command string, e.g. `bundle exec rspec`.
    pub fn from_shell(command: &str) -> Result<Self, TestCommandError> {
        let mut words =
            shell_words::split(command).map_err(|error| TestCommandError::Parse {
                command: command.to_owned(),
                error,
            })?;
        if words.is_empty() {
            return Err(TestCommandError::Empty);
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            args: words,
        })
    }

    /// Converts the command to a [`duct::Expression`] targeting `location`,
    /// with `env` merged over the process environment.
    fn to_expression(&self, location: &str, env: &EnvOverrides) -> duct::Expression {
        let args = self
            .args
            .iter()
            .map(String::as_str)
            .chain(["--color", location]);
        let mut expression = duct::cmd(self.program.as_str(), args);
        for (key, value) in env {
            expression = expression.env(key, value);
        }
        expression
    }

    /// Runs the case at `location`, blocking until the subprocess exits, and
    /// returns its combined stdout and stderr.
    ///
    /// The exit status is deliberately ignored: the runner's textual report is
    /// the source of truth for classification, not its exit code.
    pub fn run(&self, location: &str, env: &EnvOverrides) -> Result<String, TestCommandError> {
        let expression = self
            .to_expression(location, env)
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked();
        trace!("executing command: {expression:?}");
        let output = expression.run().map_err(|error| TestCommandError::Spawn {
            command: self.to_string(),
            error,
        })?;
        debug!("case {location} exited with {}", output.status);
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for TestCommand {
    fn default() -> Self {
        Self {
            program: "bundle".to_owned(),
            args: vec!["exec".to_owned(), "rspec".to_owned()],
        }
    }
}

impl fmt::Display for TestCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        write!(f, "{}", shell_words::join(words))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_shell_splits_words() {
        let command = TestCommand::from_shell("bundle exec rspec").unwrap();
        assert_eq!(command.program, "bundle");
        assert_eq!(command.args, vec!["exec".to_owned(), "rspec".to_owned()]);
        assert_eq!(command.to_string(), "bundle exec rspec");
    }

    #[test]
    fn from_shell_rejects_empty_commands() {
        assert!(matches!(
            TestCommand::from_shell("  "),
            Err(TestCommandError::Empty)
        ));
        assert!(matches!(
            TestCommand::from_shell("rspec '"),
            Err(TestCommandError::Parse { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn run_captures_output_and_target_argument() {
        let command = TestCommand::from_shell("echo").unwrap();
        let output = command
            .run("spec/sample_spec.rb:3", &EnvOverrides::new())
            .unwrap();
        assert_eq!(output.trim(), "--color spec/sample_spec.rb:3");
    }

    #[cfg(unix)]
    #[test]
    fn run_applies_env_overrides() {
        let command = TestCommand::from_shell("sh -c 'printf %s \"$PARSPEC_TEST_MARKER\"'").unwrap();
        let env: EnvOverrides = [("PARSPEC_TEST_MARKER".to_owned(), "overridden".to_owned())]
            .into_iter()
            .collect();
        let output = command.run("spec/sample_spec.rb:3", &env).unwrap();
        assert_eq!(output, "overridden");
    }

    #[test]
    fn run_reports_spawn_failures() {
        let command = TestCommand::from_shell("/nonexistent/parspec-runner-binary").unwrap();
        assert!(matches!(
            command.run("spec/sample_spec.rb:3", &EnvOverrides::new()),
            Err(TestCommandError::Spawn { .. })
        ));
    }
}
