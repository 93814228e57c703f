// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation of the `rerun.sh` script that re-invokes only failed cases.

use crate::{classify::Excerpt, errors::WriteRerunScriptError, test_command::TestCommand};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::sync::OnceLock;
use swrite::{SWrite, swrite};
use tracing::debug;

/// File name the script is written under.
pub const RERUN_SCRIPT_NAME: &str = "rerun.sh";

/// Matches the runnable spec sub-path inside a failed location.
fn spec_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/spec/.*_spec\.rb:\d{1,4}").expect("spec path regex is valid"))
}

/// One entry of the rerun script: a failed case and the line that re-runs it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RerunEntry {
    /// The first line of the failure excerpt, used as the entry's comment.
    pub description: String,

    /// The `<runner> .<subpath>` invocation.
    pub command: String,
}

/// The rerun script derived from a run's ordered failure list.
#[derive(Clone, Debug, Default)]
pub struct RerunScript {
    entries: Vec<RerunEntry>,
}

impl RerunScript {
    /// Builds the script from the failure list, in failure order.
    ///
    /// The runnable sub-path is the portion of each location matching the
    /// `/spec/..._spec.rb:<line>` convention; a location without such a
    /// portion produces a bare `<runner> .` line rather than being dropped.
    pub fn from_failures(command: &TestCommand, failures: &[(String, Excerpt)]) -> Self {
        let entries = failures
            .iter()
            .map(|(location, excerpt)| {
                let sub_path = spec_path_regex()
                    .find(location)
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                RerunEntry {
                    description: excerpt.description().to_owned(),
                    command: format!("{command} .{sub_path}"),
                }
            })
            .collect();
        Self { entries }
    }

    /// The script entries in failure order.
    pub fn entries(&self) -> &[RerunEntry] {
        &self.entries
    }

    /// Renders the full script text: per failure, one `echo` of the case
    /// description and one invocation line with the description as a trailing
    /// comment.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            swrite!(out, "echo ----{}\n", entry.description);
            swrite!(out, "{} # {}\n", entry.command, entry.description);
        }
        out
    }

    /// Writes the script under `dir`, world-writable so any shell can pick it
    /// up directly, and returns its path.
    pub fn write(&self, dir: &Utf8Path) -> Result<Utf8PathBuf, WriteRerunScriptError> {
        let path = dir.join(RERUN_SCRIPT_NAME);
        fs_err::write(&path, self.render()).map_err(|error| WriteRerunScriptError::Write {
            path: path.clone(),
            error,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs_err::set_permissions(&path, std::fs::Permissions::from_mode(0o777)).map_err(
                |error| WriteRerunScriptError::SetPermissions {
                    path: path.clone(),
                    error,
                },
            )?;
        }
        debug!("wrote rerun script to {path}");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;

    fn failure(location: &str, description: &str) -> (String, Excerpt) {
        (location.to_owned(), Excerpt::from_message(description))
    }

    #[test]
    fn entries_reconstruct_the_runnable_sub_path() {
        let command = TestCommand::from_shell("rspec").unwrap();
        let script = RerunScript::from_failures(
            &command,
            &[
                failure("./spec/login_spec.rb:12", "Login rejects bad passwords"),
                failure("./deep/nested/spec/api_spec.rb:345", "Api times out"),
            ],
        );
        assert_eq!(
            script.entries(),
            &[
                RerunEntry {
                    description: "Login rejects bad passwords".to_owned(),
                    command: "rspec ./spec/login_spec.rb:12".to_owned(),
                },
                RerunEntry {
                    description: "Api times out".to_owned(),
                    command: "rspec ./spec/api_spec.rb:345".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn every_failed_location_appears_as_a_rerun_target() {
        let command = TestCommand::from_shell("rspec").unwrap();
        let locations = [
            "./spec/a_spec.rb:1",
            "./spec/b_spec.rb:22",
            "./spec/c_spec.rb:333",
        ];
        let failures: Vec<_> = locations
            .iter()
            .map(|location| failure(location, "desc"))
            .collect();
        let script = RerunScript::from_failures(&command, &failures);
        for (entry, location) in script.entries().iter().zip(locations) {
            assert!(entry.command.ends_with(location), "{}", entry.command);
        }
    }

    #[test]
    fn render_pairs_echo_and_invocation_lines() {
        let command = TestCommand::from_shell("bundle exec rspec").unwrap();
        let script = RerunScript::from_failures(
            &command,
            &[failure("./spec/login_spec.rb:12", "Login works")],
        );
        assert_eq!(
            script.render(),
            "echo ----Login works\n\
             bundle exec rspec ./spec/login_spec.rb:12 # Login works\n"
        );
    }

    #[test]
    fn write_creates_an_executable_script() {
        let temp_dir = Utf8TempDir::new().unwrap();
        let command = TestCommand::from_shell("rspec").unwrap();
        let script =
            RerunScript::from_failures(&command, &[failure("./spec/a_spec.rb:1", "desc")]);

        let path = script.write(temp_dir.path()).unwrap();
        assert_eq!(fs_err::read_to_string(&path).unwrap(), script.render());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs_err::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o777);
        }
    }
}
