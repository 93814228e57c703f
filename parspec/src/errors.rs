// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::StderrStyles;
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use parspec_runner::errors::{
    CreateTestListError, TestCommandError, TestFilterBuildError, TestRunnerBuildError,
    WriteRerunScriptError,
};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Exit codes returned by the `parspec` binary.
pub struct ExitCode;

impl ExitCode {
    /// A setup or configuration error occurred before any case was run.
    pub const SETUP_ERROR: i32 = 96;

    /// At least one case failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Scanning the case folder failed.
    pub const TEST_LIST_CREATION_FAILED: i32 = 104;

    /// An output (the case list or the rerun script) could not be written.
    pub const WRITE_OUTPUT_ERROR: i32 = 105;
}

// Note that the #[error()] strings are mostly placeholder messages -- the
// expected way to print out errors is with the display_to_stderr method,
// which colorizes errors.

/// An anticipated failure mode: either in the external runner or in the
/// inputs given to parspec, not a bug in parspec itself.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("test list creation failed")]
    CreateTestListError {
        #[from]
        err: CreateTestListError,
    },
    #[error("filter build error")]
    FilterBuildError {
        #[from]
        err: TestFilterBuildError,
    },
    #[error("runner build error")]
    RunnerBuildError {
        #[from]
        err: TestRunnerBuildError,
    },
    #[error("runner command error")]
    CommandParseError {
        #[from]
        err: TestCommandError,
    },
    #[error("failed to read environment file")]
    EnvFileReadError {
        file: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to parse environment file")]
    EnvFileParseError {
        file: Utf8PathBuf,
        #[source]
        err: serde_json::Error,
    },
    #[error("failed to write rerun script")]
    WriteRerunScriptError {
        #[from]
        err: WriteRerunScriptError,
    },
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
    #[error("test run failed")]
    TestRunFailed,
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CreateTestListError { .. } => ExitCode::TEST_LIST_CREATION_FAILED,
            Self::FilterBuildError { .. }
            | Self::RunnerBuildError { .. }
            | Self::CommandParseError { .. }
            | Self::EnvFileReadError { .. }
            | Self::EnvFileParseError { .. } => ExitCode::SETUP_ERROR,
            Self::WriteRerunScriptError { .. } | Self::WriteOutputError { .. } => {
                ExitCode::WRITE_OUTPUT_ERROR
            }
            Self::TestRunFailed => ExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CreateTestListError { err } => {
                error!("failed to build the case list");
                Some(err as &dyn Error)
            }
            Self::FilterBuildError { err } => {
                error!("failed to build the case filter");
                Some(err as &dyn Error)
            }
            Self::RunnerBuildError { err } => {
                error!("{}", err);
                err.source()
            }
            Self::CommandParseError { err } => {
                error!("failed to build the runner command");
                Some(err as &dyn Error)
            }
            Self::EnvFileReadError { file, err } => {
                error!("failed to read environment file `{}`", file.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::EnvFileParseError { file, err } => {
                error!(
                    "failed to parse environment file `{}`",
                    file.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::WriteRerunScriptError { err } => {
                error!("failed to write the rerun script");
                Some(err as &dyn Error)
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: "parspec::no_heading", "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
