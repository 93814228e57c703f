// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by parspec.

use camino::Utf8PathBuf;
use thiserror::Error;

/// An error that occurred while discovering the test list.
///
/// Individual unreadable spec files are tolerated and contribute zero cases;
/// only a failure to traverse the case folder itself surfaces here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CreateTestListError {
    /// The case folder could not be traversed.
    #[error("failed to walk case folder `{case_folder}`")]
    WalkDir {
        /// The folder being walked.
        case_folder: Utf8PathBuf,

        /// The underlying traversal error.
        #[source]
        error: walkdir::Error,
    },
}

/// An error that occurred while building a test filter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestFilterBuildError {
    /// The location pattern is not a valid regex.
    #[error("failed to compile location pattern `{pattern}`")]
    Pattern {
        /// The pattern as provided.
        pattern: String,

        /// The underlying regex error.
        #[source]
        error: regex::Error,
    },
}

/// An error that occurred while building a test runner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerBuildError {
    /// The configured thread count is below the minimum of 1.
    #[error("thread count may not be less than 1 (configured: {thread_count})")]
    InvalidThreadCount {
        /// The configured thread count.
        thread_count: usize,
    },
}

/// An error that occurred while constructing or spawning the runner command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestCommandError {
    /// The runner command string could not be split into shell words.
    #[error("failed to parse runner command `{command}`")]
    Parse {
        /// The command as provided.
        command: String,

        /// The underlying shell-words error.
        #[source]
        error: shell_words::ParseError,
    },

    /// The runner command string contained no words.
    #[error("runner command is empty")]
    Empty,

    /// The runner subprocess could not be spawned or read.
    #[error("failed to execute `{command}`")]
    Spawn {
        /// The command that failed.
        command: String,

        /// The underlying I/O error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurred while writing the rerun script.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteRerunScriptError {
    /// The script file could not be written.
    #[error("failed to write rerun script to `{path}`")]
    Write {
        /// The script path.
        path: Utf8PathBuf,

        /// The underlying I/O error.
        #[source]
        error: std::io::Error,
    },

    /// The script file permissions could not be set.
    #[error("failed to set permissions on rerun script `{path}`")]
    SetPermissions {
        /// The script path.
        path: Utf8PathBuf,

        /// The underlying I/O error.
        #[source]
        error: std::io::Error,
    },
}
