// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classifying a case's captured output and extracting a readable excerpt.
//!
//! Classification is purely text-pattern based against the runner's report
//! format; exit codes are never consulted. The markers here are a hard
//! contract with the external runner's textual conventions.

/// Marker that opens the failure section of a report.
const FAILURES_MARKER: &str = "Failures";

/// Marker printed when a location resolved to no runnable case.
const NO_EXAMPLES_MARKER: &str = "0 examples";

/// Coarse marker for a pending case.
const PENDING_MARKER: &str = "Pending";

/// Header of the pending section, used for excerpt slicing.
const PENDING_SECTION: &str = "Pending:";

/// Prefix of the first enumerated failure item.
const FIRST_FAILURE_ITEM: &str = "1) ";

/// Timing line that terminates both the failure and pending sections.
const FINISHED_MARKER: &str = "Finished in";

/// The outcome of one case, derived from the runner's textual report.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExecutionStatus {
    /// The case passed.
    Pass,

    /// The case failed, or its location resolved to no runnable case.
    Fail,

    /// The case is pending.
    Pending,
}

/// Classifies runner output. `Fail` takes precedence over `Pending`.
pub fn classify(output: &str) -> ExecutionStatus {
    if output.contains(FAILURES_MARKER) || output.contains(NO_EXAMPLES_MARKER) {
        ExecutionStatus::Fail
    } else if output.contains(PENDING_MARKER) {
        ExecutionStatus::Pending
    } else {
        ExecutionStatus::Pass
    }
}

/// One line of an excerpt, tagged with how the reporter should present it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExcerptLine {
    /// The case description: the first line of the sliced section.
    Description(String),

    /// A `# path:line` location line.
    Location(String),

    /// A failure detail line.
    Detail(String),

    /// A line passed through without styling.
    Plain(String),
}

impl ExcerptLine {
    /// The line's text, regardless of presentation.
    pub fn text(&self) -> &str {
        match self {
            Self::Description(text)
            | Self::Location(text)
            | Self::Detail(text)
            | Self::Plain(text) => text,
        }
    }
}

/// The formatted slice of a case's output relevant to its failure or pending
/// state.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Excerpt {
    lines: Vec<ExcerptLine>,
}

impl Excerpt {
    /// Creates a single-line excerpt carrying `message` as its description.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            lines: vec![ExcerptLine::Description(message.into())],
        }
    }

    /// The tagged lines in order.
    pub fn lines(&self) -> &[ExcerptLine] {
        &self.lines
    }

    /// The description line, used for rerun-script comments. Empty if no
    /// relevant section could be located.
    pub fn description(&self) -> &str {
        self.lines.first().map(ExcerptLine::text).unwrap_or_default()
    }

    /// Returns true if no relevant section could be located.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Extracts the failure excerpt: the text between the first enumerated
/// failure item and the timing line.
///
/// A `0 examples` report has no failure section; the whole output is kept as
/// unstyled lines. Absent slice markers yield an empty excerpt rather than an
/// error -- an inconsistency in the runner's output must not take the run
/// down.
pub fn failure_excerpt(output: &str) -> Excerpt {
    if output.contains(NO_EXAMPLES_MARKER) {
        return Excerpt {
            lines: output
                .lines()
                .map(|line| ExcerptLine::Plain(line.to_owned()))
                .collect(),
        };
    }
    let Some(section) = slice_section(output, FIRST_FAILURE_ITEM, FINISHED_MARKER) else {
        return Excerpt::default();
    };
    let lines = section
        .lines()
        .enumerate()
        .map(|(idx, line)| {
            if idx == 0 {
                ExcerptLine::Description(line.to_owned())
            } else if line.trim_start().starts_with("# ") {
                ExcerptLine::Location(line.to_owned())
            } else {
                ExcerptLine::Detail(line.to_owned())
            }
        })
        .collect();
    Excerpt { lines }
}

/// Extracts the pending excerpt: the text between the pending section header
/// and the timing line. Absent markers yield an empty excerpt.
pub fn pending_excerpt(output: &str) -> Excerpt {
    let Some(section) = slice_section(output, PENDING_SECTION, FINISHED_MARKER) else {
        return Excerpt::default();
    };
    let lines = section
        .lines()
        .enumerate()
        .map(|(idx, line)| {
            if idx == 0 {
                ExcerptLine::Description(line.to_owned())
            } else if line.trim_start().starts_with("# ") {
                ExcerptLine::Location(line.to_owned())
            } else {
                ExcerptLine::Plain(line.to_owned())
            }
        })
        .collect();
    Excerpt { lines }
}

/// Slices the text strictly between `start` and `end`, trimmed. `None` when
/// either marker is missing or they are out of order.
fn slice_section<'a>(output: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let start_idx = output.find(start)? + start.len();
    let end_idx = output.find(end)?;
    output.get(start_idx..end_idx).map(str::trim)
}

/// The classified outcome of one executed case.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// The combined stdout and stderr captured from the runner.
    pub output: String,

    /// The classification derived from the output text.
    pub status: ExecutionStatus,

    /// The relevant excerpt; empty for passing cases.
    pub excerpt: Excerpt,
}

impl ExecutionResult {
    /// Classifies raw runner output and extracts its excerpt.
    pub fn from_output(output: String) -> Self {
        let status = classify(&output);
        let excerpt = match status {
            ExecutionStatus::Fail => failure_excerpt(&output),
            ExecutionStatus::Pending => pending_excerpt(&output),
            ExecutionStatus::Pass => Excerpt::default(),
        };
        Self {
            output,
            status,
            excerpt,
        }
    }

    /// Builds a failure result for a task that could not be executed at all.
    pub fn synthetic_failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            output: message.clone(),
            status: ExecutionStatus::Fail,
            excerpt: Excerpt::from_message(message),
        }
    }
}
