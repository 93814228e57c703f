// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovering spec files and the test cases declared inside them.
//!
//! The main structure in this module is [`TestList`], produced by
//! [`TestList::discover`]. The structural scan of a single file is exposed as
//! the pure function [`parse_cases`] so its heuristics can be tested without
//! file I/O.

use crate::errors::CreateTestListError;
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use regex::Regex;
use std::{collections::BTreeSet, io, sync::OnceLock};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// File name suffix that marks a file as a spec file.
const SPEC_FILE_SUFFIX: &str = "_spec.rb";

/// A single runnable test case.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestCase {
    /// The `file:line` location identifying the case. Also the argument passed
    /// to the runner to execute this case alone.
    pub location: String,

    /// Tags attached to the case: its own inline tags unioned with the tags of
    /// its enclosing `describe` group. Fixed at parse time.
    pub tags: BTreeSet<String>,
}

/// The list of test cases discovered under a case folder.
#[derive(Clone, Debug, Default)]
pub struct TestList {
    cases: Vec<TestCase>,
}

impl TestList {
    /// Discovers every test case declared in spec files under `case_folder`.
    ///
    /// Files are visited in sorted order so discovery order is stable across
    /// runs. Unreadable entries and files are skipped with a warning rather
    /// than aborting the scan.
    pub fn discover(case_folder: &Utf8Path) -> Result<Self, CreateTestListError> {
        let mut cases = Vec::new();
        for entry in WalkDir::new(case_folder).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) if error.depth() == 0 => {
                    return Err(CreateTestListError::WalkDir {
                        case_folder: case_folder.to_owned(),
                        error,
                    });
                }
                Err(error) => {
                    warn!("skipping unreadable entry under `{case_folder}`: {error}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = match Utf8PathBuf::try_from(entry.into_path()) {
                Ok(path) => path,
                Err(error) => {
                    warn!("skipping non-UTF-8 path: {error}");
                    continue;
                }
            };
            if !path.as_str().ends_with(SPEC_FILE_SUFFIX) {
                continue;
            }
            // Decode defensively: a spec file with stray non-UTF-8 bytes still
            // gets scanned instead of aborting the whole discovery.
            let bytes = match fs_err::read(&path) {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!("skipping unreadable spec file: {error}");
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&bytes);
            let file_cases = parse_cases(&path, &text);
            debug!("{path}: {} cases", file_cases.len());
            cases.extend(file_cases);
        }
        Ok(Self { cases })
    }

    /// Creates a test list from already-parsed cases.
    pub fn from_cases(cases: impl IntoIterator<Item = TestCase>) -> Self {
        Self {
            cases: cases.into_iter().collect(),
        }
    }

    /// The discovered cases, in discovery order.
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// The number of discovered cases.
    pub fn test_count(&self) -> usize {
        self.cases.len()
    }

    /// Writes the list in human-readable form: one `location [tag, tag]` line
    /// per case.
    pub fn write_human(&self, mut writer: impl io::Write) -> io::Result<()> {
        for case in &self.cases {
            if case.tags.is_empty() {
                writeln!(writer, "{}", case.location)?;
            } else {
                writeln!(writer, "{} [{}]", case.location, case.tags.iter().join(", "))?;
            }
        }
        Ok(())
    }
}

fn describe_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)describe .*? do").expect("describe regex is valid"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,\s]:(\w+)").expect("tag regex is valid"))
}

fn block_case_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)it (?:"([^"]*)"|'([^']*)').*? do"#).expect("block case regex is valid")
    })
}

fn expr_case_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)it \{.*?\}").expect("expression case regex is valid"))
}

/// Extracts every test case declared in `text`, locating each at a 1-based
/// line of `file`.
///
/// Two declaration styles are recognized:
///
/// * block style, `it "<description>" ... do`, where the `do` opener may only
///   appear on a later source line than the description;
/// * expression style, `it { ... }`, a single-line inline assertion carrying
///   only the enclosing group's tags.
///
/// A case's tags are its own inline `:symbol` tokens unioned with those of the
/// first `describe ... do` opener in the file. Line numbers are assigned with
/// a forward-only cursor per style, so a description recurring earlier in the
/// file is not matched twice at the same line. Known heuristic limit: the same
/// description text reused non-sequentially can be assigned the wrong line.
///
/// Never fails: text with no recognizable declarations yields an empty vec.
pub fn parse_cases(file: &Utf8Path, text: &str) -> Vec<TestCase> {
    let group_tags = describe_tags(text);
    let mut cases = Vec::new();

    // Block-style cases.
    let mut last_line = 0;
    for caps in block_case_regex().captures_iter(text) {
        let matched = &caps[0];
        let description = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let mut tags: BTreeSet<String> = tag_regex()
            .captures_iter(matched)
            .map(|c| c[1].to_owned())
            .collect();
        tags.extend(group_tags.iter().cloned());
        if let Some(line) = locate_block_opener(text, description, &mut last_line) {
            cases.push(TestCase {
                location: format!("{file}:{line}"),
                tags,
            });
        }
    }

    // Expression-style cases, with their own forward-only cursor.
    let mut last_line = 0;
    for mat in expr_case_regex().find_iter(text) {
        if let Some(line) = locate_line(text, mat.as_str(), &mut last_line) {
            cases.push(TestCase {
                location: format!("{file}:{line}"),
                tags: group_tags.clone(),
            });
        }
    }

    cases
}

/// Tags declared on the first `describe ... do` opener, if any.
fn describe_tags(text: &str) -> BTreeSet<String> {
    let Some(opener) = describe_regex().find(text) else {
        return BTreeSet::new();
    };
    tag_regex()
        .captures_iter(opener.as_str())
        .map(|c| c[1].to_owned())
        .collect()
}

/// Finds the 1-based line of the block opener for the case described by
/// `needle`, scanning forward from `*last_line` only.
///
/// If the line containing the description does not itself end in ` do`, the
/// declaration continues, and the first following line that ends in ` do` is
/// the opener.
fn locate_block_opener(text: &str, needle: &str, last_line: &mut usize) -> Option<usize> {
    let mut continuation = false;
    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        if lineno <= *last_line {
            continue;
        }
        if line.contains(needle) {
            if line.trim().ends_with(" do") {
                *last_line = lineno;
                return Some(lineno);
            }
            continuation = true;
        }
        if continuation && line.trim().ends_with(" do") {
            *last_line = lineno;
            return Some(lineno);
        }
    }
    None
}

/// Finds the 1-based line containing `needle` verbatim, scanning forward from
/// `*last_line` only. A needle spanning multiple lines is never located.
fn locate_line(text: &str, needle: &str, last_line: &mut usize) -> Option<usize> {
    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        if lineno <= *last_line {
            continue;
        }
        if line.contains(needle) {
            *last_line = lineno;
            return Some(lineno);
        }
    }
    None
}
