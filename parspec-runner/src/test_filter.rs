// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering discovered cases by location pattern and tag expression.

use crate::{
    errors::TestFilterBuildError,
    list::{TestCase, TestList},
};
use regex::Regex;

/// Prefix that turns a tag token into an exclusion.
const EXCLUDE_MARKER: char = '~';

/// A compiled case filter.
///
/// Both parts are optional: an absent location pattern keeps all locations,
/// and an absent tag expression keeps all tag sets.
#[derive(Clone, Debug)]
pub struct TestFilter {
    pattern: Option<Regex>,
    tags: Option<TagFilter>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct TagFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl TestFilter {
    /// Builds a filter from an optional location pattern and an optional tag
    /// expression.
    ///
    /// The tag expression is a comma-separated token list, e.g. `smoke,~slow`;
    /// tokens prefixed with `~` exclude cases carrying that tag.
    pub fn new(pattern: Option<&str>, tags: Option<&str>) -> Result<Self, TestFilterBuildError> {
        let pattern = pattern
            .map(|p| {
                Regex::new(p).map_err(|error| TestFilterBuildError::Pattern {
                    pattern: p.to_owned(),
                    error,
                })
            })
            .transpose()?;
        let tags = tags.map(TagFilter::parse);
        Ok(Self { pattern, tags })
    }

    /// Returns true if `case` passes both the location pattern and the tag
    /// expression.
    pub fn matches(&self, case: &TestCase) -> bool {
        if let Some(pattern) = &self.pattern
            && !pattern.is_match(&case.location)
        {
            return false;
        }
        match &self.tags {
            Some(tags) => tags.matches(case),
            None => true,
        }
    }

    /// Reduces `list` to the location strings to queue, preserving discovery
    /// order.
    pub fn apply(&self, list: &TestList) -> Vec<String> {
        list.cases()
            .iter()
            .filter(|case| self.matches(case))
            .map(|case| case.location.clone())
            .collect()
    }

    /// Returns a copy of `list` reduced to matching cases.
    pub fn filter_list(&self, list: &TestList) -> TestList {
        TestList::from_cases(
            list.cases()
                .iter()
                .filter(|case| self.matches(case))
                .cloned(),
        )
    }
}

impl TagFilter {
    fn parse(expression: &str) -> Self {
        let mut filter = Self::default();
        for token in expression.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.strip_prefix(EXCLUDE_MARKER) {
                Some(tag) => filter.exclude.push(tag.to_owned()),
                None => filter.include.push(token.to_owned()),
            }
        }
        filter
    }

    fn matches(&self, case: &TestCase) -> bool {
        // Exclusion dominates: any excluded tag rejects the case outright.
        if self.exclude.iter().any(|tag| case.tags.contains(tag)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|tag| case.tags.contains(tag))
    }
}
