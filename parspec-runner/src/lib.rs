// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for the `parspec` parallel spec runner.
//!
//! parspec discovers the individual test cases declared in a tree of
//! `*_spec.rb` files, filters them by location pattern and tag expression,
//! then runs each matching case as its own runner subprocess across a fixed
//! pool of worker threads, aggregating results and writing a `rerun.sh`
//! script for the cases that failed.

pub mod classify;
pub mod errors;
mod helpers;
pub mod list;
pub mod reporter;
pub mod rerun;
pub mod runner;
pub mod test_command;
pub mod test_filter;
mod time;
