// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregation and live display of run results.
//!
//! The reporter is driven from the runner's callback, so it only ever sees
//! one event at a time. Failures are printed as they arrive, above the
//! progress bar; pending cases are collected and printed in the final
//! summary.

use crate::{
    classify::{Excerpt, ExcerptLine, ExecutionStatus},
    helpers::format_duration,
    rerun::RerunScript,
    runner::TaskFinished,
    time::{StopwatchStart, stopwatch},
};
use chrono::Local;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::{OwoColorize, Style};
use std::{
    io::{self, Write},
    time::Duration,
};
use swrite::{SWrite, swrite, swriteln};
use tracing::debug;

/// Aggregate counters for a run.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    /// The number of cases queued at the start of the run.
    pub initial_run_count: usize,

    /// The number of cases that have finished so far.
    pub finished_count: usize,

    /// The number of failed cases, including synthetic failures.
    pub failed: usize,

    /// The number of pending cases.
    pub pending: usize,
}

impl RunStats {
    /// True if no case failed. Pending cases do not fail a run.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Where the reporter writes its output.
///
/// Normal operation writes to the terminal's stderr; the buffer variant is
/// used by tests to capture output.
pub enum ReporterOutput<'a> {
    /// Write to stderr, with the progress bar drawn below the report text.
    Terminal,

    /// Write to the supplied buffer. No progress bar is drawn.
    Buffer(&'a mut Vec<u8>),
}

#[derive(Copy, Clone, Debug, Default)]
struct Styles {
    fail: Style,
    pass: Style,
    count: Style,
    location: Style,
    pending: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.fail = Style::new().red().bold();
        self.pass = Style::new().green().bold();
        self.count = Style::new().yellow().bold();
        self.location = Style::new().cyan();
        self.pending = Style::new().yellow();
    }
}

/// Builder for [`Reporter`].
#[derive(Clone, Debug, Default)]
pub struct ReporterBuilder {
    show_pending: bool,
    should_colorize: bool,
    hide_progress_bar: bool,
}

impl ReporterBuilder {
    /// Sets whether the final summary lists pending cases.
    pub fn set_show_pending(&mut self, show_pending: bool) -> &mut Self {
        self.show_pending = show_pending;
        self
    }

    /// Sets whether output is colorized.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets whether the progress bar is hidden.
    pub fn set_hide_progress_bar(&mut self, hide_progress_bar: bool) -> &mut Self {
        self.hide_progress_bar = hide_progress_bar;
        self
    }

    /// Creates a reporter for a run of `test_count` cases.
    pub fn build<'a>(&self, test_count: usize, output: ReporterOutput<'a>) -> Reporter<'a> {
        let mut styles = Styles::default();
        if self.should_colorize {
            styles.colorize();
        }

        let progress_bar = ProgressBar::new(test_count as u64);
        let count_width = test_count.to_string().len();
        let template = format!(
            "[{{elapsed_precise:>9}}] {{wide_bar}} {{pos:>{count_width}}}/{{len:{count_width}}} {{msg}}"
        );
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .progress_chars("=> ")
                .template(&template)
                .expect("template is valid"),
        );
        // Emulate the steady tick rate modulo the refresh rate.
        progress_bar.enable_steady_tick(Duration::from_millis(100));

        let hide_bar = self.hide_progress_bar
            || is_ci::uncached()
            || !matches!(output, ReporterOutput::Terminal);
        if hide_bar {
            progress_bar.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            // Limit the update rate so a fast run doesn't spend its time
            // redrawing the bar.
            progress_bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
        }

        let stopwatch = stopwatch();
        debug!(
            "starting run of {test_count} cases at {}",
            stopwatch.start_time()
        );

        Reporter {
            show_pending: self.show_pending,
            styles,
            output,
            progress_bar,
            stopwatch,
            stats: RunStats {
                initial_run_count: test_count,
                ..RunStats::default()
            },
            failures: Vec::new(),
            pending: Vec::new(),
        }
    }
}

/// Receives task events, keeps the run counters, and renders the report.
pub struct Reporter<'a> {
    show_pending: bool,
    styles: Styles,
    output: ReporterOutput<'a>,
    progress_bar: ProgressBar,
    stopwatch: StopwatchStart,
    stats: RunStats,
    failures: Vec<(String, Excerpt)>,
    pending: Vec<(String, Excerpt)>,
}

impl Reporter<'_> {
    /// Records one finished task, printing its failure block immediately if it
    /// failed.
    pub fn report(&mut self, event: TaskFinished) -> io::Result<()> {
        match event.result.status {
            ExecutionStatus::Fail => {
                self.stats.failed += 1;
                let mut block = String::new();
                if self.stats.failed == 1 {
                    swriteln!(block, "Failures:");
                }
                swriteln!(block);
                let rendered =
                    render_excerpt(&event.result.excerpt, &self.styles, self.styles.fail);
                swriteln!(block, "  {}) {rendered}", self.stats.failed);
                swriteln!(
                    block,
                    "{}",
                    format!("(Failure time: {})", Local::now()).style(self.styles.fail)
                );
                self.failures.push((event.location, event.result.excerpt));
                self.write_block(&block)?;
            }
            ExecutionStatus::Pending => {
                self.stats.pending += 1;
                self.pending.push((event.location, event.result.excerpt));
            }
            ExecutionStatus::Pass => {}
        }
        self.stats.finished_count += 1;
        self.progress_bar
            .set_position(self.stats.finished_count as u64);
        self.progress_bar.set_message(progress_message(&self.stats));
        Ok(())
    }

    /// Finishes the run: clears the progress bar, prints the pending section
    /// and the summary line, and returns the final counters.
    pub fn finish(&mut self) -> io::Result<RunStats> {
        self.progress_bar.finish_and_clear();

        let mut block = String::new();
        if self.show_pending && !self.pending.is_empty() {
            swriteln!(block, "\nPending:");
            for (idx, (_, excerpt)) in self.pending.iter().enumerate() {
                swriteln!(block);
                let rendered = render_excerpt(excerpt, &self.styles, self.styles.pending);
                swriteln!(block, "  {}) {rendered}", idx + 1);
            }
        }

        swriteln!(block);
        swriteln!(
            block,
            "{}",
            format!("Finished in {}", format_duration(self.stopwatch.elapsed()))
                .style(self.styles.pass)
        );

        let mut summary = format!(
            "{} examples, {} failures",
            self.stats.finished_count, self.stats.failed
        );
        if self.stats.pending > 0 {
            swrite!(summary, ", {} pending", self.stats.pending);
        }
        let summary_style = if self.stats.failed > 0 {
            self.styles.fail
        } else {
            self.styles.count
        };
        swriteln!(block, "{}", summary.style(summary_style));

        self.write_block(&block)?;
        debug!("run finished: {:?}", self.stats);
        Ok(self.stats)
    }

    /// The failed cases in failure order, for rerun-script generation.
    pub fn failures(&self) -> &[(String, Excerpt)] {
        &self.failures
    }

    /// Prints the `Failed examples:` section listing the rerun invocations.
    pub fn write_failed_examples(&mut self, script: &RerunScript) -> io::Result<()> {
        let mut block = String::new();
        swriteln!(block, "\nFailed examples:");
        swriteln!(block);
        for entry in script.entries() {
            swriteln!(
                block,
                "{} {}",
                entry.command.style(self.styles.fail),
                format!("# {}", entry.description).style(self.styles.location),
            );
        }
        self.write_block(&block)
    }

    fn write_block(&mut self, block: &str) -> io::Result<()> {
        match &mut self.output {
            ReporterOutput::Terminal => {
                let progress_bar = &self.progress_bar;
                progress_bar.suspend(|| {
                    let mut stderr = io::stderr().lock();
                    stderr.write_all(block.as_bytes())?;
                    stderr.flush()
                })
            }
            ReporterOutput::Buffer(buf) => {
                buf.extend_from_slice(block.as_bytes());
                Ok(())
            }
        }
    }
}

fn progress_message(stats: &RunStats) -> String {
    let mut message = String::new();
    if stats.failed > 0 {
        swrite!(message, "{} failed", stats.failed);
    }
    if stats.pending > 0 {
        if !message.is_empty() {
            message.push_str(", ");
        }
        swrite!(message, "{} pending", stats.pending);
    }
    message
}

/// Renders an excerpt with per-line styling. The first line carries no
/// leading indentation so it can sit behind the item number.
fn render_excerpt(excerpt: &Excerpt, styles: &Styles, description_style: Style) -> String {
    let mut out = String::new();
    for (idx, line) in excerpt.lines().iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        match line {
            ExcerptLine::Description(text) => {
                swrite!(out, "{}", text.style(description_style));
            }
            ExcerptLine::Location(text) => {
                swrite!(out, "{}", text.style(styles.location));
            }
            ExcerptLine::Detail(text) => {
                swrite!(out, "{}", text.style(styles.fail));
            }
            ExcerptLine::Plain(text) => {
                swrite!(out, "{text}");
            }
        }
    }
    out
}
