// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result},
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use parspec_runner::{
    list::TestList,
    reporter::ReporterBuilder,
    rerun::RerunScript,
    runner::TestRunnerBuilder,
    test_command::{EnvOverrides, TestCommand},
    test_filter::TestFilter,
};
use std::{io::Write, time::Duration};
use tracing::{info, warn};

/// A parallel runner for spec-style test suites.
#[derive(Debug, Parser)]
#[command(
    version,
    bin_name = "parspec",
    styles = crate::output::clap_styles::style(),
    max_term_width = 100
)]
pub struct ParspecApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl ParspecApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::List {
                case_folder,
                filter_opts,
            } => {
                let filter = filter_opts.build()?;
                let list = filter.filter_list(&TestList::discover(&case_folder)?);
                let mut writer = output_writer.stdout_writer();
                list.write_human(&mut writer)
                    .and_then(|()| writer.flush())
                    .map_err(|err| ExpectedError::WriteOutputError { err })?;
                Ok(0)
            }
            Command::Run {
                case_folder,
                filter_opts,
                runner_opts,
                reporter_opts,
            } => {
                let filter = filter_opts.build()?;
                let tasks = filter.apply(&TestList::discover(&case_folder)?);
                let command = TestCommand::from_shell(&runner_opts.runner)?;
                let env_overrides = runner_opts.read_env_overrides()?;

                if output.verbose {
                    info!("running {} cases with `{command}`", tasks.len());
                }
                info!("threads number: {}", runner_opts.jobs);
                let runner = TestRunnerBuilder::default()
                    .set_thread_count(runner_opts.jobs)
                    .set_ramp_up(Duration::from_millis(runner_opts.ramp_up_ms))
                    .set_env_overrides(env_overrides)
                    .build(command.clone())?;

                let should_colorize = output
                    .color
                    .should_colorize(supports_color::Stream::Stderr);
                let mut reporter = ReporterBuilder::default()
                    .set_show_pending(reporter_opts.show_pending)
                    .set_colorize(should_colorize)
                    .set_hide_progress_bar(reporter_opts.hide_progress_bar)
                    .build(tasks.len(), output_writer.reporter_output());

                // A failed terminal write must not take the run down.
                runner.execute(tasks, |event| {
                    if let Err(error) = reporter.report(event) {
                        warn!("error writing to terminal: {error}");
                    }
                });

                let stats = reporter
                    .finish()
                    .map_err(|err| ExpectedError::WriteOutputError { err })?;

                if stats.is_success() {
                    Ok(0)
                } else {
                    let script = RerunScript::from_failures(&command, reporter.failures());
                    script.write(Utf8Path::new("."))?;
                    reporter
                        .write_failed_examples(&script)
                        .map_err(|err| ExpectedError::WriteOutputError { err })?;
                    Err(ExpectedError::TestRunFailed)
                }
            }
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List cases discovered in the case folder
    List {
        /// Folder scanned recursively for `*_spec.rb` files
        #[arg(value_name = "CASE-FOLDER")]
        case_folder: Utf8PathBuf,

        #[clap(flatten)]
        filter_opts: FilterOpts,
    },
    /// Run cases in parallel
    Run {
        /// Folder scanned recursively for `*_spec.rb` files
        #[arg(value_name = "CASE-FOLDER")]
        case_folder: Utf8PathBuf,

        #[clap(flatten)]
        filter_opts: FilterOpts,

        #[clap(flatten)]
        runner_opts: RunnerOpts,

        #[clap(flatten)]
        reporter_opts: ReporterOpts,
    },
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Filter options")]
struct FilterOpts {
    /// Run only cases whose location matches this regular expression
    #[arg(long, short = 'p', value_name = "REGEX")]
    pattern: Option<String>,

    /// Comma-separated tags; prefix a tag with `~` to exclude it
    #[arg(long, short = 't', value_name = "TAGS")]
    tags: Option<String>,
}

impl FilterOpts {
    fn build(&self) -> Result<TestFilter> {
        Ok(TestFilter::new(
            self.pattern.as_deref(),
            self.tags.as_deref(),
        )?)
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Runner options")]
struct RunnerOpts {
    /// Number of worker threads
    #[arg(
        long,
        short = 'j',
        value_name = "N",
        env = "PARSPEC_THREADS",
        default_value_t = 1
    )]
    jobs: usize,

    /// Command that runs a single case location
    #[arg(
        long,
        value_name = "COMMAND",
        env = "PARSPEC_RUNNER",
        default_value = "bundle exec rspec"
    )]
    runner: String,

    /// JSON file with one environment map per worker
    #[arg(long, value_name = "PATH")]
    env_file: Option<Utf8PathBuf>,

    /// Delay in milliseconds between worker starts
    #[arg(long, value_name = "MS", default_value_t = 100)]
    ramp_up_ms: u64,
}

impl RunnerOpts {
    /// Reads the per-worker environment maps. Worker `i` receives the map at
    /// index `i`; workers beyond the end of the list run with no overrides.
    fn read_env_overrides(&self) -> Result<Vec<EnvOverrides>> {
        let Some(file) = &self.env_file else {
            return Ok(Vec::new());
        };
        let text =
            fs_err::read_to_string(file).map_err(|err| ExpectedError::EnvFileReadError {
                file: file.clone(),
                err,
            })?;
        serde_json::from_str(&text).map_err(|err| ExpectedError::EnvFileParseError {
            file: file.clone(),
            err,
        })
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Reporter options")]
struct ReporterOpts {
    /// List pending cases in the final summary
    #[arg(long)]
    show_pending: bool,

    /// Hide the progress bar
    #[arg(long, env = "PARSPEC_HIDE_PROGRESS_BAR")]
    hide_progress_bar: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use clap::CommandFactory;

    #[test]
    fn app_command_is_well_formed() {
        ParspecApp::command().debug_assert();
    }

    #[test]
    fn list_writes_discovered_cases_to_stdout() {
        let temp_dir = Utf8TempDir::new().unwrap();
        fs_err::write(
            temp_dir.path().join("sample_spec.rb"),
            "describe Sample, :smoke do\n  it \"works\" do\n  end\nend\n",
        )
        .unwrap();

        let app = ParspecApp::try_parse_from([
            "parspec",
            "list",
            temp_dir.path().as_str(),
        ])
        .unwrap();
        let output = app.init_output();
        let mut output_writer = OutputWriter::Test {
            stdout: Vec::new(),
            stderr: Vec::new(),
        };
        let code = app.exec(output, &mut output_writer).unwrap();
        assert_eq!(code, 0);

        let OutputWriter::Test { stdout, .. } = output_writer else {
            unreachable!();
        };
        let text = String::from_utf8(stdout).unwrap();
        assert!(text.contains("sample_spec.rb:2"), "{text}");
        assert!(text.contains("smoke"), "{text}");
    }

    #[test]
    fn tag_exclusion_is_parsed_from_the_command_line() {
        let app = ParspecApp::try_parse_from([
            "parspec",
            "list",
            "spec",
            "--tags",
            "smoke,~slow",
        ])
        .unwrap();
        let Command::List { filter_opts, .. } = &app.command else {
            panic!("expected list command");
        };
        assert!(filter_opts.build().is_ok());
    }
}
