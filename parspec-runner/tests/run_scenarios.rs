// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios driving the runner with a stub external command and
//! feeding its events through the reporter.

#![cfg(unix)]

use camino_tempfile::Utf8TempDir;
use indoc::indoc;
use parspec_runner::{
    classify::ExecutionStatus,
    reporter::{Reporter, ReporterBuilder, ReporterOutput, RunStats},
    rerun::{RERUN_SCRIPT_NAME, RerunScript},
    runner::{TestRunner, TestRunnerBuilder},
    test_command::TestCommand,
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

/// Writes a stub runner script that reports per-location outcomes based on
/// the location text, and returns the command that invokes it.
///
/// The runner appends `--color <location>` to the configured command, so
/// inside the script `$2` is the location.
fn stub_runner(dir: &Utf8TempDir) -> TestCommand {
    let script = indoc! {r#"
        location="$2"
        case "$location" in
            *fail*)
                printf 'Failures:\n\n  1) Group stub case\n     boom\n     # %s\n\n' "$location"
                printf 'Finished in 0.01 seconds\n1 example, 1 failure\n'
                ;;
            *pending*)
                printf 'Pending:\n  Group stub case\n    # %s\n' "$location"
                printf 'Finished in 0.01 seconds\n1 example, 0 failures, 1 pending\n'
                ;;
            *)
                printf '1 example, 0 failures\n'
                ;;
        esac
        if [ -n "$PARSPEC_STUB_MARKER" ]; then
            printf 'marker: %s\n' "$PARSPEC_STUB_MARKER"
        fi
    "#};
    let path = dir.path().join("stub_runner.sh");
    fs_err::write(&path, script).unwrap();
    TestCommand::from_shell(&format!("sh {path}")).unwrap()
}

fn run_to_reporter(
    runner: &TestRunner,
    reporter: &mut Reporter<'_>,
    tasks: Vec<String>,
) -> RunStats {
    runner.execute(tasks, |event| {
        reporter.report(event).unwrap();
    });
    reporter.finish().unwrap()
}

#[test]
fn mixed_run_aggregates_outcomes() {
    let temp_dir = Utf8TempDir::new().unwrap();
    let runner = TestRunnerBuilder::default()
        .set_thread_count(2)
        .set_ramp_up(Duration::ZERO)
        .build(stub_runner(&temp_dir))
        .unwrap();

    let tasks: Vec<String> = [
        "./spec/a_spec.rb:3",
        "./spec/b_spec.rb:9",
        "./spec/pending_spec.rb:5",
        "./spec/fail_spec.rb:12",
        "./spec/c_spec.rb:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let mut buf = Vec::new();
    let mut reporter = ReporterBuilder::default()
        .set_show_pending(true)
        .build(tasks.len(), ReporterOutput::Buffer(&mut buf));
    let stats = run_to_reporter(&runner, &mut reporter, tasks);

    assert_eq!(
        stats,
        RunStats {
            initial_run_count: 5,
            finished_count: 5,
            failed: 1,
            pending: 1,
        }
    );
    assert!(!stats.is_success());
    assert_eq!(reporter.failures().len(), 1);
    assert_eq!(reporter.failures()[0].0, "./spec/fail_spec.rb:12");

    let text = String::from_utf8(buf).unwrap();
    assert!(text.contains("Failures:"), "{text}");
    assert!(text.contains("Group stub case"), "{text}");
    assert!(text.contains("Pending:"), "{text}");
    assert!(text.contains("5 examples, 1 failures, 1 pending"), "{text}");
}

#[test]
fn every_queued_task_runs_exactly_once() {
    let temp_dir = Utf8TempDir::new().unwrap();
    let runner = TestRunnerBuilder::default()
        .set_thread_count(4)
        .set_ramp_up(Duration::ZERO)
        .build(stub_runner(&temp_dir))
        .unwrap();

    let tasks: Vec<String> = (1..=20).map(|n| format!("./spec/a_spec.rb:{n}")).collect();
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        runner.execute(tasks.clone(), move |event| {
            assert_eq!(event.result.status, ExecutionStatus::Pass);
            seen.lock().unwrap().push(event.location);
        });
    }

    let mut seen = Arc::try_unwrap(seen).unwrap().into_inner().unwrap();
    seen.sort();
    let mut expected = tasks;
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn failures_feed_the_rerun_script() {
    let temp_dir = Utf8TempDir::new().unwrap();
    let command = stub_runner(&temp_dir);
    let runner = TestRunnerBuilder::default()
        .set_ramp_up(Duration::ZERO)
        .build(command.clone())
        .unwrap();

    let tasks = vec![
        "./spec/fail_spec.rb:12".to_owned(),
        "./spec/fail_spec.rb:34".to_owned(),
    ];
    let mut buf = Vec::new();
    let mut reporter =
        ReporterBuilder::default().build(tasks.len(), ReporterOutput::Buffer(&mut buf));
    let stats = run_to_reporter(&runner, &mut reporter, tasks);
    assert_eq!(stats.failed, 2);

    let script = RerunScript::from_failures(&command, reporter.failures());
    let path = script.write(temp_dir.path()).unwrap();
    assert_eq!(path, temp_dir.path().join(RERUN_SCRIPT_NAME));

    let rendered = fs_err::read_to_string(&path).unwrap();
    assert!(rendered.contains("./spec/fail_spec.rb:12"), "{rendered}");
    assert!(rendered.contains("./spec/fail_spec.rb:34"), "{rendered}");
    assert!(rendered.contains("echo ----Group stub case"), "{rendered}");

    reporter.write_failed_examples(&script).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert!(text.contains("Failed examples:"), "{text}");
}

#[test]
fn per_worker_env_reaches_the_external_command() {
    let temp_dir = Utf8TempDir::new().unwrap();
    let env: Vec<BTreeMap<String, String>> = vec![BTreeMap::from([(
        "PARSPEC_STUB_MARKER".to_owned(),
        "worker-zero".to_owned(),
    )])];
    let runner = TestRunnerBuilder::default()
        .set_ramp_up(Duration::ZERO)
        .set_env_overrides(env)
        .build(stub_runner(&temp_dir))
        .unwrap();

    let outputs = Mutex::new(Vec::new());
    runner.execute(vec!["./spec/a_spec.rb:3".to_owned()], |event| {
        outputs.lock().unwrap().push(event.result.output);
    });

    let outputs = outputs.into_inner().unwrap();
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].contains("marker: worker-zero"), "{}", outputs[0]);
}

#[test]
fn rerun_script_reruns_only_the_failures() {
    let temp_dir = Utf8TempDir::new().unwrap();
    let command = stub_runner(&temp_dir);
    let runner = TestRunnerBuilder::default()
        .set_ramp_up(Duration::ZERO)
        .build(command.clone())
        .unwrap();

    let tasks = vec![
        "./spec/a_spec.rb:3".to_owned(),
        "./spec/fail_spec.rb:12".to_owned(),
    ];
    let mut buf = Vec::new();
    let mut reporter =
        ReporterBuilder::default().build(tasks.len(), ReporterOutput::Buffer(&mut buf));
    run_to_reporter(&runner, &mut reporter, tasks);

    let script = RerunScript::from_failures(&command, reporter.failures());
    let commands: Vec<_> = script.entries().iter().map(|e| e.command.as_str()).collect();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].ends_with("./spec/fail_spec.rb:12"), "{}", commands[0]);
}
