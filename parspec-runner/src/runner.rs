// Copyright (c) The parspec Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The work queue and worker pool driving parallel case execution.
//!
//! The main structure in this module is [`TestRunner`], created by a
//! [`TestRunnerBuilder`].

use crate::{
    classify::ExecutionResult,
    errors::TestRunnerBuildError,
    test_command::{EnvOverrides, TestCommand},
};
use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{Mutex, PoisonError},
    thread,
    time::Duration,
};
use tracing::debug;

/// Default delay between worker thread spawns.
const DEFAULT_RAMP_UP: Duration = Duration::from_millis(100);

/// An event emitted once per completed task.
#[derive(Clone, Debug)]
pub struct TaskFinished {
    /// Index of the worker that executed the task.
    pub worker: usize,

    /// The `file:line` task that completed.
    pub location: String,

    /// The classified result.
    pub result: ExecutionResult,
}

/// Builder for [`TestRunner`].
#[derive(Clone, Debug)]
pub struct TestRunnerBuilder {
    thread_count: usize,
    ramp_up: Duration,
    env_overrides: Vec<EnvOverrides>,
}

impl Default for TestRunnerBuilder {
    fn default() -> Self {
        Self {
            thread_count: 1,
            ramp_up: DEFAULT_RAMP_UP,
            env_overrides: Vec::new(),
        }
    }
}

impl TestRunnerBuilder {
    /// Sets the number of worker threads. Must be at least 1.
    pub fn set_thread_count(&mut self, thread_count: usize) -> &mut Self {
        self.thread_count = thread_count;
        self
    }

    /// Sets the delay between worker thread spawns, staggering the initial
    /// burst of subprocess spawns.
    pub fn set_ramp_up(&mut self, ramp_up: Duration) -> &mut Self {
        self.ramp_up = ramp_up;
        self
    }

    /// Sets per-worker environment overrides; entry `i` applies to every task
    /// executed by worker `i`. Workers without an entry inherit the process
    /// environment unchanged.
    pub fn set_env_overrides(&mut self, env_overrides: Vec<EnvOverrides>) -> &mut Self {
        self.env_overrides = env_overrides;
        self
    }

    /// Builds the runner, validating the configuration.
    pub fn build(&self, command: TestCommand) -> Result<TestRunner, TestRunnerBuildError> {
        if self.thread_count < 1 {
            return Err(TestRunnerBuildError::InvalidThreadCount {
                thread_count: self.thread_count,
            });
        }
        Ok(TestRunner {
            command,
            thread_count: self.thread_count,
            ramp_up: self.ramp_up,
            env_overrides: self.env_overrides.clone(),
        })
    }
}

/// Executes queued tasks across a fixed pool of worker threads.
#[derive(Debug)]
pub struct TestRunner {
    command: TestCommand,
    thread_count: usize,
    ramp_up: Duration,
    env_overrides: Vec<EnvOverrides>,
}

impl TestRunner {
    /// Runs every task in `tasks`, invoking `callback` once per completed
    /// task, and returns once all workers have drained the queue.
    ///
    /// The queue is fully populated before the first worker starts. Each pop
    /// happens under the queue lock, so no task is ever claimed twice or
    /// dropped. `callback` is invoked under a single run-wide lock: counter
    /// updates and console writes are never interleaved across workers.
    ///
    /// There is no per-task timeout; a hung subprocess occupies its worker
    /// until the subprocess exits.
    pub fn execute<F>(&self, tasks: Vec<String>, callback: F)
    where
        F: FnMut(TaskFinished) + Send,
    {
        let queue = Mutex::new(VecDeque::from(tasks));
        let callback = Mutex::new(callback);
        thread::scope(|scope| {
            for worker in 0..self.thread_count {
                let queue = &queue;
                let callback = &callback;
                let env = self.env_overrides.get(worker).cloned().unwrap_or_default();
                scope.spawn(move || self.worker_loop(worker, env, queue, callback));
                // Ramp up worker threads one by one.
                thread::sleep(self.ramp_up);
            }
        });
    }

    fn worker_loop<F>(
        &self,
        worker: usize,
        env: EnvOverrides,
        queue: &Mutex<VecDeque<String>>,
        callback: &Mutex<F>,
    ) where
        F: FnMut(TaskFinished) + Send,
    {
        loop {
            let task = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(location) = task else { break };
            debug!("worker {worker}: running {location}");
            let result = self.run_one(&location, &env);
            let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
            (callback)(TaskFinished {
                worker,
                location,
                result,
            });
        }
        debug!("worker {worker}: queue empty, exiting");
    }

    /// Executes and classifies one task. Spawn failures and panics are
    /// converted into failure results so one bad task never takes down its
    /// worker or the run, and the outcome count stays equal to the number of
    /// dequeued tasks.
    fn run_one(&self, location: &str, env: &EnvOverrides) -> ExecutionResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            match self.command.run(location, env) {
                Ok(output) => ExecutionResult::from_output(output),
                Err(error) => {
                    ExecutionResult::synthetic_failure(format!("failed to execute runner: {error}"))
                }
            }
        }));
        outcome.unwrap_or_else(|payload| ExecutionResult::synthetic_failure(panic_message(&payload)))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {message}")
    } else {
        "worker panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ExecutionStatus;

    #[test]
    fn thread_count_below_one_is_rejected() {
        let mut builder = TestRunnerBuilder::default();
        builder.set_thread_count(0);
        assert!(matches!(
            builder.build(TestCommand::default()),
            Err(TestRunnerBuildError::InvalidThreadCount { thread_count: 0 })
        ));
    }

    #[test]
    fn empty_queue_completes_immediately() {
        let runner = TestRunnerBuilder::default()
            .set_ramp_up(Duration::ZERO)
            .build(TestCommand::default())
            .unwrap();
        let mut events = Vec::new();
        runner.execute(Vec::new(), |event| events.push(event));
        assert!(events.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn every_task_is_claimed_exactly_once() {
        let tasks: Vec<String> = (0..20).map(|i| format!("spec/gen_spec.rb:{i}")).collect();
        let runner = TestRunnerBuilder::default()
            .set_thread_count(4)
            .set_ramp_up(Duration::ZERO)
            .build(TestCommand::from_shell("echo").unwrap())
            .unwrap();

        let mut seen = Vec::new();
        runner.execute(tasks.clone(), |event| {
            assert_eq!(event.result.status, ExecutionStatus::Pass);
            seen.push(event.location);
        });

        seen.sort();
        let mut expected = tasks;
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[cfg(unix)]
    #[test]
    fn spawn_failure_becomes_a_task_failure() {
        let runner = TestRunnerBuilder::default()
            .set_ramp_up(Duration::ZERO)
            .build(TestCommand::from_shell("/nonexistent/parspec-runner-binary").unwrap())
            .unwrap();

        let mut statuses = Vec::new();
        runner.execute(vec!["spec/a_spec.rb:1".to_owned()], |event| {
            statuses.push(event.result.status);
        });
        assert_eq!(statuses, vec![ExecutionStatus::Fail]);
    }

    #[cfg(unix)]
    #[test]
    fn per_worker_env_overrides_reach_the_subprocess() {
        // Worker 0 forces a pending marker through its environment; the
        // stub runner just prints the variable back.
        let command = TestCommand::from_shell("sh -c 'printf %s \"$PARSPEC_MARKER\"'").unwrap();
        let env: EnvOverrides = [("PARSPEC_MARKER".to_owned(), "Pending".to_owned())]
            .into_iter()
            .collect();
        let runner = TestRunnerBuilder::default()
            .set_ramp_up(Duration::ZERO)
            .set_env_overrides(vec![env])
            .build(command)
            .unwrap();

        let mut statuses = Vec::new();
        runner.execute(vec!["spec/a_spec.rb:1".to_owned()], |event| {
            statuses.push(event.result.status);
        });
        assert_eq!(statuses, vec![ExecutionStatus::Pending]);
    }
}
