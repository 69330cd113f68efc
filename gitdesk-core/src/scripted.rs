//! Scripted process runner for deterministic testing.
//!
//! Replays queued results in order and records every invocation so tests
//! can check the exact argv, working directory and environment.
//!
//! ```
//! use gitdesk_core::scripted::ScriptedRunner;
//! use gitdesk_core::{Invocation, ProcessRunner};
//!
//! # tokio_test_block_on(async {
//! let runner = ScriptedRunner::new();
//! runner.push(0, "main\n", "");
//!
//! let result = runner
//!     .run(&Invocation::new("git", "/repo").args(["symbolic-ref", "--short", "HEAD"]))
//!     .await
//!     .unwrap();
//! assert_eq!(result.stdout, "main\n");
//! assert_eq!(runner.recorded_args(), vec![vec!["symbolic-ref", "--short", "HEAD"]]);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::error::{GitError, Result};
use crate::runner::{CommandResult, Invocation, ProcessRunner};

#[derive(Debug)]
enum Scripted {
    Output(CommandResult),
    SpawnFailure,
}

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<Scripted>,
    fallback: Option<CommandResult>,
    calls: Vec<Invocation>,
}

/// Runner that answers from a script instead of spawning processes.
///
/// Once the queue is drained the fallback result is returned, or a
/// successful empty result when no fallback was set.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    inner: Mutex<Inner>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that answers every invocation with the same result.
    pub fn always(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        let runner = Self::new();
        runner.lock().fallback = Some(CommandResult::new(exit_code, stdout, stderr));
        runner
    }

    /// Queues the result for the next unanswered invocation.
    pub fn push(&self, exit_code: i32, stdout: &str, stderr: &str) -> &Self {
        self.lock()
            .queue
            .push_back(Scripted::Output(CommandResult::new(exit_code, stdout, stderr)));
        self
    }

    /// Queues a failure to start the process.
    pub fn push_spawn_failure(&self) -> &Self {
        self.lock().queue.push_back(Scripted::SpawnFailure);
        self
    }

    /// Every invocation received so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.lock().calls.clone()
    }

    /// Arguments (without the program) of every invocation so far.
    pub fn recorded_args(&self) -> Vec<Vec<String>> {
        self.lock()
            .calls
            .iter()
            .map(|call| call.arguments().to_vec())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandResult> {
        let mut inner = self.lock();
        inner.calls.push(invocation.clone());

        match inner.queue.pop_front() {
            Some(Scripted::Output(result)) => Ok(result),
            Some(Scripted::SpawnFailure) => Err(GitError::Spawn {
                program: invocation.program().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn failure"),
            }),
            None => Ok(inner
                .fallback
                .clone()
                .unwrap_or_else(|| CommandResult::new(0, "", ""))),
        }
    }
}
