//! Bounded parallel processing of independent tasks.
//!
//! A [`BatchRunner`] owns a rayon pool of fixed size and a global timeout.
//! Every task receives a shared [`CancelToken`] and is expected to poll it at
//! step boundaries. A task that notices cancellation reports
//! [`TaskOutcome::Cancelled`]; siblings keep their own outcomes.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use miette::Diagnostic;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::BatchConfig;
use crate::error::OmrError;
use crate::eval::{Evaluation, GlyphEvaluator, GlyphMonitor, TrainingMonitor};
use crate::glyph::Glyph;

/// Errors from batch processing.
#[derive(Debug, Error, Diagnostic)]
pub enum BatchError {
    #[error("failed to build worker pool: {message}")]
    #[diagnostic(
        code(omr::batch::pool),
        help("Lower `batch.threads` in the config file, or set it to 0 for one thread per core.")
    )]
    ThreadPool { message: String },

    #[error("task {task} panicked")]
    #[diagnostic(
        code(omr::batch::panic),
        help("This is a bug. Rerun the task alone with RUST_LOG=debug to locate it.")
    )]
    TaskPanicked { task: String },
}

pub type BatchResult<T> = std::result::Result<T, BatchError>;

/// Cooperative cancellation shared by every task of a batch.
///
/// Cancelled either explicitly or once its deadline has passed. Clones share
/// the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that cancels itself `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl GlyphMonitor for CancelToken {
    fn should_stop(&self) -> bool {
        self.is_cancelled()
    }
}

impl TrainingMonitor for CancelToken {
    fn should_stop(&self) -> bool {
        self.is_cancelled()
    }
}

/// How a task ended. Cancellation is an outcome, not an error.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),
    Cancelled,
    Failed(OmrError),
}

impl<T> TaskOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            TaskOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Result<T, OmrError>> for TaskOutcome<T> {
    fn from(result: Result<T, OmrError>) -> Self {
        match result {
            Ok(value) => TaskOutcome::Completed(value),
            Err(e) => TaskOutcome::Failed(e),
        }
    }
}

/// Outcome of one named task.
#[derive(Debug)]
pub struct TaskReport<T> {
    pub name: String,
    pub outcome: TaskOutcome<T>,
    pub elapsed: Duration,
}

/// Outcome counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub completed: usize,
    pub cancelled: usize,
    pub failed: usize,
}

impl BatchStats {
    pub fn from_reports<T>(reports: &[TaskReport<T>]) -> Self {
        let mut stats = Self::default();
        for report in reports {
            match report.outcome {
                TaskOutcome::Completed(_) => stats.completed += 1,
                TaskOutcome::Cancelled => stats.cancelled += 1,
                TaskOutcome::Failed(_) => stats.failed += 1,
            }
        }
        stats
    }
}

/// Runs tasks on a bounded worker pool under a global timeout.
pub struct BatchRunner {
    pool: rayon::ThreadPool,
    timeout: Duration,
}

impl BatchRunner {
    pub fn new(config: &BatchConfig) -> BatchResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("omr-worker-{i}"))
            .build()
            .map_err(|e| BatchError::ThreadPool {
                message: e.to_string(),
            })?;
        Ok(Self {
            pool,
            timeout: config.timeout(),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run every task under a fresh token bound to the batch timeout.
    pub fn run<I, T, F>(&self, tasks: Vec<(String, I)>, work: F) -> Vec<TaskReport<T>>
    where
        I: Send,
        T: Send,
        F: Fn(I, &CancelToken) -> TaskOutcome<T> + Sync,
    {
        let token = CancelToken::with_timeout(self.timeout);
        self.run_with(tasks, &token, work)
    }

    /// Run every task under a caller-provided token. Reports come back in
    /// task order. Tasks not yet started when the token fires are reported
    /// cancelled without running.
    pub fn run_with<I, T, F>(
        &self,
        tasks: Vec<(String, I)>,
        token: &CancelToken,
        work: F,
    ) -> Vec<TaskReport<T>>
    where
        I: Send,
        T: Send,
        F: Fn(I, &CancelToken) -> TaskOutcome<T> + Sync,
    {
        let total = tasks.len();
        let reports: Vec<TaskReport<T>> = self.pool.install(|| {
            tasks
                .into_par_iter()
                .map(|(name, input)| {
                    let start = Instant::now();
                    let outcome = if token.is_cancelled() {
                        TaskOutcome::Cancelled
                    } else {
                        catch_unwind(AssertUnwindSafe(|| work(input, token))).unwrap_or_else(|_| {
                            TaskOutcome::Failed(BatchError::TaskPanicked { task: name.clone() }.into())
                        })
                    };
                    match &outcome {
                        TaskOutcome::Completed(_) => tracing::debug!(task = %name, "task completed"),
                        TaskOutcome::Cancelled => tracing::warn!(task = %name, "task cancelled"),
                        TaskOutcome::Failed(e) => tracing::warn!(task = %name, error = %e, "task failed"),
                    }
                    TaskReport {
                        name,
                        outcome,
                        elapsed: start.elapsed(),
                    }
                })
                .collect()
        });
        let stats = BatchStats::from_reports(&reports);
        tracing::info!(
            tasks = total,
            completed = stats.completed,
            cancelled = stats.cancelled,
            failed = stats.failed,
            "batch finished"
        );
        reports
    }

    /// Evaluate glyphs concurrently. Results come back in glyph order.
    pub fn evaluate_all(&self, evaluator: &dyn GlyphEvaluator, glyphs: &[&Glyph]) -> Vec<Vec<Evaluation>> {
        self.pool.install(|| {
            glyphs
                .par_iter()
                .map(|glyph| evaluator.get_all_evaluations(glyph))
                .collect()
        })
    }
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("threads", &self.threads())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GlyphError;

    fn runner(threads: usize, timeout_secs: u64) -> BatchRunner {
        BatchRunner::new(&BatchConfig {
            threads,
            timeout_secs,
        })
        .unwrap()
    }

    #[test]
    fn token_cancels_explicitly_and_on_deadline() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());

        let expired = CancelToken::with_timeout(Duration::ZERO);
        assert!(expired.is_cancelled());
        assert!(GlyphMonitor::should_stop(&expired));
    }

    #[test]
    fn outcomes_are_reported_per_task_in_order() {
        let runner = runner(2, 60);
        let tasks: Vec<(String, u32)> = (0..6).map(|i| (format!("t{i}"), i)).collect();
        let reports = runner.run(tasks, |i, _token| match i % 3 {
            0 => TaskOutcome::Completed(i * 10),
            1 => TaskOutcome::Cancelled,
            _ => TaskOutcome::Failed(GlyphError::EmptyCompound.into()),
        });
        let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["t0", "t1", "t2", "t3", "t4", "t5"]);
        assert_eq!(
            BatchStats::from_reports(&reports),
            BatchStats {
                completed: 2,
                cancelled: 2,
                failed: 2
            }
        );
    }

    #[test]
    fn expired_batch_cancels_pending_tasks() {
        let runner = runner(1, 0);
        let reports = runner.run(vec![("a".to_string(), ()), ("b".to_string(), ())], |_, _| {
            TaskOutcome::Completed(())
        });
        assert!(reports.iter().all(|r| r.outcome.is_cancelled()));
    }

    #[test]
    fn a_panicking_task_does_not_sink_its_siblings() {
        let runner = runner(2, 60);
        let tasks = vec![("ok".to_string(), false), ("boom".to_string(), true)];
        let reports = runner.run(tasks, |explode, _| {
            if explode {
                panic!("boom");
            }
            TaskOutcome::Completed(1)
        });
        assert!(reports[0].outcome.is_completed());
        assert!(matches!(
            reports[1].outcome,
            TaskOutcome::Failed(OmrError::Batch(BatchError::TaskPanicked { .. }))
        ));
    }

    #[test]
    fn result_converts_to_outcome() {
        let ok: TaskOutcome<u8> = Ok(3).into();
        assert_eq!(ok.completed(), Some(3));
        let err: TaskOutcome<u8> = Err(OmrError::from(GlyphError::EmptyCompound)).into();
        assert!(matches!(err, TaskOutcome::Failed(_)));
    }
}
