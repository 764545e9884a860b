// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::errors::{ExecutionError, FailureStrategy, TaskError};
use crate::observability::messages::pool::{BatchCancelled, BatchStarted, TaskSlotFailed};
use crate::observability::messages::StructuredLog;

use super::{PoolOperation, Task};

/// Fixed-size pool of parallel workers for out-of-process fan-out.
///
/// Workers are capped by a semaphore rather than pinned threads: every task
/// is a `tokio::spawn` that first acquires a permit, so at most `workers`
/// tasks are in flight while the rest queue greedily.
///
/// # Cancellation
///
/// The pool observes a `CancellationToken` (typically wired to Ctrl-C by the
/// entry point). In the default mode a cancelled batch drops its in-flight
/// futures immediately, which kills their child processes through
/// kill-on-drop: no zombies, no ignored interrupts. In graceful mode the
/// in-flight task of each worker finishes first, trading latency for not
/// discarding partial work. Either way `map` returns
/// `ExecutionError::Cancelled` rather than hanging or silently dropping the
/// request.
///
/// # Failure policy
///
/// A failed task occupies its result slot as `Err(TaskError)`; successes and
/// failures stay distinguishable. With `FailureStrategy::FailFast` the first
/// failure also cancels the rest of the batch. The pipeline default is
/// per-slot isolation (`ContinueOnError`) with a `rollup` afterwards.
pub struct WorkerPool {
    workers: usize,
    graceful: bool,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Create a pool with a fixed worker count observing `cancel`.
    pub fn new(workers: usize, cancel: CancellationToken) -> Self {
        WorkerPool {
            workers: workers.max(1),
            graceful: false,
            cancel,
        }
    }

    /// Let the in-flight task of each worker finish before honoring a
    /// cancellation.
    pub fn with_graceful_shutdown(mut self) -> Self {
        self.graceful = true;
        self
    }

    /// Map `op` over `tasks` with the default failure strategy.
    pub async fn map<Op>(
        &self,
        op: Arc<Op>,
        tasks: Vec<Task<Op::Arg>>,
    ) -> Result<Vec<Result<Op::Output, TaskError>>, ExecutionError>
    where
        Op: PoolOperation + 'static,
    {
        self.map_with_strategy(op, tasks, FailureStrategy::default())
            .await
    }

    /// Map `op` over `tasks`, one result slot per task, in task order.
    pub async fn map_with_strategy<Op>(
        &self,
        op: Arc<Op>,
        tasks: Vec<Task<Op::Arg>>,
        strategy: FailureStrategy,
    ) -> Result<Vec<Result<Op::Output, TaskError>>, ExecutionError>
    where
        Op: PoolOperation + 'static,
    {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let shape = tasks[0].shape();
        if tasks.iter().any(|task| task.shape() != shape) {
            return Err(ExecutionError::MixedTaskShapes {
                batch_size: tasks.len(),
            });
        }
        if self.cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        BatchStarted {
            operation: op.name(),
            task_count: tasks.len(),
            workers: self.workers,
        }
        .log();

        // The batch token lets FailFast stop a batch without touching the
        // run-wide token; parent cancellation propagates into it.
        let batch = self.cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let op = Arc::clone(&op);
            let semaphore = Arc::clone(&semaphore);
            let batch = batch.clone();
            let graceful = self.graceful;

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(TaskError::Cancelled),
                };
                // Cancellation is checked between work items: a queued task
                // that reaches the front after cancellation never starts.
                if batch.is_cancelled() {
                    return Err(TaskError::Cancelled);
                }

                let work = async {
                    match task {
                        Task::Positional(args) => op.positional(args).await,
                        Task::Named(args) => op.named(args).await,
                        Task::Single(arg) => op.single(arg).await,
                    }
                };

                let result = if graceful {
                    work.await
                } else {
                    tokio::select! {
                        biased;
                        _ = batch.cancelled() => Err(TaskError::Cancelled),
                        result = work => result,
                    }
                };

                if strategy == FailureStrategy::FailFast
                    && matches!(result, Err(ref err) if !matches!(err, TaskError::Cancelled))
                {
                    batch.cancel();
                }
                result
            }));
        }

        let op_name = op.name();
        let mut results = Vec::with_capacity(handles.len());
        for (slot, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(result) => {
                    if let Err(ref err) = result {
                        if !matches!(err, TaskError::Cancelled) {
                            TaskSlotFailed {
                                operation: op_name,
                                slot,
                                error: err,
                            }
                            .log();
                        }
                    }
                    results.push(result);
                }
                Err(join_err) if join_err.is_cancelled() => {
                    results.push(Err(TaskError::Cancelled));
                }
                Err(join_err) => {
                    return Err(ExecutionError::InternalError {
                        message: format!("task join error: {}", join_err),
                    });
                }
            }
        }

        if self.cancel.is_cancelled() {
            BatchCancelled { operation: op_name }.log();
            return Err(ExecutionError::Cancelled);
        }
        Ok(results)
    }
}

/// Collapse per-slot results into the batch's outputs, or a rollup error
/// naming every failed slot.
pub fn rollup<R>(results: Vec<Result<R, TaskError>>) -> Result<Vec<R>, ExecutionError> {
    let mut outputs = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (slot, result) in results.into_iter().enumerate() {
        match result {
            Ok(output) => outputs.push(output),
            Err(err) => failures.push((slot, err.to_string())),
        }
    }
    if failures.is_empty() {
        Ok(outputs)
    } else {
        Err(ExecutionError::BatchFailed { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::time::Duration;

    /// Echoes its argument back after an optional delay.
    struct Echo {
        delay: Duration,
    }

    #[async_trait]
    impl PoolOperation for Echo {
        type Arg = usize;
        type Output = usize;

        fn name(&self) -> &'static str {
            "echo"
        }

        async fn single(&self, arg: usize) -> Result<usize, TaskError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(arg)
        }

        async fn positional(&self, args: Vec<usize>) -> Result<usize, TaskError> {
            Ok(args.iter().sum())
        }

        async fn named(&self, args: BTreeMap<String, usize>) -> Result<usize, TaskError> {
            args.get("value")
                .copied()
                .ok_or_else(|| TaskError::failed("missing 'value' field"))
        }
    }

    /// Fails on odd arguments.
    struct FailOdd;

    #[async_trait]
    impl PoolOperation for FailOdd {
        type Arg = usize;
        type Output = usize;

        fn name(&self) -> &'static str {
            "fail_odd"
        }

        async fn single(&self, arg: usize) -> Result<usize, TaskError> {
            if arg % 2 == 1 {
                Err(TaskError::failed(format!("odd input {}", arg)))
            } else {
                Ok(arg)
            }
        }
    }

    fn pool(workers: usize) -> WorkerPool {
        WorkerPool::new(workers, CancellationToken::new())
    }

    #[tokio::test]
    async fn map_preserves_task_order() {
        // Slower tasks first: completion order differs from task order.
        let op = Arc::new(Echo {
            delay: Duration::from_millis(5),
        });
        let tasks: Vec<Task<usize>> = (0..16).rev().map(Task::Single).collect();
        let results = pool(4).map(op, tasks).await.unwrap();
        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        let expected: Vec<usize> = (0..16).rev().collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn positional_and_named_shapes_dispatch() {
        let op = Arc::new(Echo {
            delay: Duration::ZERO,
        });
        let results = pool(2)
            .map(
                Arc::clone(&op),
                vec![
                    Task::Positional(vec![1, 2, 3]),
                    Task::Positional(vec![10, 20]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(results[0], Ok(6));
        assert_eq!(results[1], Ok(30));

        let mut record = BTreeMap::new();
        record.insert("value".to_string(), 42);
        let results = pool(2)
            .map(op, vec![Task::Named(record)])
            .await
            .unwrap();
        assert_eq!(results[0], Ok(42));
    }

    #[tokio::test]
    async fn mixed_shapes_are_rejected_up_front() {
        let op = Arc::new(Echo {
            delay: Duration::ZERO,
        });
        let err = pool(2)
            .map(op, vec![Task::Single(1), Task::Positional(vec![2])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::MixedTaskShapes { batch_size: 2 }
        ));
    }

    #[tokio::test]
    async fn unsupported_shape_fails_that_slot() {
        let op = Arc::new(FailOdd);
        let results = pool(2)
            .map(op, vec![Task::Positional(vec![1, 2])])
            .await
            .unwrap();
        assert!(matches!(
            results[0],
            Err(TaskError::UnsupportedShape {
                shape: "positional",
                operation: "fail_odd",
            })
        ));
    }

    #[tokio::test]
    async fn failures_stay_isolated_per_slot() {
        let op = Arc::new(FailOdd);
        let tasks: Vec<Task<usize>> = (0..6).map(Task::Single).collect();
        let results = pool(3).map(op, tasks).await.unwrap();
        for (i, result) in results.iter().enumerate() {
            if i % 2 == 0 {
                assert_eq!(*result, Ok(i));
            } else {
                assert!(matches!(result, Err(TaskError::Failed { .. })));
            }
        }
        // Rollup names exactly the failed slots.
        let err = rollup(results).unwrap_err();
        match err {
            ExecutionError::BatchFailed { failures } => {
                let slots: Vec<usize> = failures.iter().map(|(slot, _)| *slot).collect();
                assert_eq!(slots, vec![1, 3, 5]);
            }
            other => panic!("expected BatchFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn fail_fast_cancels_the_remaining_slots() {
        struct FailFirst;

        #[async_trait]
        impl PoolOperation for FailFirst {
            type Arg = usize;
            type Output = usize;

            fn name(&self) -> &'static str {
                "fail_first"
            }

            async fn single(&self, arg: usize) -> Result<usize, TaskError> {
                if arg == 0 {
                    return Err(TaskError::failed("boom"));
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(arg)
            }
        }

        let op = Arc::new(FailFirst);
        let tasks: Vec<Task<usize>> = (0..8).map(Task::Single).collect();
        let results = pool(1)
            .map_with_strategy(op, tasks, FailureStrategy::FailFast)
            .await
            .unwrap();
        assert!(matches!(results[0], Err(TaskError::Failed { .. })));
        // With one worker, everything after the failure was cancelled.
        for result in &results[1..] {
            assert_eq!(*result, Err(TaskError::Cancelled));
        }
    }

    #[tokio::test]
    async fn cancellation_terminates_within_bounded_time() {
        let cancel = CancellationToken::new();
        let pool = WorkerPool::new(2, cancel.clone());
        let op = Arc::new(Echo {
            delay: Duration::from_secs(3600),
        });
        let tasks: Vec<Task<usize>> = (0..10).map(Task::Single).collect();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(5), pool.map(op, tasks))
            .await
            .expect("map must terminate promptly after cancellation");
        assert!(matches!(outcome, Err(ExecutionError::Cancelled)));
    }

    #[tokio::test]
    async fn graceful_mode_finishes_in_flight_work() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counting {
            completed: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl PoolOperation for Counting {
            type Arg = usize;
            type Output = usize;

            fn name(&self) -> &'static str {
                "counting"
            }

            async fn single(&self, arg: usize) -> Result<usize, TaskError> {
                tokio::time::sleep(Duration::from_millis(100)).await;
                self.completed.fetch_add(1, Ordering::SeqCst);
                Ok(arg)
            }
        }

        let cancel = CancellationToken::new();
        let completed = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(1, cancel.clone()).with_graceful_shutdown();
        let op = Arc::new(Counting {
            completed: Arc::clone(&completed),
        });
        let tasks: Vec<Task<usize>> = (0..4).map(Task::Single).collect();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(5), pool.map(op, tasks))
            .await
            .unwrap();
        assert!(matches!(outcome, Err(ExecutionError::Cancelled)));
        // The task that was in flight when the interrupt arrived completed;
        // the queued ones never started.
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_pool_rejects_new_batches() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let pool = WorkerPool::new(2, cancel);
        let op = Arc::new(Echo {
            delay: Duration::ZERO,
        });
        let err = pool.map(op, vec![Task::Single(1)]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Cancelled));
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let op = Arc::new(Echo {
            delay: Duration::ZERO,
        });
        let results = pool(2).map(op, Vec::new()).await.unwrap();
        assert!(results.is_empty());
    }
}
