// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors and policies for worker pool batch execution.

use std::fmt;

/// How a batch reacts to individual task failures.
///
/// The pool always keeps per-slot results distinguishable; the strategy only
/// controls whether remaining slots keep running once one has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStrategy {
    /// Stop dispatching and cancel remaining slots on the first failure.
    FailFast,
    /// Let every slot run to completion; failures surface in the rollup.
    ContinueOnError,
}

impl Default for FailureStrategy {
    fn default() -> Self {
        FailureStrategy::ContinueOnError
    }
}

/// Failure of a single task slot within a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskError {
    /// The operation does not accept this task shape.
    UnsupportedShape {
        shape: &'static str,
        operation: &'static str,
    },
    /// The task ran and failed.
    Failed { message: String },
    /// The task was cancelled before or while running.
    Cancelled,
}

impl TaskError {
    /// Convenience constructor for stage failures surfaced through a slot.
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed {
            message: message.into(),
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::UnsupportedShape { shape, operation } => {
                write!(f, "operation '{}' does not accept {} tasks", operation, shape)
            }
            TaskError::Failed { message } => write!(f, "{}", message),
            TaskError::Cancelled => write!(f, "task cancelled"),
        }
    }
}

impl std::error::Error for TaskError {}

/// Errors that abort a whole `WorkerPool::map` batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// The batch was interrupted before completion. In-flight external
    /// processes have been terminated (default mode) or allowed to finish
    /// (graceful mode); either way the caller gets this single signal.
    Cancelled,
    /// One or more task slots failed; `(slot, message)` per failure.
    BatchFailed { failures: Vec<(usize, String)> },
    /// A batch mixed positional, named, and single task shapes.
    MixedTaskShapes { batch_size: usize },
    /// Invariant violation inside the pool.
    InternalError { message: String },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Cancelled => write!(f, "batch cancelled"),
            ExecutionError::BatchFailed { failures } => {
                write!(f, "{} task slot(s) failed:", failures.len())?;
                for (slot, message) in failures {
                    write!(f, " [{}] {};", slot, message)?;
                }
                Ok(())
            }
            ExecutionError::MixedTaskShapes { batch_size } => {
                write!(
                    f,
                    "batch of {} tasks mixes argument shapes; a batch must be homogeneous",
                    batch_size
                )
            }
            ExecutionError::InternalError { message } => {
                write!(f, "internal pool error: {}", message)
            }
        }
    }
}

impl std::error::Error for ExecutionError {}
