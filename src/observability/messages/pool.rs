// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for worker pool batch events.

use std::fmt::{Display, Formatter};
use tracing::Span;

use super::StructuredLog;

/// A batch started dispatching to the pool.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use thalseg::observability::messages::pool::BatchStarted;
///
/// let msg = BatchStarted {
///     operation: "warp_subjects",
///     task_count: 20,
///     workers: 8,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct BatchStarted<'a> {
    pub operation: &'a str,
    pub task_count: usize,
    pub workers: usize,
}

impl Display for BatchStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatching {} '{}' tasks across {} workers",
            self.task_count, self.operation, self.workers
        )
    }
}

impl StructuredLog for BatchStarted<'_> {
    fn log(&self) {
        tracing::info!(
            operation = self.operation,
            task_count = self.task_count,
            workers = self.workers,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "batch",
            span_name = name,
            operation = self.operation,
            task_count = self.task_count,
            workers = self.workers,
        )
    }
}

/// A batch was cancelled before completion.
///
/// # Log Level
/// `warn!` - User-initiated, not a crash
pub struct BatchCancelled<'a> {
    pub operation: &'a str,
}

impl Display for BatchCancelled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Batch '{}' cancelled", self.operation)
    }
}

impl StructuredLog for BatchCancelled<'_> {
    fn log(&self) {
        tracing::warn!(operation = self.operation, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("batch_cancelled", span_name = name, operation = self.operation)
    }
}

/// A single task slot within a batch failed.
///
/// # Log Level
/// `warn!` - The slot is reported in the batch rollup
pub struct TaskSlotFailed<'a> {
    pub operation: &'a str,
    pub slot: usize,
    pub error: &'a dyn std::error::Error,
}

impl Display for TaskSlotFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Task {} of batch '{}' failed: {}",
            self.slot, self.operation, self.error
        )
    }
}

impl StructuredLog for TaskSlotFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            operation = self.operation,
            slot = self.slot,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "task_slot_failed",
            span_name = name,
            operation = self.operation,
            slot = self.slot,
            error = %self.error,
        )
    }
}
