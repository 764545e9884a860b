// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pipeline stage lifecycle events.

use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

use super::StructuredLog;

/// A pipeline stage is starting.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use thalseg::observability::messages::pipeline::StageStarted;
/// use std::time::Duration;
///
/// let msg = StageStarted {
///     stage: "registration",
///     elapsed: Duration::from_secs(42),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct StageStarted<'a> {
    pub stage: &'a str,
    /// Time since the pipeline started.
    pub elapsed: Duration,
}

impl Display for StageStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "--- {} --- elapsed {:?}", self.stage, self.elapsed)
    }
}

impl StructuredLog for StageStarted<'_> {
    fn log(&self) {
        tracing::info!(
            stage = self.stage,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("stage", span_name = name, stage = self.stage)
    }
}

/// A stage transition was skipped because its artifact already exists.
///
/// # Log Level
/// `info!` - Resumability at work
pub struct StageSkipped<'a> {
    pub stage: &'a str,
    pub artifact: &'a str,
}

impl Display for StageSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Skipped {}, using {}", self.stage, self.artifact)
    }
}

impl StructuredLog for StageSkipped<'_> {
    fn log(&self) {
        tracing::info!(stage = self.stage, artifact = self.artifact, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "stage_skipped",
            span_name = name,
            stage = self.stage,
            artifact = self.artifact,
        )
    }
}

/// The pipeline finished successfully.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PipelineCompleted {
    pub label_count: usize,
    pub elapsed: Duration,
}

impl Display for PipelineCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Finished: {} label(s) fused in {:?}",
            self.label_count, self.elapsed
        )
    }
}

impl StructuredLog for PipelineCompleted {
    fn log(&self) {
        tracing::info!(
            label_count = self.label_count,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline_completed",
            span_name = name,
            label_count = self.label_count,
        )
    }
}

/// The pipeline failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct PipelineFailed<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for PipelineFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pipeline failed: {}", self.error)
    }
}

impl StructuredLog for PipelineFailed<'_> {
    fn log(&self) {
        tracing::error!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("pipeline_failed", span_name = name, error = %self.error)
    }
}
