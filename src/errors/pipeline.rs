// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Top-level error for a pipeline run.

use thiserror::Error;

use super::{CommandError, ExecutionError, StageError};

/// Anything that can end a pipeline run early.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Required external tools are absent. Reported before any stage runs.
    #[error("missing required external tools: {}", .tools.join(", "))]
    MissingTools { tools: Vec<String> },

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Invalid run configuration detected at startup.
    #[error("configuration error: {0}")]
    Config(String),
}
