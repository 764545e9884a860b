// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised by individual pipeline stages.

use std::path::PathBuf;
use thiserror::Error;

use super::CommandError;

/// Errors that can occur while a pipeline stage runs.
#[derive(Error, Debug)]
pub enum StageError {
    /// An upstream artifact this stage depends on is absent.
    #[error("expected artifact missing before {stage}: {path}")]
    MissingArtifact { stage: &'static str, path: PathBuf },

    /// An external tool ran and exited non-zero. Never auto-retried.
    #[error("external tool '{tool}' exited with status {status}")]
    ToolFailed { tool: String, status: i32 },

    /// A producer reported success but its declared output does not exist.
    #[error("producer finished but did not create {path}")]
    OutputNotProduced { path: PathBuf },

    /// Per-subject result mappings disagree on their key sets.
    #[error("subject '{subject}' produced keys {found:?}, expected {expected:?}")]
    RaggedResults {
        subject: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A label selector does not name anything in the catalog.
    #[error("unknown label selector '{0}'")]
    UnknownLabel(String),

    /// The atlas library directory exists but holds no subjects.
    #[error("atlas library at {path} contains no subjects")]
    EmptyAtlas { path: PathBuf },

    #[error(transparent)]
    Command(#[from] CommandError),

    /// Filesystem failure tied to a specific path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
