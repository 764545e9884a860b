// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while locating and spawning external tools.

use thiserror::Error;

/// Errors from the external command runner.
///
/// A non-zero exit status is *not* an error here: it is reported through
/// `CommandOutcome` and the caller decides fatality. These variants cover the
/// cases where the process could not be run at all.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The executable is not present on the search path. Reported by the
    /// preflight check before any stage runs.
    #[error("required external tool '{tool}' was not found on PATH")]
    MissingTool { tool: String },

    /// The executable exists but could not be spawned.
    #[error("failed to spawn '{tool}': {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    /// I/O failure while waiting on or collecting output from a child.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
