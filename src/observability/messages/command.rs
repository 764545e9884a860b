// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for external tool invocation events.

use std::fmt::{Display, Formatter};
use tracing::Span;

use super::StructuredLog;

/// A tool is about to be executed (verbose mode).
///
/// # Log Level
/// `info!` - Operational event
pub struct ToolInvoked<'a> {
    pub command_line: &'a str,
}

impl Display for ToolInvoked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Executing: {}", self.command_line)
    }
}

impl StructuredLog for ToolInvoked<'_> {
    fn log(&self) {
        tracing::info!(command = self.command_line, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("tool_invoked", span_name = name, command = self.command_line)
    }
}

/// A suppressed tool produced stderr output.
///
/// # Log Level
/// `warn!` - Possibly interesting, not necessarily fatal
pub struct ToolStderr<'a> {
    pub tool: &'a str,
    pub stderr: &'a str,
}

impl Display for ToolStderr<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} stderr: {}", self.tool, self.stderr.trim_end())
    }
}

impl StructuredLog for ToolStderr<'_> {
    fn log(&self) {
        tracing::warn!(tool = self.tool, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("tool_stderr", span_name = name, tool = self.tool)
    }
}

/// A tool exited non-zero.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ToolFailed<'a> {
    pub tool: &'a str,
    pub status: i32,
}

impl Display for ToolFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} exited with status {}", self.tool, self.status)
    }
}

impl StructuredLog for ToolFailed<'_> {
    fn log(&self) {
        tracing::error!(tool = self.tool, status = self.status, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "tool_failed",
            span_name = name,
            tool = self.tool,
            status = self.status,
        )
    }
}
