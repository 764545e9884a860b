// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline stages.
//!
//! Each stage turns upstream artifacts into downstream ones through the
//! external tools, guarded by output existence. Fan-out stages implement
//! `PoolOperation` so the driver can dispatch them through the worker pool.

pub mod aggregate;
pub mod fuse;
pub mod register;
pub mod reorient;
pub mod sanitize;
pub mod warp;

use crate::config::ExecOptions;
use crate::errors::StageError;
use crate::observability::messages::command::ToolFailed;
use crate::observability::messages::StructuredLog;
use crate::runner::ToolCommand;

/// Run a tool and turn a non-zero exit status into a stage failure.
pub(crate) async fn run_checked(
    command: ToolCommand,
    options: &ExecOptions,
) -> Result<(), StageError> {
    let tool = command.program().to_string();
    let outcome = command.run(options).await?;
    if !outcome.success() {
        let status = outcome.status().unwrap_or(-1);
        ToolFailed {
            tool: &tool,
            status,
        }
        .log();
        return Err(StageError::ToolFailed { tool, status });
    }
    Ok(())
}
