// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod command;
mod execution;
mod pipeline;
mod stage;

pub use command::CommandError;
pub use execution::{ExecutionError, FailureStrategy, TaskError};
pub use pipeline::PipelineError;
pub use stage::StageError;
