// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Synchronous invocation of external tools.
//!
//! Every scientific operation in the pipeline is an opaque external program.
//! `ToolCommand` carries a fully-assembled argument vector; `run` spawns one
//! process, waits for it, and reports the exit status as data. Whether a
//! non-zero status is fatal is the caller's decision.

mod command;
pub mod require;

pub use command::{CommandOutcome, ToolCommand};
