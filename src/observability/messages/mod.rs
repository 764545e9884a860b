// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! # Usage Pattern
//!
//! ```rust
//! use thalseg::observability::messages::pipeline::StageSkipped;
//! use thalseg::observability::messages::StructuredLog;
//!
//! StageSkipped {
//!     stage: "registration",
//!     artifact: "subject01InverseWarp.nii.gz",
//! }
//! .log();
//! ```

use tracing::Span;

pub mod command;
pub mod pipeline;
pub mod pool;

/// Emit a message through `tracing` with structured fields.
pub trait StructuredLog {
    /// Log the message at its natural level.
    fn log(&self);

    /// Create a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
