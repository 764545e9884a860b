// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging.
//!
//! Message types follow a struct-based pattern with `Display` implementations
//! so that diagnostic strings live in one place instead of being scattered
//! through the codebase. Each type also implements `StructuredLog` to emit
//! itself through `tracing` with structured fields.
//!
//! Messages are organized by subsystem:
//! * `messages::command` - external tool invocation events
//! * `messages::pipeline` - pipeline stage lifecycle events
//! * `messages::pool` - worker pool batch events

pub mod messages;
