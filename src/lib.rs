// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod cache;      // idempotent output guard
pub mod config;     // run configuration + atlas library
pub mod errors;     // error handling
pub mod observability;
pub mod pipeline;   // driver + run workspace
pub mod pool;       // worker pool
pub mod runner;     // external command runner
pub mod stages;     // pipeline stages
pub mod tools;      // external tool command builders
