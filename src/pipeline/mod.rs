// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod driver;
pub mod workspace;

#[cfg(test)]
mod integration_tests;

pub use driver::Driver;
pub use workspace::Workspace;
