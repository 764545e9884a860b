// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod atlas;
pub mod consts;
pub mod options;

pub use atlas::{AtlasLibrary, FusionParams, Subject};
pub use options::{Algorithm, ExecOptions, FusionStrategy, PipelineConfig, resolve_labels};
