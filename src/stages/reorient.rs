// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Post-processing fan-out: mirror fused labels back and reorder their axes
//! to match the original input.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::cache;
use crate::config::ExecOptions;
use crate::errors::TaskError;
use crate::pool::PoolOperation;
use crate::tools;

use super::run_checked;

/// Mirror fused outputs back along L-R. Tasks are positional
/// `(input, output)` records.
pub struct FlipOutputs {
    pub options: ExecOptions,
}

#[async_trait]
impl PoolOperation for FlipOutputs {
    type Arg = PathBuf;
    type Output = PathBuf;

    fn name(&self) -> &'static str {
        "flip_outputs"
    }

    async fn positional(&self, args: Vec<PathBuf>) -> Result<PathBuf, TaskError> {
        let [input, output]: [PathBuf; 2] = args
            .try_into()
            .map_err(|_| TaskError::failed("flip expects an (input, output) record"))?;
        cache::ensure(&output, &self.options, |staging| async move {
            run_checked(tools::image::flip_lr(&input, &staging), &self.options).await
        })
        .await
        .map_err(|err| TaskError::failed(err.to_string()))
    }
}

/// Reorder each fused label to the original input's axis ordering. Tasks are
/// positional `(input, reference, output)` records.
pub struct ReorientOutputs {
    pub options: ExecOptions,
}

#[async_trait]
impl PoolOperation for ReorientOutputs {
    type Arg = PathBuf;
    type Output = PathBuf;

    fn name(&self) -> &'static str {
        "reorient_outputs"
    }

    async fn positional(&self, args: Vec<PathBuf>) -> Result<PathBuf, TaskError> {
        let [input, reference, output]: [PathBuf; 3] = args
            .try_into()
            .map_err(|_| TaskError::failed("reorient expects an (input, reference, output) record"))?;
        cache::ensure(&output, &self.options, |staging| async move {
            run_checked(
                tools::image::swapdim_like(&input, &reference, &staging),
                &self.options,
            )
            .await
        })
        .await
        .map_err(|err| TaskError::failed(err.to_string()))
    }
}
