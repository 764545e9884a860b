// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Label fusion stage and conservative mask estimation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::cache;
use crate::config::{ExecOptions, FusionParams, FusionStrategy};
use crate::errors::{StageError, TaskError};
use crate::pool::PoolOperation;
use crate::tools;

use super::run_checked;

/// Fan-out operation fusing one label per task.
pub struct FuseLabels {
    pub strategy: FusionStrategy,
    /// The sanitized target image the fused labels describe.
    pub target_image: PathBuf,
    /// Warped reference volumes, one per subject, in subject order.
    pub atlas_images: Vec<PathBuf>,
    /// `label -> (subject -> warped label volume)` from the aggregator.
    pub warped_labels: BTreeMap<String, BTreeMap<String, PathBuf>>,
    /// Tuned fusion parameters per label.
    pub parameters: BTreeMap<String, FusionParams>,
    /// Conservative region restriction, present for `JointMasked`.
    pub mask: Option<PathBuf>,
    pub output_root: PathBuf,
    pub options: ExecOptions,
}

impl FuseLabels {
    /// Fuse all subjects' estimates of one label into a consensus volume.
    pub async fn fuse_label(&self, label: &str) -> Result<PathBuf, StageError> {
        let per_subject =
            self.warped_labels
                .get(label)
                .ok_or_else(|| StageError::MissingArtifact {
                    stage: "label fusion",
                    path: PathBuf::from(label),
                })?;
        let atlas_labels: Vec<PathBuf> = per_subject.values().cloned().collect();
        let params = self.parameters.get(label).copied().unwrap_or_default();
        let output = self.output_root.join(format!("{}.nii.gz", label));

        let target = self.target_image.clone();
        let atlas_images = self.atlas_images.clone();
        let mask = self.mask.clone();
        cache::ensure(&output, &self.options, |staging| async move {
            let command = match self.strategy {
                FusionStrategy::Majority => tools::fusion::majority_vote(&atlas_labels, &staging),
                FusionStrategy::Joint => tools::fusion::joint_fusion_legacy(
                    &target,
                    &atlas_images,
                    &atlas_labels,
                    &staging,
                    params,
                ),
                FusionStrategy::JointMasked => tools::fusion::joint_fusion(
                    &target,
                    &atlas_images,
                    &atlas_labels,
                    &staging,
                    params,
                    mask.as_deref(),
                ),
            };
            run_checked(command, &self.options).await
        })
        .await
    }
}

#[async_trait]
impl PoolOperation for FuseLabels {
    type Arg = String;
    type Output = PathBuf;

    fn name(&self) -> &'static str {
        "fuse_labels"
    }

    async fn single(&self, label: String) -> Result<Self::Output, TaskError> {
        self.fuse_label(&label)
            .await
            .map_err(|err| TaskError::failed(err.to_string()))
    }
}

/// Estimate a conservative maximum mask from one label across all subjects:
/// maximum-projection + binarize, then grow by `dilation` voxels per side.
///
/// Guard-keyed on the mask path; both steps run against the staging file so
/// the final mask appears atomically.
pub async fn conservative_mask(
    input_masks: &[PathBuf],
    output: &Path,
    dilation: u32,
    options: &ExecOptions,
) -> Result<PathBuf, StageError> {
    let input_masks = input_masks.to_vec();
    cache::ensure(output, options, |staging| async move {
        run_checked(tools::fusion::max_projection(&input_masks, &staging), options).await?;
        if dilation > 0 {
            run_checked(tools::fusion::dilate(&staging, dilation, &staging), options).await?;
        }
        Ok(())
    })
    .await
}
