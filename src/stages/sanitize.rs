// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Input sanitation: orientation, optional laterality flip, bias correction,
//! and the v2 crop preparation.

use std::path::{Path, PathBuf};

use crate::cache;
use crate::config::ExecOptions;
use crate::errors::StageError;
use crate::observability::messages::pipeline::StageSkipped;
use crate::observability::messages::StructuredLog;
use crate::tools::{self, Interpolation};

use super::run_checked;

/// FSL rewrites outputs as compressed NIfTI regardless of the input name.
fn sanitized_name(input: &Path) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input.nii.gz".to_string());
    if name.ends_with(".nii") {
        format!("{}.gz", name)
    } else {
        name
    }
}

/// Standardize the input to neurological axis ordering, optionally mirror it
/// along L-R for right-side segmentation, and correct its bias field.
///
/// The three operations are guarded as one unit on the sanitized artifact:
/// when it exists the whole block is skipped.
pub async fn sanitize_input(
    input: &Path,
    workspace: &Path,
    flip_right: bool,
    options: &ExecOptions,
) -> Result<PathBuf, StageError> {
    let sanitized = workspace.join(sanitized_name(input));
    if sanitized.exists() {
        StageSkipped {
            stage: "input sanitation",
            artifact: &sanitized.display().to_string(),
        }
        .log();
        return Ok(sanitized);
    }
    let input = input.to_path_buf();
    cache::ensure(&sanitized, options, |staging| async move {
        run_checked(tools::image::reorient_to_standard(&input, &staging), options).await?;
        if flip_right {
            run_checked(tools::image::flip_lr(&staging, &staging), options).await?;
        }
        run_checked(tools::registration::bias_correct(&staging, &staging), options).await
    })
    .await
}

/// v2 preparation: rigidly align the whole-brain template to the input,
/// carry the crop mask into input space, and crop the input to it.
///
/// Crop artifacts get their own directory: the cropped volume keeps the
/// input's base name, and in the workspace root it would shadow the
/// sanitized artifact derived from it.
pub async fn crop_to_template_mask(
    input: &Path,
    orig_template: &Path,
    crop_mask: &Path,
    workspace: &Path,
    options: &ExecOptions,
) -> Result<PathBuf, StageError> {
    let crop_dir = workspace.join("crop");
    cache::ensure_dir(&crop_dir)?;
    let rigid_prefix = crop_dir.join("rigid");
    let rigid_affine = tools::prefixed(&rigid_prefix, "0GenericAffine.mat");

    // Multi-output registration, so guarded by a plain existence check.
    if !rigid_affine.exists() {
        run_checked(
            tools::registration::rigid_register(input, orig_template, &rigid_prefix),
            options,
        )
        .await?;
        if !rigid_affine.exists() && !options.echo {
            return Err(StageError::OutputNotProduced { path: rigid_affine });
        }
    } else {
        StageSkipped {
            stage: "rigid template alignment",
            artifact: &rigid_affine.display().to_string(),
        }
        .log();
    }

    let mask_input = crop_dir.join("mask_inp.nii.gz");
    cache::ensure(&mask_input, options, |staging| async move {
        run_checked(
            tools::registration::apply_transforms(
                crop_mask,
                input,
                &rigid_affine,
                &staging,
                Interpolation::NearestNeighbor,
            ),
            options,
        )
        .await
    })
    .await?;

    let cropped = crop_dir.join(format!("crop_{}", sanitized_name(input)));
    let input = input.to_path_buf();
    let mask = mask_input.clone();
    cache::ensure(&cropped, options, |staging| async move {
        run_checked(tools::image::crop_by_mask(&input, &staging, &mask), options).await
    })
    .await
}
