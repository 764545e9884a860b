// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Image housekeeping tools: orientation, mirroring, cropping.

use std::path::Path;

use crate::runner::ToolCommand;

/// Standardize voxel axis ordering to neurological convention.
pub fn reorient_to_standard(input: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new("fslreorient2std").arg(input).arg(output)
}

/// Mirror one spatial axis (left-right flip).
pub fn flip_lr(input: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new("fslswapdim")
        .arg(input)
        .args(["-x", "y", "z"])
        .arg(output)
}

/// Reorder the axes of `input` to match `reference`.
pub fn swapdim_like(input: &Path, reference: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new("swapdimlike")
        .arg(input)
        .arg(reference)
        .arg(output)
}

/// Crop `input` to the region covered by `mask`.
pub fn crop_by_mask(input: &Path, output: &Path, mask: &Path) -> ToolCommand {
    // ExtractRegionFromImageByMask dim input output mask [label=1] [padRadius=0]
    ToolCommand::new("ExtractRegionFromImageByMask")
        .arg("3")
        .arg(input)
        .arg(output)
        .arg(mask)
        .arg("1")
        .arg("0")
}
