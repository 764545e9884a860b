// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bias correction, registration, and transform plumbing.
//!
//! Registration outputs follow the `<prefix>Warp.nii.gz` /
//! `<prefix>InverseWarp.nii.gz` / `<prefix>Affine.txt` naming convention;
//! everything downstream (existence checks, composition, application)
//! assumes it.

use std::path::Path;

use crate::runner::ToolCommand;

use super::{prefixed, Interpolation};

/// N4 bias field correction.
pub fn bias_correct(input: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new("N4BiasFieldCorrection")
        .args(["-d", "3", "-i"])
        .arg(input)
        .arg("-o")
        .arg(output)
        .args(["-b", "[200]", "-s", "3", "-c", "[50x50x30x20,1e-6]"])
}

/// Quick rigid + affine alignment of `moving` onto `fixed`, writing
/// `<prefix>0GenericAffine.mat`.
pub fn rigid_register(fixed: &Path, moving: &Path, prefix: &Path) -> ToolCommand {
    let mi = format!(
        "MI[{},{},1,32,Regular,0.25]",
        fixed.display(),
        moving.display()
    );
    ToolCommand::new("antsRegistration")
        .args(["-d", "3", "--float", "0", "--output"])
        .arg(prefix)
        .args(["-t", "Rigid[0.1]", "-r"])
        .arg(format!("[{},{},1]", fixed.display(), moving.display()))
        .arg("--metric")
        .arg(&mi)
        .args(["--convergence", "[1000x500x250x100,5e-7,10]", "-v"])
        .args(["-f", "8x4x2x1", "-s", "3x2x1x0vox"])
        .args(["-t", "Affine[0.1]", "--metric"])
        .arg(&mi)
        .args(["--convergence", "[1000x500x250x100,4e-7,10]"])
        .args(["-f", "8x4x2x1", "-s", "3x2x1x0vox"])
}

/// Whole-brain affine + SyN registration of `input` to `template` (v0).
pub fn nonlinear_register_v0(template: &Path, input: &Path, prefix: &Path) -> ToolCommand {
    ToolCommand::new("antsRegistration")
        .args(["-d", "3", "--float", "0", "--output"])
        .arg(prefix)
        .args(["-t", "Affine[0.1]", "--metric"])
        .arg(format!(
            "MI[{},{},1,32,Regular,0.25]",
            template.display(),
            input.display()
        ))
        .args(["--convergence", "[1000x500x250x100,1e-6,10]"])
        .args(["-f", "8x4x2x1", "-s", "3x2x1x0vox"])
        .args(["-t", "SyN[0.1,3.0]", "--metric"])
        .arg(format!(
            "CC[{},{},1,4]",
            template.display(),
            input.display()
        ))
        .args(["--convergence", "[70x70x20,1e-6,10]"])
        .args(["-f", "4x2x1", "-s", "2x1x0vox"])
}

/// Rigid + affine + MI-driven SyN registration of `input` to `template`
/// (v2), optionally restricted by fixed/moving image masks.
pub fn nonlinear_register_mi(
    template: &Path,
    input: &Path,
    prefix: &Path,
    fixed_mask: Option<&Path>,
    moving_mask: Option<&Path>,
) -> ToolCommand {
    let mattes32 = format!(
        "Mattes[{},{},1,32,None]",
        template.display(),
        input.display()
    );
    let mut cmd = ToolCommand::new("antsRegistration")
        .args(["-v", "-d", "3", "--float", "0", "--output"])
        .arg(prefix)
        .args(["--use-histogram-matching", "1"])
        .args(["-t", "Rigid[0.1]", "--metric"])
        .arg(&mattes32)
        .args(["--convergence", "[500x500x500x500x500,1e-6,10]"])
        .args(["-f", "5x5x5x5x4", "-s", "1.685x1.4771x1.256x1.0402x0.82235mm"])
        .args(["-t", "Affine[0.1]", "--metric"])
        .arg(format!(
            "Mattes[{},{},1,64,None]",
            template.display(),
            input.display()
        ))
        .args(["--convergence", "[450x150x50,1e-7,10]"])
        .args(["-f", "3x2x1", "-s", "0.60056x0.3677x0mm"])
        .args(["-t", "SyN[0.4,3.0]", "--metric"])
        .arg(format!(
            "MI[{},{},1,32,None]",
            template.display(),
            input.display()
        ))
        .args(["--convergence", "[200x200x90x50,1e-10,10]"])
        .args(["-f", "4x3x2x1", "-s", "0.82x0.6x0.3677x0.0mm"]);
    if fixed_mask.is_some() || moving_mask.is_some() {
        let fixed = fixed_mask
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "NULL".to_string());
        let moving = moving_mask
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "NULL".to_string());
        cmd = cmd.arg("-x").arg(format!("[{},{}]", fixed, moving));
    }
    cmd
}

/// Compose the transform chain of `a` with the inverse chain of `b` via the
/// shared template space, producing one combined deformation field resampled
/// on `b_image`.
pub fn compose_a_to_b(
    a_prefix: &Path,
    b_image: &Path,
    b_prefix: &Path,
    output: &Path,
) -> ToolCommand {
    ToolCommand::new("ComposeMultiTransform")
        .arg("3")
        .arg(output)
        .arg("-i")
        .arg(prefixed(b_prefix, "Affine.txt"))
        .arg(prefixed(b_prefix, "InverseWarp.nii.gz"))
        .arg(prefixed(a_prefix, "Warp.nii.gz"))
        .arg(prefixed(a_prefix, "Affine.txt"))
        .arg("-R")
        .arg(b_image)
}

/// Apply a transform chain to `input`, resampled on `reference`.
pub fn apply_warp(
    reference: &Path,
    input: &Path,
    transforms: &[&Path],
    output: &Path,
    interpolation: Interpolation,
) -> ToolCommand {
    let mut cmd = ToolCommand::new("WarpImageMultiTransform")
        .arg("3")
        .arg(input)
        .arg(output);
    for transform in transforms {
        cmd = cmd.arg(transform);
    }
    cmd = cmd.arg("-R").arg(reference);
    if let Some(switch) = interpolation.warp_switch() {
        cmd = cmd.arg(switch);
    }
    cmd
}

/// Apply a single transform to `input` with `antsApplyTransforms`.
pub fn apply_transforms(
    input: &Path,
    reference: &Path,
    transform: &Path,
    output: &Path,
    interpolation: Interpolation,
) -> ToolCommand {
    ToolCommand::new("antsApplyTransforms")
        .args(["-d", "3", "-i"])
        .arg(input)
        .arg("-r")
        .arg(reference)
        .arg("-t")
        .arg(transform)
        .args(["-n", interpolation.ants_name()])
        .arg("-o")
        .arg(output)
}
