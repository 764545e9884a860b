// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Label fusion tools and conservative mask construction.

use std::path::{Path, PathBuf};

use crate::config::FusionParams;
use crate::runner::ToolCommand;

use super::radius;

/// Regularization added to the patch similarity matrix; fixed across labels.
const ALPHA: f64 = 0.1;

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Joint label fusion, optionally restricted to a mask region.
pub fn joint_fusion(
    target: &Path,
    atlas_images: &[PathBuf],
    atlas_labels: &[PathBuf],
    output: &Path,
    params: FusionParams,
    mask: Option<&Path>,
) -> ToolCommand {
    let mut cmd = ToolCommand::new("antsJointFusion")
        .args(["-d", "3", "-g"])
        .arg(format!("[{}]", join_paths(atlas_images)))
        .arg("-t")
        .arg(target)
        .arg("-l")
        .arg(format!("[{}]", join_paths(atlas_labels)))
        .arg("-a")
        .arg(format!("{}", ALPHA))
        .arg("-b")
        .arg(format!("{}", params.beta))
        .arg("-p")
        .arg(radius(params.patch_radius))
        .arg("-s")
        .arg(radius(params.search_radius));
    if let Some(mask) = mask {
        cmd = cmd.arg("-x").arg(mask);
    }
    cmd.arg("-o").arg(output)
}

/// Joint label fusion through the older standalone binary.
pub fn joint_fusion_legacy(
    target: &Path,
    atlas_images: &[PathBuf],
    atlas_labels: &[PathBuf],
    output: &Path,
    params: FusionParams,
) -> ToolCommand {
    let mut cmd = ToolCommand::new("jointfusion").args(["3", "1", "-g"]);
    for image in atlas_images {
        cmd = cmd.arg(image);
    }
    cmd = cmd.arg("-tg").arg(target).arg("-l");
    for label in atlas_labels {
        cmd = cmd.arg(label);
    }
    cmd.arg("-m")
        .arg(format!("Joint[{},{}]", ALPHA, params.beta))
        .arg("-rp")
        .arg(radius(params.patch_radius))
        .arg("-rs")
        .arg(radius(params.search_radius))
        .arg(output)
}

/// Unweighted majority vote across atlas label estimates.
pub fn majority_vote(atlas_labels: &[PathBuf], output: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new("ImageMath")
        .arg("3")
        .arg(output)
        .arg("MajorityVoting");
    for label in atlas_labels {
        cmd = cmd.arg(label);
    }
    cmd
}

/// Maximum-projection of binary volumes, binarized.
pub fn max_projection(inputs: &[PathBuf], output: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new("c3d");
    for input in inputs {
        cmd = cmd.arg(input);
    }
    cmd.args(["-accum", "-max", "-endaccum", "-binarize", "-o"])
        .arg(output)
}

/// Grow a binary volume by `voxels` per side.
pub fn dilate(input: &Path, voxels: u32, output: &Path) -> ToolCommand {
    ToolCommand::new("c3d")
        .arg(input)
        .args(["-dilate", "1"])
        .arg(format!("{}x{}x{}vox", voxels, voxels, voxels))
        .arg("-o")
        .arg(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn majority_vote_lists_every_atlas_label() {
        let cmd = majority_vote(
            &paths(&["s01/2-AV.nii.gz", "s02/2-AV.nii.gz"]),
            Path::new("2-AV.nii.gz"),
        );
        assert_eq!(
            cmd.argv(),
            vec![
                "3",
                "2-AV.nii.gz",
                "MajorityVoting",
                "s01/2-AV.nii.gz",
                "s02/2-AV.nii.gz",
            ]
        );
    }

    #[test]
    fn joint_fusion_carries_tuned_parameters() {
        let params = FusionParams {
            patch_radius: [3, 3, 1],
            search_radius: [3, 3, 3],
            beta: 3.5,
        };
        let cmd = joint_fusion(
            Path::new("target.nii.gz"),
            &paths(&["s01/ref.nii.gz"]),
            &paths(&["s01/6-VLP.nii.gz"]),
            Path::new("6-VLP.nii.gz"),
            params,
            Some(Path::new("mask.nii.gz")),
        );
        let argv = cmd.argv();
        let b = argv.iter().position(|a| a == "-b").unwrap();
        assert_eq!(argv[b + 1], "3.5");
        let p = argv.iter().position(|a| a == "-p").unwrap();
        assert_eq!(argv[p + 1], "3x3x1");
        let x = argv.iter().position(|a| a == "-x").unwrap();
        assert_eq!(argv[x + 1], "mask.nii.gz");
    }

    #[test]
    fn joint_fusion_without_mask_omits_the_restriction() {
        let cmd = joint_fusion(
            Path::new("target.nii.gz"),
            &paths(&["s01/ref.nii.gz"]),
            &paths(&["s01/6-VLP.nii.gz"]),
            Path::new("6-VLP.nii.gz"),
            FusionParams::default(),
            None,
        );
        assert!(!cmd.argv().contains(&"-x".to_string()));
    }

    #[test]
    fn legacy_fusion_uses_the_standalone_binary_grammar() {
        let cmd = joint_fusion_legacy(
            Path::new("target.nii.gz"),
            &paths(&["s01/ref.nii.gz", "s02/ref.nii.gz"]),
            &paths(&["s01/2-AV.nii.gz", "s02/2-AV.nii.gz"]),
            Path::new("2-AV.nii.gz"),
            FusionParams::default(),
        );
        let argv = cmd.argv();
        assert_eq!(cmd.program(), "jointfusion");
        assert_eq!(&argv[..2], ["3", "1"]);
        let m = argv.iter().position(|a| a == "-m").unwrap();
        assert_eq!(argv[m + 1], "Joint[0.1,2]");
        assert_eq!(argv.last().unwrap(), "2-AV.nii.gz");
    }

    #[test]
    fn conservative_mask_is_max_projection_then_dilation() {
        // Maximum-projection + binarize over all subjects...
        let project = max_projection(
            &paths(&["s01/1-THALAMUS.nii.gz", "s02/1-THALAMUS.nii.gz"]),
            Path::new("mask.nii.gz"),
        );
        assert_eq!(
            project.argv(),
            vec![
                "s01/1-THALAMUS.nii.gz",
                "s02/1-THALAMUS.nii.gz",
                "-accum",
                "-max",
                "-endaccum",
                "-binarize",
                "-o",
                "mask.nii.gz",
            ]
        );
        // ...then grow by one voxel per side.
        let grow = dilate(Path::new("mask.nii.gz"), 1, Path::new("mask.nii.gz"));
        assert_eq!(
            grow.argv(),
            vec!["mask.nii.gz", "-dilate", "1", "1x1x1vox", "-o", "mask.nii.gz"]
        );
    }
}
