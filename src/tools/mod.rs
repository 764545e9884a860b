// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Command builders for the external collaborators.
//!
//! Each function assembles the full argument vector for one opaque external
//! operation and returns it as a `ToolCommand`; nothing here spawns anything.
//! The stages decide when to run a command and whether its exit status is
//! fatal.

pub mod fusion;
pub mod image;
pub mod registration;

use std::path::{Path, PathBuf};

/// Append a suffix to a path-prefix. Registration tools name their outputs
/// `<prefix>Warp.nii.gz`, `<prefix>InverseWarp.nii.gz`, `<prefix>Affine.txt`.
pub fn prefixed(prefix: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", prefix.display(), suffix))
}

/// Interpolation used when applying a transform chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Default trilinear interpolation.
    Linear,
    /// Nearest-neighbor, for label volumes.
    NearestNeighbor,
    /// Smooth BSpline, for intensity volumes.
    BSpline,
}

impl Interpolation {
    /// Switch understood by `WarpImageMultiTransform`; linear is its default
    /// and takes no switch.
    pub(crate) fn warp_switch(self) -> Option<&'static str> {
        match self {
            Interpolation::Linear => None,
            Interpolation::NearestNeighbor => Some("--use-NN"),
            Interpolation::BSpline => Some("--use-BSpline"),
        }
    }

    /// Mode name understood by `antsApplyTransforms -n`.
    pub(crate) fn ants_name(self) -> &'static str {
        match self {
            Interpolation::Linear => "Linear",
            Interpolation::NearestNeighbor => "NearestNeighbor",
            Interpolation::BSpline => "BSpline",
        }
    }
}

/// `AxBxC` rendering for radius vectors.
pub(crate) fn radius(r: [u32; 3]) -> String {
    format!("{}x{}x{}", r[0], r[1], r[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_appends_to_the_file_stem() {
        let prefix = Path::new("/tmp/run/subject01");
        assert_eq!(
            prefixed(prefix, "InverseWarp.nii.gz"),
            PathBuf::from("/tmp/run/subject01InverseWarp.nii.gz")
        );
    }

    #[test]
    fn radius_renders_axbxc() {
        assert_eq!(radius([2, 2, 2]), "2x2x2");
        assert_eq!(radius([3, 1, 0]), "3x1x0");
    }
}
