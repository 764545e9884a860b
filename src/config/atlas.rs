// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Atlas library: training subjects, templates, and tuned fusion parameters.
//!
//! The library is discovered once at startup and immutable afterwards. Each
//! subject directory carries a precomputed registration to the common
//! template (`WMnMPRAGEWarp.nii.gz` + `WMnMPRAGEAffine.txt`), a directory of
//! sanitized label volumes, and the bias-corrected reference volume.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::StageError;

use super::consts;

/// One training subject: identifier plus its directory of precomputed
/// transforms and label volumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    id: String,
    dir: PathBuf,
}

impl Subject {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Prefix of the subject's precomputed registration to the template.
    pub fn transform_prefix(&self) -> PathBuf {
        self.dir.join(consts::SUBJECT_TRANSFORM_PREFIX)
    }

    /// The subject's sanitized volume for one label.
    pub fn label_volume(&self, label: &str) -> PathBuf {
        self.dir
            .join(consts::SANITIZED_ROI_DIR)
            .join(format!("{}.nii.gz", label))
    }

    /// The subject's bias-corrected intensity volume.
    pub fn reference_volume(&self) -> PathBuf {
        self.dir.join(consts::REFERENCE_IMAGE)
    }
}

/// Joint fusion parameters for one label.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FusionParams {
    /// Patch radius for similarity measures, per axis.
    #[serde(default = "default_patch_radius")]
    pub patch_radius: [u32; 3],
    /// Local search radius, per axis.
    #[serde(default = "default_search_radius")]
    pub search_radius: [u32; 3],
    /// Exponent mapping intensity difference to the joint error.
    #[serde(default = "default_beta")]
    pub beta: f64,
}

fn default_patch_radius() -> [u32; 3] {
    [2, 2, 2]
}

fn default_search_radius() -> [u32; 3] {
    [3, 3, 3]
}

fn default_beta() -> f64 {
    2.0
}

impl Default for FusionParams {
    fn default() -> Self {
        FusionParams {
            patch_radius: default_patch_radius(),
            search_radius: default_search_radius(),
            beta: default_beta(),
        }
    }
}

/// On-disk manifest mapping label stems to tuned fusion parameters.
#[derive(Debug, Default, Deserialize)]
struct FusionManifest {
    #[serde(default)]
    labels: BTreeMap<String, FusionParams>,
}

/// The atlas library: subjects, templates, and fusion parameters under one
/// root directory.
#[derive(Debug)]
pub struct AtlasLibrary {
    root: PathBuf,
    subjects: Vec<Subject>,
    fusion: FusionManifest,
}

impl AtlasLibrary {
    /// Discover the library under `root`. Subjects are the non-hidden
    /// directories inside `priors/`, sorted by name; an empty library is an
    /// error. The fusion manifest is optional.
    pub fn discover(root: &Path) -> Result<Self, StageError> {
        let priors = root.join(consts::PRIORS_DIR);
        let entries = std::fs::read_dir(&priors).map_err(|_| StageError::MissingArtifact {
            stage: "atlas discovery",
            path: priors.clone(),
        })?;

        let mut subjects = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StageError::Io {
                path: priors.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            subjects.push(Subject {
                id: name,
                dir: entry.path(),
            });
        }
        subjects.sort_by(|a, b| a.id.cmp(&b.id));
        if subjects.is_empty() {
            return Err(StageError::EmptyAtlas { path: priors });
        }

        let fusion = load_fusion_manifest(&root.join(consts::FUSION_MANIFEST))?;

        Ok(AtlasLibrary {
            root: root.to_path_buf(),
            subjects,
            fusion,
        })
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    /// Whole-brain mean template.
    pub fn orig_template(&self) -> PathBuf {
        self.root.join(consts::ORIG_TEMPLATE)
    }

    /// Cropped template for the v2 algorithm.
    pub fn cropped_template(&self, big_crop: bool) -> PathBuf {
        let name = if big_crop {
            consts::TEMPLATE_CROP_BIG
        } else {
            consts::TEMPLATE_CROP
        };
        self.root.join(name)
    }

    /// Template-space crop mask for the v2 algorithm.
    pub fn crop_mask(&self, big_crop: bool) -> PathBuf {
        let name = if big_crop {
            consts::MASK_CROP_BIG
        } else {
            consts::MASK_CROP
        };
        self.root.join(name)
    }

    /// Tuned fusion parameters for a label, falling back to the published
    /// defaults when the manifest has no entry.
    pub fn fusion_parameters(&self, label: &str) -> FusionParams {
        self.fusion
            .labels
            .get(label)
            .copied()
            .unwrap_or_default()
    }
}

fn load_fusion_manifest(path: &Path) -> Result<FusionManifest, StageError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(FusionManifest::default());
        }
        Err(source) => {
            return Err(StageError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_yaml::from_str(&content).map_err(|err| StageError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
    })
}
