// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Fixed names shared by the atlas library layout and the pipeline stages.

/// File name of the bias-corrected reference volume each atlas subject carries.
pub const REFERENCE_IMAGE: &str = "WMnMPRAGE_bias_corr.nii.gz";

/// Key under which the warped reference volume appears in a subject's result
/// mapping, next to the label keys.
pub const REFERENCE_KEY: &str = "WMnMPRAGE_bias_corr";

/// Transform prefix inside a subject directory; `<prefix>Warp.nii.gz` and
/// `<prefix>Affine.txt` are the subject's precomputed registration.
pub const SUBJECT_TRANSFORM_PREFIX: &str = "WMnMPRAGE";

/// Label covering the whole structure. Always warped, whether requested or
/// not, so the conservative mask stage has something to project.
pub const WHOLE_STRUCTURE_LABEL: &str = "1-THALAMUS";

/// Subdirectory of each subject holding sanitized label volumes.
pub const SANITIZED_ROI_DIR: &str = "sanitized_rois";

/// Subdirectory of the atlas root holding the training subjects.
pub const PRIORS_DIR: &str = "priors";

/// CLI selector that expands to every label in the catalog.
pub const ALL_LABELS: &str = "ALL";

/// CLI selector name paired with the on-disk label volume stem.
pub const LABEL_CATALOG: &[(&str, &str)] = &[
    ("thalamus", "1-THALAMUS"),
    ("av", "2-AV"),
    ("va", "4-VA"),
    ("vla", "5-VLa"),
    ("vlp", "6-VLP"),
    ("vpl", "7-VPL"),
    ("vl", "4567-VL"),
    ("pul", "8-Pul"),
    ("lgn", "9-LGN"),
    ("mgn", "10-MGN"),
    ("cm", "11-CM"),
    ("md", "12-MD-Pf"),
    ("hb", "13-Hb"),
    ("mtt", "14-MTT"),
];

/// Whole-brain mean template used for v0 registration and the v2 rigid
/// pre-alignment.
pub const ORIG_TEMPLATE: &str = "origtemplate.nii.gz";

/// Cropped template / crop mask pairs used by the v2 algorithm.
pub const TEMPLATE_CROP: &str = "templ_93x187x68.nii.gz";
pub const MASK_CROP: &str = "mask_templ_93x187x68.nii.gz";
pub const TEMPLATE_CROP_BIG: &str = "p15_templ_93x187x68.nii.gz";
pub const MASK_CROP_BIG: &str = "mask_templ_93x187x68_p15.nii.gz";

/// Per-label fusion parameter manifest inside the atlas root.
pub const FUSION_MANIFEST: &str = "fusion.yaml";

/// Voxel radius for growing the conservative fusion mask.
pub const DEFAULT_MASK_DILATION: u32 = 10;
