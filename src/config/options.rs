// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Run configuration, built once at the entry point and threaded through
//! every call. No global mutable state.

use std::path::PathBuf;

use crate::errors::StageError;

use super::consts;

/// Execution modes applied to every external tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Print each command line without executing it (dry run).
    pub echo: bool,
    /// Announce each command before executing it.
    pub verbose: bool,
    /// Capture stdout/stderr instead of inheriting the terminal.
    pub suppress: bool,
    /// Prompt for confirmation before each command. Forces serial execution.
    pub interactive: bool,
    /// Extra environment overrides applied to every spawned tool.
    pub env: Vec<(String, String)>,
}

impl ExecOptions {
    /// The `PATH` override to use when resolving tools, if one is configured.
    pub fn search_path(&self) -> Option<&str> {
        self.env
            .iter()
            .find(|(key, _)| key == "PATH")
            .map(|(_, value)| value.as_str())
    }
}

/// Which registration pipeline variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Whole-brain registration against the mean template.
    V0,
    /// Crop the input to the template mask first, then register the cropped
    /// template with mutual information and optional registration masks.
    V2,
}

impl Algorithm {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "v0" => Some(Algorithm::V0),
            "v2" => Some(Algorithm::V2),
            _ => None,
        }
    }
}

/// Label fusion strategy, fixed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionStrategy {
    /// Joint label fusion with per-label tuned parameters.
    Joint,
    /// Unweighted majority voting.
    Majority,
    /// Joint fusion restricted to a conservative mask estimated from the
    /// whole-structure label across subjects.
    JointMasked,
}

/// Everything a pipeline run needs, resolved before the first stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Input intensity volume to segment.
    pub input_image: PathBuf,
    /// Directory receiving the final per-label artifacts.
    pub output_dir: PathBuf,
    /// Requested label stems, resolved against the catalog.
    pub labels: Vec<String>,
    pub algorithm: Algorithm,
    pub fusion: FusionStrategy,
    /// Use the bigger crop template/mask pair (v2 only).
    pub big_crop: bool,
    /// Mirror the input along L-R to segment the right side.
    pub flip_right: bool,
    /// Re-run template registration even when its artifacts exist.
    pub force_registration: bool,
    /// Look for `<prefix>InverseWarp.nii.gz` / `<prefix>Affine.txt` here
    /// instead of deriving the prefix from the input image name.
    pub warp_prefix: Option<PathBuf>,
    /// Fixed-image mask for the nonlinear registration (v2).
    pub fixed_image_mask: Option<PathBuf>,
    /// Moving-image mask for the nonlinear registration (v2).
    pub moving_image_mask: Option<PathBuf>,
    /// Custom template/mask pair overriding the atlas defaults (v2).
    pub custom_template: Option<PathBuf>,
    pub custom_mask: Option<PathBuf>,
    /// Worker count; `None` means hardware parallelism.
    pub workers: Option<usize>,
    /// Keep intermediate artifacts here instead of a throwaway temp dir.
    pub temp_dir: Option<PathBuf>,
    /// Voxel radius for the conservative mask dilation.
    pub mask_dilation: u32,
    pub exec: ExecOptions,
}

impl PipelineConfig {
    /// Worker count after applying mode constraints: interactive confirmation
    /// cannot interleave prompts, so it forces a single worker.
    pub fn effective_workers(&self) -> usize {
        if self.exec.interactive {
            return 1;
        }
        self.workers.unwrap_or_else(default_workers)
    }

    /// Custom template/mask pairs must be specified together; the pair has to
    /// agree on geometry, so half an override is a configuration error.
    pub fn validate(&self) -> Result<(), String> {
        if self.custom_template.is_some() != self.custom_mask.is_some() {
            return Err(
                "a custom template and mask must be specified together".to_string(),
            );
        }
        if self.labels.is_empty() {
            return Err("at least one label must be requested".to_string());
        }
        Ok(())
    }
}

/// Default worker count based on system capabilities, falling back to 4 if
/// detection fails.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Resolve CLI label selectors to on-disk label stems.
///
/// The `ALL` wildcard expands to the full catalog. Selectors are the short
/// names from the catalog; anything else is an error.
pub fn resolve_labels(names: &[String]) -> Result<Vec<String>, StageError> {
    if names.iter().any(|name| name == consts::ALL_LABELS) {
        return Ok(consts::LABEL_CATALOG
            .iter()
            .map(|(_, stem)| (*stem).to_string())
            .collect());
    }
    let mut labels = Vec::with_capacity(names.len());
    for name in names {
        let stem = consts::LABEL_CATALOG
            .iter()
            .find(|(short, _)| short == name)
            .map(|(_, stem)| (*stem).to_string())
            .ok_or_else(|| StageError::UnknownLabel(name.clone()))?;
        labels.push(stem);
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> PipelineConfig {
        PipelineConfig {
            input_image: PathBuf::from("subject.nii.gz"),
            output_dir: PathBuf::from("out"),
            labels: vec!["1-THALAMUS".to_string()],
            algorithm: Algorithm::V0,
            fusion: FusionStrategy::Majority,
            big_crop: false,
            flip_right: false,
            force_registration: false,
            warp_prefix: None,
            fixed_image_mask: None,
            moving_image_mask: None,
            custom_template: None,
            custom_mask: None,
            workers: Some(8),
            temp_dir: None,
            mask_dilation: consts::DEFAULT_MASK_DILATION,
            exec: ExecOptions::default(),
        }
    }

    #[test]
    fn resolve_labels_maps_short_names() {
        let labels =
            resolve_labels(&["thalamus".to_string(), "pul".to_string()]).unwrap();
        assert_eq!(labels, vec!["1-THALAMUS", "8-Pul"]);
    }

    #[test]
    fn resolve_labels_expands_wildcard() {
        let labels = resolve_labels(&[consts::ALL_LABELS.to_string()]).unwrap();
        assert_eq!(labels.len(), consts::LABEL_CATALOG.len());
        assert!(labels.contains(&"6-VLP".to_string()));
    }

    #[test]
    fn resolve_labels_rejects_unknown_selector() {
        let err = resolve_labels(&["cerebellum".to_string()]).unwrap_err();
        assert!(matches!(err, StageError::UnknownLabel(name) if name == "cerebellum"));
    }

    #[test]
    fn interactive_mode_forces_single_worker() {
        let mut config = minimal_config();
        assert_eq!(config.effective_workers(), 8);
        config.exec.interactive = true;
        assert_eq!(config.effective_workers(), 1);
    }

    #[test]
    fn custom_template_requires_custom_mask() {
        let mut config = minimal_config();
        config.custom_template = Some(PathBuf::from("templ.nii.gz"));
        assert!(config.validate().is_err());
        config.custom_mask = Some(PathBuf::from("mask.nii.gz"));
        assert!(config.validate().is_ok());
    }
}
