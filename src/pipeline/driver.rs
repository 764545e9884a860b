// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline driver: a linear state machine with two fan-out/fan-in points.
//!
//! `Sanitized -> BiasCorrected -> Registered -> SubjectsWarped (fan-out) ->
//! MaskEstimated (optional) -> LabelsFused (fan-out) -> Reoriented (fan-out)
//! -> Done`. Stages run strictly in sequence with a barrier between them;
//! each transition is guarded by the existence of its expected artifact, so
//! an interrupted run resumes where it stopped.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::cache;
use crate::config::{consts, Algorithm, AtlasLibrary, FusionStrategy, PipelineConfig, Subject};
use crate::errors::{PipelineError, StageError};
use crate::observability::messages::pipeline::{PipelineCompleted, StageStarted};
use crate::observability::messages::StructuredLog;
use crate::pool::{rollup, Task, WorkerPool};
use crate::runner::require;
use crate::stages::{aggregate, fuse, register, sanitize};
use crate::stages::fuse::FuseLabels;
use crate::stages::reorient::{FlipOutputs, ReorientOutputs};
use crate::stages::warp::WarpSubjects;

use super::Workspace;

pub struct Driver {
    config: PipelineConfig,
    atlas: AtlasLibrary,
    pool: WorkerPool,
}

impl Driver {
    pub fn new(config: PipelineConfig, atlas: AtlasLibrary, cancel: CancellationToken) -> Self {
        let pool = WorkerPool::new(config.effective_workers(), cancel);
        Driver {
            config,
            atlas,
            pool,
        }
    }

    /// External tools this run will invoke, derived from the configuration.
    fn required_tools(&self) -> Vec<&'static str> {
        let cfg = &self.config;
        let mut tools = vec![
            "fslreorient2std",
            "N4BiasFieldCorrection",
            "antsRegistration",
            "ComposeMultiTransform",
            "WarpImageMultiTransform",
            "swapdimlike",
        ];
        if cfg.flip_right {
            tools.push("fslswapdim");
        }
        if cfg.algorithm == Algorithm::V2 {
            tools.push("antsApplyTransforms");
            tools.push("ExtractRegionFromImageByMask");
        }
        match cfg.fusion {
            FusionStrategy::Majority => tools.push("ImageMath"),
            FusionStrategy::Joint => tools.push("jointfusion"),
            FusionStrategy::JointMasked => {
                tools.push("antsJointFusion");
                tools.push("c3d");
            }
        }
        tools
    }

    /// Run the pipeline to completion, returning `label -> final artifact`.
    pub async fn run(
        &self,
        workspace: &Workspace,
    ) -> Result<BTreeMap<String, PathBuf>, PipelineError> {
        let started = Instant::now();
        let cfg = &self.config;
        cfg.validate().map_err(PipelineError::Config)?;

        // Missing external tools are fatal before any stage runs.
        let missing =
            require::missing_tools(self.required_tools(), cfg.exec.search_path());
        if !missing.is_empty() {
            return Err(PipelineError::MissingTools { tools: missing });
        }

        if !cfg.input_image.exists() {
            return Err(StageError::MissingArtifact {
                stage: "input sanitation",
                path: cfg.input_image.clone(),
            }
            .into());
        }
        cache::ensure_dir(&cfg.output_dir)?;

        let (template, crop_mask) = self.resolve_template();

        // v2 crops the input to the template mask before anything else.
        let mut working_input = cfg.input_image.clone();
        if let Some(crop_mask) = &crop_mask {
            StageStarted {
                stage: "input cropping",
                elapsed: started.elapsed(),
            }
            .log();
            working_input = sanitize::crop_to_template_mask(
                &working_input,
                &self.atlas.orig_template(),
                crop_mask,
                workspace.root(),
                &cfg.exec,
            )
            .await?;
        }

        StageStarted {
            stage: "input sanitation",
            elapsed: started.elapsed(),
        }
        .log();
        let sanitized =
            sanitize::sanitize_input(&working_input, workspace.root(), cfg.flip_right, &cfg.exec)
                .await?;

        StageStarted {
            stage: "template registration",
            elapsed: started.elapsed(),
        }
        .log();
        let warp_prefix = cfg
            .warp_prefix
            .clone()
            .unwrap_or_else(|| workspace.warp_prefix_for(&cfg.input_image));
        register::register_to_template(
            &sanitized,
            &template,
            &warp_prefix,
            cfg.algorithm,
            cfg.fixed_image_mask.as_deref(),
            cfg.moving_image_mask.as_deref(),
            cfg.force_registration,
            &cfg.exec,
        )
        .await?;
        register::warp_to_template_space(
            &sanitized,
            &template,
            &warp_prefix,
            workspace.root(),
            &cfg.exec,
        )
        .await?;

        StageStarted {
            stage: "atlas warping",
            elapsed: started.elapsed(),
        }
        .log();
        let warped = self.warp_all_subjects(workspace, &sanitized, &warp_prefix).await?;

        let atlas_images: Vec<PathBuf> = warped
            .get(consts::REFERENCE_KEY)
            .map(|per_subject| per_subject.values().cloned().collect())
            .ok_or_else(|| StageError::MissingArtifact {
                stage: "aggregation",
                path: PathBuf::from(consts::REFERENCE_KEY),
            })?;

        let mask = match cfg.fusion {
            FusionStrategy::JointMasked => {
                StageStarted {
                    stage: "mask estimation",
                    elapsed: started.elapsed(),
                }
                .log();
                let whole = warped.get(consts::WHOLE_STRUCTURE_LABEL).ok_or_else(|| {
                    StageError::MissingArtifact {
                        stage: "mask estimation",
                        path: PathBuf::from(consts::WHOLE_STRUCTURE_LABEL),
                    }
                })?;
                let inputs: Vec<PathBuf> = whole.values().cloned().collect();
                Some(
                    fuse::conservative_mask(
                        &inputs,
                        &workspace.root().join("mask.nii.gz"),
                        cfg.mask_dilation,
                        &cfg.exec,
                    )
                    .await?,
                )
            }
            _ => None,
        };

        StageStarted {
            stage: "label fusion",
            elapsed: started.elapsed(),
        }
        .log();
        let fused = self
            .fuse_all_labels(workspace, &sanitized, atlas_images, warped, mask)
            .await?;

        // Fused labels live in target space; mirror them back when the run
        // segmented the flipped side, then reorder axes to match the
        // original input.
        let staged = if cfg.flip_right {
            StageStarted {
                stage: "laterality restore",
                elapsed: started.elapsed(),
            }
            .log();
            let op = Arc::new(FlipOutputs {
                options: cfg.exec.clone(),
            });
            let tasks: Vec<Task<PathBuf>> = cfg
                .labels
                .iter()
                .zip(&fused)
                .map(|(label, path)| {
                    Task::Positional(vec![
                        path.clone(),
                        workspace.root().join(format!("flip_{}.nii.gz", label)),
                    ])
                })
                .collect();
            rollup(self.pool.map(op, tasks).await?)?
        } else {
            fused
        };

        StageStarted {
            stage: "output reorientation",
            elapsed: started.elapsed(),
        }
        .log();
        let op = Arc::new(ReorientOutputs {
            options: cfg.exec.clone(),
        });
        let tasks: Vec<Task<PathBuf>> = cfg
            .labels
            .iter()
            .zip(&staged)
            .map(|(label, path)| {
                Task::Positional(vec![
                    path.clone(),
                    cfg.input_image.clone(),
                    cfg.output_dir.join(format!("{}.nii.gz", label)),
                ])
            })
            .collect();
        let finals = rollup(self.pool.map(op, tasks).await?)?;

        let outputs: BTreeMap<String, PathBuf> =
            cfg.labels.iter().cloned().zip(finals).collect();
        PipelineCompleted {
            label_count: outputs.len(),
            elapsed: started.elapsed(),
        }
        .log();
        Ok(outputs)
    }

    /// Template and optional crop mask for the configured algorithm.
    fn resolve_template(&self) -> (PathBuf, Option<PathBuf>) {
        let cfg = &self.config;
        match cfg.algorithm {
            Algorithm::V0 => (self.atlas.orig_template(), None),
            Algorithm::V2 => match (&cfg.custom_template, &cfg.custom_mask) {
                (Some(template), Some(mask)) => (template.clone(), Some(mask.clone())),
                _ => (
                    self.atlas.cropped_template(cfg.big_crop),
                    Some(self.atlas.crop_mask(cfg.big_crop)),
                ),
            },
        }
    }

    /// Fan out the per-subject warp stage and fan the results back in as
    /// `name -> (subject -> artifact)`.
    async fn warp_all_subjects(
        &self,
        workspace: &Workspace,
        sanitized: &PathBuf,
        warp_prefix: &PathBuf,
    ) -> Result<BTreeMap<String, BTreeMap<String, PathBuf>>, PipelineError> {
        let cfg = &self.config;

        // The whole-structure label always travels along so the mask stage
        // has something to project.
        let mut warp_labels = cfg.labels.clone();
        if !warp_labels.iter().any(|l| l == consts::WHOLE_STRUCTURE_LABEL) {
            warp_labels.push(consts::WHOLE_STRUCTURE_LABEL.to_string());
        }

        let op = Arc::new(WarpSubjects {
            labels: warp_labels,
            target_image: sanitized.clone(),
            target_prefix: warp_prefix.clone(),
            output_root: workspace.root().to_path_buf(),
            options: cfg.exec.clone(),
        });
        let tasks: Vec<Task<Subject>> = self
            .atlas
            .subjects()
            .iter()
            .cloned()
            .map(Task::Single)
            .collect();
        let results = self.pool.map(op, tasks).await?;
        let mappings = rollup(results)?;

        // Task-to-result correspondence is positional, so zipping against
        // the subject list is sound.
        let per_subject: Vec<(String, BTreeMap<String, PathBuf>)> = self
            .atlas
            .subjects()
            .iter()
            .map(|subject| subject.id().to_string())
            .zip(mappings)
            .collect();
        Ok(aggregate::invert(per_subject)?)
    }

    /// Fan out the fusion stage over the requested labels, returning fused
    /// artifacts in label order.
    async fn fuse_all_labels(
        &self,
        workspace: &Workspace,
        sanitized: &PathBuf,
        atlas_images: Vec<PathBuf>,
        warped_labels: BTreeMap<String, BTreeMap<String, PathBuf>>,
        mask: Option<PathBuf>,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let cfg = &self.config;
        let parameters = cfg
            .labels
            .iter()
            .map(|label| (label.clone(), self.atlas.fusion_parameters(label)))
            .collect();
        let op = Arc::new(FuseLabels {
            strategy: cfg.fusion,
            target_image: sanitized.clone(),
            atlas_images,
            warped_labels,
            parameters,
            mask,
            output_root: workspace.root().to_path_buf(),
            options: cfg.exec.clone(),
        });
        let tasks: Vec<Task<String>> =
            cfg.labels.iter().cloned().map(Task::Single).collect();
        let results = self.pool.map(op, tasks).await?;
        Ok(rollup(results)?)
    }
}
