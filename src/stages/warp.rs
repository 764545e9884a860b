// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-subject atlas warp stage.
//!
//! For each atlas subject: compose the subject's precomputed transform chain
//! with the inverse of the target's registration into one combined
//! deformation field, then pull every requested label volume and the
//! reference intensity volume through it into target space.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::cache;
use crate::config::{consts, ExecOptions, Subject};
use crate::errors::{StageError, TaskError};
use crate::pool::PoolOperation;
use crate::tools::{self, Interpolation};

use super::run_checked;

/// Fan-out operation warping one atlas subject per task.
pub struct WarpSubjects {
    /// Labels to pull through, in addition to the reference volume.
    pub labels: Vec<String>,
    /// The sanitized target image; defines the output space.
    pub target_image: PathBuf,
    /// Prefix of the target's registration to the template.
    pub target_prefix: PathBuf,
    /// Per-run scratch root; each subject gets a directory under it.
    pub output_root: PathBuf,
    pub options: ExecOptions,
}

impl WarpSubjects {
    /// Warp one subject's volumes into target space.
    ///
    /// Returns `name -> artifact` containing exactly the requested labels
    /// plus the reference key. Every artifact is guard-keyed on its own
    /// output path, so a resumed run only redoes missing volumes.
    pub async fn warp_subject(
        &self,
        subject: &Subject,
    ) -> Result<BTreeMap<String, PathBuf>, StageError> {
        let subject_dir = self.output_root.join(subject.id());
        cache::ensure_dir(&subject_dir)?;

        let combined = subject_dir.join("Warp.nii.gz");
        let a_prefix = subject.transform_prefix();
        {
            let target_image = self.target_image.clone();
            let target_prefix = self.target_prefix.clone();
            cache::ensure(&combined, &self.options, |staging| async move {
                run_checked(
                    tools::registration::compose_a_to_b(
                        &a_prefix,
                        &target_image,
                        &target_prefix,
                        &staging,
                    ),
                    &self.options,
                )
                .await
            })
            .await?;
        }

        let mut outputs = BTreeMap::new();
        for label in &self.labels {
            let warped = subject_dir.join(format!("{}.nii.gz", label));
            let volume = subject.label_volume(label);
            self.apply(&volume, &warped, &combined, Interpolation::NearestNeighbor)
                .await?;
            outputs.insert(label.clone(), warped);
        }

        // The anatomical reference travels along with smooth interpolation.
        let warped_reference = subject_dir.join(consts::REFERENCE_IMAGE);
        self.apply(
            &subject.reference_volume(),
            &warped_reference,
            &combined,
            Interpolation::BSpline,
        )
        .await?;
        outputs.insert(consts::REFERENCE_KEY.to_string(), warped_reference);

        Ok(outputs)
    }

    async fn apply(
        &self,
        input: &Path,
        output: &Path,
        combined: &Path,
        interpolation: Interpolation,
    ) -> Result<(), StageError> {
        let input = input.to_path_buf();
        let combined = combined.to_path_buf();
        let target = self.target_image.clone();
        cache::ensure(output, &self.options, |staging| async move {
            run_checked(
                tools::registration::apply_warp(
                    &target,
                    &input,
                    &[combined.as_path()],
                    &staging,
                    interpolation,
                ),
                &self.options,
            )
            .await
        })
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl PoolOperation for WarpSubjects {
    type Arg = Subject;
    type Output = BTreeMap<String, PathBuf>;

    fn name(&self) -> &'static str {
        "warp_subjects"
    }

    async fn single(&self, subject: Subject) -> Result<Self::Output, TaskError> {
        self.warp_subject(&subject)
            .await
            .map_err(|err| TaskError::failed(err.to_string()))
    }
}
