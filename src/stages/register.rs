// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Template registration stage.

use std::path::Path;

use crate::cache;
use crate::config::{Algorithm, ExecOptions};
use crate::errors::StageError;
use crate::observability::messages::pipeline::StageSkipped;
use crate::observability::messages::StructuredLog;
use crate::tools::{self, Interpolation};

use super::run_checked;

/// Register the sanitized input to the common template, writing transforms
/// under `warp_prefix`.
///
/// The transition is skipped when both registration artifacts already exist,
/// unless `force` is set. This is the whole-pipeline resumability check: a
/// rerun after interruption re-uses hours of registration work.
pub async fn register_to_template(
    input: &Path,
    template: &Path,
    warp_prefix: &Path,
    algorithm: Algorithm,
    fixed_mask: Option<&Path>,
    moving_mask: Option<&Path>,
    force: bool,
    options: &ExecOptions,
) -> Result<(), StageError> {
    if !force && cache::warps_exist(warp_prefix) {
        StageSkipped {
            stage: "template registration",
            artifact: &tools::prefixed(warp_prefix, "InverseWarp.nii.gz")
                .display()
                .to_string(),
        }
        .log();
        return Ok(());
    }

    let command = match algorithm {
        Algorithm::V0 => tools::registration::nonlinear_register_v0(template, input, warp_prefix),
        Algorithm::V2 => tools::registration::nonlinear_register_mi(
            template,
            input,
            warp_prefix,
            fixed_mask,
            moving_mask,
        ),
    };
    run_checked(command, options).await?;

    if !cache::warps_exist(warp_prefix) && !options.echo {
        return Err(StageError::OutputNotProduced {
            path: tools::prefixed(warp_prefix, "InverseWarp.nii.gz"),
        });
    }
    Ok(())
}

/// Warp the sanitized input into template space as a registration check
/// image.
pub async fn warp_to_template_space(
    input: &Path,
    template: &Path,
    warp_prefix: &Path,
    workspace: &Path,
    options: &ExecOptions,
) -> Result<std::path::PathBuf, StageError> {
    let registered = workspace.join("registered.nii.gz");
    let warp = tools::prefixed(warp_prefix, "Warp.nii.gz");
    let affine = tools::prefixed(warp_prefix, "Affine.txt");
    cache::ensure(&registered, options, |staging| async move {
        run_checked(
            tools::registration::apply_warp(
                template,
                input,
                &[warp.as_path(), affine.as_path()],
                &staging,
                Interpolation::Linear,
            ),
            options,
        )
        .await
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn echo() -> ExecOptions {
        ExecOptions {
            echo: true,
            ..ExecOptions::default()
        }
    }

    #[tokio::test]
    async fn existing_warps_skip_registration() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("subject");
        std::fs::write(dir.path().join("subjectInverseWarp.nii.gz"), b"w").unwrap();
        std::fs::write(dir.path().join("subjectAffine.txt"), b"a").unwrap();

        // With the artifacts present, nothing is invoked: even a missing
        // registration binary cannot fail.
        register_to_template(
            Path::new("in.nii.gz"),
            Path::new("templ.nii.gz"),
            &prefix,
            Algorithm::V0,
            None,
            None,
            false,
            &ExecOptions::default(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn force_flag_bypasses_the_skip_check() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("subject");
        std::fs::write(dir.path().join("subjectInverseWarp.nii.gz"), b"w").unwrap();
        std::fs::write(dir.path().join("subjectAffine.txt"), b"a").unwrap();

        // Echo mode: the registration command is printed, not run, and the
        // dry run succeeds. Reaching the command at all proves the skip
        // check was bypassed.
        register_to_template(
            Path::new("in.nii.gz"),
            Path::new("templ.nii.gz"),
            &prefix,
            Algorithm::V0,
            None,
            None,
            true,
            &echo(),
        )
        .await
        .unwrap();
    }
}
