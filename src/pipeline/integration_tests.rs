// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! End-to-end pipeline tests against a stub toolchain.
//!
//! The external collaborators are replaced by shell stubs that append their
//! invocation to a log and create the artifacts their real counterparts
//! would. The pipeline itself cannot tell the difference: completion is
//! artifact existence either way.

#![cfg(unix)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::config::{
    consts, Algorithm, AtlasLibrary, ExecOptions, FusionStrategy, PipelineConfig,
};
use crate::errors::PipelineError;
use crate::pipeline::{Driver, Workspace};
use crate::stages::warp::WarpSubjects;

fn install_stub(dir: &Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    let script = format!(
        "#!/bin/sh\necho \"{} $@\" >> \"$STUB_LOG\"\n{}\nexit 0\n",
        name, body
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Body fragment locating the argument after a flag and creating it.
const CREATE_AFTER_O: &str =
    "prev=\"\"\nfor a in \"$@\"; do [ \"$prev\" = \"-o\" ] && out=\"$a\"; prev=\"$a\"; done\n: > \"$out\"";

/// Stubs for every external collaborator the tests touch. Output creation
/// uses the `:` builtin so the stubs work with a bare PATH.
fn install_toolchain(dir: &Path) {
    install_stub(dir, "fslreorient2std", ": > \"$2\"");
    install_stub(dir, "fslswapdim", "for a in \"$@\"; do out=\"$a\"; done\n: > \"$out\"");
    install_stub(dir, "N4BiasFieldCorrection", CREATE_AFTER_O);
    install_stub(
        dir,
        "antsRegistration",
        "prev=\"\"\nfor a in \"$@\"; do [ \"$prev\" = \"--output\" ] && prefix=\"$a\"; prev=\"$a\"; done\n: > \"${prefix}Warp.nii.gz\"\n: > \"${prefix}InverseWarp.nii.gz\"\n: > \"${prefix}Affine.txt\"\n: > \"${prefix}0GenericAffine.mat\"",
    );
    install_stub(dir, "ComposeMultiTransform", ": > \"$2\"");
    install_stub(dir, "WarpImageMultiTransform", ": > \"$3\"");
    install_stub(dir, "antsApplyTransforms", CREATE_AFTER_O);
    install_stub(dir, "ExtractRegionFromImageByMask", ": > \"$3\"");
    install_stub(dir, "ImageMath", ": > \"$2\"");
    install_stub(dir, "antsJointFusion", CREATE_AFTER_O);
    install_stub(dir, "c3d", CREATE_AFTER_O);
    install_stub(dir, "swapdimlike", ": > \"$3\"");
}

fn scaffold_atlas(root: &Path, subject_ids: &[&str]) {
    for id in subject_ids {
        let subject_dir = root.join(consts::PRIORS_DIR).join(id);
        std::fs::create_dir_all(subject_dir.join(consts::SANITIZED_ROI_DIR)).unwrap();
    }
}

struct Scaffold {
    base: TempDir,
    atlas_root: PathBuf,
    stubs: PathBuf,
    log: PathBuf,
    input: PathBuf,
    output_dir: PathBuf,
    scratch: PathBuf,
}

impl Scaffold {
    fn new() -> Self {
        let base = TempDir::new().unwrap();
        let atlas_root = base.path().join("atlas");
        scaffold_atlas(&atlas_root, &["s01", "s02"]);

        let stubs = base.path().join("bin");
        std::fs::create_dir(&stubs).unwrap();
        install_toolchain(&stubs);

        let input = base.path().join("subject01.nii.gz");
        std::fs::write(&input, b"input volume").unwrap();

        let output_dir = base.path().join("out");
        let scratch = base.path().join("scratch");
        let log = base.path().join("invocations.log");

        Scaffold {
            base,
            atlas_root,
            stubs,
            log,
            input,
            output_dir,
            scratch,
        }
    }

    fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            suppress: true,
            env: vec![
                (
                    "PATH".to_string(),
                    format!("{}:/usr/bin:/bin", self.stubs.display()),
                ),
                ("STUB_LOG".to_string(), self.log.display().to_string()),
            ],
            ..ExecOptions::default()
        }
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            input_image: self.input.clone(),
            output_dir: self.output_dir.clone(),
            labels: vec![consts::WHOLE_STRUCTURE_LABEL.to_string()],
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
            workers: Some(2),
            temp_dir: Some(self.scratch.clone()),
            mask_dilation: consts::DEFAULT_MASK_DILATION,
            exec: self.exec_options(),
        }
    }

    fn invocations_of(&self, tool: &str) -> usize {
        match std::fs::read_to_string(&self.log) {
            Ok(content) => content
                .lines()
                .filter(|line| line.starts_with(tool))
                .count(),
            Err(_) => 0,
        }
    }

    fn driver(&self) -> Driver {
        let atlas = AtlasLibrary::discover(&self.atlas_root).unwrap();
        Driver::new(self.config(), atlas, CancellationToken::new())
    }
}

#[tokio::test]
async fn end_to_end_majority_vote_run_and_resume() {
    let scaffold = Scaffold::new();
    let workspace = Workspace::create(Some(&scaffold.scratch), &scaffold.input).unwrap();

    // First run: everything is built, registration runs exactly once.
    let outputs = scaffold.driver().run(&workspace).await.unwrap();
    let fused = &outputs[consts::WHOLE_STRUCTURE_LABEL];
    assert!(fused.exists());
    assert_eq!(
        *fused,
        scaffold
            .output_dir
            .join(format!("{}.nii.gz", consts::WHOLE_STRUCTURE_LABEL))
    );
    assert_eq!(scaffold.invocations_of("antsRegistration"), 1);
    assert_eq!(scaffold.invocations_of("ImageMath"), 1);
    // One combined warp per subject.
    assert_eq!(scaffold.invocations_of("ComposeMultiTransform"), 2);

    // Rerun over the same workspace: every transition finds its artifact
    // and skips, so registration is invoked zero further times.
    let outputs = scaffold.driver().run(&workspace).await.unwrap();
    assert!(outputs[consts::WHOLE_STRUCTURE_LABEL].exists());
    assert_eq!(scaffold.invocations_of("antsRegistration"), 1);
    assert_eq!(scaffold.invocations_of("ImageMath"), 1);
    assert_eq!(scaffold.invocations_of("ComposeMultiTransform"), 2);
}

#[tokio::test]
async fn v2_masked_run_crops_then_sanitizes_then_fuses() {
    let scaffold = Scaffold::new();
    let mut config = scaffold.config();
    config.algorithm = Algorithm::V2;
    config.fusion = FusionStrategy::JointMasked;

    let atlas = AtlasLibrary::discover(&scaffold.atlas_root).unwrap();
    let driver = Driver::new(config, atlas, CancellationToken::new());
    let workspace = Workspace::create(Some(&scaffold.scratch), &scaffold.input).unwrap();

    let outputs = driver.run(&workspace).await.unwrap();
    assert!(outputs[consts::WHOLE_STRUCTURE_LABEL].exists());

    // Crop preparation ran against the original input: rigid alignment,
    // mask transform, crop.
    assert_eq!(scaffold.invocations_of("ExtractRegionFromImageByMask"), 1);
    assert_eq!(scaffold.invocations_of("antsApplyTransforms"), 1);
    // Sanitation still ran against the cropped volume.
    assert_eq!(scaffold.invocations_of("fslreorient2std"), 1);
    assert_eq!(scaffold.invocations_of("N4BiasFieldCorrection"), 1);
    // Rigid pre-alignment plus the nonlinear template registration.
    assert_eq!(scaffold.invocations_of("antsRegistration"), 2);
    // Conservative mask: maximum-projection then dilation.
    assert_eq!(scaffold.invocations_of("c3d"), 2);
    assert_eq!(scaffold.invocations_of("antsJointFusion"), 1);
    assert!(workspace.root().join("mask.nii.gz").exists());
}

#[tokio::test]
async fn warp_subject_yields_exactly_requested_labels_plus_reference() {
    let scaffold = Scaffold::new();
    let atlas = AtlasLibrary::discover(&scaffold.atlas_root).unwrap();
    let warp_root = scaffold.base.path().join("warp");
    std::fs::create_dir(&warp_root).unwrap();

    let op = WarpSubjects {
        labels: vec!["2-AV".to_string(), "6-VLP".to_string()],
        target_image: scaffold.input.clone(),
        target_prefix: warp_root.join("subject01"),
        output_root: warp_root.clone(),
        options: scaffold.exec_options(),
    };
    let mapping = op.warp_subject(&atlas.subjects()[0]).await.unwrap();

    let keys: Vec<&str> = mapping.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["2-AV", "6-VLP", consts::REFERENCE_KEY]);
    for artifact in mapping.values() {
        assert!(artifact.exists());
    }
}

#[tokio::test]
async fn missing_tool_fails_before_any_stage_runs() {
    let scaffold = Scaffold::new();
    // Point the search path at an empty directory: nothing resolves.
    let empty = scaffold.base.path().join("empty");
    std::fs::create_dir(&empty).unwrap();
    let mut config = scaffold.config();
    config.exec.env = vec![
        ("PATH".to_string(), empty.display().to_string()),
        ("STUB_LOG".to_string(), scaffold.log.display().to_string()),
    ];

    let atlas = AtlasLibrary::discover(&scaffold.atlas_root).unwrap();
    let driver = Driver::new(config, atlas, CancellationToken::new());
    let workspace = Workspace::create(Some(&scaffold.scratch), &scaffold.input).unwrap();

    let err = driver.run(&workspace).await.unwrap_err();
    match err {
        PipelineError::MissingTools { tools } => {
            assert!(tools.contains(&"antsRegistration".to_string()));
        }
        other => panic!("expected MissingTools, got {:?}", other),
    }
    // Nothing ran.
    assert_eq!(scaffold.invocations_of(""), 0);
}

#[tokio::test]
async fn dry_run_walks_the_whole_pipeline_without_spawning() {
    let scaffold = Scaffold::new();
    let mut config = scaffold.config();
    config.exec.echo = true;

    let atlas = AtlasLibrary::discover(&scaffold.atlas_root).unwrap();
    let driver = Driver::new(config, atlas, CancellationToken::new());
    let workspace = Workspace::create(Some(&scaffold.scratch), &scaffold.input).unwrap();

    let outputs = driver.run(&workspace).await.unwrap();
    assert_eq!(outputs.len(), 1);
    // Commands were printed, not executed: no stub ever logged, no artifact
    // was produced.
    assert_eq!(scaffold.invocations_of(""), 0);
    assert!(!outputs[consts::WHOLE_STRUCTURE_LABEL].exists());
}

#[tokio::test]
async fn per_subject_scratch_directories_are_isolated() {
    let scaffold = Scaffold::new();
    let workspace = Workspace::create(Some(&scaffold.scratch), &scaffold.input).unwrap();
    scaffold.driver().run(&workspace).await.unwrap();

    for subject in ["s01", "s02"] {
        let dir = workspace.root().join(subject);
        assert!(dir.join("Warp.nii.gz").exists());
        assert!(dir
            .join(format!("{}.nii.gz", consts::WHOLE_STRUCTURE_LABEL))
            .exists());
        assert!(dir.join(consts::REFERENCE_IMAGE).exists());
    }
}
