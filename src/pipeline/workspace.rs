// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-run scratch workspace.
//!
//! All intermediate artifacts of one run land here: the sanitized input,
//! registration transforms, per-subject warps, and the fused labels before
//! post-processing. A throwaway workspace is deleted when the run ends; a
//! caller-provided one is retained, which both enables resuming an
//! interrupted run and aids post-mortem debugging.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::errors::StageError;

pub struct Workspace {
    root: PathBuf,
    /// Present for throwaway workspaces; dropping it deletes the directory.
    temp: Option<TempDir>,
}

impl Workspace {
    /// Create the run workspace before the pipeline starts.
    ///
    /// With `retain_at` the directory is created (parents included) and kept
    /// afterwards. Otherwise a temp directory is created next to `anchor` so
    /// that intermediate artifacts live on the same filesystem as the final
    /// outputs.
    pub fn create(retain_at: Option<&Path>, anchor: &Path) -> Result<Self, StageError> {
        match retain_at {
            Some(path) => {
                std::fs::create_dir_all(path).map_err(|source| StageError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok(Workspace {
                    root: path.to_path_buf(),
                    temp: None,
                })
            }
            None => {
                let parent = anchor.parent().filter(|p| !p.as_os_str().is_empty());
                let temp = match parent {
                    Some(parent) => tempfile::Builder::new()
                        .prefix("thalseg-")
                        .tempdir_in(parent),
                    None => tempfile::Builder::new().prefix("thalseg-").tempdir(),
                }
                .map_err(|source| StageError::Io {
                    path: anchor.to_path_buf(),
                    source,
                })?;
                Ok(Workspace {
                    root: temp.path().to_path_buf(),
                    temp: Some(temp),
                })
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn retained(&self) -> bool {
        self.temp.is_none()
    }

    /// Default registration prefix derived from the input image name, the
    /// way a run without an explicit warp prefix stores its transforms.
    pub fn warp_prefix_for(&self, input_image: &Path) -> PathBuf {
        let stem = input_image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string())
            .replace(".nii", "")
            .replace(".gz", "");
        self.root.join(stem)
    }
}
