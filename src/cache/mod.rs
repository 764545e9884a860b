// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Idempotent output guard.
//!
//! Artifact presence is the pipeline's only completion record: if the output
//! path exists, the work that produces it is skipped. The guard is a pure
//! existence cache (no hashing, no staleness check), but check-and-create is
//! made atomic by handing the producer a staging path and renaming the result
//! into place. Two workers racing on the same output both finish with a whole
//! file; the loser's rename simply overwrites an identical artifact.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ExecOptions;
use crate::errors::StageError;

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Staging path next to `output`, keeping the full file name (and therefore
/// its extension) as a suffix: several external tools sniff `.nii.gz`.
fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    output.with_file_name(format!(".tmp-{}-{}-{}", std::process::id(), seq, name))
}

/// Run `producer` unless `output` already exists.
///
/// The producer receives a staging path in the same directory and must create
/// it as a side effect; the guard renames it to `output` afterwards. In echo
/// mode nothing is written, so the staging check and rename are skipped and
/// the dry run walks on.
pub async fn ensure<F, Fut>(
    output: &Path,
    options: &ExecOptions,
    producer: F,
) -> Result<PathBuf, StageError>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<(), StageError>>,
{
    if output.exists() {
        return Ok(output.to_path_buf());
    }
    let staging = staging_path(output);
    producer(staging.clone()).await?;
    if options.echo {
        return Ok(output.to_path_buf());
    }
    if !staging.exists() {
        return Err(StageError::OutputNotProduced {
            path: output.to_path_buf(),
        });
    }
    tokio::fs::rename(&staging, output)
        .await
        .map_err(|source| StageError::Io {
            path: output.to_path_buf(),
            source,
        })?;
    Ok(output.to_path_buf())
}

/// Create a directory, treating "already exists" as success. Any other
/// creation error is fatal.
pub fn ensure_dir(path: &Path) -> Result<(), StageError> {
    match std::fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(StageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Whether a registration's artifact pair exists under `prefix`:
/// `<prefix>InverseWarp.nii.gz` and `<prefix>Affine.txt`.
pub fn warps_exist(prefix: &Path) -> bool {
    crate::tools::prefixed(prefix, "InverseWarp.nii.gz").exists()
        && crate::tools::prefixed(prefix, "Affine.txt").exists()
}
