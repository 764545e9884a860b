// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Result aggregation: reshape per-subject mappings into per-label
//! collections for the fusion stage.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::errors::StageError;

/// Invert `subject -> (name -> artifact)` into `name -> (subject -> artifact)`.
///
/// The key set of the first subject defines the expected set; every other
/// subject must match it exactly. A mismatch means some subject silently
/// failed to produce a volume, which must surface as an error rather than a
/// ragged mapping that would desynchronize the fusion inputs.
pub fn invert(
    per_subject: Vec<(String, BTreeMap<String, PathBuf>)>,
) -> Result<BTreeMap<String, BTreeMap<String, PathBuf>>, StageError> {
    let mut inverted: BTreeMap<String, BTreeMap<String, PathBuf>> = BTreeMap::new();
    let mut expected: Option<Vec<String>> = None;

    for (subject, mapping) in per_subject {
        let keys: Vec<String> = mapping.keys().cloned().collect();
        match &expected {
            None => expected = Some(keys),
            Some(expected) => {
                if *expected != keys {
                    return Err(StageError::RaggedResults {
                        subject,
                        expected: expected.clone(),
                        found: keys,
                    });
                }
            }
        }
        for (name, artifact) in mapping {
            inverted.entry(name).or_default().insert(subject.clone(), artifact);
        }
    }

    Ok(inverted)
}
