// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Preflight check for required external tools.
//!
//! Every collaborator the configured run will invoke must resolve on the
//! search path before the first stage starts; a missing tool found mid-run
//! would waste hours of registration work.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::errors::CommandError;

/// Resolve a tool on the search path. `search_path` overrides the process
/// `PATH` when given (tests point this at a directory of stubs).
pub fn resolve(tool: &str, search_path: Option<&str>) -> Option<PathBuf> {
    let path: OsString = match search_path {
        Some(value) => OsString::from(value),
        None => std::env::var_os("PATH")?,
    };
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(tool);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Names of every tool in `tools` that does not resolve.
pub fn missing_tools<'a, I>(tools: I, search_path: Option<&str>) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    tools
        .into_iter()
        .filter(|tool| resolve(tool, search_path).is_none())
        .map(str::to_string)
        .collect()
}

/// Error on the first missing tool. Callers that want the full list use
/// `missing_tools` instead.
pub fn check_required(tools: &[&str], search_path: Option<&str>) -> Result<(), CommandError> {
    match missing_tools(tools.iter().copied(), search_path).into_iter().next() {
        Some(tool) => Err(CommandError::MissingTool { tool }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn install_stub(dir: &std::path::Path, name: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn resolves_common_shell() {
        assert!(resolve("sh", None).is_some());
    }

    #[test]
    fn unresolvable_tool_is_none() {
        assert!(resolve("definitely-not-a-real-tool-thalseg", None).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn search_path_override_wins() {
        let dir = TempDir::new().unwrap();
        install_stub(dir.path(), "antsJointFusion");
        let path = dir.path().to_string_lossy().into_owned();
        assert!(resolve("antsJointFusion", Some(path.as_str())).is_some());
        // The override replaces PATH entirely.
        assert!(resolve("sh", Some(path.as_str())).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn missing_tools_reports_every_absentee() {
        let dir = TempDir::new().unwrap();
        install_stub(dir.path(), "c3d");
        let path = dir.path().to_string_lossy().into_owned();
        let missing = missing_tools(["c3d", "ImageMath", "jointfusion"], Some(path.as_str()));
        assert_eq!(missing, vec!["ImageMath", "jointfusion"]);
    }

    #[test]
    fn check_required_errors_on_first_missing() {
        let err = check_required(&["definitely-not-a-real-tool-thalseg"], None).unwrap_err();
        assert!(matches!(err, CommandError::MissingTool { .. }));
    }
}
