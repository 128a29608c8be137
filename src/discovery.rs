//! Submodule references
//!
//! Submodules come from the configuration when it lists any, otherwise from
//! the parent repository's `.gitmodules`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::git::GitClient;

/// A submodule of the parent repository, identified by its relative path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submodule {
    /// Path relative to the parent working tree (e.g. "vendor/engine")
    pub path: String,

    /// Absolute or parent-relative location of the submodule working tree
    pub work_tree: PathBuf,
}

impl Submodule {
    pub fn new(repository: &Path, path: impl Into<String>) -> Self {
        let path = path.into();
        let work_tree = repository.join(&path);
        Self { path, work_tree }
    }
}

/// Resolve the submodules to manage, in processing order
pub async fn resolve_submodules(
    git: &GitClient,
    repository: &Path,
    configured: &[String],
) -> Result<Vec<Submodule>> {
    if !configured.is_empty() {
        return Ok(configured
            .iter()
            .map(|path| Submodule::new(repository, normalize_path(path)))
            .collect());
    }

    let raw = git
        .gitmodules_paths(repository)
        .await
        .context("Failed to read .gitmodules")?;
    let paths = parse_gitmodules_paths(&raw);

    info!(
        "Discovered {} submodules from .gitmodules in {}",
        paths.len(),
        repository.display()
    );

    Ok(paths
        .into_iter()
        .map(|path| Submodule::new(repository, path))
        .collect())
}

/// Parse `git config --get-regexp path` output: `submodule.<name>.path <path>`
pub fn parse_gitmodules_paths(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(char::is_whitespace)?;
            if key.starts_with("submodule.") && key.ends_with(".path") {
                Some(normalize_path(value.trim()))
            } else {
                None
            }
        })
        .filter(|path| !path.is_empty())
        .collect()
}

fn normalize_path(path: &str) -> String {
    path.trim().trim_end_matches('/').to_string()
}
