//! Divergence Detector

use anyhow::{Context, Result};
use tracing::debug;

use crate::discovery::Submodule;
use crate::git::GitClient;

/// Local state of a submodule compared to what its remote already has
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DivergenceState {
    /// Working tree differs from the last commit
    pub has_uncommitted_changes: bool,
    /// HEAD has commits no remote-tracking branch contains
    pub has_unpushed_commits: bool,
}

impl DivergenceState {
    pub fn is_divergent(&self) -> bool {
        self.has_uncommitted_changes || self.has_unpushed_commits
    }
}

/// Query a submodule's divergence. Read-only.
pub async fn detect(git: &GitClient, submodule: &Submodule) -> Result<DivergenceState> {
    let status = git
        .status_short(&submodule.work_tree)
        .await
        .with_context(|| format!("Failed to read status of {}", submodule.path))?;

    let unpushed = git
        .unpushed_commits(&submodule.work_tree)
        .await
        .with_context(|| format!("Failed to list unpushed commits of {}", submodule.path))?;

    let state = DivergenceState {
        has_uncommitted_changes: !status.trim().is_empty(),
        has_unpushed_commits: !unpushed.trim().is_empty(),
    };

    debug!("Divergence of {}: {:?}", submodule.path, state);
    Ok(state)
}
