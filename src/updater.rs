//! Submodule Updater
//!
//! Brings every submodule to the latest revision of its integration branch.
//! Any failure here is fatal to the run: it means git or the remote is not
//! usable, and nothing downstream can be trusted.

use std::fmt;
use std::path::Path;
use tracing::{error, info};

use crate::config::Config;
use crate::discovery::Submodule;
use crate::git::GitClient;

/// Stage of the update that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStage {
    /// `git submodule init`
    Init,
    /// `git submodule update --remote`
    RemoteUpdate,
    /// Switching a submodule to the integration branch
    Checkout { submodule: String },
    /// Fast-forwarding a submodule from its remote
    Pull { submodule: String },
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStage::Init => write!(f, "submodule init"),
            UpdateStage::RemoteUpdate => write!(f, "submodule remote update"),
            UpdateStage::Checkout { submodule } => write!(f, "checkout of {}", submodule),
            UpdateStage::Pull { submodule } => write!(f, "pull of {}", submodule),
        }
    }
}

/// Fatal updater failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFailure {
    pub stage: UpdateStage,
    pub reason: String,
}

impl fmt::Display for UpdateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.reason)
    }
}

impl std::error::Error for UpdateFailure {}

pub struct SubmoduleUpdater<'a> {
    git: &'a GitClient,
    config: &'a Config,
}

impl<'a> SubmoduleUpdater<'a> {
    pub fn new(git: &'a GitClient, config: &'a Config) -> Self {
        Self { git, config }
    }

    /// Init, remote update, then checkout + pull of every submodule.
    /// Stops at the first failing stage.
    pub async fn update(
        &self,
        repository: &Path,
        submodules: &[Submodule],
    ) -> Result<(), UpdateFailure> {
        info!("Initializing submodules in {}", repository.display());
        self.git
            .submodule_init(repository)
            .await
            .map_err(|e| fail(UpdateStage::Init, e))?;

        info!("Updating submodules to their remote revisions");
        self.git
            .submodule_update_remote(repository, self.config.update.recursive)
            .await
            .map_err(|e| fail(UpdateStage::RemoteUpdate, e))?;

        let branch = &self.config.integration_branch;
        for submodule in submodules {
            info!("Pulling {} on {}", submodule.path, branch);

            self.git
                .checkout(&submodule.work_tree, branch)
                .await
                .map_err(|e| {
                    fail(
                        UpdateStage::Checkout {
                            submodule: submodule.path.clone(),
                        },
                        e,
                    )
                })?;

            self.git
                .pull(
                    &submodule.work_tree,
                    &self.config.remote,
                    branch,
                    self.config.update.fast_forward_only,
                )
                .await
                .map_err(|e| {
                    fail(
                        UpdateStage::Pull {
                            submodule: submodule.path.clone(),
                        },
                        e,
                    )
                })?;
        }

        Ok(())
    }
}

fn fail(stage: UpdateStage, err: anyhow::Error) -> UpdateFailure {
    let failure = UpdateFailure {
        stage,
        reason: format!("{:#}", err),
    };
    error!("{}", failure);
    failure
}
