//! Parent Re-pinner
//!
//! Records the new submodule heads in the parent repository. Committing and
//! pushing are separate steps: a failed push keeps the local commit.

use std::fmt;
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::discovery::Submodule;
use crate::git::GitClient;
use crate::operator::{is_blank, Operator};

/// What happened to the parent commit after it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    Declined,
    Pushed { branch: String },
    Failed { reason: String },
}

/// Result of re-pinning the parent repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepinOutcome {
    /// Parent status names none of the submodules
    NothingToRepin,
    /// Operator left the commit message empty
    AbortedByOperator,
    /// Pointer commit made for `paths`
    Committed {
        paths: Vec<String>,
        push: PushResult,
    },
    /// Status, prompt, staging or commit failed; nothing was committed
    Failed {
        operation: &'static str,
        reason: String,
    },
}

impl fmt::Display for RepinOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepinOutcome::NothingToRepin => write!(f, "nothing to re-pin"),
            RepinOutcome::AbortedByOperator => write!(f, "aborted by operator"),
            RepinOutcome::Committed { paths, push } => {
                write!(f, "committed pointers for {}", paths.join(", "))?;
                match push {
                    PushResult::Declined => write!(f, " (not pushed)"),
                    PushResult::Pushed { branch } => write!(f, ", pushed to {}", branch),
                    PushResult::Failed { reason } => write!(f, ", push failed: {}", reason),
                }
            }
            RepinOutcome::Failed { operation, reason } => {
                write!(f, "{} failed: {}", operation, reason)
            }
        }
    }
}

/// Submodule paths named by the parent's status entries, in submodule order.
/// An entry matches the submodule path itself or anything under it.
pub fn changed_submodule_paths(entries: &[String], submodules: &[Submodule]) -> Vec<String> {
    submodules
        .iter()
        .filter(|submodule| {
            let nested = format!("{}/", submodule.path);
            entries
                .iter()
                .any(|entry| *entry == submodule.path || entry.starts_with(&nested))
        })
        .map(|submodule| submodule.path.clone())
        .collect()
}

pub struct Repinner<'a> {
    git: &'a GitClient,
    config: &'a Config,
    operator: &'a dyn Operator,
}

impl<'a> Repinner<'a> {
    pub fn new(git: &'a GitClient, config: &'a Config, operator: &'a dyn Operator) -> Self {
        Self {
            git,
            config,
            operator,
        }
    }

    pub async fn repin(&self, repository: &Path, submodules: &[Submodule]) -> RepinOutcome {
        let outcome = self.run(repository, submodules).await;

        match &outcome {
            RepinOutcome::NothingToRepin => {
                info!("Parent repository: nothing to re-pin");
                self.operator.notify("✅ Parent repository: nothing to re-pin");
            }
            RepinOutcome::AbortedByOperator => {
                warn!("Parent re-pin aborted by operator");
                self.operator
                    .notify("⏭️  Parent repository: empty commit message, pointers left unstaged");
            }
            RepinOutcome::Committed {
                push: PushResult::Failed { .. },
                ..
            } => {
                error!("Parent repository: {}", outcome);
                self.operator.notify(&format!(
                    "❌ Parent repository: {} (local commit kept)",
                    outcome
                ));
            }
            RepinOutcome::Committed { .. } => {
                info!("Parent repository: {}", outcome);
                self.operator
                    .notify(&format!("✅ Parent repository: {}", outcome));
            }
            RepinOutcome::Failed { .. } => {
                error!("Parent repository: {}", outcome);
                self.operator
                    .notify(&format!("❌ Parent repository: {}", outcome));
            }
        }

        outcome
    }

    async fn run(&self, repository: &Path, submodules: &[Submodule]) -> RepinOutcome {
        let entries = match self.git.status_paths(repository).await {
            Ok(entries) => entries,
            Err(e) => return failed("status", e),
        };

        let paths = changed_submodule_paths(&entries, submodules);
        if paths.is_empty() {
            return RepinOutcome::NothingToRepin;
        }

        self.operator.notify(&format!(
            "📌 Submodule pointers changed in parent: {}",
            paths.join(", ")
        ));

        let message = match self
            .operator
            .commit_message("Commit message for the parent repository (empty to skip)")
        {
            Ok(message) => message,
            Err(e) => return failed("prompt", e),
        };
        if is_blank(&message) {
            return RepinOutcome::AbortedByOperator;
        }

        if let Err(e) = self.git.add_paths(repository, &paths).await {
            return failed("stage", e);
        }
        if let Err(e) = self.git.commit(repository, message.trim()).await {
            return failed("commit", e);
        }

        let push = self.push(repository).await;
        RepinOutcome::Committed { paths, push }
    }

    async fn push(&self, repository: &Path) -> PushResult {
        match self.operator.confirm("Push the parent repository?") {
            Ok(true) => {}
            Ok(false) => return PushResult::Declined,
            Err(e) => {
                return PushResult::Failed {
                    reason: format!("{:#}", e),
                }
            }
        }

        let branch = match self.git.current_branch(repository).await {
            Ok(Some(branch)) => branch,
            Ok(None) => {
                return PushResult::Failed {
                    reason: "HEAD is detached, no branch to push".to_string(),
                }
            }
            Err(e) => {
                return PushResult::Failed {
                    reason: format!("{:#}", e),
                }
            }
        };

        match self.git.push(repository, &self.config.remote, &branch).await {
            Ok(()) => PushResult::Pushed { branch },
            Err(e) => PushResult::Failed {
                reason: format!("{:#}", e),
            },
        }
    }
}

fn failed(operation: &'static str, err: anyhow::Error) -> RepinOutcome {
    RepinOutcome::Failed {
        operation,
        reason: format!("{:#}", err),
    }
}
