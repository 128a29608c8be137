//! Divergence Reconciler
//!
//! Commits a divergent submodule's local edits (if the operator supplies a
//! message) and pushes its current branch. This is the only place that
//! creates submodule commits or moves a submodule's remote branch.

use std::fmt;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::discovery::Submodule;
use crate::git::GitClient;
use crate::operator::{is_blank, Operator};

/// Result of reconciling one submodule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The branch was pushed; `committed` tells whether a new commit was made first
    Pushed { branch: String, committed: bool },
    /// Operator left the commit message empty
    AbortedByOperator,
    /// A git step failed; `operation` names it ("status", "prompt", "commit", "push")
    Failed {
        operation: &'static str,
        reason: String,
    },
}

impl ReconcileOutcome {
    pub fn is_reconciled(&self) -> bool {
        matches!(self, ReconcileOutcome::Pushed { .. })
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::Pushed {
                branch,
                committed: true,
            } => write!(f, "committed and pushed to {}", branch),
            ReconcileOutcome::Pushed {
                branch,
                committed: false,
            } => write!(f, "pushed to {}", branch),
            ReconcileOutcome::AbortedByOperator => write!(f, "aborted by operator"),
            ReconcileOutcome::Failed { operation, reason } => {
                write!(f, "{} failed: {}", operation, reason)
            }
        }
    }
}

pub struct Reconciler<'a> {
    git: &'a GitClient,
    config: &'a Config,
    operator: &'a dyn Operator,
}

impl<'a> Reconciler<'a> {
    pub fn new(git: &'a GitClient, config: &'a Config, operator: &'a dyn Operator) -> Self {
        Self {
            git,
            config,
            operator,
        }
    }

    pub async fn reconcile(&self, submodule: &Submodule) -> ReconcileOutcome {
        let outcome = self.run(submodule).await;

        match &outcome {
            ReconcileOutcome::Pushed { .. } => {
                info!("{}: {}", submodule.path, outcome);
                self.operator
                    .notify(&format!("✅ {}: {}", submodule.path, outcome));
            }
            ReconcileOutcome::AbortedByOperator => {
                warn!("{}: reconciliation aborted by operator", submodule.path);
                self.operator.notify(&format!(
                    "⏭️  {}: empty commit message, skipping (nothing pushed)",
                    submodule.path
                ));
            }
            ReconcileOutcome::Failed { .. } => {
                error!("{}: {}", submodule.path, outcome);
                self.operator
                    .notify(&format!("❌ {}: {}", submodule.path, outcome));
            }
        }

        outcome
    }

    async fn run(&self, submodule: &Submodule) -> ReconcileOutcome {
        let dir = &submodule.work_tree;

        // Authoritative re-check; the detector's answer may be stale
        let status = match self.git.status_short(dir).await {
            Ok(status) => status,
            Err(e) => return failed("status", e),
        };

        let mut committed = false;
        if !status.trim().is_empty() {
            self.operator
                .notify(&format!("📝 Uncommitted changes in {}:", submodule.path));
            for line in status.lines() {
                self.operator.notify(&format!("   {}", line));
            }

            let message = match self
                .operator
                .commit_message(&format!("Commit message for {} (empty to skip)", submodule.path))
            {
                Ok(message) => message,
                Err(e) => return failed("prompt", e),
            };

            if is_blank(&message) {
                return ReconcileOutcome::AbortedByOperator;
            }

            if let Err(e) = self.git.add_all(dir).await {
                return failed("commit", e);
            }
            if let Err(e) = self.git.commit(dir, message.trim()).await {
                return failed("commit", e);
            }
            committed = true;
        }

        let branch = match self.git.current_branch(dir).await {
            Ok(Some(branch)) => branch,
            Ok(None) => {
                return ReconcileOutcome::Failed {
                    operation: "push",
                    reason: "HEAD is detached, no branch to push".to_string(),
                }
            }
            Err(e) => return failed("push", e),
        };

        info!("Pushing {} to {}/{}", submodule.path, self.config.remote, branch);
        match self.git.push(dir, &self.config.remote, &branch).await {
            Ok(()) => ReconcileOutcome::Pushed { branch, committed },
            Err(e) => failed("push", e),
        }
    }
}

fn failed(operation: &'static str, err: anyhow::Error) -> ReconcileOutcome {
    ReconcileOutcome::Failed {
        operation,
        reason: format!("{:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{CommandOutput, MockCommandRunner};
    use crate::operator::MockOperator;
    use assert_matches::assert_matches;
    use std::path::Path;
    use std::sync::Arc;

    fn quiet_operator() -> MockOperator {
        let mut operator = MockOperator::new();
        operator.expect_notify().return_const(());
        operator
    }

    fn submodule() -> Submodule {
        Submodule::new(Path::new("/p"), "a")
    }

    #[tokio::test]
    async fn test_commit_and_push() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|_, argv| argv[0] == "status")
            .returning(|_, _| Ok(CommandOutput::ok(" M README.md\n")));
        mock.expect_run()
            .withf(|_, argv| argv == ["add", "-A"])
            .times(1)
            .returning(|_, _| Ok(CommandOutput::ok("")));
        mock.expect_run()
            .withf(|_, argv| argv == ["commit", "-m", "fix typo"])
            .times(1)
            .returning(|_, _| Ok(CommandOutput::ok("")));
        mock.expect_run()
            .withf(|_, argv| argv[0] == "branch")
            .returning(|_, _| Ok(CommandOutput::ok("main\n")));
        mock.expect_run()
            .withf(|dir, argv| dir == Path::new("/p/a") && argv == ["push", "origin", "main"])
            .times(1)
            .returning(|_, _| Ok(CommandOutput::ok("")));

        let mut operator = quiet_operator();
        operator
            .expect_commit_message()
            .times(1)
            .returning(|_| Ok("  fix typo \n".to_string()));

        let git = GitClient::new(Arc::new(mock));
        let config = Config::default();
        let outcome = Reconciler::new(&git, &config, &operator)
            .reconcile(&submodule())
            .await;

        assert_eq!(
            outcome,
            ReconcileOutcome::Pushed {
                branch: "main".to_string(),
                committed: true
            }
        );
        assert!(outcome.is_reconciled());
    }

    #[tokio::test]
    async fn test_blank_message_aborts_without_commit_or_push() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|_, argv| argv[0] == "status")
            .returning(|_, _| Ok(CommandOutput::ok("?? notes.txt\n")));
        // add/commit/push have no expectation

        let mut operator = quiet_operator();
        operator
            .expect_commit_message()
            .returning(|_| Ok("   ".to_string()));

        let git = GitClient::new(Arc::new(mock));
        let config = Config::default();
        let outcome = Reconciler::new(&git, &config, &operator)
            .reconcile(&submodule())
            .await;

        assert_eq!(outcome, ReconcileOutcome::AbortedByOperator);
        assert!(!outcome.is_reconciled());
    }

    #[tokio::test]
    async fn test_unpushed_only_skips_prompt() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|_, argv| argv[0] == "status")
            .returning(|_, _| Ok(CommandOutput::ok("")));
        mock.expect_run()
            .withf(|_, argv| argv[0] == "branch")
            .returning(|_, _| Ok(CommandOutput::ok("feature\n")));
        mock.expect_run()
            .withf(|_, argv| argv == ["push", "origin", "feature"])
            .times(1)
            .returning(|_, _| Ok(CommandOutput::ok("")));

        // commit_message has no expectation and would panic if asked
        let operator = quiet_operator();

        let git = GitClient::new(Arc::new(mock));
        let config = Config::default();
        let outcome = Reconciler::new(&git, &config, &operator)
            .reconcile(&submodule())
            .await;

        assert_matches!(outcome, ReconcileOutcome::Pushed { committed: false, .. });
    }

    #[tokio::test]
    async fn test_commit_failure_stops_before_push() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|_, argv| argv[0] == "status")
            .returning(|_, _| Ok(CommandOutput::ok(" D old.rs\n")));
        mock.expect_run()
            .withf(|_, argv| argv[0] == "add")
            .returning(|_, _| Ok(CommandOutput::ok("")));
        mock.expect_run()
            .withf(|_, argv| argv[0] == "commit")
            .returning(|_, _| Ok(CommandOutput::failed("Author identity unknown")));

        let mut operator = quiet_operator();
        operator
            .expect_commit_message()
            .returning(|_| Ok("remove old".to_string()));

        let git = GitClient::new(Arc::new(mock));
        let config = Config::default();
        let outcome = Reconciler::new(&git, &config, &operator)
            .reconcile(&submodule())
            .await;

        assert_matches!(outcome, ReconcileOutcome::Failed { operation: "commit", .. });
    }

    #[tokio::test]
    async fn test_push_failure_is_reported() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|_, argv| argv[0] == "status")
            .returning(|_, _| Ok(CommandOutput::ok("")));
        mock.expect_run()
            .withf(|_, argv| argv[0] == "branch")
            .returning(|_, _| Ok(CommandOutput::ok("main\n")));
        mock.expect_run()
            .withf(|_, argv| argv[0] == "push")
            .returning(|_, _| Ok(CommandOutput::failed("! [rejected] main -> main (fetch first)")));

        let operator = quiet_operator();
        let git = GitClient::new(Arc::new(mock));
        let config = Config::default();
        let outcome = Reconciler::new(&git, &config, &operator)
            .reconcile(&submodule())
            .await;

        assert_matches!(
            outcome,
            ReconcileOutcome::Failed { operation: "push", ref reason } if reason.contains("rejected")
        );
    }

    #[tokio::test]
    async fn test_detached_head_cannot_push() {
        let mut mock = MockCommandRunner::new();
        mock.expect_run()
            .withf(|_, argv| argv[0] == "status")
            .returning(|_, _| Ok(CommandOutput::ok("")));
        mock.expect_run()
            .withf(|_, argv| argv[0] == "branch")
            .returning(|_, _| Ok(CommandOutput::ok("")));

        let operator = quiet_operator();
        let git = GitClient::new(Arc::new(mock));
        let config = Config::default();
        let outcome = Reconciler::new(&git, &config, &operator)
            .reconcile(&submodule())
            .await;

        assert_matches!(outcome, ReconcileOutcome::Failed { operation: "push", .. });
        assert!(outcome.to_string().contains("detached"));
    }
}
