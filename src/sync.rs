//! Sync Engine - drives the submodule workflow
//!
//! Update every submodule, then detect and reconcile divergence one submodule
//! at a time, then re-pin the parent if anything was pushed. Only an updater
//! failure stops the run; every other failure is reported and the run moves
//! on (best-effort semantics, reflected in [`RunOutcome::exit_code`]).

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::detector::{detect, DivergenceState};
use crate::discovery::{resolve_submodules, Submodule};
use crate::git::{CommandRunner, GitClient};
use crate::operator::Operator;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::repin::{RepinOutcome, Repinner};
use crate::updater::{SubmoduleUpdater, UpdateFailure};

/// Per-submodule record of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleReport {
    pub path: String,
    /// `None` when detection failed
    pub divergence: Option<DivergenceState>,
    /// `None` when the submodule was clean or detection failed
    pub reconcile: Option<ReconcileOutcome>,
    /// Detection error, if any
    pub error: Option<String>,
}

impl SubmoduleReport {
    pub fn is_reconciled(&self) -> bool {
        self.reconcile
            .as_ref()
            .map(ReconcileOutcome::is_reconciled)
            .unwrap_or(false)
    }
}

/// Results from a completed run
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub reports: Vec<SubmoduleReport>,
    /// OR of every submodule's reconciliation; gates the re-pin
    pub any_reconciled: bool,
    /// `None` when the re-pin was not needed
    pub repin: Option<RepinOutcome>,
    pub duration: Duration,
}

impl SyncSummary {
    pub fn divergent_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.divergence.map(|d| d.is_divergent()).unwrap_or(false))
            .count()
    }

    pub fn reconciled_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_reconciled()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| {
                r.error.is_some() || matches!(r.reconcile, Some(ReconcileOutcome::Failed { .. }))
            })
            .count()
    }
}

/// Terminal state of a run
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Done(SyncSummary),
    Aborted(UpdateFailure),
}

impl RunOutcome {
    /// 0 for `Done` even if individual submodules failed; 1 for `Aborted`
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Done(_) => 0,
            RunOutcome::Aborted(_) => 1,
        }
    }
}

/// Result of a dry run
#[derive(Debug, Clone)]
pub enum StatusOutcome {
    Reports(Vec<SubmoduleReport>),
    Aborted(UpdateFailure),
}

/// Knobs for one invocation
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Work on the current working trees without pulling first
    pub skip_update: bool,
}

/// The main engine that orchestrates submodule synchronization
pub struct SyncEngine {
    config: Config,
    git: GitClient,
    operator: Arc<dyn Operator>,
}

impl SyncEngine {
    pub fn new(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        operator: Arc<dyn Operator>,
    ) -> Self {
        Self {
            config,
            git: GitClient::new(runner),
            operator,
        }
    }

    /// Submodules this engine manages, configured or discovered
    pub async fn submodules(&self) -> Result<Vec<Submodule>> {
        resolve_submodules(
            &self.git,
            &self.config.repository_path(),
            &self.config.submodules,
        )
        .await
    }

    /// Run the full pull / detect / reconcile / re-pin workflow.
    ///
    /// `Err` only for problems before any git state is touched (submodule
    /// discovery); workflow failures are part of the returned outcome.
    pub async fn run(&self, options: SyncOptions) -> Result<RunOutcome> {
        let start_time = Instant::now();
        let repository = self.config.repository_path();
        let submodules = self.submodules().await?;

        info!(
            "Synchronizing {} submodules of {}",
            submodules.len(),
            repository.display()
        );

        // init and remote update run even with no submodules listed
        if !options.skip_update {
            if let Err(failure) = self.update(&submodules).await {
                return Ok(RunOutcome::Aborted(failure));
            }
        }

        if submodules.is_empty() {
            warn!("No submodules configured or found in .gitmodules");
            self.operator
                .notify("⚠️  No submodules configured or found in .gitmodules");
            return Ok(RunOutcome::Done(SyncSummary {
                reports: Vec::new(),
                any_reconciled: false,
                repin: None,
                duration: start_time.elapsed(),
            }));
        }

        let reconciler = Reconciler::new(&self.git, &self.config, self.operator.as_ref());
        let mut reports = Vec::with_capacity(submodules.len());

        for submodule in &submodules {
            let report = match detect(&self.git, submodule).await {
                Ok(state) if state.is_divergent() => {
                    self.operator.notify(&format!(
                        "🔀 {} has diverged ({})",
                        submodule.path,
                        describe(&state)
                    ));
                    let outcome = reconciler.reconcile(submodule).await;
                    SubmoduleReport {
                        path: submodule.path.clone(),
                        divergence: Some(state),
                        reconcile: Some(outcome),
                        error: None,
                    }
                }
                Ok(state) => {
                    self.operator
                        .notify(&format!("✅ {} is up to date", submodule.path));
                    SubmoduleReport {
                        path: submodule.path.clone(),
                        divergence: Some(state),
                        reconcile: None,
                        error: None,
                    }
                }
                Err(e) => {
                    error!("Divergence check failed for {}: {:#}", submodule.path, e);
                    self.operator.notify(&format!(
                        "❌ {}: divergence check failed: {:#}",
                        submodule.path, e
                    ));
                    SubmoduleReport {
                        path: submodule.path.clone(),
                        divergence: None,
                        reconcile: None,
                        error: Some(format!("{:#}", e)),
                    }
                }
            };
            reports.push(report);
        }

        let any_reconciled = reports.iter().any(SubmoduleReport::is_reconciled);

        let repin = if any_reconciled {
            Some(
                Repinner::new(&self.git, &self.config, self.operator.as_ref())
                    .repin(&repository, &submodules)
                    .await,
            )
        } else {
            info!("No submodule was pushed, parent pointers left alone");
            None
        };

        let summary = SyncSummary {
            reports,
            any_reconciled,
            repin,
            duration: start_time.elapsed(),
        };

        info!(
            "Sync completed in {:.2}s: {} divergent, {} reconciled, {} failed",
            summary.duration.as_secs_f64(),
            summary.divergent_count(),
            summary.reconciled_count(),
            summary.failed_count()
        );

        Ok(RunOutcome::Done(summary))
    }

    /// Dry run: report each submodule's divergence without prompting,
    /// committing or pushing. Pulls first when `update` is set.
    pub async fn status(&self, update: bool) -> Result<StatusOutcome> {
        let submodules = self.submodules().await?;

        if update {
            if let Err(failure) = self.update(&submodules).await {
                return Ok(StatusOutcome::Aborted(failure));
            }
        }

        let mut reports = Vec::with_capacity(submodules.len());
        for submodule in &submodules {
            let report = match detect(&self.git, submodule).await {
                Ok(state) => SubmoduleReport {
                    path: submodule.path.clone(),
                    divergence: Some(state),
                    reconcile: None,
                    error: None,
                },
                Err(e) => SubmoduleReport {
                    path: submodule.path.clone(),
                    divergence: None,
                    reconcile: None,
                    error: Some(format!("{:#}", e)),
                },
            };
            reports.push(report);
        }

        Ok(StatusOutcome::Reports(reports))
    }

    async fn update(&self, submodules: &[Submodule]) -> std::result::Result<(), UpdateFailure> {
        let result = SubmoduleUpdater::new(&self.git, &self.config)
            .update(&self.config.repository_path(), submodules)
            .await;

        if let Err(failure) = &result {
            self.operator
                .notify(&format!("❌ Update aborted: {}", failure));
        }
        result
    }

    /// Get configuration for external inspection
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Human-readable list of divergence reasons
pub fn describe(state: &DivergenceState) -> String {
    match (state.has_uncommitted_changes, state.has_unpushed_commits) {
        (true, true) => "uncommitted changes, unpushed commits".to_string(),
        (true, false) => "uncommitted changes".to_string(),
        (false, true) => "unpushed commits".to_string(),
        (false, false) => "clean".to_string(),
    }
}
