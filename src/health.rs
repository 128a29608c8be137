//! System health checks for subsync
//!
//! Preflight checks that tell the operator whether a sync can work before any
//! git state is touched.

use std::path::Path;

use crate::config::Config;
use crate::discovery::{resolve_submodules, Submodule};
use crate::git::GitClient;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Git installation status
    pub git: CheckResult,
    /// Parent repository status
    pub repository: CheckResult,
    /// Submodule working trees (warning only: `submodule init` creates them)
    pub submodules: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks
    pub async fn run(config: &Config, git: &GitClient) -> Self {
        let repository = config.repository_path();
        let repo_check = Self::check_repository(git, &repository).await;

        let submodules = if repo_check.passed {
            match resolve_submodules(git, &repository, &config.submodules).await {
                Ok(submodules) => Self::check_submodules(&submodules),
                Err(e) => CheckResult::error_with_details(
                    "Could not determine submodules",
                    format!("{:#}", e),
                ),
            }
        } else {
            CheckResult::warning_with_details(
                "Submodules not checked",
                "Parent repository is not usable",
            )
        };

        Self {
            git: Self::check_git(git, &repository).await,
            repository: repo_check,
            submodules,
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.git.passed && self.repository.passed && self.submodules.passed
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        [&self.git, &self.repository, &self.submodules]
            .into_iter()
            .filter(|r| r.is_warning)
            .collect()
    }

    /// Check git installation
    async fn check_git(git: &GitClient, dir: &Path) -> CheckResult {
        // Any existing directory works for `git --version`
        let dir = if dir.exists() { dir } else { Path::new(".") };
        match git.version(dir).await {
            Ok(version) => CheckResult::ok_with_details("Git installed", version),
            Err(e) => CheckResult::error_with_details(
                "Git not usable",
                format!("{:#}\nInstall git: https://git-scm.com/downloads", e),
            ),
        }
    }

    /// Check the parent repository is a git work tree
    async fn check_repository(git: &GitClient, repository: &Path) -> CheckResult {
        if !repository.exists() {
            return CheckResult::error_with_details(
                "Repository directory does not exist",
                repository.display().to_string(),
            );
        }

        if git.is_work_tree(repository).await {
            CheckResult::ok_with_details(
                "Repository is a git work tree",
                repository.display().to_string(),
            )
        } else {
            CheckResult::error_with_details(
                "Not a git work tree",
                format!(
                    "{}\nRun subsync from the parent repository or pass --repo",
                    repository.display()
                ),
            )
        }
    }

    /// Check each submodule has a working tree
    fn check_submodules(submodules: &[Submodule]) -> CheckResult {
        if submodules.is_empty() {
            return CheckResult::warning_with_details(
                "No submodules configured",
                "List them under `submodules:` in the config or add them to .gitmodules",
            );
        }

        let missing: Vec<&str> = submodules
            .iter()
            .filter(|s| !s.work_tree.join(".git").exists())
            .map(|s| s.path.as_str())
            .collect();

        if missing.is_empty() {
            CheckResult::ok(format!("{} submodules checked out", submodules.len()))
        } else {
            CheckResult::warning_with_details(
                format!("{} submodules not checked out", missing.len()),
                format!("{}\n`subsync sync` initializes them", missing.join(", ")),
            )
        }
    }

    /// Get all checks as a slice for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 3] {
        [
            ("Git Installation", &self.git),
            ("Parent Repository", &self.repository),
            ("Submodules", &self.submodules),
        ]
    }
}
