use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Captured result of one git invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Turn a non-zero exit into an error carrying git's own message
    fn into_checked(self, what: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            let detail = if self.stderr.trim().is_empty() {
                self.stdout.trim()
            } else {
                self.stderr.trim()
            };
            Err(anyhow!("Git {} failed: {}", what, detail))
        }
    }
}

/// Narrow seam between the sync workflow and the git executable.
///
/// Every invocation names the directory it runs in, so callers never touch
/// the process working directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, dir: &Path, args: &[String]) -> Result<CommandOutput>;
}

/// Runs git as a subprocess
pub struct ProcessRunner {
    binary: String,
}

impl ProcessRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, dir: &Path, args: &[String]) -> Result<CommandOutput> {
        debug!("{} {} (in {})", self.binary, args.join(" "), dir.display());

        let output = AsyncCommand::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .with_context(|| format!("Failed to execute {} {}", self.binary, args.join(" ")))?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

/// Parse NUL-separated `status --short -z` output. Renames and copies carry
/// their source path as an extra field; both paths are returned.
pub fn parse_status_paths(raw: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut fields = raw.split('\0').filter(|field| !field.is_empty());

    while let Some(entry) = fields.next() {
        let Some(path) = entry.get(3..) else {
            continue;
        };
        paths.push(path.trim_end_matches('/').to_string());

        if entry.starts_with('R') || entry.starts_with('C') {
            if let Some(source) = fields.next() {
                paths.push(source.trim_end_matches('/').to_string());
            }
        }
    }

    paths
}

/// Git operations used by the submodule workflow
#[derive(Clone)]
pub struct GitClient {
    runner: Arc<dyn CommandRunner>,
}

impl GitClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn checked(&self, dir: &Path, argv: Vec<String>, what: &str) -> Result<CommandOutput> {
        self.runner.run(dir, &argv).await?.into_checked(what)
    }

    pub async fn submodule_init(&self, repo: &Path) -> Result<()> {
        self.checked(repo, args(&["submodule", "init"]), "submodule init")
            .await
            .map(drop)
    }

    pub async fn submodule_update_remote(&self, repo: &Path, recursive: bool) -> Result<()> {
        let mut argv = args(&["submodule", "update", "--remote"]);
        if recursive {
            argv.push("--recursive".to_string());
        }
        self.checked(repo, argv, "submodule update").await.map(drop)
    }

    pub async fn checkout(&self, dir: &Path, branch: &str) -> Result<()> {
        self.checked(dir, args(&["checkout", branch]), "checkout")
            .await
            .map(drop)
    }

    pub async fn pull(
        &self,
        dir: &Path,
        remote: &str,
        branch: &str,
        fast_forward_only: bool,
    ) -> Result<()> {
        let mut argv = args(&["pull"]);
        if fast_forward_only {
            argv.push("--ff-only".to_string());
        } else {
            argv.push("--no-edit".to_string());
        }
        argv.push(remote.to_string());
        argv.push(branch.to_string());
        self.checked(dir, argv, "pull").await.map(drop)
    }

    /// `git status --short`, trimmed
    pub async fn status_short(&self, dir: &Path) -> Result<String> {
        let output = self
            .checked(dir, args(&["status", "--short"]), "status")
            .await?;
        Ok(output.stdout.trim_end().to_string())
    }

    /// Paths named by `git status --short -z`, unquoted and unescaped
    pub async fn status_paths(&self, dir: &Path) -> Result<Vec<String>> {
        let output = self
            .checked(dir, args(&["status", "--short", "-z"]), "status")
            .await?;
        Ok(parse_status_paths(&output.stdout))
    }

    /// Commits reachable from HEAD that no remote-tracking branch contains
    pub async fn unpushed_commits(&self, dir: &Path) -> Result<String> {
        let output = self
            .checked(
                dir,
                args(&["log", "HEAD", "--not", "--remotes", "--oneline"]),
                "log",
            )
            .await?;
        Ok(output.stdout.trim_end().to_string())
    }

    pub async fn add_all(&self, dir: &Path) -> Result<()> {
        self.checked(dir, args(&["add", "-A"]), "add").await.map(drop)
    }

    pub async fn add_paths(&self, dir: &Path, paths: &[String]) -> Result<()> {
        let mut argv = args(&["add", "--"]);
        argv.extend(paths.iter().cloned());
        self.checked(dir, argv, "add").await.map(drop)
    }

    pub async fn commit(&self, dir: &Path, message: &str) -> Result<()> {
        self.checked(dir, args(&["commit", "-m", message]), "commit")
            .await
            .map(drop)
    }

    /// Current branch name, `None` on a detached HEAD
    pub async fn current_branch(&self, dir: &Path) -> Result<Option<String>> {
        let output = self
            .checked(dir, args(&["branch", "--show-current"]), "branch")
            .await?;
        let branch = output.stdout.trim();
        if branch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(branch.to_string()))
        }
    }

    pub async fn push(&self, dir: &Path, remote: &str, branch: &str) -> Result<()> {
        self.checked(dir, args(&["push", remote, branch]), "push")
            .await
            .map(drop)
    }

    /// Raw `path` entries of `.gitmodules`; exit status 1 means "no entries"
    pub async fn gitmodules_paths(&self, repo: &Path) -> Result<String> {
        let output = self
            .runner
            .run(
                repo,
                &args(&["config", "--file", ".gitmodules", "--get-regexp", "path"]),
            )
            .await?;

        if output.success {
            Ok(output.stdout)
        } else if output.stderr.trim().is_empty() {
            Ok(String::new())
        } else {
            Err(anyhow!("Git config failed: {}", output.stderr.trim()))
        }
    }

    pub async fn version(&self, dir: &Path) -> Result<String> {
        let output = self.checked(dir, args(&["--version"]), "version").await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn is_work_tree(&self, dir: &Path) -> bool {
        match self
            .runner
            .run(dir, &args(&["rev-parse", "--is-inside-work-tree"]))
            .await
        {
            Ok(output) => output.success && output.stdout.trim() == "true",
            Err(_) => false,
        }
    }
}
