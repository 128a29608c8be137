//! Common test utilities and helpers for subsync tests
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use subsync::{CommandOutput, CommandRunner, Operator};

/// One recorded git invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub dir: PathBuf,
    pub args: Vec<String>,
}

impl Call {
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

struct Rule {
    dir: Option<PathBuf>,
    prefix: Vec<String>,
    output: CommandOutput,
}

/// Fake git: answers by (directory, argument prefix) rules, newest rule first.
/// Unmatched invocations succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `prefix` in any directory
    pub fn on(&self, prefix: &[&str], output: CommandOutput) -> &Self {
        self.push_rule(None, prefix, output)
    }

    /// Answer `prefix` only when run in `dir`
    pub fn on_in(&self, dir: impl AsRef<Path>, prefix: &[&str], output: CommandOutput) -> &Self {
        self.push_rule(Some(dir.as_ref().to_path_buf()), prefix, output)
    }

    fn push_rule(&self, dir: Option<PathBuf>, prefix: &[&str], output: CommandOutput) -> &Self {
        self.rules.lock().unwrap().push(Rule {
            dir,
            prefix: prefix.iter().map(|p| p.to_string()).collect(),
            output,
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_with(&self, prefix: &[&str]) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn calls_in_with(&self, dir: impl AsRef<Path>, prefix: &[&str]) -> Vec<Call> {
        self.calls_with(prefix)
            .into_iter()
            .filter(|c| c.dir == dir.as_ref())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, dir: &Path, args: &[String]) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(Call {
            dir: dir.to_path_buf(),
            args: args.to_vec(),
        });

        let rules = self.rules.lock().unwrap();
        let matched = rules.iter().rev().find(|rule| {
            rule.dir.as_deref().map(|d| d == dir).unwrap_or(true)
                && args.len() >= rule.prefix.len()
                && args.iter().zip(&rule.prefix).all(|(a, p)| a == p)
        });

        Ok(matched
            .map(|rule| rule.output.clone())
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}

/// Operator with pre-recorded answers
#[derive(Default)]
pub struct ScriptedOperator {
    messages: Mutex<VecDeque<String>>,
    confirmations: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<String>>,
    notices: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(self, messages: &[&str]) -> Self {
        self.messages
            .lock()
            .unwrap()
            .extend(messages.iter().map(|m| m.to_string()));
        self
    }

    pub fn with_confirmations(self, answers: &[bool]) -> Self {
        self.confirmations.lock().unwrap().extend(answers);
        self
    }

    /// Every question asked, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl Operator for ScriptedOperator {
    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn commit_message(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.messages
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted commit message for: {}", prompt))
    }

    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.confirmations
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted confirmation for: {}", prompt))
    }
}

// Real git helpers for tests that build throwaway repositories

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir`, panicking with git's stderr on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute git");

    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.name", "Subsync Tests"]);
    git(dir, &["config", "user.email", "tests@example.com"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Bare repository with one commit on `main`, plus the clone used to make it
pub fn bare_remote_with_commit(root: &Path, name: &str) -> (PathBuf, PathBuf) {
    let remote = root.join(format!("{}.git", name));
    std::fs::create_dir_all(&remote).unwrap();
    git(&remote, &["init", "--bare", "--initial-branch=main"]);

    let seed = root.join(format!("{}-seed", name));
    git(root, &["clone", remote.to_str().unwrap(), seed.to_str().unwrap()]);
    configure_identity(&seed);
    std::fs::write(seed.join("README.md"), format!("# {}\n", name)).unwrap();
    git(&seed, &["add", "README.md"]);
    git(&seed, &["commit", "-m", "initial"]);
    git(&seed, &["branch", "-M", "main"]);
    git(&seed, &["push", "-u", "origin", "main"]);

    (remote, seed)
}

/// Subject of the latest commit on `branch` of a bare repository
pub fn remote_head_subject(remote: &Path, branch: &str) -> String {
    git(remote, &["log", "-1", "--format=%s", branch])
}

pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
