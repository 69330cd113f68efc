use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::envelope::OperationResult;
use crate::error::{GitError, Result};
use crate::runner::{Invocation, ProcessRunner};
use crate::settings::Settings;

pub const DEFAULT_REMOTE_NAME: &str = "origin";

/// Code reported when the current branch has nothing to push to, matching
/// what `git push` itself exits with.
pub const NO_UPSTREAM_CODE: i32 = 128;

const MERGE_ABORTED_MESSAGE: &str = "Unable to pull latest changes as doing so would result in a \
merge conflict. The merge was aborted and the working tree is unchanged.";

fn default_remote_name() -> String {
    DEFAULT_REMOTE_NAME.to_string()
}

/// A remote to register.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteSpec {
    #[serde(default = "default_remote_name")]
    pub name: String,
    pub url: String,
}

impl RemoteSpec {
    pub fn new(url: impl Into<String>) -> Self {
        RemoteSpec {
            name: default_remote_name(),
            url: url.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// What HEAD points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    Branch(String),
    /// The label `git branch` prints instead of a name, e.g.
    /// `(HEAD detached at 1a2b3c4)`.
    Detached(String),
}

impl HeadState {
    pub fn name(&self) -> &str {
        match self {
            HeadState::Branch(name) | HeadState::Detached(name) => name,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, HeadState::Detached(_))
    }
}

/// Where `git push` sends the current branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushTarget {
    pub remote: String,
    pub refspec: String,
}

impl PushTarget {
    /// Derives the target from an upstream name. `origin/feature` pushes
    /// `HEAD:feature` to `origin`; a bare `feature` is a local branch and
    /// pushes to the repository itself (`.`). Blank means no target.
    pub fn from_upstream(upstream: &str) -> Option<Self> {
        let upstream = upstream.trim();
        if upstream.is_empty() {
            return None;
        }

        let target = match upstream.split_once('/') {
            Some((remote, branch)) => PushTarget {
                remote: remote.to_string(),
                refspec: format!("HEAD:{branch}"),
            },
            None => PushTarget {
                remote: ".".to_string(),
                refspec: format!("HEAD:{upstream}"),
            },
        };
        Some(target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamPayload {
    pub upstream: Option<String>,
}

/// Operations that talk to other repositories, plus the branch tracking
/// queries they depend on.
pub struct RemoteSync<'a, R> {
    runner: &'a R,
    settings: &'a Settings,
}

impl<'a, R: ProcessRunner> RemoteSync<'a, R> {
    pub fn new(runner: &'a R, settings: &'a Settings) -> Self {
        RemoteSync { runner, settings }
    }

    /// Resolves HEAD. A detached HEAD is reported with the label from
    /// `git branch -a`.
    pub async fn current_head(&self, path: &Path) -> Result<HeadState> {
        let invocation = self.settings.git(path).args(["symbolic-ref", "--short", "HEAD"]);
        let result = self.runner.run(&invocation).await?;

        if result.is_success() {
            return Ok(HeadState::Branch(result.stdout.trim().to_string()));
        }
        if !result.stderr.contains("not a symbolic ref") {
            return Err(GitError::tool(&result, &invocation));
        }

        let invocation = self.settings.git(path).args(["branch", "-a"]);
        let result = self.runner.run(&invocation).await?;
        if !result.is_success() {
            return Err(GitError::tool(&result, &invocation));
        }

        result
            .stdout
            .lines()
            .find_map(|line| line.strip_prefix("* "))
            .map(|label| HeadState::Detached(label.trim().to_string()))
            .ok_or_else(|| GitError::Tool {
                code: result.exit_code,
                command: invocation.display_command(),
                message: "no branch is marked as current".to_string(),
            })
    }

    pub async fn current_branch(&self, path: &Path) -> Result<String> {
        Ok(self.current_head(path).await?.name().to_string())
    }

    /// Upstream of `branch`, or `None` when none is configured.
    pub async fn upstream_branch(&self, path: &Path, branch: &str) -> Result<Option<String>> {
        let invocation = self
            .settings
            .git(path)
            .args(["rev-parse".to_string(), "--abbrev-ref".to_string(), format!("{branch}@{{upstream}}")]);
        let result = self.runner.run(&invocation).await?;

        if result.is_success() {
            let upstream = result.stdout.trim();
            return Ok((!upstream.is_empty()).then(|| upstream.to_string()));
        }
        if is_missing_upstream(&result.stderr) {
            return Ok(None);
        }
        Err(GitError::tool(&result, &invocation))
    }

    pub async fn upstream(&self, path: &Path) -> Result<OperationResult<UpstreamPayload>> {
        let branch = self.current_branch(path).await?;
        let upstream = self.upstream_branch(path, &branch).await?;
        Ok(OperationResult::success(UpstreamPayload { upstream }))
    }

    pub async fn push(
        &self,
        path: &Path,
        remote: &str,
        refspec: &str,
        credentials: Option<&Credentials>,
    ) -> Result<OperationResult> {
        let invocation = self.network(path, credentials).args(["push", remote, refspec]);
        let result = self.runner.run(&invocation).await?;
        Ok(OperationResult::from_status(&result, &invocation))
    }

    /// Pushes the current branch to its upstream. Without an upstream
    /// nothing is run and the result carries [`NO_UPSTREAM_CODE`].
    pub async fn push_to_upstream(
        &self,
        path: &Path,
        credentials: Option<&Credentials>,
    ) -> Result<OperationResult> {
        let branch = self.current_branch(path).await?;
        let upstream = self.upstream_branch(path, &branch).await?;

        match upstream.as_deref().and_then(PushTarget::from_upstream) {
            Some(target) => {
                debug!(remote = %target.remote, refspec = %target.refspec, "pushing to upstream");
                self.push(path, &target.remote, &target.refspec, credentials).await
            }
            None => {
                warn!(branch = %branch, "current branch has no upstream");
                Ok(GitError::Precondition {
                    code: NO_UPSTREAM_CODE,
                    message: format!("fatal: The current branch {branch} has no upstream branch."),
                }
                .into())
            }
        }
    }

    /// `git pull --no-commit`. With `cancel_on_conflict`, a pull that stops
    /// on conflicts is rolled back with `git merge --abort`.
    pub async fn pull(
        &self,
        path: &Path,
        credentials: Option<&Credentials>,
        cancel_on_conflict: bool,
    ) -> Result<OperationResult> {
        let invocation = self.network(path, credentials).args(["pull", "--no-commit"]);
        let result = self.runner.run(&invocation).await?;

        if result.is_success() || !cancel_on_conflict || !is_merge_conflict(&result.stdout, &result.stderr) {
            return Ok(OperationResult::from_status(&result, &invocation));
        }

        warn!(path = %path.display(), "pull stopped on conflicts, aborting the merge");
        let abort = self.settings.git(path).args(["merge", "--abort"]);
        let aborted = self.runner.run(&abort).await?;
        if !aborted.is_success() {
            return Ok(OperationResult::tool_failure(&aborted, &abort));
        }
        Ok(OperationResult::failure(result.exit_code, MERGE_ABORTED_MESSAGE))
    }

    /// Clones `url` into a new directory under `path`.
    pub async fn clone(
        &self,
        path: &Path,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<OperationResult> {
        let mut invocation = self.network(path, credentials).args(["clone", url]);
        if credentials.is_some() {
            invocation = invocation.arg("-q");
        }
        let result = self.runner.run(&invocation).await?;
        Ok(OperationResult::from_status(&result, &invocation))
    }

    pub async fn remote_add(&self, path: &Path, remote: &RemoteSpec) -> Result<OperationResult> {
        let invocation = self
            .settings
            .git(path)
            .args(["remote", "add", remote.name.as_str(), remote.url.as_str()]);
        let result = self.runner.run(&invocation).await?;

        let envelope = OperationResult::from_status(&result, &invocation);
        Ok(if envelope.is_success() {
            envelope.with_command(invocation.display_command())
        } else {
            envelope
        })
    }

    /// Invocation for a command that may contact a remote: never prompts on
    /// a terminal, and carries the credentials when given.
    fn network(&self, path: &Path, credentials: Option<&Credentials>) -> Invocation {
        let invocation = self.settings.git(path).env("GIT_TERMINAL_PROMPT", "0");
        match credentials {
            Some(credentials) => credentials.apply(invocation),
            None => invocation,
        }
    }
}

/// Answers of `rev-parse <branch>@{upstream}` meaning nothing is tracked.
/// An unborn branch or a detached HEAD label gets "no such branch".
fn is_missing_upstream(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    [
        "no upstream configured for branch",
        "unknown revision or path not in the working tree",
        "no such branch",
    ]
    .iter()
    .any(|phrase| stderr.contains(phrase))
}

fn is_merge_conflict(stdout: &str, stderr: &str) -> bool {
    [stdout, stderr]
        .iter()
        .any(|out| out.contains("Automatic merge failed") || out.contains("CONFLICT ("))
}
