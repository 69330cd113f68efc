use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::branch::{self, BranchInfo, BranchPayload, HEADS_ARGS, REMOTES_ARGS};
use crate::content::{DiffContent, DiffContentRequest, RefResolver};
use crate::credentials::Credentials;
use crate::diff::{self, ChangedFilesPayload, ChangedFilesRequest, DiffPayload, NUMSTAT_ARGS};
use crate::envelope::OperationResult;
use crate::error::{GitError, Result};
use crate::log::{self, CommitDetail, LogPayload};
use crate::remote::{HeadState, RemoteSpec, RemoteSync, UpstreamPayload};
use crate::runner::{CommandResult, Invocation, ProcessRunner, TokioRunner};
use crate::settings::Settings;
use crate::status::{self, StatusPayload, STATUS_ARGS};

/// Configuration keys readable and writable through [`RepositoryFacade::config`].
pub const ALLOWED_CONFIG_OPTIONS: [&str; 2] = ["user.name", "user.email"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopLevelPayload {
    pub top_repo_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixPayload {
    pub under_repo_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigPayload {
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRootPayload {
    pub server_root: Option<String>,
}

/// Everything a client needs to draw a repository in one round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPayload {
    pub data: HistoryData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryData {
    pub show_top_level: OperationResult<TopLevelPayload>,
    pub branch: OperationResult<BranchPayload>,
    pub log: OperationResult<LogPayload>,
    pub status: OperationResult<StatusPayload>,
}

/// One method per repository operation.
///
/// Every method takes the repository path explicitly; relative paths are
/// resolved against [`Settings::root_dir`]. A git command that exits
/// non-zero comes back as `Ok` with the exit code in the envelope. `Err` is
/// reserved for failures that have no exit code of their own (spawn
/// failures, binary or missing files, bad requests); callers turn those into
/// envelopes with `OperationResult::from`.
pub struct RepositoryFacade<R = TokioRunner> {
    runner: R,
    settings: Settings,
}

impl RepositoryFacade<TokioRunner> {
    /// Facade that runs the real git binary.
    pub fn open(settings: Settings) -> Self {
        RepositoryFacade::new(TokioRunner::new(), settings)
    }
}

impl<R: ProcessRunner> RepositoryFacade<R> {
    pub fn new(runner: R, settings: Settings) -> Self {
        RepositoryFacade { runner, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn remote_sync(&self) -> RemoteSync<'_, R> {
        RemoteSync::new(&self.runner, &self.settings)
    }

    async fn execute<I, S>(&self, path: &Path, args: I) -> Result<(CommandResult, Invocation)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = self.settings.git(path).args(args);
        let result = self.runner.run(&invocation).await?;
        Ok((result, invocation))
    }

    /// Runs a command whose output is not interpreted.
    async fn execute_status<I, S>(&self, path: &Path, args: I) -> Result<OperationResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = self.settings.resolve(path);
        let (result, invocation) = self.execute(&path, args).await?;
        Ok(OperationResult::from_status(&result, &invocation))
    }

    async fn execute_parsed<T, I, S, F>(&self, path: &Path, args: I, parse: F) -> Result<OperationResult<T>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnOnce(&str) -> T,
    {
        let path = self.settings.resolve(path);
        let (result, invocation) = self.execute(&path, args).await?;
        Ok(OperationResult::from_output(&result, &invocation, parse))
    }

    pub async fn init(&self, path: &Path) -> Result<OperationResult> {
        self.execute_status(path, ["init"]).await
    }

    /// Clones `url` into a new directory inside `path`.
    pub async fn clone(
        &self,
        path: &Path,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<OperationResult> {
        let path = self.settings.resolve(path);
        self.remote_sync().clone(&path, url, credentials).await
    }

    pub async fn show_top_level(&self, path: &Path) -> Result<OperationResult<TopLevelPayload>> {
        self.execute_parsed(path, ["rev-parse", "--show-toplevel"], |out| TopLevelPayload {
            top_repo_path: out.trim().to_string(),
        })
        .await
    }

    /// Path of `path` relative to the top of its repository.
    pub async fn show_prefix(&self, path: &Path) -> Result<OperationResult<PrefixPayload>> {
        self.execute_parsed(path, ["rev-parse", "--show-prefix"], |out| PrefixPayload {
            under_repo_path: out.trim().to_string(),
        })
        .await
    }

    pub async fn status(&self, path: &Path) -> Result<OperationResult<StatusPayload>> {
        self.execute_parsed(path, STATUS_ARGS, |out| StatusPayload {
            files: status::parse_status(out),
        })
        .await
    }

    /// The last `count` commits, or [`Settings::history_count`] of them.
    pub async fn log(&self, path: &Path, count: Option<usize>) -> Result<OperationResult<LogPayload>> {
        let count = count.unwrap_or(self.settings.history_count);
        self.execute_parsed(path, log::log_args(count), |out| LogPayload {
            commits: log::parse_log(out),
        })
        .await
    }

    pub async fn detailed_log(&self, path: &Path, sha: &str) -> Result<OperationResult<CommitDetail>> {
        self.execute_parsed(path, log::detailed_log_args(sha), log::parse_detailed_log)
            .await
    }

    /// Local branches, then remote-tracking branches.
    pub async fn branch(&self, path: &Path) -> Result<OperationResult<BranchPayload>> {
        let path = self.settings.resolve(path);

        let (heads, invocation) = self.execute(&path, HEADS_ARGS).await?;
        if !heads.is_success() {
            return Ok(OperationResult::tool_failure(&heads, &invocation));
        }
        let (remotes, invocation) = self.execute(&path, REMOTES_ARGS).await?;
        if !remotes.is_success() {
            return Ok(OperationResult::tool_failure(&remotes, &invocation));
        }

        let heads = branch::parse_heads(&heads.stdout);
        let remotes = branch::parse_remotes(&remotes.stdout);
        let fallback = if heads.iter().any(|b| b.is_current_branch) {
            None
        } else {
            Some(self.unlisted_head(&path).await?)
        };

        Ok(OperationResult::success(BranchPayload::assemble(heads, remotes, fallback)))
    }

    /// Entry for a HEAD that `for-each-ref refs/heads/` does not list: the
    /// unborn branch of an empty repository, or a detached HEAD.
    async fn unlisted_head(&self, path: &Path) -> Result<BranchInfo> {
        let head = self.remote_sync().current_head(path).await?;
        debug!(head = head.name(), "current branch is not a listed head");

        let (top_commit, tag) = match &head {
            HeadState::Branch(_) => (None, None),
            HeadState::Detached(_) => {
                let (result, invocation) = self.execute(path, ["rev-parse", "HEAD"]).await?;
                if !result.is_success() {
                    return Err(GitError::tool(&result, &invocation));
                }
                (Some(result.stdout.trim().to_string()), self.describe_head(path).await?)
            }
        };

        Ok(BranchInfo {
            name: head.name().to_string(),
            is_current_branch: true,
            is_remote_branch: false,
            upstream: None,
            top_commit,
            tag,
        })
    }

    async fn describe_head(&self, path: &Path) -> Result<Option<String>> {
        let (result, invocation) = self.execute(path, ["describe", "--tags", "HEAD"]).await?;
        if result.is_success() {
            return Ok(Some(result.stdout.trim().to_string()));
        }
        if branch::is_missing_tag(&result.stderr) {
            return Ok(None);
        }
        Err(GitError::tool(&result, &invocation))
    }

    /// Top level, then branches, log and status run concurrently. A path
    /// outside any repository stops after the first step.
    pub async fn all_history(&self, path: &Path, count: Option<usize>) -> Result<OperationResult<HistoryPayload>> {
        let show_top_level = self.show_top_level(path).await?;
        if !show_top_level.is_success() {
            return Ok(show_top_level.without_payload());
        }

        let (branch, log, status) =
            tokio::try_join!(self.branch(path), self.log(path, count), self.status(path))?;

        Ok(OperationResult::success(HistoryPayload {
            data: HistoryData {
                show_top_level,
                branch,
                log,
                status,
            },
        }))
    }

    /// Working-tree line counts against the index.
    pub async fn diff(&self, path: &Path) -> Result<OperationResult<DiffPayload>> {
        self.execute_parsed(path, NUMSTAT_ARGS, |out| DiffPayload {
            result: diff::parse_numstat(out),
        })
        .await
    }

    pub async fn changed_files(
        &self,
        path: &Path,
        request: &ChangedFilesRequest,
    ) -> Result<OperationResult<ChangedFilesPayload>> {
        let args = request.args()?;
        self.execute_parsed(path, args, |out| ChangedFilesPayload {
            files: diff::parse_name_only(out),
        })
        .await
    }

    pub async fn add(&self, path: &Path, filename: &str) -> Result<OperationResult> {
        self.execute_status(path, ["add", "--", filename]).await
    }

    pub async fn add_all(&self, path: &Path) -> Result<OperationResult> {
        self.execute_status(path, ["add", "-A"]).await
    }

    /// Stages modifications and deletions of tracked files only.
    pub async fn add_all_unstaged(&self, path: &Path) -> Result<OperationResult> {
        self.execute_status(path, ["add", "-u"]).await
    }

    /// Stages every untracked file that is not ignored.
    pub async fn add_all_untracked(&self, path: &Path) -> Result<OperationResult> {
        let path = self.settings.resolve(path);
        let (listing, invocation) = self
            .execute(&path, ["ls-files", "--others", "--exclude-standard", "-z"])
            .await?;
        if !listing.is_success() {
            return Ok(OperationResult::tool_failure(&listing, &invocation));
        }

        let files: Vec<&str> = listing.stdout.split('\0').filter(|f| !f.is_empty()).collect();
        if files.is_empty() {
            return Ok(OperationResult::ok());
        }
        let args = ["add", "--"].into_iter().chain(files);
        let (result, invocation) = self.execute(&path, args).await?;
        Ok(OperationResult::from_status(&result, &invocation))
    }

    /// Unstages one file.
    pub async fn reset(&self, path: &Path, filename: &str) -> Result<OperationResult> {
        self.execute_status(path, ["reset", "--", filename]).await
    }

    pub async fn reset_all(&self, path: &Path) -> Result<OperationResult> {
        self.execute_status(path, ["reset"]).await
    }

    /// Reverts the changes of a commit into the index and working tree
    /// without committing.
    pub async fn delete_commit(&self, path: &Path, commit_id: &str) -> Result<OperationResult> {
        self.execute_status(path, ["revert", "--no-commit", commit_id]).await
    }

    pub async fn reset_to_commit(&self, path: &Path, commit_id: &str) -> Result<OperationResult> {
        self.execute_status(path, ["reset", "--hard", commit_id]).await
    }

    pub async fn checkout_new_branch(
        &self,
        path: &Path,
        branch_name: &str,
        start_point: &str,
    ) -> Result<OperationResult> {
        self.execute_status(path, ["checkout", "-b", branch_name, start_point])
            .await
    }

    /// Switches to a branch. A remote-tracking name such as `origin/feature`
    /// creates or resets the local `feature` to it.
    pub async fn checkout_branch(&self, path: &Path, branch_name: &str) -> Result<OperationResult> {
        let resolved = self.settings.resolve(path);
        let remote_ref = format!("refs/remotes/{branch_name}");
        let (lookup, _) = self
            .execute(&resolved, ["show-ref", "--verify", "--quiet", remote_ref.as_str()])
            .await?;

        if !lookup.is_success() {
            return self.execute_status(path, ["checkout", branch_name]).await;
        }
        let local = branch_name
            .split_once('/')
            .map_or(branch_name, |(_, local)| local);
        self.execute_status(path, ["checkout", "-B", local, branch_name])
            .await
    }

    /// Discards working-tree changes to one file.
    pub async fn checkout(&self, path: &Path, filename: &str) -> Result<OperationResult> {
        self.execute_status(path, ["checkout", "--", filename]).await
    }

    pub async fn checkout_all(&self, path: &Path) -> Result<OperationResult> {
        self.execute_status(path, ["checkout", "--", "."]).await
    }

    pub async fn commit(&self, path: &Path, message: &str) -> Result<OperationResult> {
        self.execute_status(path, ["commit", "-m", message]).await
    }

    pub async fn upstream(&self, path: &Path) -> Result<OperationResult<UpstreamPayload>> {
        let path = self.settings.resolve(path);
        self.remote_sync().upstream(&path).await
    }

    pub async fn push(
        &self,
        path: &Path,
        remote: &str,
        refspec: &str,
        credentials: Option<&Credentials>,
    ) -> Result<OperationResult> {
        let path = self.settings.resolve(path);
        self.remote_sync().push(&path, remote, refspec, credentials).await
    }

    pub async fn push_to_upstream(
        &self,
        path: &Path,
        credentials: Option<&Credentials>,
    ) -> Result<OperationResult> {
        let path = self.settings.resolve(path);
        self.remote_sync().push_to_upstream(&path, credentials).await
    }

    pub async fn pull(
        &self,
        path: &Path,
        credentials: Option<&Credentials>,
        cancel_on_conflict: bool,
    ) -> Result<OperationResult> {
        let path = self.settings.resolve(path);
        self.remote_sync().pull(&path, credentials, cancel_on_conflict).await
    }

    pub async fn remote_add(&self, path: &Path, remote: &RemoteSpec) -> Result<OperationResult> {
        let path = self.settings.resolve(path);
        self.remote_sync().remote_add(&path, remote).await
    }

    /// With no options, reads the allowed keys from `git config --list`.
    /// Otherwise sets each option; any key outside
    /// [`ALLOWED_CONFIG_OPTIONS`] rejects the whole request before anything
    /// is written.
    pub async fn config(
        &self,
        path: &Path,
        options: &BTreeMap<String, String>,
    ) -> Result<OperationResult<ConfigPayload>> {
        if options.is_empty() {
            return self
                .execute_parsed(path, ["config", "--list"], |out| ConfigPayload {
                    options: parse_config_list(out),
                })
                .await;
        }

        if let Some(key) = options.keys().find(|k| !ALLOWED_CONFIG_OPTIONS.contains(&k.as_str())) {
            warn!(key = %key, "refusing to set configuration option");
            return Err(GitError::InvalidRequest(format!(
                "configuration option '{key}' cannot be set"
            )));
        }

        let path = self.settings.resolve(path);
        for (key, value) in options {
            let (result, invocation) = self.execute(&path, ["config", key.as_str(), value.as_str()]).await?;
            if !result.is_success() {
                return Ok(OperationResult::tool_failure(&result, &invocation));
            }
        }
        Ok(OperationResult::ok())
    }

    pub async fn diff_content(&self, request: &DiffContentRequest) -> Result<OperationResult<DiffContent>> {
        let content = RefResolver::new(&self.runner, &self.settings)
            .resolve(request)
            .await?;
        Ok(OperationResult::success(content))
    }

    /// The directory relative repository paths are resolved against.
    pub fn server_root(&self) -> OperationResult<ServerRootPayload> {
        let server_root = self
            .settings
            .root_dir
            .as_deref()
            .map(posix_path);
        OperationResult::success(ServerRootPayload { server_root })
    }
}

fn posix_path(path: &Path) -> String {
    let path: PathBuf = path.components().collect();
    path.to_string_lossy().replace('\\', "/")
}

/// Keeps the allowed keys of `key=value` lines; later lines win, as they do
/// for git itself.
fn parse_config_list(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| ALLOWED_CONFIG_OPTIONS.contains(key))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentPointer, SpecialRef};
    use crate::envelope::ErrorKind;
    use crate::log::LOG_FORMAT;
    use crate::scripted::ScriptedRunner;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::process::Command;
    use tempfile::TempDir;

    const SHA_A: &str = "abcdefghijklmnopqrstuvwxyz01234567890123";
    const SHA_B: &str = "01234567899999abcdefghijklmnopqrstuvwxyz";

    fn scripted() -> RepositoryFacade<ScriptedRunner> {
        RepositoryFacade::new(ScriptedRunner::new(), Settings::default())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_status_envelope() {
        let facade = scripted();
        facade.runner().push(0, "A  notebook with λ.ipynb\0?? untracked.py\0", "");

        let result = facade.status(Path::new("test_path")).await.unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "code": 0,
                "files": [
                    {"x": "A", "y": " ", "to": "notebook with λ.ipynb", "from": "notebook with λ.ipynb"},
                    {"x": "?", "y": "?", "to": "untracked.py", "from": "untracked.py"},
                ]
            })
        );
        assert_eq!(facade.runner().recorded_args(), vec![args(&STATUS_ARGS)]);
    }

    #[tokio::test]
    async fn test_log_uses_configured_count() {
        let facade = scripted();
        facade.log(Path::new("test_path"), None).await.unwrap();
        facade.log(Path::new("test_path"), Some(20)).await.unwrap();

        assert_eq!(
            facade.runner().recorded_args(),
            vec![args(&["log", LOG_FORMAT, "-25"]), args(&["log", LOG_FORMAT, "-20"])]
        );
    }

    #[tokio::test]
    async fn test_relative_path_is_resolved_against_root_dir() {
        let settings = Settings {
            root_dir: Some(PathBuf::from("/srv/notebooks")),
            ..Settings::default()
        };
        let facade = RepositoryFacade::new(ScriptedRunner::new(), settings);

        facade.status(Path::new("project")).await.unwrap();
        facade.status(Path::new("/abs/project")).await.unwrap();

        let calls = facade.runner().calls();
        assert_eq!(calls[0].cwd(), Path::new("/srv/notebooks/project"));
        assert_eq!(calls[1].cwd(), Path::new("/abs/project"));
    }

    #[tokio::test]
    async fn test_branch_listing() {
        let facade = scripted();
        facade
            .runner()
            .push(
                0,
                &format!(
                    "feature-foo\t{SHA_A}\torigin/feature-foo\t*\n\
                     master\t{SHA_A}\torigin/master\t \n\
                     feature-bar\t{SHA_B}\t\t \n"
                ),
                "",
            )
            .push(0, &format!("origin/feature-foo\t{SHA_A}\norigin/master\t{SHA_A}\n"), "");

        let result = facade.branch(Path::new("test_path")).await.unwrap();
        let payload = result.payload.unwrap();

        assert_eq!(payload.branches.len(), 5);
        assert_eq!(
            payload
                .branches
                .iter()
                .map(|b| (b.name.as_str(), b.is_current_branch, b.is_remote_branch, b.upstream.as_deref()))
                .collect::<Vec<_>>(),
            vec![
                ("feature-foo", true, false, Some("origin/feature-foo")),
                ("master", false, false, Some("origin/master")),
                ("feature-bar", false, false, None),
                ("origin/feature-foo", false, true, None),
                ("origin/master", false, true, None),
            ]
        );
        assert_eq!(payload.current_branch.unwrap().name, "feature-foo");
        assert_eq!(
            facade.runner().recorded_args(),
            vec![args(&HEADS_ARGS), args(&REMOTES_ARGS)]
        );
    }

    #[tokio::test]
    async fn test_branch_listing_is_rebuilt_on_every_call() {
        let facade = scripted();
        let heads = format!("main\t{SHA_A}\t\t*\n");
        for _ in 0..2 {
            facade.runner().push(0, &heads, "").push(0, "", "");
        }

        let first = facade.branch(Path::new("test_path")).await.unwrap();
        let second = facade.branch(Path::new("test_path")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(facade.runner().calls().len(), 4);
    }

    #[tokio::test]
    async fn test_branch_detached_head() {
        let facade = scripted();
        facade
            .runner()
            .push(0, &format!("master\t{SHA_A}\t\t \n"), "")
            .push(0, "", "")
            .push(128, "", "fatal: ref HEAD is not a symbolic ref\n")
            .push(0, "* (HEAD detached at 0123456)\n  master\n", "")
            .push(0, &format!("{SHA_B}\n"), "")
            .push(0, "v1.0\n", "");

        let payload = facade.branch(Path::new("test_path")).await.unwrap().payload.unwrap();

        let detached = BranchInfo {
            name: "(HEAD detached at 0123456)".into(),
            is_current_branch: true,
            is_remote_branch: false,
            upstream: None,
            top_commit: Some(SHA_B.into()),
            tag: Some("v1.0".into()),
        };
        assert_eq!(payload.branches[0], detached);
        assert_eq!(payload.branches[1].name, "master");
        assert_eq!(payload.current_branch, Some(detached));
    }

    #[tokio::test]
    async fn test_branch_detached_head_without_tags() {
        let facade = scripted();
        facade
            .runner()
            .push(0, "", "")
            .push(0, "", "")
            .push(128, "", "fatal: ref HEAD is not a symbolic ref\n")
            .push(0, "* (HEAD detached at 0123456)\n", "")
            .push(0, &format!("{SHA_B}\n"), "")
            .push(128, "", "fatal: No names found, cannot describe anything.\n");

        let payload = facade.branch(Path::new("test_path")).await.unwrap().payload.unwrap();
        assert_eq!(payload.branches[0].tag, None);
    }

    #[tokio::test]
    async fn test_all_history_outside_repository() {
        let facade = RepositoryFacade::new(
            ScriptedRunner::always(128, "", "fatal: not a git repository"),
            Settings::default(),
        );

        let result = facade.all_history(Path::new("test_path"), None).await.unwrap();

        assert_eq!(result.code, 128);
        assert_eq!(result.payload, None);
        assert_eq!(facade.runner().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_all_history() {
        let facade = scripted();
        facade
            .runner()
            .push(0, "/repo\n", "")
            .push(0, &format!("main\t{SHA_A}\t\t*\n"), "")
            .push(0, "", "")
            .push(0, &format!("{SHA_A}\nAlice\n2 days ago\nFirst"), "")
            .push(0, "?? new.py\0", "");

        let result = facade.all_history(Path::new("test_path"), Some(5)).await.unwrap();
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["code"], 0);
        assert_eq!(value["data"]["show_top_level"], json!({"code": 0, "top_repo_path": "/repo"}));
        assert_eq!(value["data"]["branch"]["current_branch"]["name"], "main");
        assert_eq!(value["data"]["log"]["commits"][0]["commit"], SHA_A);
        assert_eq!(value["data"]["status"]["files"][0]["to"], "new.py");
        assert_eq!(facade.runner().recorded_args()[3], args(&["log", LOG_FORMAT, "-5"]));
    }

    #[tokio::test]
    async fn test_changed_files_failure() {
        let facade = RepositoryFacade::new(
            ScriptedRunner::always(128, "", "error message"),
            Settings::default(),
        );
        let request = ChangedFilesRequest {
            base: Some("HEAD".into()),
            remote: Some("origin/HEAD".into()),
            single_commit: None,
        };

        let result = facade.changed_files(Path::new("/bin"), &request).await.unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "code": 128,
                "message": "error message",
                "command": "git diff HEAD origin/HEAD --name-only -z",
            })
        );
    }

    #[tokio::test]
    async fn test_changed_files_invalid_request_runs_nothing() {
        let facade = scripted();
        let err = facade
            .changed_files(Path::new("/bin"), &ChangedFilesRequest::default())
            .await
            .unwrap_err();

        let envelope: OperationResult = err.into();
        assert_eq!(envelope.kind, Some(ErrorKind::InvalidRequest));
        assert!(facade.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_pass_through_arguments() {
        let facade = scripted();
        let path = Path::new("test_path");
        const SHA: &str = "64950a634cd11d1a01ddfedaeffed67b531cb11e";

        facade.init(path).await.unwrap();
        facade.show_prefix(path).await.unwrap();
        facade.detailed_log(path, SHA).await.unwrap();
        facade.diff(path).await.unwrap();
        facade.add(path, "-weird name.txt").await.unwrap();
        facade.add_all(path).await.unwrap();
        facade.add_all_unstaged(path).await.unwrap();
        facade.reset(path, "notes.txt").await.unwrap();
        facade.reset_all(path).await.unwrap();
        facade.delete_commit(path, SHA).await.unwrap();
        facade.reset_to_commit(path, SHA).await.unwrap();
        facade.checkout_new_branch(path, "topic", "HEAD~1").await.unwrap();
        facade.checkout(path, "notes.txt").await.unwrap();
        facade.checkout_all(path).await.unwrap();
        facade.commit(path, "Fix the thing").await.unwrap();

        assert_eq!(
            facade.runner().recorded_args(),
            vec![
                args(&["init"]),
                args(&["rev-parse", "--show-prefix"]),
                args(&["log", "-1", "--numstat", "--oneline", "-z", SHA]),
                args(&NUMSTAT_ARGS),
                args(&["add", "--", "-weird name.txt"]),
                args(&["add", "-A"]),
                args(&["add", "-u"]),
                args(&["reset", "--", "notes.txt"]),
                args(&["reset"]),
                args(&["revert", "--no-commit", SHA]),
                args(&["reset", "--hard", SHA]),
                args(&["checkout", "-b", "topic", "HEAD~1"]),
                args(&["checkout", "--", "notes.txt"]),
                args(&["checkout", "--", "."]),
                args(&["commit", "-m", "Fix the thing"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_add_all_untracked() {
        let facade = scripted();
        facade.runner().push(0, "a.txt\0dir/b c.txt\0", "").push(0, "", "");

        let result = facade.add_all_untracked(Path::new("test_path")).await.unwrap();

        assert!(result.is_success());
        assert_eq!(
            facade.runner().recorded_args(),
            vec![
                args(&["ls-files", "--others", "--exclude-standard", "-z"]),
                args(&["add", "--", "a.txt", "dir/b c.txt"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_checkout_remote_branch_creates_local() {
        let facade = scripted();
        facade.runner().push(0, "", "").push(0, "", "");

        facade.checkout_branch(Path::new("test_path"), "origin/feature").await.unwrap();

        assert_eq!(
            facade.runner().recorded_args(),
            vec![
                args(&["show-ref", "--verify", "--quiet", "refs/remotes/origin/feature"]),
                args(&["checkout", "-B", "feature", "origin/feature"]),
            ]
        );
    }

    #[tokio::test]
    async fn test_checkout_local_branch() {
        let facade = scripted();
        facade.runner().push(1, "", "").push(0, "", "");

        facade.checkout_branch(Path::new("test_path"), "master").await.unwrap();

        assert_eq!(facade.runner().recorded_args()[1], args(&["checkout", "master"]));
    }

    #[tokio::test]
    async fn test_config_get_filters_keys() {
        let facade = scripted();
        facade.runner().push(
            0,
            "user.name=Global Name\ncore.editor=vim\nuser.email=me@example.com\nuser.name=Local Name\n",
            "",
        );

        let result = facade.config(Path::new("test_path"), &BTreeMap::new()).await.unwrap();

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "code": 0,
                "options": {"user.email": "me@example.com", "user.name": "Local Name"},
            })
        );
    }

    #[tokio::test]
    async fn test_config_set() {
        let facade = scripted();
        let options = BTreeMap::from([("user.name".to_string(), "Alice".to_string())]);

        let result = facade.config(Path::new("test_path"), &options).await.unwrap();

        assert!(result.is_success());
        assert_eq!(facade.runner().recorded_args(), vec![args(&["config", "user.name", "Alice"])]);
    }

    #[tokio::test]
    async fn test_config_set_rejects_unknown_keys() {
        let facade = scripted();
        let options = BTreeMap::from([
            ("user.name".to_string(), "Alice".to_string()),
            ("core.hooksPath".to_string(), "/tmp".to_string()),
        ]);

        let err = facade.config(Path::new("test_path"), &options).await.unwrap_err();

        assert!(matches!(err, GitError::InvalidRequest(_)));
        assert!(facade.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error() {
        let facade = scripted();
        facade.runner().push_spawn_failure();

        let err = facade.init(Path::new("test_path")).await.unwrap_err();
        let envelope: OperationResult = err.into();

        assert_eq!(envelope.kind, Some(ErrorKind::SpawnFailure));
    }

    #[test]
    fn test_server_root() {
        let facade = scripted();
        assert_eq!(
            serde_json::to_value(facade.server_root()).unwrap(),
            json!({"code": 0, "server_root": null})
        );

        let settings = Settings {
            root_dir: Some(PathBuf::from("/srv/notebooks/")),
            ..Settings::default()
        };
        let facade = RepositoryFacade::new(ScriptedRunner::new(), settings);
        assert_eq!(
            facade.server_root().payload.unwrap().server_root.as_deref(),
            Some("/srv/notebooks")
        );
    }

    // Real git below.

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn repository_with_commit() -> TempDir {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q"]);
        std::fs::write(dir.path().join("notes.txt"), "one\n").unwrap();
        std::fs::write(dir.path().join("image.bin"), [0u8, 159, 146, 150, 0, 1]).unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "Initial"]);
        dir
    }

    fn content_request(dir: &Path, filename: &str, previous: ContentPointer, current: ContentPointer) -> DiffContentRequest {
        DiffContentRequest {
            filename: filename.into(),
            previous,
            current,
            repository_root: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_init_and_status_with_git() {
        let dir = TempDir::new().unwrap();
        let facade = RepositoryFacade::open(Settings::default());

        assert!(facade.init(dir.path()).await.unwrap().is_success());
        std::fs::write(dir.path().join("new.py"), "print('hi')\n").unwrap();

        let status = facade.status(dir.path()).await.unwrap();
        let files = status.payload.unwrap().files;
        assert_eq!(files.len(), 1);
        assert_eq!((files[0].x.as_str(), files[0].y.as_str(), files[0].to.as_str()), ("?", "?", "new.py"));
    }

    #[tokio::test]
    async fn test_branch_in_empty_repository_with_git() {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q"]);
        let facade = RepositoryFacade::open(Settings::default());

        let payload = facade.branch(dir.path()).await.unwrap().payload.unwrap();

        let current = payload.current_branch.unwrap();
        assert!(current.is_current_branch);
        assert_eq!(current.top_commit, None);
        assert_eq!(payload.branches.len(), 1);
    }

    #[tokio::test]
    async fn test_push_from_unborn_branch_with_git() {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["-c", "init.defaultBranch=trunk", "init", "-q"]);
        let facade = RepositoryFacade::open(Settings::default());

        let upstream = facade.upstream(dir.path()).await.unwrap();
        let pushed = facade.push_to_upstream(dir.path(), None).await.unwrap();

        assert_eq!(upstream, OperationResult::success(UpstreamPayload { upstream: None }));
        assert_eq!(
            pushed,
            OperationResult::failure(128, "fatal: The current branch trunk has no upstream branch.")
        );
    }

    #[tokio::test]
    async fn test_push_from_detached_head_with_git() {
        let dir = repository_with_commit();
        git(dir.path(), &["checkout", "-q", "--detach"]);
        let facade = RepositoryFacade::open(Settings::default());

        let upstream = facade.upstream(dir.path()).await.unwrap();
        let pushed = facade.push_to_upstream(dir.path(), None).await.unwrap();

        assert_eq!(upstream.payload, Some(UpstreamPayload { upstream: None }));
        assert_eq!(pushed.code, 128);
        assert_eq!(pushed.kind, None);
        let message = pushed.message.unwrap();
        assert!(message.starts_with("fatal: The current branch (HEAD detached at "), "{message}");
        assert!(message.ends_with(") has no upstream branch."), "{message}");
    }

    #[tokio::test]
    async fn test_diff_content_with_git() {
        let dir = repository_with_commit();
        std::fs::write(dir.path().join("notes.txt"), "two\n").unwrap();
        let facade = RepositoryFacade::open(Settings::default());

        let request = content_request(
            dir.path(),
            "notes.txt",
            ContentPointer::Git("HEAD".into()),
            ContentPointer::Special(SpecialRef::Working),
        );
        let first = facade.diff_content(&request).await.unwrap();
        let second = facade.diff_content(&request).await.unwrap();

        assert_eq!(
            first.payload,
            Some(DiffContent {
                prev_content: "one\n".into(),
                curr_content: "two\n".into(),
            })
        );
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_diff_content_of_new_file_with_git() {
        let dir = repository_with_commit();
        std::fs::write(dir.path().join("added.txt"), "fresh\n").unwrap();
        git(dir.path(), &["add", "added.txt"]);
        let facade = RepositoryFacade::open(Settings::default());

        let content = facade
            .diff_content(&content_request(
                dir.path(),
                "added.txt",
                ContentPointer::Git("HEAD".into()),
                ContentPointer::Special(SpecialRef::Index),
            ))
            .await
            .unwrap()
            .payload
            .unwrap();

        assert_eq!(content.prev_content, "");
        assert_eq!(content.curr_content, "fresh\n");
    }

    #[tokio::test]
    async fn test_diff_content_of_binary_file_with_git() {
        let dir = repository_with_commit();
        let facade = RepositoryFacade::open(Settings::default());

        let err = facade
            .diff_content(&content_request(
                dir.path(),
                "image.bin",
                ContentPointer::Git("HEAD".into()),
                ContentPointer::Special(SpecialRef::Working),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, GitError::BinaryFile { .. }));
    }

    #[tokio::test]
    async fn test_diff_content_of_deleted_working_file_with_git() {
        let dir = repository_with_commit();
        std::fs::remove_file(dir.path().join("notes.txt")).unwrap();
        let facade = RepositoryFacade::open(Settings::default());

        let err = facade
            .diff_content(&content_request(
                dir.path(),
                "notes.txt",
                ContentPointer::Git("HEAD".into()),
                ContentPointer::Special(SpecialRef::Working),
            ))
            .await
            .unwrap_err();

        let envelope: OperationResult = err.into();
        assert_eq!(envelope.kind, Some(ErrorKind::NotFound));
    }
}
