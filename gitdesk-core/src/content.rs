//! File content on both sides of a diff.
//!
//! Each side is named by a [`ContentPointer`]: either a git revision or one
//! of the two special locations, the working tree and the index. The two
//! sides are resolved concurrently and independently of each other.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{GitError, Result};
use crate::runner::{Invocation, ProcessRunner};
use crate::settings::Settings;

/// Sha of the tree with no entries. Diffing against it yields the full
/// line counts of a file, or `-\t-` if git considers it binary.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SpecialRef {
    Working,
    Index,
}

impl SpecialRef {
    pub fn as_str(self) -> &'static str {
        match self {
            SpecialRef::Working => "WORKING",
            SpecialRef::Index => "INDEX",
        }
    }
}

impl FromStr for SpecialRef {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "WORKING" => Ok(SpecialRef::Working),
            "INDEX" => Ok(SpecialRef::Index),
            other => Err(GitError::UnknownSpecialRef(other.to_string())),
        }
    }
}

impl TryFrom<String> for SpecialRef {
    type Error = GitError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SpecialRef> for &'static str {
    fn from(special: SpecialRef) -> Self {
        special.as_str()
    }
}

/// One side of a diff: `{"git": "<rev>"}` or `{"special": "WORKING"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentPointer {
    Git(String),
    Special(SpecialRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiffContentRequest {
    pub filename: String,
    #[serde(alias = "prev_ref")]
    pub previous: ContentPointer,
    #[serde(alias = "curr_ref")]
    pub current: ContentPointer,
    #[serde(alias = "top_repo_path")]
    pub repository_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffContent {
    pub prev_content: String,
    pub curr_content: String,
}

/// Resolves [`ContentPointer`]s to file content.
pub struct RefResolver<'a, R> {
    runner: &'a R,
    settings: &'a Settings,
}

impl<'a, R: ProcessRunner> RefResolver<'a, R> {
    pub fn new(runner: &'a R, settings: &'a Settings) -> Self {
        RefResolver { runner, settings }
    }

    /// Content of `request.filename` on both sides. A side where the file
    /// does not exist at the given revision or in the index is empty; a
    /// missing working-tree file is [`GitError::NotFound`].
    pub async fn resolve(&self, request: &DiffContentRequest) -> Result<DiffContent> {
        let root = self.settings.resolve(&request.repository_root);
        let (prev_content, curr_content) = tokio::try_join!(
            self.content(&root, &request.filename, &request.previous),
            self.content(&root, &request.filename, &request.current),
        )?;

        Ok(DiffContent {
            prev_content,
            curr_content,
        })
    }

    async fn content(&self, root: &Path, filename: &str, pointer: &ContentPointer) -> Result<String> {
        self.ensure_text(root, filename, pointer).await?;

        match pointer {
            ContentPointer::Git(rev) => self.show(root, filename, rev).await,
            ContentPointer::Special(SpecialRef::Index) => self.show(root, filename, "").await,
            ContentPointer::Special(SpecialRef::Working) => read_working(root, filename).await,
        }
    }

    async fn ensure_text(&self, root: &Path, filename: &str, pointer: &ContentPointer) -> Result<()> {
        let invocation = numstat_invocation(self.settings.git(root), filename, pointer);
        let result = self.runner.run(&invocation).await?;

        if !result.is_success() {
            let rev = match pointer {
                ContentPointer::Git(rev) => rev.as_str(),
                ContentPointer::Special(_) => "",
            };
            if is_absent(&result.stderr, filename, rev) {
                return Ok(());
            }
            return Err(GitError::tool(&result, &invocation));
        }

        if result.stdout.starts_with("-\t-\t") {
            warn!(filename, "refusing to return binary content");
            return Err(GitError::BinaryFile {
                filename: filename.to_string(),
            });
        }
        Ok(())
    }

    async fn show(&self, root: &Path, filename: &str, rev: &str) -> Result<String> {
        let invocation = self.settings.git(root).args(["show".to_string(), format!("{rev}:{filename}")]);
        let result = self.runner.run(&invocation).await?;

        if result.is_success() {
            return Ok(result.stdout);
        }
        if is_absent(&result.stderr, filename, rev) {
            debug!(filename, rev, "file absent at revision");
            return Ok(String::new());
        }
        Err(GitError::tool(&result, &invocation))
    }
}

fn numstat_invocation(invocation: Invocation, filename: &str, pointer: &ContentPointer) -> Invocation {
    let invocation = invocation.args(["diff", "--numstat"]);
    let invocation = match pointer {
        ContentPointer::Git(rev) => invocation.args([EMPTY_TREE, rev.as_str()]),
        ContentPointer::Special(SpecialRef::Index) => invocation.args(["--cached", EMPTY_TREE]),
        ContentPointer::Special(SpecialRef::Working) => invocation.arg(EMPTY_TREE),
    };
    invocation.args(["--", filename])
}

/// Whether git failed only because the file does not exist on that side.
fn is_absent(stderr: &str, filename: &str, rev: &str) -> bool {
    let stderr = stderr.to_lowercase();
    let path = format!("path '{}'", filename.to_lowercase());
    let rev = rev.to_lowercase();

    [
        format!("{path} does not exist (neither on disk nor in the index)"),
        format!("{path} does not exist in '{rev}'"),
        format!("{path} exists on disk, but not in '{rev}'"),
        format!("{path} exists on disk, but not in the index"),
    ]
    .iter()
    .any(|phrase| stderr.contains(phrase.as_str()))
}

async fn read_working(root: &Path, filename: &str) -> Result<String> {
    let path = root.join(filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => String::from_utf8(bytes).map_err(|_| GitError::BinaryFile {
            filename: filename.to_string(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(GitError::NotFound { path }),
        Err(e) => Err(e.into()),
    }
}
