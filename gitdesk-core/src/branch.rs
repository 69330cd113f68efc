use serde::Serialize;

/// Local branches: name, tip, upstream and the `*` marker for HEAD.
pub const HEADS_FORMAT: &str =
    "--format=%(refname:short)%09%(objectname)%09%(upstream:short)%09%(HEAD)";
/// Remote-tracking branches: name and tip.
pub const REMOTES_FORMAT: &str = "--format=%(refname:short)%09%(objectname)";

pub const HEADS_ARGS: [&str; 3] = ["for-each-ref", HEADS_FORMAT, "refs/heads/"];
pub const REMOTES_ARGS: [&str; 3] = ["for-each-ref", REMOTES_FORMAT, "refs/remotes/"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchInfo {
    pub name: String,
    pub is_current_branch: bool,
    pub is_remote_branch: bool,
    pub upstream: Option<String>,
    /// `None` only for the current branch of a repository without commits.
    pub top_commit: Option<String>,
    pub tag: Option<String>,
}

/// Branch listing. Local branches come first in git's order, followed by
/// remote-tracking branches in git's order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchPayload {
    pub branches: Vec<BranchInfo>,
    pub current_branch: Option<BranchInfo>,
}

impl BranchPayload {
    /// Builds the listing. When no local branch is marked current (a
    /// repository without commits, or a detached HEAD) the `fallback`
    /// entry is placed first and reported as current.
    pub fn assemble(
        mut heads: Vec<BranchInfo>,
        remotes: Vec<BranchInfo>,
        fallback: Option<BranchInfo>,
    ) -> Self {
        let mut current_branch = heads.iter().find(|b| b.is_current_branch).cloned();
        if current_branch.is_none() {
            if let Some(fallback) = fallback {
                heads.insert(0, fallback.clone());
                current_branch = Some(fallback);
            }
        }

        heads.extend(remotes);
        BranchPayload {
            branches: heads,
            current_branch,
        }
    }
}

/// Parses [`HEADS_FORMAT`] lines. Lines without exactly four fields are
/// skipped.
pub fn parse_heads(output: &str) -> Vec<BranchInfo> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
            let [name, top_commit, upstream, head] = fields.as_slice() else {
                return None;
            };
            if name.is_empty() {
                return None;
            }
            Some(BranchInfo {
                name: name.to_string(),
                is_current_branch: head.trim() == "*",
                is_remote_branch: false,
                upstream: Some(upstream.to_string()).filter(|u| !u.is_empty()),
                top_commit: Some(top_commit.to_string()),
                tag: None,
            })
        })
        .collect()
}

/// Parses [`REMOTES_FORMAT`] lines. Lines without exactly two fields are
/// skipped.
pub fn parse_remotes(output: &str) -> Vec<BranchInfo> {
    output
        .lines()
        .filter_map(|line| {
            let (name, top_commit) = line.trim_end_matches('\r').split_once('\t')?;
            if name.is_empty() || top_commit.contains('\t') {
                return None;
            }
            Some(BranchInfo {
                name: name.to_string(),
                is_current_branch: false,
                is_remote_branch: true,
                upstream: None,
                top_commit: Some(top_commit.to_string()),
                tag: None,
            })
        })
        .collect()
}

/// Whether `git describe` failed only because nothing can describe HEAD.
pub fn is_missing_tag(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("no names found") || stderr.contains("no tags can describe")
}
