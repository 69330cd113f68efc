use serde::{Deserialize, Serialize};

use crate::content::SpecialRef;
use crate::error::{GitError, Result};

pub const NUMSTAT_ARGS: [&str; 3] = ["diff", "--numstat", "-z"];

/// Line counts for one file of `git diff --numstat`. Binary files keep
/// git's `-` markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumstatEntry {
    pub insertions: String,
    pub deletions: String,
    pub filename: String,
}

impl NumstatEntry {
    pub fn is_binary(&self) -> bool {
        self.insertions == "-" && self.deletions == "-"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffPayload {
    pub result: Vec<NumstatEntry>,
}

/// Parses `git diff --numstat -z`. Renames are reported under their
/// destination path.
pub fn parse_numstat(output: &str) -> Vec<NumstatEntry> {
    let mut entries = Vec::new();
    let mut fields = output
        .split('\0')
        .map(|field| field.trim_start_matches('\n'))
        .filter(|field| !field.is_empty());

    while let Some(field) = fields.next() {
        let mut parts = field.splitn(3, '\t');
        let (Some(insertions), Some(deletions), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let filename = if path.is_empty() {
            let (Some(_from), Some(to)) = (fields.next(), fields.next()) else {
                break;
            };
            to
        } else {
            path
        };

        entries.push(NumstatEntry {
            insertions: insertions.to_string(),
            deletions: deletions.to_string(),
            filename: filename.to_string(),
        });
    }

    entries
}

/// Which pair of trees a changed-files request compares.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangedFilesRequest {
    /// `WORKING`, `INDEX` or any revision.
    pub base: Option<String>,
    pub remote: Option<String>,
    /// Compare one commit with its parents.
    pub single_commit: Option<String>,
}

impl ChangedFilesRequest {
    pub fn args(&self) -> Result<Vec<String>> {
        let mut args = vec!["diff".to_string()];

        match (&self.single_commit, &self.base, &self.remote) {
            (Some(commit), _, _) => args.push(format!("{commit}^!")),
            (None, Some(base), Some(remote)) => match base.parse::<SpecialRef>() {
                Ok(SpecialRef::Working) => args.push(remote.clone()),
                Ok(SpecialRef::Index) => args.extend(["--staged".to_string(), remote.clone()]),
                Err(_) => args.extend([base.clone(), remote.clone()]),
            },
            _ => {
                return Err(GitError::InvalidRequest(
                    "changed_files needs either single_commit or both base and remote".into(),
                ))
            }
        }

        args.extend(["--name-only".to_string(), "-z".to_string()]);
        Ok(args)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFilesPayload {
    pub files: Vec<String>,
}

pub fn parse_name_only(output: &str) -> Vec<String> {
    output
        .split('\0')
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}
