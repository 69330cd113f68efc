use serde::Serialize;

/// `--pretty` format consumed by [`parse_log`]: four lines per commit.
pub const LOG_FORMAT: &str = "--pretty=format:%H%n%an%n%ar%n%s";

const LINES_PER_COMMIT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub commit: String,
    pub author: String,
    /// Relative date as git prints it, e.g. "3 days ago".
    pub date: String,
    pub commit_msg: String,
    /// Sha of the next commit in the listing (its parent in linear
    /// history), empty for the last one.
    pub pre_commit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogPayload {
    pub commits: Vec<CommitInfo>,
}

/// Arguments for the last `count` commits.
pub fn log_args(count: usize) -> Vec<String> {
    vec!["log".to_string(), LOG_FORMAT.to_string(), format!("-{count}")]
}

/// Parses [`LOG_FORMAT`] output. A trailing incomplete group is dropped.
pub fn parse_log(output: &str) -> Vec<CommitInfo> {
    let lines: Vec<&str> = output.lines().collect();

    lines
        .chunks(LINES_PER_COMMIT)
        .enumerate()
        .filter(|(_, chunk)| chunk.len() == LINES_PER_COMMIT)
        .map(|(i, chunk)| CommitInfo {
            commit: chunk[0].to_string(),
            author: chunk[1].to_string(),
            date: chunk[2].to_string(),
            commit_msg: chunk[3].to_string(),
            pre_commit: lines
                .get((i + 1) * LINES_PER_COMMIT)
                .map(|sha| sha.to_string())
                .unwrap_or_default(),
        })
        .collect()
}

/// Per-file numbers for one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedFile {
    pub modified_file_path: String,
    pub modified_file_name: String,
    pub insertion: u64,
    pub deletion: u64,
    pub is_binary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitDetail {
    pub modified_file_note: String,
    pub modified_files_count: usize,
    pub number_of_insertions: u64,
    pub number_of_deletions: u64,
    pub modified_files: Vec<ModifiedFile>,
}

pub fn detailed_log_args(sha: &str) -> Vec<String> {
    ["log", "-1", "--numstat", "--oneline", "-z", sha]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Parses `git log -1 --numstat --oneline -z <sha>`.
///
/// The first field holds the one-line header, possibly followed on the next
/// line by the first numstat record. A record with an empty path is a rename
/// whose source and destination are the next two fields. Binary files report
/// `-` counts, taken as zero.
pub fn parse_detailed_log(output: &str) -> CommitDetail {
    let mut fields = output.split('\0');
    let header = fields.next().unwrap_or_default();
    let mut records = header
        .lines()
        .skip(1)
        .chain(fields)
        .map(|field| field.trim_start_matches('\n'))
        .filter(|field| !field.is_empty());

    let mut files = Vec::new();
    while let Some(record) = records.next() {
        let mut parts = record.splitn(3, '\t');
        let (Some(insertion), Some(deletion), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };

        let is_binary = insertion == "-" && deletion == "-";
        let (modified_file_path, modified_file_name) = if path.is_empty() {
            let (Some(from), Some(to)) = (records.next(), records.next()) else {
                break;
            };
            (to.to_string(), format!("{from} => {to}"))
        } else {
            let name = path.rsplit('/').next().unwrap_or(path);
            (path.to_string(), name.to_string())
        };

        files.push(ModifiedFile {
            modified_file_path,
            modified_file_name,
            insertion: insertion.parse().unwrap_or(0),
            deletion: deletion.parse().unwrap_or(0),
            is_binary,
        });
    }

    let number_of_insertions: u64 = files.iter().map(|f| f.insertion).sum();
    let number_of_deletions: u64 = files.iter().map(|f| f.deletion).sum();
    CommitDetail {
        modified_file_note: format!(
            "{} files changed, {} insertions(+), {} deletions(-)",
            files.len(),
            number_of_insertions,
            number_of_deletions
        ),
        modified_files_count: files.len(),
        number_of_insertions,
        number_of_deletions,
        modified_files: files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_log_links_previous_commit() {
        let output = "aaa\nAlice\n2 days ago\nSecond\nbbb\nBob\n3 days ago\nFirst";
        let commits = parse_log(output);

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].commit, "aaa");
        assert_eq!(commits[0].author, "Alice");
        assert_eq!(commits[0].date, "2 days ago");
        assert_eq!(commits[0].commit_msg, "Second");
        assert_eq!(commits[0].pre_commit, "bbb");
        assert_eq!(commits[1].pre_commit, "");
    }

    #[test]
    fn test_parse_log_drops_incomplete_group() {
        let commits = parse_log("aaa\nAlice\n2 days ago\nSecond\nbbb\nBob\n");
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].pre_commit, "bbb");
        assert!(parse_log("").is_empty());
    }

    #[test]
    fn test_log_args() {
        assert_eq!(log_args(25), vec!["log", LOG_FORMAT, "-25"]);
    }

    fn modified(path: &str, name: &str, insertion: u64, deletion: u64, is_binary: bool) -> ModifiedFile {
        ModifiedFile {
            modified_file_path: path.into(),
            modified_file_name: name.into(),
            insertion,
            deletion,
            is_binary,
        }
    }

    #[test]
    fn test_parse_detailed_log() {
        let output = [
            "f29660a (HEAD, origin/feature) Commit message",
            "10\t3\tnotebook_without_spaces.ipynb",
            "11\t4\tNotebook with spaces.ipynb",
            "12\t5\tpath/notebook_without_spaces.ipynb",
            "13\t6\tpath/Notebook with spaces.ipynb",
            "14\t1\tpath/Notebook with λ.ipynb",
            "0\t0\t",
            "folder1/file with spaces and λ.py",
            "folder2/file with spaces.py",
            "-\t-\tbinary_file.png",
        ]
        .join("\0")
            + "\0";

        let detail = parse_detailed_log(&output);

        assert_eq!(detail.modified_file_note, "7 files changed, 60 insertions(+), 19 deletions(-)");
        assert_eq!(detail.modified_files_count, 7);
        assert_eq!(detail.number_of_insertions, 60);
        assert_eq!(detail.number_of_deletions, 19);
        assert_eq!(
            detail.modified_files,
            vec![
                modified("notebook_without_spaces.ipynb", "notebook_without_spaces.ipynb", 10, 3, false),
                modified("Notebook with spaces.ipynb", "Notebook with spaces.ipynb", 11, 4, false),
                modified("path/notebook_without_spaces.ipynb", "notebook_without_spaces.ipynb", 12, 5, false),
                modified("path/Notebook with spaces.ipynb", "Notebook with spaces.ipynb", 13, 6, false),
                modified("path/Notebook with λ.ipynb", "Notebook with λ.ipynb", 14, 1, false),
                modified(
                    "folder2/file with spaces.py",
                    "folder1/file with spaces and λ.py => folder2/file with spaces.py",
                    0,
                    0,
                    false
                ),
                modified("binary_file.png", "binary_file.png", 0, 0, true),
            ]
        );
    }

    #[test]
    fn test_parse_detailed_log_record_on_header_line() {
        let output = "f29660a Commit message\n\n3\t1\tsrc/main.rs\0";
        let detail = parse_detailed_log(output);
        assert_eq!(detail.modified_files, vec![modified("src/main.rs", "main.rs", 3, 1, false)]);
    }
}
