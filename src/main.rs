use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gitdesk_core::{
    ChangedFilesRequest, ContentPointer, Credentials, DiffContentRequest, OperationResult, RemoteSpec,
    RepositoryFacade, Settings, SpecialRef, DEFAULT_REMOTE_NAME,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gitdesk")]
#[command(about = "Run git operations and print normalized JSON results", long_about = None)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true, env = "GITDESK_CONFIG")]
    config: Option<PathBuf>,

    /// git binary to run
    #[arg(long, global = true)]
    git_bin: Option<PathBuf>,

    /// Directory relative repository paths are resolved against
    #[arg(long, global = true)]
    root_dir: Option<PathBuf>,

    /// Username for network operations
    #[arg(long, global = true, env = "GITDESK_USERNAME", requires = "password")]
    username: Option<String>,

    /// Password or token for network operations
    #[arg(long, global = true, env = "GITDESK_PASSWORD", hide_env_values = true, requires = "username")]
    password: Option<String>,

    /// More logging on stderr (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// clap only lets both halves through together.
    fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials::new(username.as_str(), password.as_str())),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new repository
    Init {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Clone a repository into a new directory under PATH
    Clone {
        url: String,
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Show the top-level directory of the repository
    ShowTopLevel {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Show the path of PATH inside its repository
    ShowPrefix {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Show working tree status
    Status {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Show recent commits
    Log {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Number of commits (defaults to the configured history count)
        #[arg(short, long)]
        count: Option<usize>,
    },
    /// Show files changed by one commit
    DetailedLog {
        sha: String,
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// List branches
    Branch {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Top level, branches, log and status at once
    AllHistory {
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(short, long)]
        count: Option<usize>,
    },
    /// Line counts of unstaged changes
    Diff {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Names of files changed between two trees or by one commit
    ChangedFiles {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// WORKING, INDEX or a revision
        #[arg(long)]
        base: Option<String>,
        #[arg(long)]
        remote: Option<String>,
        #[arg(long)]
        single_commit: Option<String>,
    },
    /// Stage changes
    Add {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// File to stage
        #[arg(short, long)]
        file: Option<String>,
        /// Tracked files only
        #[arg(long, conflicts_with = "file")]
        unstaged: bool,
        /// Untracked files only
        #[arg(long, conflicts_with_all = ["file", "unstaged"])]
        untracked: bool,
    },
    /// Unstage changes
    Reset {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// File to unstage (all files when omitted)
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Revert a commit's changes without committing
    DeleteCommit {
        commit: String,
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Hard reset to a commit
    ResetToCommit {
        commit: String,
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Switch branches or discard file changes
    Checkout {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Branch to switch to
        #[arg(short, long)]
        branch: Option<String>,
        /// Create the branch first
        #[arg(long, requires = "branch")]
        new: bool,
        /// Start point for a new branch
        #[arg(long, default_value = "HEAD")]
        start_point: String,
        /// File to restore (all files when neither branch nor file is given)
        #[arg(short, long, conflicts_with = "branch")]
        file: Option<String>,
    },
    /// Create a commit from the index
    Commit {
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(short, long)]
        message: String,
    },
    /// Show the upstream of the current branch
    Upstream {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Push the current branch (to its upstream unless a remote is given)
    Push {
        #[arg(default_value = ".")]
        path: PathBuf,
        #[arg(long, requires = "refspec")]
        remote: Option<String>,
        #[arg(long, requires = "remote")]
        refspec: Option<String>,
    },
    /// Pull into the current branch
    Pull {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Abort the merge if the pull stops on conflicts
        #[arg(long)]
        cancel_on_conflict: bool,
    },
    /// Manage remotes
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },
    /// Read or set user.name and user.email
    Config {
        #[arg(default_value = ".")]
        path: PathBuf,
        /// KEY=VALUE to set (reads when omitted)
        #[arg(long = "set", value_parser = parse_option)]
        options: Vec<(String, String)>,
    },
    /// File content on both sides of a diff
    DiffContent {
        filename: String,
        #[arg(default_value = ".")]
        path: PathBuf,
        /// WORKING, INDEX or a revision
        #[arg(long, default_value = "HEAD")]
        previous: String,
        /// WORKING, INDEX or a revision
        #[arg(long, default_value = "WORKING")]
        current: String,
    },
    /// Show the directory relative paths are resolved against
    ServerRoot,
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// Add a remote
    Add {
        url: String,
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Remote name
        #[arg(long, default_value = DEFAULT_REMOTE_NAME)]
        name: String,
    },
}

fn parse_option(value: &str) -> std::result::Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{value}'"))
}

fn pointer(value: &str) -> ContentPointer {
    value
        .parse::<SpecialRef>()
        .map(ContentPointer::Special)
        .unwrap_or_else(|_| ContentPointer::Git(value.to_string()))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "gitdesk=info,gitdesk_core=info",
        1 => "gitdesk=debug,gitdesk_core=debug",
        _ => "gitdesk=trace,gitdesk_core=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints the envelope as JSON on stdout and returns its code.
fn emit<T: Serialize>(result: gitdesk_core::Result<OperationResult<T>>) -> Result<i32> {
    let envelope = result.unwrap_or_else(OperationResult::from);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(envelope.code)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let credentials = cli.credentials();

    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(git_bin) = cli.git_bin {
        settings.git_binary = git_bin;
    }
    if let Some(root_dir) = cli.root_dir {
        settings.root_dir = Some(root_dir);
    }
    tracing::debug!(?settings, "settings loaded");

    let credentials = credentials.as_ref();
    let repo = RepositoryFacade::open(settings);

    let code = match cli.command {
        Commands::Init { path } => emit(repo.init(&path).await)?,
        Commands::Clone { url, path } => emit(repo.clone(&path, &url, credentials).await)?,
        Commands::ShowTopLevel { path } => emit(repo.show_top_level(&path).await)?,
        Commands::ShowPrefix { path } => emit(repo.show_prefix(&path).await)?,
        Commands::Status { path } => emit(repo.status(&path).await)?,
        Commands::Log { path, count } => emit(repo.log(&path, count).await)?,
        Commands::DetailedLog { sha, path } => emit(repo.detailed_log(&path, &sha).await)?,
        Commands::Branch { path } => emit(repo.branch(&path).await)?,
        Commands::AllHistory { path, count } => emit(repo.all_history(&path, count).await)?,
        Commands::Diff { path } => emit(repo.diff(&path).await)?,
        Commands::ChangedFiles {
            path,
            base,
            remote,
            single_commit,
        } => {
            let request = ChangedFilesRequest {
                base,
                remote,
                single_commit,
            };
            emit(repo.changed_files(&path, &request).await)?
        }
        Commands::Add {
            path,
            file,
            unstaged,
            untracked,
        } => match file {
            Some(file) => emit(repo.add(&path, &file).await)?,
            None if unstaged => emit(repo.add_all_unstaged(&path).await)?,
            None if untracked => emit(repo.add_all_untracked(&path).await)?,
            None => emit(repo.add_all(&path).await)?,
        },
        Commands::Reset { path, file } => match file {
            Some(file) => emit(repo.reset(&path, &file).await)?,
            None => emit(repo.reset_all(&path).await)?,
        },
        Commands::DeleteCommit { commit, path } => emit(repo.delete_commit(&path, &commit).await)?,
        Commands::ResetToCommit { commit, path } => emit(repo.reset_to_commit(&path, &commit).await)?,
        Commands::Checkout {
            path,
            branch,
            new,
            start_point,
            file,
        } => match (branch, file) {
            (Some(branch), _) if new => emit(repo.checkout_new_branch(&path, &branch, &start_point).await)?,
            (Some(branch), _) => emit(repo.checkout_branch(&path, &branch).await)?,
            (None, Some(file)) => emit(repo.checkout(&path, &file).await)?,
            (None, None) => emit(repo.checkout_all(&path).await)?,
        },
        Commands::Commit { path, message } => emit(repo.commit(&path, &message).await)?,
        Commands::Upstream { path } => emit(repo.upstream(&path).await)?,
        Commands::Push { path, remote, refspec } => match (remote, refspec) {
            (Some(remote), Some(refspec)) => emit(repo.push(&path, &remote, &refspec, credentials).await)?,
            _ => emit(repo.push_to_upstream(&path, credentials).await)?,
        },
        Commands::Pull {
            path,
            cancel_on_conflict,
        } => emit(repo.pull(&path, credentials, cancel_on_conflict).await)?,
        Commands::Remote { command } => match command {
            RemoteCommands::Add { url, path, name } => {
                emit(repo.remote_add(&path, &RemoteSpec::new(url).named(name)).await)?
            }
        },
        Commands::Config { path, options } => {
            let options: BTreeMap<String, String> = options.into_iter().collect();
            emit(repo.config(&path, &options).await)?
        }
        Commands::DiffContent {
            filename,
            path,
            previous,
            current,
        } => {
            let request = DiffContentRequest {
                filename,
                previous: pointer(&previous),
                current: pointer(&current),
                repository_root: path,
            };
            emit(repo.diff_content(&request).await)?
        }
        Commands::ServerRoot => emit(Ok(repo.server_root()))?,
    };

    Ok(if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
