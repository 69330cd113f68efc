use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{GitError, Result};
use crate::runner::Invocation;

/// Overrides the git binary.
pub const ENV_GIT_BIN: &str = "GITDESK_GIT_BIN";
/// Overrides the directory relative repository paths are resolved against.
pub const ENV_ROOT_DIR: &str = "GITDESK_ROOT_DIR";

pub const DEFAULT_HISTORY_COUNT: usize = 25;

/// Facade settings. Immutable once the facade is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Program used for every invocation.
    pub git_binary: PathBuf,
    /// Base directory for relative repository paths. When unset, relative
    /// paths are used as given.
    pub root_dir: Option<PathBuf>,
    /// Number of commits returned by `log` when the caller gives none.
    pub history_count: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            git_binary: PathBuf::from("git"),
            root_dir: None,
            history_count: DEFAULT_HISTORY_COUNT,
        }
    }
}

impl Settings {
    /// Reads settings from a TOML file, then applies environment overrides.
    /// Defaults are used only when no file is named.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::read(path)?,
            None => Settings::default(),
        };
        settings.with_env_overrides(|key| std::env::var(key).ok())
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GitError::Settings(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| GitError::Settings(e.to_string()))
    }

    /// Applies `GITDESK_*` overrides using `lookup` to read variables.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(binary) = lookup(ENV_GIT_BIN) {
            if binary.trim().is_empty() {
                return Err(GitError::Settings(format!(
                    "{ENV_GIT_BIN} is set but empty. Provide a valid git binary path or unset it."
                )));
            }
            self.git_binary = PathBuf::from(binary);
        }
        if let Some(root) = lookup(ENV_ROOT_DIR).filter(|root| !root.trim().is_empty()) {
            self.root_dir = Some(PathBuf::from(root));
        }
        Ok(self)
    }

    /// Resolves a caller-supplied repository path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root_dir {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// A git invocation running in `cwd`, before any arguments.
    pub fn git(&self, cwd: &Path) -> Invocation {
        Invocation::new(self.git_binary.to_string_lossy(), cwd)
    }
}
