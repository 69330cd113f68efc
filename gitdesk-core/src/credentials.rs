//! Per-call credentials for network operations.
//!
//! Credentials reach git only through the child's environment and an inline
//! credential helper that reads it. They are never put in argv, never
//! serialized and never written to logs.

use serde::Deserialize;
use std::fmt;

use crate::runner::Invocation;

pub const ENV_USERNAME: &str = "GITDESK_USERNAME";
pub const ENV_PASSWORD: &str = "GITDESK_PASSWORD";

/// Answers `get` requests from the two variables above and nothing else.
const CREDENTIAL_HELPER: &str = "!f() { test \"$1\" = get || exit 0; \
echo \"username=${GITDESK_USERNAME}\"; echo \"password=${GITDESK_PASSWORD}\"; }; f";

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Adds the helper options and the credential variables to an
    /// invocation. Must be applied before the git subcommand is appended,
    /// since `-c` options only work ahead of it.
    pub(crate) fn apply(&self, invocation: Invocation) -> Invocation {
        invocation
            .args(["-c", "credential.helper="])
            .args(["-c".to_string(), format!("credential.helper={CREDENTIAL_HELPER}")])
            .env(ENV_USERNAME, self.username.as_str())
            .env(ENV_PASSWORD, self.password.as_str())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
