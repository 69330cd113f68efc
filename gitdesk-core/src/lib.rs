pub mod branch;
pub mod content;
pub mod credentials;
pub mod diff;
pub mod envelope;
pub mod error;
pub mod log;
pub mod remote;
pub mod repository;
pub mod runner;
pub mod scripted;
pub mod settings;
pub mod status;

pub use branch::{BranchInfo, BranchPayload};
pub use content::{ContentPointer, DiffContent, DiffContentRequest, RefResolver, SpecialRef};
pub use credentials::Credentials;
pub use diff::{ChangedFilesPayload, ChangedFilesRequest, DiffPayload, NumstatEntry};
pub use envelope::{ErrorKind, OperationResult};
pub use error::{GitError, Result};
pub use log::{CommitDetail, CommitInfo, LogPayload, ModifiedFile};
pub use remote::{HeadState, PushTarget, RemoteSpec, RemoteSync, UpstreamPayload, DEFAULT_REMOTE_NAME};
pub use repository::{
    ConfigPayload, HistoryPayload, PrefixPayload, RepositoryFacade, ServerRootPayload, TopLevelPayload,
};
pub use runner::{CommandResult, Invocation, ProcessRunner, TokioRunner};
pub use settings::Settings;
pub use status::{StatusEntry, StatusPayload};
