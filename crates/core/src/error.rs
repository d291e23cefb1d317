use crate::backend::RemoteError;
use crate::validation::ValidationErrors;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid id: {0}")]
    InvalidId(#[from] intake_uuid::IdError),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("{operation} failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: RemoteError,
    },
    #[error("{operation} timed out after {}s", after.as_secs_f32())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("email already registered but no matching user was returned by lookup")]
    ConflictUnresolved,
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(
        "persisting patient failed and removing uploaded file {file_id} also failed: persist={persist_error}; cleanup={cleanup_error}"
    )]
    CleanupAfterPersistFailed {
        file_id: String,
        #[source]
        persist_error: Box<IntakeError>,
        cleanup_error: Box<IntakeError>,
    },
    #[error("uploaded file {file_id} may be orphaned: {source}")]
    DocumentPossiblyOrphaned {
        file_id: String,
        #[source]
        source: Box<IntakeError>,
    },
}

impl IntakeError {
    /// True when the failure came from the remote service or the network rather than the
    /// caller's input.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            IntakeError::Remote { .. }
                | IntakeError::ConflictUnresolved
                | IntakeError::Decode { .. }
                | IntakeError::CleanupAfterPersistFailed { .. }
                | IntakeError::DocumentPossiblyOrphaned { .. }
        )
    }

    /// True when nothing was written remotely: the request was refused or never sent.
    /// Timeouts and transport failures are not rejections; the remote may have applied them.
    pub fn is_rejection(&self) -> bool {
        match self {
            IntakeError::Remote { source, .. } => source.is_rejection(),
            IntakeError::InvalidConfig(_)
            | IntakeError::InvalidId(_)
            | IntakeError::Validation(_)
            | IntakeError::Encode { .. } => true,
            _ => false,
        }
    }

    /// True when the failure, or the failure it wraps, is a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            IntakeError::Timeout { .. } => true,
            IntakeError::DocumentPossiblyOrphaned { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

pub type IntakeResult<T> = std::result::Result<T, IntakeError>;
