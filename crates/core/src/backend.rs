//! Remote API seams.
//!
//! The provisioning service talks to three remote APIs: identity (users), storage (files) and
//! database (structured records). Each is a trait so the service can be handed an HTTP client
//! in production and [`crate::memory::InMemoryBackend`] in tests.

use crate::document::{IdentificationDocument, StoredFile};
use crate::user::{Query, User, UserList};
use async_trait::async_trait;
use intake_types::{EmailAddress, NonEmptyText, PhoneNumber};
use intake_uuid::UniqueId;

/// Failure reported by a remote API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The resource already exists (HTTP 409).
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Any other non-success response.
    #[error("service returned {code}: {message}")]
    Service { code: u16, message: String },
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The response arrived but could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    /// The service answered and refused the request, so nothing was written. Transport and
    /// decode failures leave the outcome unknown.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RemoteError::Conflict(_) | RemoteError::NotFound(_) | RemoteError::Service { .. }
        )
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Create a user without a password. A duplicate email is [`RemoteError::Conflict`].
    async fn create(
        &self,
        id: &UniqueId,
        email: &EmailAddress,
        phone: &PhoneNumber,
        name: &NonEmptyText,
    ) -> RemoteResult<User>;

    async fn list(&self, queries: &[Query]) -> RemoteResult<UserList>;

    async fn get(&self, user_id: &str) -> RemoteResult<User>;
}

#[async_trait]
pub trait StorageApi: Send + Sync {
    async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &UniqueId,
        document: &IdentificationDocument,
    ) -> RemoteResult<StoredFile>;

    async fn delete_file(&self, bucket_id: &str, file_id: &str) -> RemoteResult<()>;
}

#[async_trait]
pub trait DatabaseApi: Send + Sync {
    /// Create a document and return it as the service stored it.
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &UniqueId,
        data: serde_json::Value,
    ) -> RemoteResult<serde_json::Value>;
}
