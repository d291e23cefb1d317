//! User provisioning.
//!
//! [`ProvisioningService`] turns validated form data into remote operations: it creates users
//! (resolving duplicate emails to the existing user), looks users up, and registers patients by
//! uploading an optional identification document and then persisting the patient record.
//!
//! Every remote call is bounded by the configured request timeout. Logging carries ids only;
//! names, emails and phone numbers never reach the log.

use crate::backend::{DatabaseApi, IdentityApi, RemoteError, RemoteResult, StorageApi};
use crate::config::BackendConfig;
use crate::document::{IdentificationDocument, StoredDocument};
use crate::registration::{PatientRecord, PatientRegistration};
use crate::user::{Query, User, UserInput};
use crate::{IntakeError, IntakeResult};
use intake_uuid::UniqueId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Provisioning operations over explicitly supplied remote clients.
#[derive(Clone)]
pub struct ProvisioningService {
    cfg: Arc<BackendConfig>,
    identity: Arc<dyn IdentityApi>,
    storage: Arc<dyn StorageApi>,
    database: Arc<dyn DatabaseApi>,
}

impl ProvisioningService {
    pub fn new(
        cfg: Arc<BackendConfig>,
        identity: Arc<dyn IdentityApi>,
        storage: Arc<dyn StorageApi>,
        database: Arc<dyn DatabaseApi>,
    ) -> Self {
        Self {
            cfg,
            identity,
            storage,
            database,
        }
    }

    /// Build a service where one client serves all three APIs.
    pub fn with_backend<B>(cfg: Arc<BackendConfig>, backend: Arc<B>) -> Self
    where
        B: IdentityApi + StorageApi + DatabaseApi + 'static,
    {
        Self::new(cfg, backend.clone(), backend.clone(), backend)
    }

    pub fn config(&self) -> &BackendConfig {
        &self.cfg
    }

    /// Create a user from validated identity fields, or return the existing user with the
    /// same email.
    ///
    /// # Errors
    ///
    /// - [`IntakeError::ConflictUnresolved`] if the email is taken but the lookup finds nobody
    /// - [`IntakeError::Remote`] / [`IntakeError::Timeout`] for any other failure
    pub async fn create_user(&self, input: &UserInput) -> IntakeResult<User> {
        let user_id = UniqueId::new();

        let created = self
            .call(
                "create user",
                self.identity
                    .create(&user_id, &input.email, &input.phone, &input.name),
            )
            .await;

        match created {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "user created");
                Ok(user)
            }
            Err(IntakeError::Remote {
                source: RemoteError::Conflict(_),
                ..
            }) => {
                tracing::debug!("email already registered, looking up existing user");
                self.find_by_email(input).await
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to create user");
                Err(e)
            }
        }
    }

    async fn find_by_email(&self, input: &UserInput) -> IntakeResult<User> {
        let queries = [Query::equal("email", [input.email.to_string()])];
        let found = self
            .call("list users", self.identity.list(&queries))
            .await?;

        match found.users.into_iter().next() {
            Some(user) => {
                tracing::info!(user_id = %user.id, "resolved existing user");
                Ok(user)
            }
            None => {
                tracing::error!("email conflict reported but lookup returned no user");
                Err(IntakeError::ConflictUnresolved)
            }
        }
    }

    /// Fetch a user by id. `Ok(None)` means the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::InvalidId`] for a malformed id, and remote or timeout errors for
    /// failures other than not-found.
    pub async fn get_user(&self, user_id: &str) -> IntakeResult<Option<User>> {
        let user_id = UniqueId::parse(user_id)?;

        match self.call("get user", self.identity.get(user_id.as_str())).await {
            Ok(user) => Ok(Some(user)),
            Err(IntakeError::Remote {
                source: RemoteError::NotFound(_),
                ..
            }) => {
                tracing::debug!(user_id = %user_id, "user not found");
                Ok(None)
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "failed to get user");
                Err(e)
            }
        }
    }

    /// Register a patient.
    ///
    /// The identification document, if present, is uploaded first; the patient record is only
    /// written once the upload has succeeded, so it never references a missing file.
    ///
    /// # Errors
    ///
    /// Returns the upload or persist error. If the database refuses the record after an upload,
    /// the uploaded file is deleted before the persist error is returned; if that deletion also
    /// fails, [`IntakeError::CleanupAfterPersistFailed`] is returned with details of both errors.
    ///
    /// When an upload or persist call ends without a definite answer (timeout, transport or
    /// decode failure) the record may exist remotely, so the file is kept and
    /// [`IntakeError::DocumentPossiblyOrphaned`] names it for later reconciliation.
    pub async fn register_patient(
        &self,
        registration: PatientRegistration,
    ) -> IntakeResult<PatientRecord> {
        let stored = match &registration.identification.document {
            Some(document) => Some(self.upload_document(document).await?),
            None => None,
        };

        let persist_error = match self.persist_record(&registration, stored.as_ref()).await {
            Ok(record) => {
                tracing::info!(
                    user_id = %registration.user_id,
                    record_id = %record.id,
                    has_document = stored.is_some(),
                    "patient registered"
                );
                return Ok(record);
            }
            Err(e) => e,
        };

        tracing::error!(
            user_id = %registration.user_id,
            error = %persist_error,
            "failed to persist patient record"
        );

        let Some(document) = stored else {
            return Err(persist_error);
        };

        if !persist_error.is_rejection() {
            tracing::warn!(
                file_id = %document.id,
                "patient record outcome unknown, keeping uploaded document"
            );
            return Err(IntakeError::DocumentPossiblyOrphaned {
                file_id: document.id,
                source: Box::new(persist_error),
            });
        }

        match self
            .call(
                "delete document",
                self.storage.delete_file(self.cfg.bucket_id(), &document.id),
            )
            .await
        {
            Ok(()) => {
                tracing::warn!(file_id = %document.id, "removed orphaned document");
                Err(persist_error)
            }
            Err(cleanup_error) => {
                tracing::error!(
                    file_id = %document.id,
                    error = %cleanup_error,
                    "failed to remove orphaned document"
                );
                Err(IntakeError::CleanupAfterPersistFailed {
                    file_id: document.id,
                    persist_error: Box::new(persist_error),
                    cleanup_error: Box::new(cleanup_error),
                })
            }
        }
    }

    /// Upload a document. The time limit is one request timeout per chunk.
    async fn upload_document(&self, document: &IdentificationDocument) -> IntakeResult<StoredDocument> {
        let file_id = UniqueId::new();
        let chunks = u32::try_from(document.chunk_count()).unwrap_or(u32::MAX);
        let after = self.cfg.request_timeout().saturating_mul(chunks);

        let uploaded = self
            .call_within(
                "upload document",
                after,
                self.storage
                    .create_file(self.cfg.bucket_id(), &file_id, document),
            )
            .await;

        let file = match uploaded {
            Ok(file) => file,
            Err(e) if e.is_rejection() => return Err(e),
            Err(e) => {
                tracing::warn!(file_id = %file_id, "upload outcome unknown");
                return Err(IntakeError::DocumentPossiblyOrphaned {
                    file_id: file_id.to_string(),
                    source: Box::new(e),
                });
            }
        };

        tracing::info!(
            file_id = %file.id,
            media_type = document.media_type(),
            bytes = document.len(),
            "document uploaded"
        );

        Ok(StoredDocument {
            url: self.cfg.document_view_url(&file.id),
            id: file.id,
        })
    }

    async fn persist_record(
        &self,
        registration: &PatientRegistration,
        document: Option<&StoredDocument>,
    ) -> IntakeResult<PatientRecord> {
        let fields = registration.record_fields(document);
        let data = serde_json::to_value(&fields).map_err(|source| IntakeError::Encode {
            what: "patient record",
            source,
        })?;

        let record_id = UniqueId::new();
        let stored = self
            .call(
                "create patient record",
                self.database.create_document(
                    self.cfg.database_id(),
                    self.cfg.patient_collection_id(),
                    &record_id,
                    data,
                ),
            )
            .await?;

        // The record exists remotely from here on; take its id and keep the fields we sent.
        let id = stored
            .get("$id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(record_id.as_str())
            .to_string();

        Ok(PatientRecord { id, fields })
    }

    async fn call<T, F>(&self, operation: &'static str, fut: F) -> IntakeResult<T>
    where
        F: Future<Output = RemoteResult<T>>,
    {
        self.call_within(operation, self.cfg.request_timeout(), fut).await
    }

    async fn call_within<T, F>(
        &self,
        operation: &'static str,
        after: Duration,
        fut: F,
    ) -> IntakeResult<T>
    where
        F: Future<Output = RemoteResult<T>>,
    {
        match tokio::time::timeout(after, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(IntakeError::Remote { operation, source }),
            Err(_) => {
                tracing::warn!(operation, timeout_secs = after.as_secs(), "remote call timed out");
                Err(IntakeError::Timeout { operation, after })
            }
        }
    }
}
