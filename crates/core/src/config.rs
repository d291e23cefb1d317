//! Backend configuration.
//!
//! Configuration is resolved once at process startup and then passed into the provisioning
//! service. Nothing in the core reads process-wide environment variables during request
//! handling; binaries hand [`BackendConfig::from_lookup`] a closure over `std::env::var`, tests
//! hand it a map.

use crate::constants::{
    DEFAULT_REQUEST_TIMEOUT_SECS, ENV_BACKEND, ENV_BUCKET_ID, ENV_DATABASE_ID, ENV_ENDPOINT,
    ENV_PATIENT_COLLECTION_ID, ENV_PROJECT_ID, ENV_REQUEST_TIMEOUT_SECS,
};
use crate::{IntakeError, IntakeResult};
use intake_types::NonEmptyText;
use std::time::Duration;
use url::Url;

/// Identifiers for the hosted backend, resolved at startup.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    endpoint: Url,
    project_id: NonEmptyText,
    database_id: NonEmptyText,
    patient_collection_id: NonEmptyText,
    bucket_id: NonEmptyText,
    request_timeout: Duration,
}

impl BackendConfig {
    /// Create a new `BackendConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`IntakeError::InvalidConfig`] if the endpoint is not an `http`/`https` URL, any
    /// identifier is blank, or the timeout is zero.
    pub fn new(
        endpoint: &str,
        project_id: &str,
        database_id: &str,
        patient_collection_id: &str,
        bucket_id: &str,
        request_timeout: Duration,
    ) -> IntakeResult<Self> {
        let endpoint = Url::parse(endpoint.trim())
            .map_err(|e| IntakeError::InvalidConfig(format!("endpoint is not a URL: {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(IntakeError::InvalidConfig(
                "endpoint must use http or https".into(),
            ));
        }

        if request_timeout.is_zero() {
            return Err(IntakeError::InvalidConfig(
                "request timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            endpoint,
            project_id: required("project_id", project_id)?,
            database_id: required("database_id", database_id)?,
            patient_collection_id: required("patient_collection_id", patient_collection_id)?,
            bucket_id: required("bucket_id", bucket_id)?,
            request_timeout,
        })
    }

    /// Resolve configuration through `lookup`, which maps a variable name to its value.
    ///
    /// Required: the endpoint, project, database, patient collection and bucket variables from
    /// [`crate::constants`]. Optional: the request timeout in whole seconds.
    pub fn from_lookup<F>(lookup: F) -> IntakeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| IntakeError::InvalidConfig(format!("{key} is not set")))
        };

        let request_timeout = request_timeout_from_env_value(lookup(ENV_REQUEST_TIMEOUT_SECS))?;

        Self::new(
            &get(ENV_ENDPOINT)?,
            &get(ENV_PROJECT_ID)?,
            &get(ENV_DATABASE_ID)?,
            &get(ENV_PATIENT_COLLECTION_ID)?,
            &get(ENV_BUCKET_ID)?,
            request_timeout,
        )
    }

    /// Placeholder identifiers for running against the in-memory backend.
    pub fn local(request_timeout: Duration) -> IntakeResult<Self> {
        Self::new(
            "http://localhost/v1",
            "local",
            "intake",
            "patients",
            "identification-documents",
            request_timeout,
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Endpoint without a trailing slash, ready for path concatenation.
    pub fn endpoint_base(&self) -> &str {
        self.endpoint.as_str().trim_end_matches('/')
    }

    pub fn project_id(&self) -> &str {
        self.project_id.as_str()
    }

    pub fn database_id(&self) -> &str {
        self.database_id.as_str()
    }

    pub fn patient_collection_id(&self) -> &str {
        self.patient_collection_id.as_str()
    }

    pub fn bucket_id(&self) -> &str {
        self.bucket_id.as_str()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Public view URL for a stored file.
    ///
    /// `{endpoint}/storage/buckets/{bucketId}/files/{fileId}/view?project={projectId}`. Anyone
    /// holding the URL can view the file when the bucket permits it.
    pub fn document_view_url(&self, file_id: &str) -> String {
        format!(
            "{}/storage/buckets/{}/files/{}/view?project={}",
            self.endpoint_base(),
            self.bucket_id,
            file_id,
            self.project_id
        )
    }
}

fn required(name: &str, value: &str) -> IntakeResult<NonEmptyText> {
    NonEmptyText::new(value)
        .map_err(|_| IntakeError::InvalidConfig(format!("{name} cannot be empty")))
}

/// Which remote backend the binaries talk to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// The hosted Appwrite-compatible REST API.
    Appwrite,
    /// Process-local store, for development without network access.
    Memory,
}

/// Parse the backend kind from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`BackendKind::Appwrite`].
pub fn backend_kind_from_env_value(value: Option<String>) -> IntakeResult<BackendKind> {
    let value = value
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());

    match value.as_deref() {
        None | Some("appwrite") => Ok(BackendKind::Appwrite),
        Some("memory") => Ok(BackendKind::Memory),
        Some(other) => Err(IntakeError::InvalidConfig(format!(
            "{ENV_BACKEND} must be 'appwrite' or 'memory', got '{other}'"
        ))),
    }
}

/// Parse the request timeout from an optional string of whole seconds.
///
/// If `value` is `None` or empty/whitespace, returns the default.
pub fn request_timeout_from_env_value(value: Option<String>) -> IntakeResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let secs = match value {
        Some(v) => v.parse::<u64>().map_err(|_| {
            IntakeError::InvalidConfig(format!(
                "{ENV_REQUEST_TIMEOUT_SECS} must be a whole number of seconds, got '{v}'"
            ))
        })?,
        None => DEFAULT_REQUEST_TIMEOUT_SECS,
    };

    Ok(Duration::from_secs(secs))
}
