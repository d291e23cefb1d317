//! # Intake Appwrite
//!
//! HTTP implementation of the intake remote APIs against an Appwrite-compatible REST backend.
//!
//! [`AppwriteClient`] implements [`IdentityApi`](intake_core::IdentityApi),
//! [`StorageApi`](intake_core::StorageApi) and [`DatabaseApi`](intake_core::DatabaseApi) with
//! server-key authentication. Responses are mapped onto [`RemoteError`](intake_core::RemoteError):
//! 409 is a conflict, 404 is not-found, anything else non-2xx is a service error.

mod client;

pub use client::AppwriteClient;

use intake_core::config::{backend_kind_from_env_value, request_timeout_from_env_value};
use intake_core::constants::{ENV_API_KEY, ENV_BACKEND, ENV_REQUEST_TIMEOUT_SECS};
use intake_core::memory::InMemoryBackend;
use intake_core::{BackendConfig, BackendKind, IntakeError, ProvisioningService};
use std::sync::Arc;

/// Errors raised while setting up a backend.
#[derive(Debug, thiserror::Error)]
pub enum AppwriteError {
    #[error("API key is empty or not a valid header value")]
    InvalidApiKey,
    #[error("project id is not a valid header value")]
    InvalidProjectId,
    #[error("endpoint cannot be used as a base URL: {0}")]
    InvalidEndpoint(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error(transparent)]
    Config(#[from] IntakeError),
}

/// Build the provisioning service the binaries run with.
///
/// `lookup` maps environment variable names to values. The backend variable selects between
/// the Appwrite client (the default, which needs the full backend configuration and an API key)
/// and the in-memory backend (which only reads the request timeout).
pub fn provisioning_from_lookup<F>(lookup: F) -> Result<ProvisioningService, AppwriteError>
where
    F: Fn(&str) -> Option<String>,
{
    match backend_kind_from_env_value(lookup(ENV_BACKEND))? {
        BackendKind::Appwrite => {
            let cfg = Arc::new(BackendConfig::from_lookup(&lookup)?);
            let api_key = lookup(ENV_API_KEY).ok_or(AppwriteError::InvalidApiKey)?;
            let client = Arc::new(AppwriteClient::new(&cfg, &api_key)?);
            tracing::info!(
                endpoint = %cfg.endpoint(),
                project_id = cfg.project_id(),
                "using Appwrite backend"
            );
            Ok(ProvisioningService::with_backend(cfg, client))
        }
        BackendKind::Memory => {
            let timeout = request_timeout_from_env_value(lookup(ENV_REQUEST_TIMEOUT_SECS))?;
            let cfg = Arc::new(BackendConfig::local(timeout)?);
            tracing::warn!("using in-memory backend, nothing will be persisted");
            Ok(ProvisioningService::with_backend(cfg, Arc::new(InMemoryBackend::new())))
        }
    }
}
