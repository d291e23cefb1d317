//! Constants used throughout the intake core crate.
//!
//! Environment variable names, defaults and navigation paths live here so the binaries and the
//! core agree on them.

/// Base URL of the hosted backend API, e.g. `https://cloud.appwrite.io/v1`.
pub const ENV_ENDPOINT: &str = "APPWRITE_ENDPOINT";

/// Project identifier at the hosted backend.
pub const ENV_PROJECT_ID: &str = "APPWRITE_PROJECT_ID";

/// Server API key used by the HTTP backend client.
pub const ENV_API_KEY: &str = "APPWRITE_API_KEY";

/// Database holding the patient collection.
pub const ENV_DATABASE_ID: &str = "APPWRITE_DATABASE_ID";

/// Collection that patient records are written to.
pub const ENV_PATIENT_COLLECTION_ID: &str = "APPWRITE_PATIENT_COLLECTION_ID";

/// Storage bucket for identification documents.
pub const ENV_BUCKET_ID: &str = "APPWRITE_BUCKET_ID";

/// Upper bound, in seconds, for any single remote call.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "INTAKE_REQUEST_TIMEOUT_SECS";

/// Which backend implementation the binaries construct (`appwrite` or `memory`).
pub const ENV_BACKEND: &str = "INTAKE_BACKEND";

/// Listen address of the REST server.
pub const ENV_REST_ADDR: &str = "INTAKE_REST_ADDR";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Largest identification document accepted for upload (10 MiB).
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Largest request body the storage API accepts; bigger files go up in chunks of this size.
pub const UPLOAD_CHUNK_BYTES: usize = 5 * 1024 * 1024;

/// Where the patient form sends the user once their account exists.
pub fn registration_path(user_id: &str) -> String {
    format!("/patients/{user_id}/register")
}

/// Where the registration form sends the user once their record is stored.
pub fn new_appointment_path(user_id: &str) -> String {
    format!("/patients/{user_id}/new-appointment")
}
