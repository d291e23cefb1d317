//! # Intake Core
//!
//! Core logic for the patient intake flow.
//!
//! This crate contains:
//! - Form validation for the patient and registration forms
//! - The provisioning service: user creation with duplicate-email resolution, user lookup,
//!   and patient registration with an optional identification document
//! - The form workflow controller that guards against double submission and navigates on
//!   success
//! - The remote API traits and an in-memory implementation of them
//!
//! **No transport concerns**: HTTP clients for the hosted backend live in `intake-appwrite`;
//! the REST surface lives in `intake-api-rest`.

pub mod backend;
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod memory;
pub mod provisioning;
pub mod registration;
pub mod user;
pub mod validation;
pub mod workflow;

pub use backend::{DatabaseApi, IdentityApi, RemoteError, RemoteResult, StorageApi};
pub use config::{BackendConfig, BackendKind};
pub use document::{DocumentError, DocumentUpload, IdentificationDocument, StoredDocument, StoredFile};
pub use error::{IntakeError, IntakeResult};
pub use provisioning::ProvisioningService;
pub use registration::{
    Gender, IdentificationType, PatientRecord, PatientRecordFields, PatientRegistration,
    RegistrationForm,
};
pub use user::{Query, User, UserForm, UserInput, UserList};
pub use validation::{FieldError, ValidationErrors};
pub use workflow::{
    FormWorkflow, LogNavigator, Navigator, RecordingNavigator, RegistrationHandle,
    SubmissionError, UserHandle, WorkflowState,
};

pub use intake_types::{EmailAddress, NonEmptyText, PhoneNumber};
pub use intake_uuid::UniqueId;
