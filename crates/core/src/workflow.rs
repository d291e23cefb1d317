//! Form workflow controller.
//!
//! A [`FormWorkflow`] sits between a form and the [`ProvisioningService`]. It validates raw
//! form input, refuses a second submission while one is running, submits, and on success
//! navigates to the next step:
//!
//! ```text
//! Idle -> Submitting -> NavigatingAway(path)
//!                    -> Idle              (error logged and returned)
//! ```
//!
//! One workflow corresponds to one form instance. The busy state is not shared between
//! instances.

use crate::constants::{new_appointment_path, registration_path};
use crate::provisioning::ProvisioningService;
use crate::registration::{PatientRecord, PatientRegistration, RegistrationForm};
use crate::user::{User, UserForm, UserInput};
use crate::validation::{validate_registration_form, validate_user_form, ValidationErrors};
use crate::IntakeError;
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Submitting,
    /// Submission succeeded and the form has moved on to `path`.
    NavigatingAway(String),
}

/// Receives the navigation side effect of a successful submission.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Logs each navigation. Used where the caller reads the next path from the returned handle.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, path: &str) {
        tracing::info!(path, "navigating");
    }
}

/// Remembers every navigation.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<String> {
        lock(&self.visits).clone()
    }

    pub fn last(&self) -> Option<String> {
        lock(&self.visits).last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        lock(&self.visits).push(path.to_string());
    }
}

impl<N: Navigator + ?Sized> Navigator for std::sync::Arc<N> {
    fn navigate(&self, path: &str) {
        (**self).navigate(path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("a submission is already in progress")]
    InProgress,
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
    #[error(transparent)]
    Provisioning(#[from] IntakeError),
}

/// Result of a successful patient form submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserHandle {
    pub user: User,
    pub next_path: String,
}

/// Result of a successful registration form submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationHandle {
    pub record: PatientRecord,
    pub next_path: String,
}

pub struct FormWorkflow<N> {
    service: ProvisioningService,
    navigator: N,
    state: Mutex<WorkflowState>,
}

impl<N: Navigator> FormWorkflow<N> {
    pub fn new(service: ProvisioningService, navigator: N) -> Self {
        Self {
            service,
            navigator,
            state: Mutex::new(WorkflowState::Idle),
        }
    }

    pub fn state(&self) -> WorkflowState {
        lock(&self.state).clone()
    }

    /// True while a submission is running; callers disable the submit control.
    pub fn is_busy(&self) -> bool {
        *lock(&self.state) == WorkflowState::Submitting
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Validate the patient form and submit it.
    ///
    /// Invalid input returns [`SubmissionError::Invalid`] without contacting the backend.
    pub async fn submit_user_form(&self, form: &UserForm) -> Result<UserHandle, SubmissionError> {
        let input = validate_user_form(form).inspect_err(|e| {
            tracing::debug!(fields = ?e.fields().collect::<Vec<_>>(), "patient form invalid");
        })?;
        self.submit_user(input).await
    }

    /// Create (or resolve) the user, then navigate to their registration page.
    ///
    /// Only the identity fields are sent.
    pub async fn submit_user(&self, input: UserInput) -> Result<UserHandle, SubmissionError> {
        let guard = self.begin()?;

        match self.service.create_user(&input).await {
            Ok(user) => {
                let next_path = registration_path(&user.id);
                guard.navigating_away(&next_path);
                self.navigator.navigate(&next_path);
                Ok(UserHandle { user, next_path })
            }
            Err(e) => {
                tracing::error!(error = %e, "patient form submission failed");
                Err(e.into())
            }
        }
    }

    /// Validate the registration form for `user_id` and submit it.
    pub async fn submit_registration_form(
        &self,
        user_id: &str,
        form: RegistrationForm,
    ) -> Result<RegistrationHandle, SubmissionError> {
        let registration = validate_registration_form(user_id, form).inspect_err(|e| {
            tracing::debug!(fields = ?e.fields().collect::<Vec<_>>(), "registration form invalid");
        })?;
        self.submit_registration(registration).await
    }

    /// Register the patient, then navigate to the new-appointment page.
    pub async fn submit_registration(
        &self,
        registration: PatientRegistration,
    ) -> Result<RegistrationHandle, SubmissionError> {
        let guard = self.begin()?;
        let user_id = registration.user_id.clone();

        match self.service.register_patient(registration).await {
            Ok(record) => {
                let next_path = new_appointment_path(user_id.as_str());
                guard.navigating_away(&next_path);
                self.navigator.navigate(&next_path);
                Ok(RegistrationHandle { record, next_path })
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "registration submission failed");
                Err(e.into())
            }
        }
    }

    fn begin(&self) -> Result<SubmitGuard<'_>, SubmissionError> {
        let mut state = lock(&self.state);
        if *state == WorkflowState::Submitting {
            tracing::warn!("submission rejected, another is in progress");
            return Err(SubmissionError::InProgress);
        }
        *state = WorkflowState::Submitting;

        Ok(SubmitGuard {
            state: &self.state,
            next: None,
        })
    }
}

/// Holds the workflow in `Submitting`. On drop it moves to `NavigatingAway` if the submission
/// succeeded and back to `Idle` otherwise, including when the submitting future is cancelled.
struct SubmitGuard<'a> {
    state: &'a Mutex<WorkflowState>,
    next: Option<String>,
}

impl SubmitGuard<'_> {
    fn navigating_away(mut self, path: &str) {
        self.next = Some(path.to_string());
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        *lock(self.state) = match self.next.take() {
            Some(path) => WorkflowState::NavigatingAway(path),
            None => WorkflowState::Idle,
        };
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
