//! # API REST
//!
//! REST API for patient intake.
//!
//! Handles:
//! - HTTP endpoints with axum for the patient form, user lookup and patient registration
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, base64 documents, status codes, CORS)
//!
//! Every submitting request runs through its own [`FormWorkflow`], so validation failures are
//! reported before the backend is contacted.

#![warn(rust_2018_idioms)]

pub mod dto;

use axum::{
    extract::{DefaultBodyLimit, Path as AxumPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use intake_core::{
    FormWorkflow, IntakeError, LogNavigator, ProvisioningService, RegistrationForm,
    SubmissionError, UserForm,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use dto::{
    CreateUserReq, CreateUserRes, DocumentReq, ErrorRes, FieldErrorRes, HealthRes,
    PatientRecordRes, RegistrationFormDto, UserRes,
};

/// Base64 inflates a 10 MiB document to a little under 14 MiB.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: ProvisioningService,
}

impl AppState {
    fn workflow(&self) -> FormWorkflow<LogNavigator> {
        FormWorkflow::new(self.service.clone(), LogNavigator)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        create_user,
        get_user,
        registration_form,
        register_patient,
    ),
    components(schemas(
        HealthRes,
        CreateUserReq,
        CreateUserRes,
        UserRes,
        DocumentReq,
        RegistrationFormDto,
        PatientRecordRes,
        ErrorRes,
        FieldErrorRes,
    ))
)]
pub struct ApiDoc;

type ApiError = (StatusCode, Json<ErrorRes>);

/// Build the REST router, including Swagger UI.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/patients", post(create_user))
        .route("/users/:user_id", get(get_user))
        .route(
            "/patients/:user_id/register",
            get(registration_form).post(register_patient),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Patient intake REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created, or the existing user with this email", body = CreateUserRes),
        (status = 422, description = "Validation failed", body = ErrorRes),
        (status = 502, description = "Backend error", body = ErrorRes),
        (status = 504, description = "Backend timed out", body = ErrorRes)
    )
)]
/// Submit the patient form
///
/// Creates the user (or resolves the existing one with the same email) and returns the path
/// of their registration page in `Location`.
#[axum::debug_handler]
async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserReq>,
) -> Result<Response, ApiError> {
    let form = UserForm::from(req);

    match state.workflow().submit_user_form(&form).await {
        Ok(handle) => Ok((
            StatusCode::CREATED,
            [(header::LOCATION, handle.next_path.clone())],
            Json(CreateUserRes {
                user: handle.user.into(),
                next_path: handle.next_path,
            }),
        )
            .into_response()),
        Err(e) => Err(submission_error(e)),
    }
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserRes),
        (status = 400, description = "Malformed user id", body = ErrorRes),
        (status = 404, description = "User not found", body = ErrorRes),
        (status = 502, description = "Backend error", body = ErrorRes)
    )
)]
/// Fetch a user
#[axum::debug_handler]
async fn get_user(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
) -> Result<Json<UserRes>, ApiError> {
    match state.service.get_user(&user_id).await {
        Ok(Some(user)) => Ok(Json(user.into())),
        Ok(None) => Err(not_found()),
        Err(e) => Err(intake_error(e)),
    }
}

#[utoipa::path(
    get,
    path = "/patients/{user_id}/register",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Registration form pre-filled from the user", body = RegistrationFormDto),
        (status = 404, description = "User not found", body = ErrorRes),
        (status = 502, description = "Backend error", body = ErrorRes)
    )
)]
/// Fetch the registration form for a user
///
/// Name, email and phone are pre-filled from the user; gender defaults to `Male`.
#[axum::debug_handler]
async fn registration_form(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
) -> Result<Json<RegistrationFormDto>, ApiError> {
    match state.service.get_user(&user_id).await {
        Ok(Some(user)) => Ok(Json(RegistrationForm::prefilled(&user).into())),
        Ok(None) => Err(not_found()),
        Err(e) => Err(intake_error(e)),
    }
}

#[utoipa::path(
    post,
    path = "/patients/{user_id}/register",
    params(("user_id" = String, Path, description = "User id")),
    request_body = RegistrationFormDto,
    responses(
        (status = 201, description = "Patient registered", body = PatientRecordRes),
        (status = 422, description = "Validation failed", body = ErrorRes),
        (status = 502, description = "Backend error", body = ErrorRes),
        (status = 504, description = "Backend timed out", body = ErrorRes)
    )
)]
/// Submit the registration form
///
/// The identification document, if any, is uploaded before the patient record is written.
#[axum::debug_handler]
async fn register_patient(
    State(state): State<AppState>,
    AxumPath(user_id): AxumPath<String>,
    Json(req): Json<RegistrationFormDto>,
) -> Result<Response, ApiError> {
    let form = RegistrationForm::from(req);

    match state.workflow().submit_registration_form(&user_id, form).await {
        Ok(handle) => Ok((
            StatusCode::CREATED,
            [(header::LOCATION, handle.next_path.clone())],
            Json(PatientRecordRes::new(handle.record, handle.next_path)),
        )
            .into_response()),
        Err(e) => Err(submission_error(e)),
    }
}

fn not_found() -> ApiError {
    (StatusCode::NOT_FOUND, Json(ErrorRes::message("User not found")))
}

fn submission_error(e: SubmissionError) -> ApiError {
    match e {
        SubmissionError::Invalid(errors) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorRes::invalid(&errors)))
        }
        SubmissionError::InProgress => (
            StatusCode::CONFLICT,
            Json(ErrorRes::message("A submission is already in progress")),
        ),
        SubmissionError::Provisioning(e) => intake_error(e),
    }
}

fn intake_error(e: IntakeError) -> ApiError {
    match e {
        IntakeError::Validation(errors) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(ErrorRes::invalid(&errors)))
        }
        IntakeError::InvalidId(_) => {
            (StatusCode::BAD_REQUEST, Json(ErrorRes::message("Malformed user id")))
        }
        e if e.is_timeout() => {
            tracing::error!("Backend timed out: {:?}", e);
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(ErrorRes::message("Backend timed out")),
            )
        }
        e if e.is_remote() => {
            tracing::error!("Backend error: {:?}", e);
            (StatusCode::BAD_GATEWAY, Json(ErrorRes::message("Backend error")))
        }
        e => {
            tracing::error!("Internal error: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRes::message("Internal error")),
            )
        }
    }
}
