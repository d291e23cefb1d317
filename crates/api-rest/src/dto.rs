//! Request and response bodies.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use intake_core::{
    DocumentUpload, PatientRecord, PatientRecordFields, RegistrationForm, User, UserForm,
    ValidationErrors,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// The patient form.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateUserReq {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl From<CreateUserReq> for UserForm {
    fn from(req: CreateUserReq) -> Self {
        UserForm {
            name: req.name,
            email: req.email,
            phone: req.phone,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserRes {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl From<User> for UserRes {
    fn from(user: User) -> Self {
        UserRes {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRes {
    pub user: UserRes,
    /// Where the client continues: the user's registration page.
    pub next_path: String,
}

/// An uploaded identification document, base64 encoded.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentReq {
    pub file_name: String,
    pub content_base64: String,
}

/// The registration form. Served pre-filled and posted back.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationFormDto {
    pub name: String,
    pub email: String,
    pub phone: String,
    /// `YYYY-MM-DD`
    pub birth_date: String,
    /// `Male`, `Female` or `Other`
    pub gender: String,
    pub address: String,
    pub occupation: String,
    pub emergency_contact_name: String,
    pub emergency_contact_number: String,
    pub primary_physician: String,
    pub insurance_provider: String,
    pub insurance_policy_number: String,
    pub allergies: Option<String>,
    pub current_medication: Option<String>,
    pub family_medical_history: Option<String>,
    pub past_medical_history: Option<String>,
    pub identification_type: Option<String>,
    pub identification_number: Option<String>,
    pub identification_document: Option<DocumentReq>,
    pub treatment_consent: bool,
    pub disclosure_consent: bool,
    pub privacy_consent: bool,
}

impl From<RegistrationForm> for RegistrationFormDto {
    fn from(form: RegistrationForm) -> Self {
        RegistrationFormDto {
            name: form.name,
            email: form.email,
            phone: form.phone,
            birth_date: form.birth_date,
            gender: form.gender,
            address: form.address,
            occupation: form.occupation,
            emergency_contact_name: form.emergency_contact_name,
            emergency_contact_number: form.emergency_contact_number,
            primary_physician: form.primary_physician,
            insurance_provider: form.insurance_provider,
            insurance_policy_number: form.insurance_policy_number,
            allergies: form.allergies,
            current_medication: form.current_medication,
            family_medical_history: form.family_medical_history,
            past_medical_history: form.past_medical_history,
            identification_type: form.identification_type,
            identification_number: form.identification_number,
            identification_document: None,
            treatment_consent: form.treatment_consent,
            disclosure_consent: form.disclosure_consent,
            privacy_consent: form.privacy_consent,
        }
    }
}

impl From<RegistrationFormDto> for RegistrationForm {
    /// An undecodable document is carried as a pending field error so form validation reports
    /// it with everything else.
    fn from(dto: RegistrationFormDto) -> Self {
        let (identification_document, identification_document_error) =
            match dto.identification_document {
                None => (None, None),
                Some(doc) => match STANDARD.decode(doc.content_base64.trim()) {
                    Ok(content) => (
                        Some(DocumentUpload {
                            file_name: doc.file_name,
                            content,
                        }),
                        None,
                    ),
                    Err(_) => (None, Some("content is not valid base64".to_string())),
                },
            };

        RegistrationForm {
            name: dto.name,
            email: dto.email,
            phone: dto.phone,
            birth_date: dto.birth_date,
            gender: dto.gender,
            address: dto.address,
            occupation: dto.occupation,
            emergency_contact_name: dto.emergency_contact_name,
            emergency_contact_number: dto.emergency_contact_number,
            primary_physician: dto.primary_physician,
            insurance_provider: dto.insurance_provider,
            insurance_policy_number: dto.insurance_policy_number,
            allergies: dto.allergies,
            current_medication: dto.current_medication,
            family_medical_history: dto.family_medical_history,
            past_medical_history: dto.past_medical_history,
            identification_type: dto.identification_type,
            identification_number: dto.identification_number,
            identification_document,
            identification_document_error,
            treatment_consent: dto.treatment_consent,
            disclosure_consent: dto.disclosure_consent,
            privacy_consent: dto.privacy_consent,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecordRes {
    pub id: String,
    #[schema(value_type = Object)]
    pub record: PatientRecordFields,
    /// Where the client continues: the new-appointment page.
    pub next_path: String,
}

impl PatientRecordRes {
    pub fn new(record: PatientRecord, next_path: String) -> Self {
        PatientRecordRes {
            id: record.id,
            record: record.fields,
            next_path,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FieldErrorRes {
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldErrorRes>,
}

impl ErrorRes {
    pub fn message(message: impl Into<String>) -> Self {
        ErrorRes {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: &ValidationErrors) -> Self {
        ErrorRes {
            message: "validation failed".into(),
            errors: errors
                .errors()
                .iter()
                .map(|e| FieldErrorRes {
                    field: e.field.to_string(),
                    reason: e.reason.clone(),
                })
                .collect(),
        }
    }
}
