//! Form validation.
//!
//! Each form field has an explicit validator returning either the typed value or a
//! [`FieldError`]. Form validators run every field validator, collect all failures, and only
//! then report: a caller always sees the complete list of problems, never the first one.
//!
//! Field names in errors are the form's own field names (`name`, `birthDate`, ...), so a view
//! can attach each message to its input.

use crate::document::{DocumentUpload, IdentificationDocument};
use crate::registration::{
    Consent, Gender, IdentificationDetails, IdentificationType, MedicalDetails, PatientRegistration,
    PersonalDetails, RegistrationForm,
};
use crate::user::{UserForm, UserInput};
use chrono::{DateTime, NaiveDate, Utc};
use intake_types::{EmailAddress, NonEmptyText, PhoneNumber, TextError};
use intake_uuid::UniqueId;
use serde::Serialize;
use std::fmt;

pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 50;

pub const MIN_ADDRESS_LENGTH: usize = 5;
pub const MAX_ADDRESS_LENGTH: usize = 500;

pub const MIN_OCCUPATION_LENGTH: usize = 2;
pub const MAX_OCCUPATION_LENGTH: usize = 500;

pub const MIN_PHYSICIAN_LENGTH: usize = 2;
pub const MAX_PHYSICIAN_LENGTH: usize = 100;

pub const MIN_INSURANCE_LENGTH: usize = 2;
pub const MAX_INSURANCE_LENGTH: usize = 50;

/// Upper bound for the free-text medical history fields.
pub const MAX_NOTES_LENGTH: usize = 1000;

pub const MAX_IDENTIFICATION_NUMBER_LENGTH: usize = 50;

/// One field that failed validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every field that failed validation, in form order. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        ValidationErrors(vec![error])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: ")?;
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Gathers field errors while a form is checked.
#[derive(Default)]
struct Collector {
    errors: Vec<FieldError>,
}

impl Collector {
    fn check<T>(&mut self, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

// ==================== FIELD VALIDATORS ====================

/// Required text whose trimmed length is within `min..=max` characters.
pub fn validate_text(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<NonEmptyText, FieldError> {
    let text = NonEmptyText::new(value).map_err(|_| FieldError::new(field, "is required"))?;

    let len = text.char_len();
    if len < min {
        return Err(FieldError::new(
            field,
            format!("must be at least {min} characters"),
        ));
    }
    if len > max {
        return Err(FieldError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }

    Ok(text)
}

/// Optional text: blank means absent, otherwise at most `max` characters.
pub fn validate_optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<NonEmptyText>, FieldError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => validate_text(field, v, 1, max).map(Some),
    }
}

pub fn validate_email(field: &'static str, value: &str) -> Result<EmailAddress, FieldError> {
    EmailAddress::parse(value).map_err(|e| match e {
        TextError::Empty => FieldError::new(field, "is required"),
        _ => FieldError::new(field, "must be a valid email address"),
    })
}

pub fn validate_phone(field: &'static str, value: &str) -> Result<PhoneNumber, FieldError> {
    PhoneNumber::parse(value).map_err(|e| match e {
        TextError::Empty => FieldError::new(field, "is required"),
        _ => FieldError::new(
            field,
            "must be a valid phone number: '+' followed by 10 to 15 digits",
        ),
    })
}

/// A date of birth as `YYYY-MM-DD` or an RFC 3339 timestamp, not after `today`.
pub fn validate_birth_date(
    field: &'static str,
    value: &str,
    today: NaiveDate,
) -> Result<NaiveDate, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::new(field, "is required"));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .ok_or_else(|| FieldError::new(field, "must be a date (YYYY-MM-DD)"))?;

    if date > today {
        return Err(FieldError::new(field, "cannot be in the future"));
    }

    Ok(date)
}

pub fn validate_gender(field: &'static str, value: &str) -> Result<Gender, FieldError> {
    value
        .parse::<Gender>()
        .map_err(|_| FieldError::new(field, "must be one of Male, Female, Other"))
}

pub fn validate_identification_type(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<IdentificationType>, FieldError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<IdentificationType>()
            .map(Some)
            .map_err(|_| FieldError::new(field, "is not a recognised identification type")),
    }
}

pub fn validate_document(
    field: &'static str,
    upload: Option<DocumentUpload>,
) -> Result<Option<IdentificationDocument>, FieldError> {
    upload
        .map(IdentificationDocument::try_from)
        .transpose()
        .map_err(|e| FieldError::new(field, e.to_string()))
}

pub fn validate_consent(field: &'static str, given: bool, reason: &str) -> Result<bool, FieldError> {
    if given {
        Ok(true)
    } else {
        Err(FieldError::new(field, reason))
    }
}

// ==================== FORM VALIDATORS ====================

/// Validates the patient form.
///
/// # Errors
///
/// Returns every failing field among `name`, `email`, `phone`.
pub fn validate_user_form(form: &UserForm) -> Result<UserInput, ValidationErrors> {
    let mut c = Collector::default();
    let identity = check_identity(&mut c, &form.name, &form.email, &form.phone);
    c.finish()?;

    identity.ok_or_else(|| FieldError::new("form", "is incomplete").into())
}

/// Validates the registration form for the user `user_id`, using the current UTC date for the
/// birth-date check.
pub fn validate_registration_form(
    user_id: &str,
    form: RegistrationForm,
) -> Result<PatientRegistration, ValidationErrors> {
    validate_registration_form_on(user_id, form, Utc::now().date_naive())
}

/// As [`validate_registration_form`], with an explicit `today`.
pub fn validate_registration_form_on(
    user_id: &str,
    form: RegistrationForm,
    today: NaiveDate,
) -> Result<PatientRegistration, ValidationErrors> {
    let mut c = Collector::default();

    let user_id = c.check(
        UniqueId::parse(user_id).map_err(|_| FieldError::new("userId", "is not a valid user id")),
    );
    let identity = check_identity(&mut c, &form.name, &form.email, &form.phone);
    let personal = check_personal(&mut c, &form, today);
    let medical = check_medical(&mut c, &form);
    let identification = check_identification(
        &mut c,
        form.identification_type.as_deref(),
        form.identification_number.as_deref(),
        form.identification_document,
        form.identification_document_error,
    );
    let consent = check_consent(
        &mut c,
        form.treatment_consent,
        form.disclosure_consent,
        form.privacy_consent,
    );

    c.finish()?;

    match (user_id, identity, personal, medical, identification, consent) {
        (
            Some(user_id),
            Some(identity),
            Some(personal),
            Some(medical),
            Some(identification),
            Some(consent),
        ) => Ok(PatientRegistration {
            user_id,
            identity,
            personal,
            medical,
            identification,
            consent,
        }),
        _ => Err(FieldError::new("form", "is incomplete").into()),
    }
}

fn check_identity(c: &mut Collector, name: &str, email: &str, phone: &str) -> Option<UserInput> {
    let name = c.check(validate_text("name", name, MIN_NAME_LENGTH, MAX_NAME_LENGTH));
    let email = c.check(validate_email("email", email));
    let phone = c.check(validate_phone("phone", phone));

    Some(UserInput {
        name: name?,
        email: email?,
        phone: phone?,
    })
}

fn check_personal(
    c: &mut Collector,
    form: &RegistrationForm,
    today: NaiveDate,
) -> Option<PersonalDetails> {
    let birth_date = c.check(validate_birth_date("birthDate", &form.birth_date, today));
    let gender = c.check(validate_gender("gender", &form.gender));
    let address = c.check(validate_text(
        "address",
        &form.address,
        MIN_ADDRESS_LENGTH,
        MAX_ADDRESS_LENGTH,
    ));
    let occupation = c.check(validate_text(
        "occupation",
        &form.occupation,
        MIN_OCCUPATION_LENGTH,
        MAX_OCCUPATION_LENGTH,
    ));
    let emergency_contact_name = c.check(validate_text(
        "emergencyContactName",
        &form.emergency_contact_name,
        MIN_NAME_LENGTH,
        MAX_NAME_LENGTH,
    ));
    let emergency_contact_number = c.check(validate_phone(
        "emergencyContactNumber",
        &form.emergency_contact_number,
    ));

    Some(PersonalDetails {
        birth_date: birth_date?,
        gender: gender?,
        address: address?,
        occupation: occupation?,
        emergency_contact_name: emergency_contact_name?,
        emergency_contact_number: emergency_contact_number?,
    })
}

fn check_medical(c: &mut Collector, form: &RegistrationForm) -> Option<MedicalDetails> {
    let primary_physician = c.check(
        validate_text(
            "primaryPhysician",
            &form.primary_physician,
            MIN_PHYSICIAN_LENGTH,
            MAX_PHYSICIAN_LENGTH,
        )
        .map_err(|e| {
            if e.reason == "is required" {
                FieldError::new(e.field, "select at least one doctor")
            } else {
                e
            }
        }),
    );
    let insurance_provider = c.check(validate_text(
        "insuranceProvider",
        &form.insurance_provider,
        MIN_INSURANCE_LENGTH,
        MAX_INSURANCE_LENGTH,
    ));
    let insurance_policy_number = c.check(validate_text(
        "insurancePolicyNumber",
        &form.insurance_policy_number,
        MIN_INSURANCE_LENGTH,
        MAX_INSURANCE_LENGTH,
    ));
    let allergies = c.check(validate_optional_text(
        "allergies",
        form.allergies.as_deref(),
        MAX_NOTES_LENGTH,
    ));
    let current_medication = c.check(validate_optional_text(
        "currentMedication",
        form.current_medication.as_deref(),
        MAX_NOTES_LENGTH,
    ));
    let family_medical_history = c.check(validate_optional_text(
        "familyMedicalHistory",
        form.family_medical_history.as_deref(),
        MAX_NOTES_LENGTH,
    ));
    let past_medical_history = c.check(validate_optional_text(
        "pastMedicalHistory",
        form.past_medical_history.as_deref(),
        MAX_NOTES_LENGTH,
    ));

    Some(MedicalDetails {
        primary_physician: primary_physician?,
        insurance_provider: insurance_provider?,
        insurance_policy_number: insurance_policy_number?,
        allergies: allergies?,
        current_medication: current_medication?,
        family_medical_history: family_medical_history?,
        past_medical_history: past_medical_history?,
    })
}

fn check_identification(
    c: &mut Collector,
    identification_type: Option<&str>,
    identification_number: Option<&str>,
    document: Option<DocumentUpload>,
    document_error: Option<String>,
) -> Option<IdentificationDetails> {
    let identification_type = c.check(validate_identification_type(
        "identificationType",
        identification_type,
    ));
    let identification_number = c.check(validate_optional_text(
        "identificationNumber",
        identification_number,
        MAX_IDENTIFICATION_NUMBER_LENGTH,
    ));
    let document = c.check(match document_error {
        Some(reason) => Err(FieldError::new("identificationDocument", reason)),
        None => validate_document("identificationDocument", document),
    });

    Some(IdentificationDetails {
        identification_type: identification_type?,
        identification_number: identification_number?,
        document: document?,
    })
}

fn check_consent(
    c: &mut Collector,
    treatment: bool,
    disclosure: bool,
    privacy: bool,
) -> Option<Consent> {
    let treatment = c.check(validate_consent(
        "treatmentConsent",
        treatment,
        "you must consent to treatment in order to proceed",
    ));
    let disclosure = c.check(validate_consent(
        "disclosureConsent",
        disclosure,
        "you must consent to disclosure in order to proceed",
    ));
    let privacy = c.check(validate_consent(
        "privacyConsent",
        privacy,
        "you must consent to privacy in order to proceed",
    ));

    Some(Consent {
        treatment: treatment?,
        disclosure: disclosure?,
        privacy: privacy?,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::{john_form, registration_form};
    use super::*;
    use crate::document::fixtures::PNG;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn valid_user_form_is_accepted() {
        let input = validate_user_form(&john_form()).unwrap();

        assert_eq!(input.name.as_str(), "John Doe");
        assert_eq!(input.email.as_str(), "john@x.com");
        assert_eq!(input.phone.as_str(), "+254712345678");
    }

    #[test]
    fn missing_name_is_reported_on_name() {
        let form = UserForm {
            name: "".into(),
            ..john_form()
        };

        let errors = validate_user_form(&form).unwrap_err();
        assert_eq!(errors.errors(), &[FieldError::new("name", "is required")]);
    }

    #[test]
    fn malformed_email_is_reported_on_email() {
        let form = UserForm {
            email: "not-an-email".into(),
            ..john_form()
        };

        let errors = validate_user_form(&form).unwrap_err();
        assert!(errors.has_field("email"));
        assert_eq!(errors.errors().len(), 1);
    }

    #[test]
    fn all_failing_fields_are_reported_together() {
        let form = UserForm {
            name: "J".into(),
            email: "nope".into(),
            phone: "12".into(),
        };

        let errors = validate_user_form(&form).unwrap_err();
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(fields, vec!["name", "email", "phone"]);
        assert_eq!(errors.errors()[0].reason, "must be at least 2 characters");
    }

    #[test]
    fn name_length_is_counted_in_characters() {
        let at_limit = "é".repeat(MAX_NAME_LENGTH);
        assert!(validate_text("name", &at_limit, MIN_NAME_LENGTH, MAX_NAME_LENGTH).is_ok());

        let over = "a".repeat(MAX_NAME_LENGTH + 1);
        let err = validate_text("name", &over, MIN_NAME_LENGTH, MAX_NAME_LENGTH).unwrap_err();
        assert_eq!(err.reason, "must be at most 50 characters");
    }

    #[test]
    fn valid_registration_is_accepted() {
        let registration =
            validate_registration_form_on("user-1", registration_form(), today()).unwrap();

        assert_eq!(registration.user_id.as_str(), "user-1");
        assert_eq!(registration.personal.gender, Gender::Male);
        assert_eq!(
            registration.personal.birth_date,
            NaiveDate::from_ymd_opt(1990, 4, 12).unwrap()
        );
        assert_eq!(
            registration.identification.identification_type,
            Some(IdentificationType::NationalIdentityCard)
        );
        assert_eq!(registration.medical.allergies.unwrap().as_str(), "Pollen");
        // Blank optional text is treated as absent.
        assert!(registration.medical.family_medical_history.is_none());
        assert!(registration.identification.document.is_none());
    }

    #[test]
    fn registration_accepts_rfc3339_birth_date() {
        let form = RegistrationForm {
            birth_date: "1990-04-12T00:00:00.000Z".into(),
            ..registration_form()
        };

        let registration = validate_registration_form_on("user-1", form, today()).unwrap();
        assert_eq!(
            registration.personal.birth_date,
            NaiveDate::from_ymd_opt(1990, 4, 12).unwrap()
        );
    }

    #[test]
    fn registration_reports_every_section() {
        let form = RegistrationForm {
            name: "".into(),
            birth_date: "2030-01-01".into(),
            gender: "robot".into(),
            primary_physician: "".into(),
            identification_type: Some("Library Card".into()),
            identification_document: Some(DocumentUpload {
                file_name: "notes.txt".into(),
                content: b"plain text".to_vec(),
            }),
            privacy_consent: false,
            ..registration_form()
        };

        let errors = validate_registration_form_on("user-1", form, today()).unwrap_err();
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(
            fields,
            vec![
                "name",
                "birthDate",
                "gender",
                "primaryPhysician",
                "identificationType",
                "identificationDocument",
                "privacyConsent",
            ]
        );

        let physician = &errors.errors()[3];
        assert_eq!(physician.reason, "select at least one doctor");
    }

    #[test]
    fn unreadable_document_is_reported_with_other_fields() {
        let form = RegistrationForm {
            name: "".into(),
            email: "not-an-email".into(),
            identification_document_error: Some("content is not valid base64".into()),
            ..registration_form()
        };

        let errors = validate_registration_form_on("user-1", form, today()).unwrap_err();
        let fields: Vec<_> = errors.fields().collect();
        assert_eq!(fields, vec!["name", "email", "identificationDocument"]);
        assert_eq!(errors.errors()[2].reason, "content is not valid base64");
    }

    #[test]
    fn registration_rejects_bad_user_id() {
        let errors =
            validate_registration_form_on("../admin", registration_form(), today()).unwrap_err();
        assert!(errors.has_field("userId"));
    }

    #[test]
    fn registration_accepts_document() {
        let form = RegistrationForm {
            identification_document: Some(DocumentUpload {
                file_name: "id.png".into(),
                content: PNG.to_vec(),
            }),
            ..registration_form()
        };

        let registration = validate_registration_form_on("user-1", form, today()).unwrap();
        let document = registration.identification.document.unwrap();
        assert_eq!(document.media_type(), "image/png");
    }

    #[test]
    fn errors_serialise_as_list() {
        let errors = validate_user_form(&UserForm::default()).unwrap_err();
        let json = serde_json::to_value(&errors).unwrap();

        assert_eq!(json.as_array().map(Vec::len), Some(3));
        assert_eq!(json[0]["field"], "name");
    }
}
