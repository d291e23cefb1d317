//! Patient registration: the raw registration form, its validated form, and the persisted
//! patient record.
//!
//! The validated [`PatientRegistration`] is grouped the way the form is laid out (personal,
//! medical, identification, consent). The persisted [`PatientRecord`] is flat, with camelCase
//! attribute names, because that is the shape of the patient collection at the backend.

use crate::document::{DocumentUpload, IdentificationDocument, StoredDocument};
use crate::user::{User, UserInput};
use chrono::NaiveDate;
use intake_types::{NonEmptyText, PhoneNumber};
use intake_uuid::UniqueId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gender::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of identification document the registration form offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentificationType {
    #[serde(rename = "Birth Certificate")]
    BirthCertificate,
    #[serde(rename = "Driver's License")]
    DriversLicense,
    #[serde(rename = "Medical Insurance Card/Policy")]
    MedicalInsuranceCard,
    #[serde(rename = "Military ID Card")]
    MilitaryIdCard,
    #[serde(rename = "National Identity Card")]
    NationalIdentityCard,
    #[serde(rename = "Passport")]
    Passport,
    #[serde(rename = "Resident Alien Card (Green Card)")]
    ResidentAlienCard,
    #[serde(rename = "Social Security Card")]
    SocialSecurityCard,
    #[serde(rename = "State ID Card")]
    StateIdCard,
    #[serde(rename = "Student ID Card")]
    StudentIdCard,
    #[serde(rename = "Voter ID Card")]
    VoterIdCard,
}

impl IdentificationType {
    pub const ALL: [IdentificationType; 11] = [
        IdentificationType::BirthCertificate,
        IdentificationType::DriversLicense,
        IdentificationType::MedicalInsuranceCard,
        IdentificationType::MilitaryIdCard,
        IdentificationType::NationalIdentityCard,
        IdentificationType::Passport,
        IdentificationType::ResidentAlienCard,
        IdentificationType::SocialSecurityCard,
        IdentificationType::StateIdCard,
        IdentificationType::StudentIdCard,
        IdentificationType::VoterIdCard,
    ];

    /// Label shown in the form and stored on the record.
    pub fn label(self) -> &'static str {
        match self {
            IdentificationType::BirthCertificate => "Birth Certificate",
            IdentificationType::DriversLicense => "Driver's License",
            IdentificationType::MedicalInsuranceCard => "Medical Insurance Card/Policy",
            IdentificationType::MilitaryIdCard => "Military ID Card",
            IdentificationType::NationalIdentityCard => "National Identity Card",
            IdentificationType::Passport => "Passport",
            IdentificationType::ResidentAlienCard => "Resident Alien Card (Green Card)",
            IdentificationType::SocialSecurityCard => "Social Security Card",
            IdentificationType::StateIdCard => "State ID Card",
            IdentificationType::StudentIdCard => "Student ID Card",
            IdentificationType::VoterIdCard => "Voter ID Card",
        }
    }
}

impl FromStr for IdentificationType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdentificationType::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

/// Field values exactly as the registration form collected them.
///
/// The identification document travels alongside the JSON fields (multipart or base64 at the
/// edge), so it is not part of the serialised form.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: String,
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
    #[serde(skip)]
    pub identification_document: Option<DocumentUpload>,
    /// Why the document could not be read at the edge, e.g. undecodable base64. Reported as an
    /// `identificationDocument` error together with every other failing field.
    #[serde(skip)]
    pub identification_document_error: Option<String>,
    pub treatment_consent: bool,
    pub disclosure_consent: bool,
    pub privacy_consent: bool,
}

impl RegistrationForm {
    /// Initial form values for a user continuing from the patient form.
    pub fn prefilled(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            gender: Gender::Male.as_str().to_string(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonalDetails {
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub address: NonEmptyText,
    pub occupation: NonEmptyText,
    pub emergency_contact_name: NonEmptyText,
    pub emergency_contact_number: PhoneNumber,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MedicalDetails {
    pub primary_physician: NonEmptyText,
    pub insurance_provider: NonEmptyText,
    pub insurance_policy_number: NonEmptyText,
    pub allergies: Option<NonEmptyText>,
    pub current_medication: Option<NonEmptyText>,
    pub family_medical_history: Option<NonEmptyText>,
    pub past_medical_history: Option<NonEmptyText>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentificationDetails {
    pub identification_type: Option<IdentificationType>,
    pub identification_number: Option<NonEmptyText>,
    pub document: Option<IdentificationDocument>,
}

/// Consents given on the form. Validation only lets through registrations where all are given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Consent {
    pub treatment: bool,
    pub disclosure: bool,
    pub privacy: bool,
}

/// A registration that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientRegistration {
    pub user_id: UniqueId,
    pub identity: UserInput,
    pub personal: PersonalDetails,
    pub medical: MedicalDetails,
    pub identification: IdentificationDetails,
    pub consent: Consent,
}

impl PatientRegistration {
    /// Attributes written to the patient collection.
    ///
    /// `document` is the upload that already completed for this registration, if any; the
    /// record only ever points at a file that exists.
    pub fn record_fields(&self, document: Option<&StoredDocument>) -> PatientRecordFields {
        let text = |t: &Option<NonEmptyText>| t.as_ref().map(|t| t.as_str().to_string());

        PatientRecordFields {
            user_id: self.user_id.to_string(),
            name: self.identity.name.to_string(),
            email: self.identity.email.to_string(),
            phone: self.identity.phone.to_string(),
            birth_date: self.personal.birth_date.format("%Y-%m-%d").to_string(),
            gender: self.personal.gender,
            address: self.personal.address.to_string(),
            occupation: self.personal.occupation.to_string(),
            emergency_contact_name: self.personal.emergency_contact_name.to_string(),
            emergency_contact_number: self.personal.emergency_contact_number.to_string(),
            primary_physician: self.medical.primary_physician.to_string(),
            insurance_provider: self.medical.insurance_provider.to_string(),
            insurance_policy_number: self.medical.insurance_policy_number.to_string(),
            allergies: text(&self.medical.allergies),
            current_medication: text(&self.medical.current_medication),
            family_medical_history: text(&self.medical.family_medical_history),
            past_medical_history: text(&self.medical.past_medical_history),
            identification_type: self.identification.identification_type,
            identification_number: text(&self.identification.identification_number),
            identification_document_id: document.map(|d| d.id.clone()),
            identification_document_url: document.map(|d| d.url.clone()),
            treatment_consent: self.consent.treatment,
            disclosure_consent: self.consent.disclosure,
            privacy_consent: self.consent.privacy,
        }
    }
}

/// Attributes of a patient record at the backend.
///
/// Optional attributes serialise as `null` rather than being omitted, so the document id and
/// URL are explicitly null when no document was supplied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecordFields {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: String,
    pub gender: Gender,
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
    pub identification_type: Option<IdentificationType>,
    pub identification_number: Option<String>,
    pub identification_document_id: Option<String>,
    pub identification_document_url: Option<String>,
    pub treatment_consent: bool,
    pub disclosure_consent: bool,
    pub privacy_consent: bool,
}

/// A persisted patient record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: PatientRecordFields,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_parses_case_insensitively() {
        assert_eq!("female".parse::<Gender>(), Ok(Gender::Female));
        assert_eq!(" Other ".parse::<Gender>(), Ok(Gender::Other));
        assert!("unknown".parse::<Gender>().is_err());
    }

    #[test]
    fn identification_type_labels_round_trip_through_serde() {
        for kind in IdentificationType::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.label()));
            assert_eq!(kind.label().parse::<IdentificationType>(), Ok(kind));
        }
    }

    #[test]
    fn prefilled_copies_identity_only() {
        let user = User {
            id: "u1".into(),
            name: "John Doe".into(),
            email: "john@x.com".into(),
            phone: "+254712345678".into(),
        };

        let form = RegistrationForm::prefilled(&user);
        assert_eq!(form.name, "John Doe");
        assert_eq!(form.email, "john@x.com");
        assert_eq!(form.phone, "+254712345678");
        assert_eq!(form.gender, "Male");
        assert!(form.address.is_empty());
        assert!(!form.treatment_consent);
    }

    #[test]
    fn record_decodes_with_backend_metadata() {
        let json = r#"{
            "$id": "rec1",
            "$collectionId": "patients",
            "$databaseId": "db",
            "userId": "u1",
            "name": "John Doe",
            "email": "john@x.com",
            "phone": "+254712345678",
            "birthDate": "1990-01-01",
            "gender": "Male",
            "address": "Kimathi Street, Nairobi",
            "occupation": "Engineer",
            "emergencyContactName": "Jane Doe",
            "emergencyContactNumber": "+254700000000",
            "primaryPhysician": "Dr. Green",
            "insuranceProvider": "NHIF",
            "insurancePolicyNumber": "ABC123",
            "allergies": null,
            "currentMedication": null,
            "familyMedicalHistory": null,
            "pastMedicalHistory": null,
            "identificationType": "Passport",
            "identificationNumber": "P123",
            "identificationDocumentId": null,
            "identificationDocumentUrl": null,
            "treatmentConsent": true,
            "disclosureConsent": true,
            "privacyConsent": true
        }"#;

        let record: PatientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "rec1");
        assert_eq!(record.fields.identification_type, Some(IdentificationType::Passport));
        assert_eq!(record.fields.identification_document_id, None);
    }
}
