//! Users: the raw patient form, its validated form, and the remote user entity.

use intake_types::{EmailAddress, NonEmptyText, PhoneNumber};
use serde::{Deserialize, Serialize};

/// Field values exactly as the patient form collected them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserForm {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Identity fields that passed validation.
///
/// This is the whole payload sent when creating a user; anything else the richer registration
/// form collects is persisted later with the patient record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    pub name: NonEmptyText,
    pub email: EmailAddress,
    pub phone: PhoneNumber,
}

/// A user as stored by the remote identity service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// One page of a user listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserList {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub users: Vec<User>,
}

/// Filter for user listings.
///
/// Only exact match is needed here: conflict resolution looks users up by email.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    Equal {
        attribute: &'static str,
        values: Vec<String>,
    },
}

impl Query {
    pub fn equal(attribute: &'static str, values: impl IntoIterator<Item = String>) -> Self {
        Query::Equal {
            attribute,
            values: values.into_iter().collect(),
        }
    }

    /// True if `user` satisfies the query. Used by stores that filter locally.
    pub fn matches(&self, user: &User) -> bool {
        match self {
            Query::Equal { attribute, values } => {
                let field = match *attribute {
                    "$id" => &user.id,
                    "name" => &user.name,
                    "email" => &user.email,
                    "phone" => &user.phone,
                    _ => return false,
                };
                values.iter().any(|v| v == field)
            }
        }
    }
}
