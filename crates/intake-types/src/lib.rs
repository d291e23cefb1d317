//! Validated text types shared across the intake crates.
//!
//! Each type trims its input on construction and refuses values that do not meet its rule, so
//! holding one is proof the value was checked. Deserialisation goes through the same
//! constructors.

/// Errors that can occur when creating validated text types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input was not a plausible email address
    #[error("Invalid email address")]
    InvalidEmail,
    /// The input was not a `+` followed by 10 to 15 digits
    #[error("Invalid phone number")]
    InvalidPhone,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Returns
    ///
    /// Returns `Ok(NonEmptyText)` if the trimmed input is non-empty,
    /// or `Err(TextError::Empty)` if it's empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters (not bytes) in the text.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

/// An email address with a single `@`, a dot-atom local part and a dotted domain.
///
/// This is a shape check, not deliverability. The whole address is stored lowercased, matching
/// the identity service, which lowercases emails before its uniqueness check; a lookup by email
/// must use the same form to find the user it conflicted with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    const MAX_LEN: usize = 254;
    const MAX_LOCAL_LEN: usize = 64;

    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.len() > Self::MAX_LEN || trimmed.chars().any(char::is_whitespace) {
            return Err(TextError::InvalidEmail);
        }

        let (local, domain) = trimmed.split_once('@').ok_or(TextError::InvalidEmail)?;
        if domain.contains('@') || !Self::local_part_ok(local) {
            return Err(TextError::InvalidEmail);
        }

        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 {
            return Err(TextError::InvalidEmail);
        }
        let labels_ok = labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        });
        if !labels_ok {
            return Err(TextError::InvalidEmail);
        }

        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Dot-separated runs of letters, digits and the printable symbols mail systems allow.
    fn local_part_ok(local: &str) -> bool {
        local.len() <= Self::MAX_LOCAL_LEN
            && local.split('.').all(|atom| {
                !atom.is_empty()
                    && atom
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+/=?^_`{|}~-".contains(&b))
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A phone number in international form: `+` followed by 10 to 15 digits.
///
/// Spaces, dashes and parentheses are accepted on input and stripped, so
/// `(+254) 7 123 - 45678` and `+254712345678` are the same number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }

        let compact: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();

        let digits = compact.strip_prefix('+').ok_or(TextError::InvalidPhone)?;
        if !(10..=15).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TextError::InvalidPhone);
        }

        Ok(Self(compact))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! text_impls {
    ($ty:ident, $ctor:ident) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $ty::$ctor(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

text_impls!(NonEmptyText, new);
text_impls!(EmailAddress, parse);
text_impls!(PhoneNumber, parse);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        assert_eq!(NonEmptyText::new("  John Doe ").unwrap().as_str(), "John Doe");
        assert_eq!(NonEmptyText::new(" \t\n"), Err(TextError::Empty));
    }

    #[test]
    fn char_len_counts_characters() {
        let text = NonEmptyText::new("Zoë").unwrap();
        assert_eq!(text.char_len(), 3);
    }

    #[test]
    fn email_accepts_common_shapes() {
        assert_eq!(
            EmailAddress::parse("John@X.com").unwrap().as_str(),
            "john@x.com"
        );
        assert!(EmailAddress::parse("johndoe@ku.ac.ke").is_ok());
        assert!(EmailAddress::parse("first.last+tag@mail-host.org").is_ok());
        assert!(EmailAddress::parse("o'brien_j@x.com").is_ok());
    }

    #[test]
    fn email_rejects_malformed() {
        for bad in [
            "not-an-email",
            "@x.com",
            "john@",
            "john@x",
            "john@@x.com",
            "john@x..com",
            "john doe@x.com",
            "john@-x.com",
            ".john@x.com",
            "john.@x.com",
            "jo..hn@x.com",
            "jo\"hn@x.com",
            "jo<hn>@x.com",
            "jöhn@x.com",
        ] {
            assert_eq!(
                EmailAddress::parse(bad),
                Err(TextError::InvalidEmail),
                "{bad}"
            );
        }
        assert_eq!(EmailAddress::parse(""), Err(TextError::Empty));

        let long_local = format!("{}@x.com", "a".repeat(65));
        assert_eq!(EmailAddress::parse(long_local), Err(TextError::InvalidEmail));
    }

    #[test]
    fn phone_normalises_separators() {
        let phone = PhoneNumber::parse("(+254) 7 123 - 45678").unwrap();
        assert_eq!(phone.as_str(), "+254712345678");
    }

    #[test]
    fn phone_rejects_missing_plus_and_bad_lengths() {
        assert_eq!(
            PhoneNumber::parse("0712345678"),
            Err(TextError::InvalidPhone)
        );
        assert_eq!(PhoneNumber::parse("+12345"), Err(TextError::InvalidPhone));
        assert_eq!(
            PhoneNumber::parse("+1234567890123456"),
            Err(TextError::InvalidPhone)
        );
        assert_eq!(
            PhoneNumber::parse("+25471234567x"),
            Err(TextError::InvalidPhone)
        );
    }

    #[test]
    fn deserialize_revalidates() {
        let ok: EmailAddress = serde_json::from_str("\"john@x.com\"").unwrap();
        assert_eq!(ok.as_str(), "john@x.com");
        assert!(serde_json::from_str::<PhoneNumber>("\"12\"").is_err());
        assert!(serde_json::from_str::<NonEmptyText>("\"  \"").is_err());
    }
}
