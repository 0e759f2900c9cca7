//! Manual-entry form: either an enrollment URI or explicit fields.

use std::fmt;

use crate::account::{AccountSpec, Algorithm};
use crate::otpauth::{OtpUriError, parse_otpauth_uri};

/// Form contents as typed (or pre-filled by a scan).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryForm {
    pub uri: String,
    pub secret: String,
    pub issuer: String,
    pub label: String,
    pub digits: Option<u32>,
    pub period: Option<u32>,
    pub algorithm: Option<Algorithm>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// Neither a URI nor a secret was given.
    Empty,
    Uri(OtpUriError),
    /// Digits or period set to zero.
    InvalidField(&'static str),
}

impl fmt::Display for EntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryError::Empty => write!(f, "Enter an otpauth:// URI or a secret"),
            EntryError::Uri(e) => write!(f, "{e}"),
            EntryError::InvalidField(name) => write!(f, "{name} must be greater than zero"),
        }
    }
}

impl std::error::Error for EntryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EntryError::Uri(e) => Some(e),
            _ => None,
        }
    }
}

impl From<OtpUriError> for EntryError {
    fn from(e: OtpUriError) -> Self {
        EntryError::Uri(e)
    }
}

impl EntryForm {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uri.trim().is_empty() && self.secret.trim().is_empty()
    }

    /// Builds the account-creation request.
    ///
    /// A non-empty URI takes precedence over the individual fields.
    ///
    /// # Errors
    /// `Empty` when neither URI nor secret is present, `Uri` when the URI is
    /// malformed, `InvalidField` for zero digits/period.
    pub fn to_spec(&self) -> Result<AccountSpec, EntryError> {
        let uri = self.uri.trim();
        if !uri.is_empty() {
            return Ok(parse_otpauth_uri(uri)?);
        }

        let secret = self.secret.trim();
        if secret.is_empty() {
            return Err(EntryError::Empty);
        }

        let digits = self.digits.unwrap_or(AccountSpec::DEFAULT_DIGITS);
        if digits == 0 {
            return Err(EntryError::InvalidField("digits"));
        }
        let period = self.period.unwrap_or(AccountSpec::DEFAULT_PERIOD);
        if period == 0 {
            return Err(EntryError::InvalidField("period"));
        }

        let spec = AccountSpec {
            issuer: Some(self.issuer.clone()),
            label: Some(self.label.clone()),
            secret: secret.to_string(),
            digits,
            period,
            algorithm: self.algorithm.unwrap_or_default(),
        };
        Ok(spec.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_form_is_rejected() {
        assert_eq!(EntryForm::default().to_spec(), Err(EntryError::Empty));
        let blank = EntryForm {
            uri: "  ".into(),
            secret: " ".into(),
            ..EntryForm::default()
        };
        assert!(blank.is_empty());
        assert_eq!(blank.to_spec(), Err(EntryError::Empty));
    }

    #[test]
    fn test_uri_wins_over_fields() {
        let form = EntryForm {
            uri: "otpauth://totp/Acme:bob?secret=URISECRET".into(),
            secret: "FIELDSECRET".into(),
            ..EntryForm::default()
        };
        let spec = form.to_spec().unwrap();
        assert_eq!(spec.secret, "URISECRET");
        assert_eq!(spec.issuer.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_bad_uri_is_reported() {
        let err = EntryForm::from_uri("otpauth://totp/x").to_spec().unwrap_err();
        assert_eq!(err, EntryError::Uri(OtpUriError::MissingSecret));
    }

    #[test]
    fn test_manual_fields_are_normalized() {
        let form = EntryForm {
            secret: "jbsw y3dp".into(),
            issuer: "GitHub".into(),
            label: String::new(),
            digits: Some(8),
            ..EntryForm::default()
        };
        let spec = form.to_spec().unwrap();
        assert_eq!(spec.secret, "JBSWY3DP");
        assert_eq!(spec.issuer.as_deref(), Some("GitHub"));
        assert_eq!(spec.label, None);
        assert_eq!(spec.digits, 8);
        assert_eq!(spec.period, 30);
        assert_eq!(spec.algorithm, Algorithm::Sha1);
    }

    #[test]
    fn test_zero_period_rejected() {
        let form = EntryForm {
            secret: "ABC".into(),
            period: Some(0),
            ..EntryForm::default()
        };
        assert_eq!(form.to_spec(), Err(EntryError::InvalidField("period")));
    }
}
