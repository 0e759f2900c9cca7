//! Parsing of `otpauth://` enrollment URIs.
//!
//! Format: `otpauth://totp/[issuer:]label?secret=...&issuer=...&digits=...&period=...&algorithm=...`
//!
//! Only the structure is checked here. Whether the secret is valid base32 is
//! for the server to decide when the account is added.

use std::fmt;

use url::Url;

use crate::account::{AccountSpec, Algorithm};

const SCHEME: &str = "otpauth";
const SUPPORTED_TYPE: &str = "totp";

/// Why an enrollment URI was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpUriError {
    /// Not a URI at all.
    Malformed(String),
    /// Scheme other than `otpauth`.
    UnsupportedScheme(String),
    /// OTP type other than `totp` (or missing).
    UnsupportedType(String),
    /// No `secret` query parameter, or it is blank.
    MissingSecret,
    /// A query parameter that could not be interpreted.
    InvalidParameter { name: &'static str, value: String },
}

impl fmt::Display for OtpUriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtpUriError::Malformed(reason) => write!(f, "Invalid otpauth URI: {reason}"),
            OtpUriError::UnsupportedScheme(scheme) => {
                write!(f, "Expected an otpauth:// URI, got {scheme}://")
            }
            OtpUriError::UnsupportedType(kind) if kind.is_empty() => {
                write!(f, "otpauth URI is missing the OTP type (expected totp)")
            }
            OtpUriError::UnsupportedType(kind) => {
                write!(f, "Unsupported OTP type '{kind}' (only totp is supported)")
            }
            OtpUriError::MissingSecret => write!(f, "otpauth URI has no secret parameter"),
            OtpUriError::InvalidParameter { name, value } => {
                write!(f, "Invalid value for {name}: '{value}'")
            }
        }
    }
}

impl std::error::Error for OtpUriError {}

/// Parses an enrollment URI into an account-creation spec.
///
/// The issuer comes from the `issuer` query parameter when present, else
/// from the `issuer:` prefix of the label. Missing `digits`, `period` and
/// `algorithm` default to 6, 30 and SHA1.
///
/// # Errors
/// Returns an `OtpUriError` describing the first problem found.
pub fn parse_otpauth_uri(input: &str) -> Result<AccountSpec, OtpUriError> {
    let url = Url::parse(input.trim()).map_err(|e| OtpUriError::Malformed(e.to_string()))?;

    if !url.scheme().eq_ignore_ascii_case(SCHEME) {
        return Err(OtpUriError::UnsupportedScheme(url.scheme().to_string()));
    }

    let kind = url.host_str().unwrap_or_default();
    if !kind.eq_ignore_ascii_case(SUPPORTED_TYPE) {
        return Err(OtpUriError::UnsupportedType(kind.to_string()));
    }

    let raw_path = url.path().trim_start_matches('/');
    let path = urlencoding::decode(raw_path).map_err(|e| OtpUriError::Malformed(e.to_string()))?;
    let (label_issuer, label) = split_label(&path);

    let mut secret = None;
    let mut issuer = None;
    let mut digits = None;
    let mut period = None;
    let mut algorithm = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "secret" => secret = Some(value.into_owned()),
            "issuer" => issuer = Some(value.into_owned()),
            "digits" => digits = Some(parse_positive("digits", &value)?),
            "period" => period = Some(parse_positive("period", &value)?),
            "algorithm" => {
                algorithm = Some(value.parse::<Algorithm>().map_err(|_| {
                    OtpUriError::InvalidParameter {
                        name: "algorithm",
                        value: value.into_owned(),
                    }
                })?);
            }
            _ => {}
        }
    }

    let secret = secret
        .filter(|s| !s.trim().is_empty())
        .ok_or(OtpUriError::MissingSecret)?;

    let issuer = issuer
        .filter(|s| !s.trim().is_empty())
        .or(label_issuer)
        .map(|s| s.trim().to_string());

    Ok(AccountSpec {
        issuer,
        label,
        secret,
        digits: digits.unwrap_or(AccountSpec::DEFAULT_DIGITS),
        period: period.unwrap_or(AccountSpec::DEFAULT_PERIOD),
        algorithm: algorithm.unwrap_or_default(),
    })
}

/// Splits `issuer:label` at the first colon.
fn split_label(path: &str) -> (Option<String>, Option<String>) {
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    match path.split_once(':') {
        Some((issuer, label)) => (non_empty(issuer), non_empty(label)),
        None => (None, non_empty(path)),
    }
}

fn parse_positive(name: &'static str, value: &str) -> Result<u32, OtpUriError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(OtpUriError::InvalidParameter {
            name,
            value: value.to_string(),
        }),
    }
}
