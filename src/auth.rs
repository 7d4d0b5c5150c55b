//! http basic authentication for the webhook endpoint
use http::{header::AUTHORIZATION, HeaderMap};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::error::AlertError;

#[derive(Debug, Clone, Default, Deserialize)]
/// Credentials the monitoring platform has to present. The guard is enabled if
/// both are set.
pub struct AuthSettings {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl AuthSettings {
    fn username(&self) -> Option<&str> {
        self.username.as_deref().filter(|s| !s.is_empty())
    }

    fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|s| !s.is_empty())
    }

    pub(crate) fn validate(&self) -> Result<(), AlertError> {
        match (self.username(), self.password()) {
            (Some(_), None) => Err(AlertError::Configuration(
                "`auth.password` (API_PASSWORD) must be set together with `auth.username`".into(),
            )),
            (None, Some(_)) => Err(AlertError::Configuration(
                "`auth.username` (API_USERNAME) must be set together with `auth.password`".into(),
            )),
            _ => Ok(()),
        }
    }

    /// configured credentials, `None` if authentication is disabled
    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials { username: self.username()?.to_string(), password: self.password()?.to_string() })
    }
}

#[derive(Debug, Clone)]
pub struct AuthGuard {
    expected: Credentials,
}

impl AuthGuard {
    pub fn new(expected: Credentials) -> Self {
        Self { expected }
    }

    /// Checks the `Authorization` header of a request.
    ///
    /// Username and password are both compared in constant time, a mismatch of
    /// either rejects the request with [AlertError::Unauthorized].
    pub fn check(&self, headers: &HeaderMap) -> Result<(), AlertError> {
        let presented = basic_credentials(headers).ok_or(AlertError::Unauthorized)?;

        let username_ok = presented.username.as_bytes().ct_eq(self.expected.username.as_bytes());
        let password_ok = presented.password.as_bytes().ct_eq(self.expected.password.as_bytes());

        if bool::from(username_ok & password_ok) {
            Ok(())
        } else {
            Err(AlertError::Unauthorized)
        }
    }
}

/// decodes `Authorization: Basic base64(user:password)`
fn basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = base64::decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;

    Some(Credentials { username: username.to_string(), password: password.to_string() })
}
