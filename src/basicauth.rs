//! Basic-auth credential validation.
//!
//! A [`Credential`] is validated once, at construction, and held for the
//! process lifetime; a credential that cannot be constructed means the
//! server refuses to start rather than running half-guarded. Per-request
//! checks are pure comparisons over that immutable state.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::request::Request;

const DEFAULT_REALM: &str = "Authorization Required Area";

/// Why a credential was rejected at construction. Startup-fatal — these are
/// operator errors, never shown to HTTP clients.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("user id and password must be non-empty")]
    Empty,
    #[error("user id must not contain ':'")]
    ColonInUserId,
    #[error("user id and password must not contain control characters")]
    ControlCharacter,
}

/// Why a request failed authentication. Recovered locally by the auth gate
/// as a 401 plus challenge; the distinction only matters for diagnostics.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no credentials supplied")]
    Missing,
    #[error("malformed authorization header")]
    Malformed,
    #[error("credentials do not match")]
    Mismatch,
}

/// The server-side credential for Basic authentication.
#[derive(Clone)]
pub struct Credential {
    user_id: String,
    password: String,
    realm: String,
}

impl Credential {
    /// Constructs a validated credential with the default realm.
    pub fn new(user_id: &str, password: &str) -> Result<Self, ValidationError> {
        Self::with_realm(user_id, password, DEFAULT_REALM)
    }

    /// Constructs a validated credential with an explicit realm.
    pub fn with_realm(
        user_id: &str,
        password: &str,
        realm: &str,
    ) -> Result<Self, ValidationError> {
        let cred = Self {
            user_id: user_id.to_owned(),
            password: password.to_owned(),
            realm: realm.to_owned(),
        };
        cred.validate()?;
        Ok(cred)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.is_empty() || self.password.is_empty() {
            return Err(ValidationError::Empty);
        }
        if self.user_id.contains(':') {
            return Err(ValidationError::ColonInUserId);
        }
        if contains_control(&self.user_id) || contains_control(&self.password) {
            return Err(ValidationError::ControlCharacter);
        }
        Ok(())
    }

    /// Checks the request's `Authorization` header against this credential.
    ///
    /// Exact, case-sensitive string comparison — no normalization.
    pub fn authenticate(&self, req: &Request) -> Result<(), AuthError> {
        let (user_id, password) = basic_credentials(req)?;
        if self.user_id != user_id || self.password != password {
            return Err(AuthError::Mismatch);
        }
        Ok(())
    }

    /// The realm-quoted challenge for the `WWW-Authenticate` header.
    pub fn challenge(&self) -> String {
        format!(r#"Basic realm="{}""#, self.realm)
    }
}

/// Extracts the user id and password from `Authorization: Basic <base64>`.
///
/// The scheme match is case-insensitive per RFC 7617; the split is at the
/// first `:` so passwords may contain colons.
fn basic_credentials(req: &Request) -> Result<(String, String), AuthError> {
    let header = req.header("authorization").ok_or(AuthError::Missing)?;
    let encoded = header
        .strip_prefix("Basic ")
        .or_else(|| {
            header
                .get(..6)
                .filter(|scheme| scheme.eq_ignore_ascii_case("basic "))
                .map(|_| &header[6..])
        })
        .ok_or(AuthError::Malformed)?;
    let decoded = BASE64
        .decode(encoded.trim())
        .map_err(|_| AuthError::Malformed)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::Malformed)?;
    let (user_id, password) = decoded.split_once(':').ok_or(AuthError::Malformed)?;
    Ok((user_id.to_owned(), password.to_owned()))
}

fn contains_control(s: &str) -> bool {
    s.chars().any(char::is_control)
}
