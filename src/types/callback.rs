//! Callback Types
//!
//! Parameters carried by the provider redirect to the loopback listener.

use url::Url;

use crate::core::state::states_match;
use crate::error::{AuthorizationError, OAuth2Error};

/// Callback parameters from authorization redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    /// Authorization code (if success).
    pub code: Option<String>,
    /// State parameter.
    pub state: Option<String>,
    /// Error code (if authorization failed).
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
    /// Error URI.
    pub error_uri: Option<String>,
}

/// Authorization code extracted from a validated redirect.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationCode(String);

impl AuthorizationCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthorizationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthorizationCode([REDACTED])")
    }
}

impl CallbackParams {
    /// Successful redirect carrying `code` and `state`.
    pub fn success(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            state: Some(state.into()),
            ..Default::default()
        }
    }

    /// Provider-side failure redirect.
    pub fn failure(
        error: impl Into<String>,
        error_description: Option<String>,
        state: Option<String>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            error_description,
            state,
            ..Default::default()
        }
    }

    /// Parse callback parameters from a raw query string.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                "error_uri" => params.error_uri = Some(value.into_owned()),
                _ => {}
            }
        }

        params
    }

    /// Parse callback parameters from URL.
    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or(""))
    }

    /// Check if callback contains an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check if callback is successful.
    pub fn is_success(&self) -> bool {
        self.code.is_some() && self.error.is_none()
    }

    /// Validate the redirect against the state generated for this attempt.
    ///
    /// The state is checked before anything else: an unbound redirect is
    /// rejected even when it carries a provider error.
    pub fn into_code(self, expected_state: &str) -> Result<AuthorizationCode, OAuth2Error> {
        let state_matches = self
            .state
            .as_deref()
            .is_some_and(|received| states_match(expected_state, received));
        if !state_matches {
            return Err(AuthorizationError::StateMismatch {
                received: self.state,
            }
            .into());
        }

        if let Some(error) = self.error {
            return Err(AuthorizationError::AccessDenied {
                error,
                error_description: self.error_description,
                error_uri: self.error_uri,
            }
            .into());
        }

        self.code
            .filter(|code| !code.is_empty())
            .map(AuthorizationCode)
            .ok_or_else(|| AuthorizationError::MissingCode.into())
    }
}
