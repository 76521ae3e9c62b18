//! Configuration Types
//!
//! Flow configuration. Built once by [`crate::builders::FlowConfigBuilder`]
//! and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Content type used to encode the token endpoint request body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    /// `application/x-www-form-urlencoded`.
    #[default]
    #[serde(rename = "form-urlencoded", alias = "application/x-www-form-urlencoded")]
    FormUrlEncoded,
    /// `application/json`.
    #[serde(rename = "json", alias = "application/json")]
    Json,
}

impl ContentType {
    /// MIME type sent in the `content-type` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
            Self::Json => "application/json",
        }
    }
}

/// Grant type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "authorization_code")]
    AuthorizationCode,
    #[serde(rename = "refresh_token")]
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Immutable configuration of one flow instance.
#[derive(Clone, Debug)]
pub struct FlowConfiguration {
    /// Authorization endpoint the browser is sent to.
    pub authorization_url: Url,
    /// Token endpoint for code and refresh exchanges.
    pub token_url: Url,
    /// Public client identifier.
    pub client_id: String,
    /// Loopback redirect URI registered with the provider.
    pub redirect_url: Url,
    /// Encoding of token endpoint request bodies.
    pub access_token_request_content_type: ContentType,
    /// Space separated scopes.
    pub scope: String,
    /// Optional API audience.
    pub audience: Option<String>,
    /// How long to wait for the browser redirect.
    pub redirect_timeout: Duration,
    /// Bound on every token endpoint request.
    pub request_timeout: Duration,
    /// Refresh proactively when the access token expires within this window.
    pub refresh_threshold: Duration,
    /// Where to send the browser after a successful login. A static page is
    /// served when unset.
    pub success_redirect_url: Option<Url>,
}

impl FlowConfiguration {
    /// Scopes as a list.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope.split_whitespace().collect()
    }
}

/// Serde-loadable flow options. Every field is optional; missing values fall
/// back to the defaults of the chosen preset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_request_content_type: Option<ContentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Redirect wait in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_timeout_secs: Option<u64>,
    /// Token request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_threshold_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_redirect_url: Option<String>,
}

/// Default configuration values.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REDIRECT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_REFRESH_THRESHOLD_SECS: u64 = 300;
pub const DEFAULT_CLIENT_ID: &str = "cli";
pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:8123";
pub const OPENID_DEFAULT_SCOPE: &str = "openid profile email offline_access";
