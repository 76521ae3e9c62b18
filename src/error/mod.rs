//! OAuth2 Error Types
//!
//! Error hierarchy for the browser login flow. Every failure path produces a
//! distinguishable [`ErrorKind`].

use std::time::Duration;
use thiserror::Error;

/// Root error type for the login flow.
#[derive(Error, Debug)]
pub enum OAuth2Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Redirect listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),
}

/// Coarse classification of a flow failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfiguration,
    AuthorizationDenied,
    StateMismatch,
    RedirectTimeout,
    Cancelled,
    NetworkFailure,
    ProviderRejected,
    InvalidTokenResponse,
    Listener,
    Flow,
}

impl OAuth2Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::InvalidConfiguration,
            Self::Authorization(e) => match e {
                AuthorizationError::StateMismatch { .. } => ErrorKind::StateMismatch,
                AuthorizationError::RedirectTimeout { .. } => ErrorKind::RedirectTimeout,
                AuthorizationError::Cancelled => ErrorKind::Cancelled,
                _ => ErrorKind::AuthorizationDenied,
            },
            Self::Token(TokenError::NoRefreshToken) => ErrorKind::Flow,
            Self::Token(_) => ErrorKind::InvalidTokenResponse,
            Self::Network(_) => ErrorKind::NetworkFailure,
            Self::Protocol(_) => ErrorKind::InvalidTokenResponse,
            Self::Provider(_) => ErrorKind::ProviderRejected,
            Self::Listener(_) => ErrorKind::Listener,
            Self::Flow(_) => ErrorKind::Flow,
        }
    }

    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "OAUTH2_CONFIG",
            Self::Authorization(_) => "OAUTH2_AUTH",
            Self::Token(_) => "OAUTH2_TOKEN",
            Self::Network(_) => "OAUTH2_NETWORK",
            Self::Protocol(_) => "OAUTH2_PROTOCOL",
            Self::Provider(_) => "OAUTH2_PROVIDER",
            Self::Listener(_) => "OAUTH2_LISTENER",
            Self::Flow(_) => "OAUTH2_FLOW",
        }
    }

    /// Check if error is retryable by the caller. The engine never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::Provider(ProviderError::ServerError { .. }) => true,
            Self::Provider(ProviderError::TemporarilyUnavailable { .. }) => true,
            _ => false,
        }
    }

    /// Get retry-after duration if applicable.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Provider(ProviderError::TemporarilyUnavailable { retry_after }) => *retry_after,
            _ => None,
        }
    }

    /// Check if error requires a new browser login.
    pub fn needs_reauth(&self) -> bool {
        match self {
            Self::Token(TokenError::NoRefreshToken) => true,
            Self::Provider(ProviderError::InvalidGrant { .. }) => true,
            Self::Authorization(AuthorizationError::AccessDenied { .. }) => true,
            _ => false,
        }
    }
}

/// Configuration error. Raised before any network activity.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL for {field}: {url}")]
    InvalidEndpoint { field: String, url: String },

    #[error("Redirect URL must be an http loopback address: {url}")]
    NonLoopbackRedirect { url: String },

    #[error("PKCE verifier length must be between 43 and 128, got {length}")]
    InvalidVerifierLength { length: usize },
}

/// Authorization (browser/redirect) stage error.
#[derive(Error, Debug)]
pub enum AuthorizationError {
    #[error("Access denied: {error}")]
    AccessDenied {
        error: String,
        error_description: Option<String>,
        error_uri: Option<String>,
    },

    #[error("State parameter mismatch (possible CSRF attack)")]
    StateMismatch { received: Option<String> },

    #[error("Login was not completed in time ({timeout:?})")]
    RedirectTimeout { timeout: Duration },

    #[error("Login was cancelled")]
    Cancelled,

    #[error("Missing authorization code in redirect")]
    MissingCode,
}

/// Token-related error.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Invalid token format: {message}")]
    InvalidToken { message: String },
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("TLS error: {message}")]
    TlsError { message: String },
}

impl NetworkError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::TlsError { .. })
    }
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid token response: {message}")]
    InvalidTokenResponse { message: String },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },
}

/// Token endpoint (authorization server) error.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid client: {}", error_description.as_deref().unwrap_or("rejected"))]
    InvalidClient { error_description: Option<String> },

    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid scope: {scope}")]
    InvalidScope { scope: String },

    #[error("Unauthorized client for this grant type")]
    UnauthorizedClient { error_description: Option<String> },

    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType { grant_type: String },

    #[error("Server error: {message}")]
    ServerError { message: String },

    #[error("Server temporarily unavailable")]
    TemporarilyUnavailable { retry_after: Option<Duration> },
}

/// Loopback listener error.
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Failed to bind {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Listener I/O failed: {message}")]
    Io { message: String },

    #[error("Failed to open browser: {message}")]
    BrowserLaunch { message: String },
}

/// State machine error.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Result type for OAuth2 operations.
pub type OAuth2Result<T> = Result<T, OAuth2Error>;

/// OAuth2 error response from provider.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

/// Map token endpoint error response to error type.
pub fn map_token_error(response: &OAuth2ErrorResponse) -> ProviderError {
    let description = || {
        response
            .error_description
            .clone()
            .unwrap_or_else(|| response.error.clone())
    };

    match response.error.as_str() {
        "invalid_client" => ProviderError::InvalidClient {
            error_description: response.error_description.clone(),
        },
        "invalid_grant" => ProviderError::InvalidGrant {
            message: description(),
        },
        "invalid_scope" => ProviderError::InvalidScope {
            scope: response.error_description.clone().unwrap_or_default(),
        },
        "unauthorized_client" => ProviderError::UnauthorizedClient {
            error_description: response.error_description.clone(),
        },
        "unsupported_grant_type" => ProviderError::UnsupportedGrantType {
            grant_type: response.error_description.clone().unwrap_or_default(),
        },
        "server_error" => ProviderError::ServerError {
            message: description(),
        },
        "temporarily_unavailable" => ProviderError::TemporarilyUnavailable { retry_after: None },
        _ => ProviderError::InvalidRequest {
            message: description(),
        },
    }
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Create error from a non-success token endpoint response.
pub fn create_error_from_response(status: u16, body: &str) -> OAuth2Error {
    if let Some(response) = parse_error_response(body) {
        return OAuth2Error::Provider(map_token_error(&response));
    }

    let error = match status {
        400 => ProviderError::InvalidRequest {
            message: "Bad request".to_string(),
        },
        401 => ProviderError::InvalidClient {
            error_description: Some("Unauthorized".to_string()),
        },
        403 => ProviderError::UnauthorizedClient {
            error_description: Some("Forbidden".to_string()),
        },
        429 => ProviderError::TemporarilyUnavailable {
            retry_after: Some(Duration::from_secs(60)),
        },
        _ => ProviderError::ServerError {
            message: format!("HTTP {}", status),
        },
    };

    OAuth2Error::Provider(error)
}

/// Get user-friendly error message.
pub fn get_user_message(error: &OAuth2Error) -> String {
    match error {
        OAuth2Error::Configuration(_) => {
            "The login configuration is invalid. Check the endpoint URLs and client id.".to_string()
        }
        OAuth2Error::Authorization(AuthorizationError::AccessDenied { .. }) => {
            "Access was denied. Please try signing in again and grant the requested permissions."
                .to_string()
        }
        OAuth2Error::Authorization(AuthorizationError::StateMismatch { .. }) => {
            "Security validation failed. Please restart the sign-in process.".to_string()
        }
        OAuth2Error::Authorization(AuthorizationError::RedirectTimeout { .. }) => {
            "Login was not completed in time. Please try again.".to_string()
        }
        OAuth2Error::Authorization(AuthorizationError::Cancelled) => {
            "Login was cancelled.".to_string()
        }
        OAuth2Error::Token(TokenError::NoRefreshToken)
        | OAuth2Error::Provider(ProviderError::InvalidGrant { .. }) => {
            "Your session cannot be renewed. Please sign in again.".to_string()
        }
        OAuth2Error::Network(NetworkError::Timeout { .. }) => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        OAuth2Error::Network(_) => {
            "Could not reach the authentication service. Please check your connection.".to_string()
        }
        OAuth2Error::Provider(ProviderError::ServerError { .. })
        | OAuth2Error::Provider(ProviderError::TemporarilyUnavailable { .. }) => {
            "The authentication service is temporarily unavailable. Please try again later."
                .to_string()
        }
        OAuth2Error::Listener(ListenerError::BindFailed { address, .. }) => format!(
            "Could not listen for the login redirect on {}. Is another login in progress?",
            address
        ),
        _ => "An authentication error occurred. Please try again.".to_string(),
    }
}
