//! OAuth2 CLI Login
//!
//! Browser-delegated OAuth2 / OpenID Connect login for command-line tools.
//!
//! # Features
//!
//! - Authorization Code Flow (RFC 6749 Section 4.1)
//! - PKCE with S256 (RFC 7636)
//! - Loopback redirect capture (RFC 8252 Section 7.3)
//! - Token Refresh (RFC 6749 Section 6)
//! - OpenID Connect variant with `nonce` and ID token claims
//!
//! # Example
//!
//! ```rust,ignore
//! use oauth2_cli_login::{openid_client, openid_config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = openid_config()
//!         .authorization_url("https://auth.example.com/authorize")
//!         .token_url("https://auth.example.com/oauth/token")
//!         .audience("https://api.example.com")
//!         .build()?;
//!
//!     let mut client = openid_client(config)?;
//!     let tokens = client.login().await?;
//!     println!("Logged in, token expires at {:?}", tokens.expires_at);
//!
//!     let tokens = client.refresh(&tokens).await?;
//!     println!("Refreshed: {}", tokens.authorization_header().len());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: configuration, PKCE, callback and token types
//! - `error`: error hierarchy with provider error mapping
//! - `core`: PKCE, state, HTTP transport, loopback listener, browser launch,
//!   token exchange and response validation
//! - `flows`: the login engine and its OAuth2 / OpenID variants
//! - `builders`: fluent configuration builder
//! - `telemetry`: span names and attributes
//! - `client`: high-level login client

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod flows;
pub mod telemetry;
pub mod types;

// Re-export main client
pub use client::{oauth2_client, openid_client, LoginClient};

// Re-export builders
pub use builders::{flow_config, openid_config, FlowConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, get_user_message, map_token_error, parse_error_response,
    AuthorizationError, ConfigurationError, ErrorKind, FlowError, ListenerError, NetworkError,
    OAuth2Error, OAuth2ErrorResponse, OAuth2Result, ProtocolError, ProviderError, TokenError,
};

// Re-export types
pub use types::{
    // Config
    ContentType, FlowConfiguration, FlowOptions, GrantType,
    // Auth
    AuthorizationParameters, PkceMethod, PkcePair,
    // Callback
    AuthorizationCode, CallbackParams,
    // Token
    TokenParameters, TokenResponse, TokenSet,
};

#[cfg(feature = "jwt")]
pub use types::IdTokenClaims;

// Re-export core components
pub use crate::core::{
    // Transport
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
    // State
    FixedStateGenerator, RandomStateGenerator, StateGenerator,
    // PKCE
    DefaultPkceGenerator, MockPkceGenerator, PkceGenerator,
    // Redirect capture
    BoundRedirect, LoopbackRedirectListener, MockRedirect, MockRedirectListener,
    RedirectListener,
    // Browser
    BrowserLauncher, RecordingBrowserLauncher, SystemBrowserLauncher,
    // Exchange and validation
    FieldKind, FieldSpec, ResponseSchema, TokenExchangeClient,
};

// Re-export flows
pub use flows::{
    cancel_on_ctrl_c, AuthorizationCodeFlow, FlowState, FlowVariant, OAuth2Flow, OpenIdFlow,
};

// Re-export telemetry
pub use telemetry::{SpanAttributes, SpanNames};

// Re-export cancellation token
pub use tokio_util::sync::CancellationToken;
