//! Telemetry
//!
//! Span names and attribute keys used with `tracing`.
//!
//! The crate only emits spans and events; installing a subscriber is left to
//! the application.

/// Login flow span names.
pub struct SpanNames;

impl SpanNames {
    pub const AUTHORIZE: &'static str = "oauth2.authorize";
    pub const REDIRECT_WAIT: &'static str = "oauth2.redirect_wait";
    pub const TOKEN_EXCHANGE: &'static str = "oauth2.token_exchange";
    pub const TOKEN_REFRESH: &'static str = "oauth2.token_refresh";
}

/// Span attribute keys.
pub struct SpanAttributes;

impl SpanAttributes {
    pub const FLOW: &'static str = "oauth2.flow";
    pub const CLIENT_ID: &'static str = "oauth2.client_id";
    pub const GRANT_TYPE: &'static str = "oauth2.grant_type";
    pub const ERROR_CODE: &'static str = "oauth2.error_code";
}
