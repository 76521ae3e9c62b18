//! Flow Variants
//!
//! The parts of the login flow that differ between providers: request
//! parameters and the expected token response shape.

use serde_json::Value;

use crate::core::ResponseSchema;
use crate::types::{
    AuthorizationCode, AuthorizationParameters, FlowConfiguration, GrantType, PkcePair,
    TokenParameters,
};

/// Variant behavior injected into [`crate::flows::AuthorizationCodeFlow`].
pub trait FlowVariant: Send + Sync {
    /// Short name used in logs and spans.
    fn name(&self) -> &'static str;

    /// Query parameters of the authorization URL, in order.
    fn authorization_parameters(
        &self,
        config: &FlowConfiguration,
        redirect_uri: &str,
        pkce: &PkcePair,
        state: &str,
        nonce: &str,
    ) -> AuthorizationParameters;

    /// Body of the code exchange request.
    fn token_parameters(
        &self,
        config: &FlowConfiguration,
        redirect_uri: &str,
        code: &AuthorizationCode,
        pkce: &PkcePair,
    ) -> TokenParameters {
        TokenParameters::new(GrantType::AuthorizationCode)
            .with("grant_type", GrantType::AuthorizationCode.as_str())
            .with("client_id", config.client_id.as_str())
            .with("code_verifier", pkce.verifier())
            .with("code", code.as_str())
            .with("redirect_uri", redirect_uri)
    }

    /// Body of the refresh request.
    fn refresh_token_parameters(
        &self,
        config: &FlowConfiguration,
        refresh_token: &str,
    ) -> TokenParameters {
        TokenParameters::new(GrantType::RefreshToken)
            .with("refresh_token", refresh_token)
            .with("grant_type", GrantType::RefreshToken.as_str())
            .with("client_id", config.client_id.as_str())
    }

    /// Expected shape of a successful response for `grant`.
    fn response_schema(&self, grant: GrantType) -> ResponseSchema;

    /// Whether `raw` has the shape this variant expects for `grant`.
    fn is_valid_exchange_response(&self, raw: &Value, grant: GrantType) -> bool {
        self.response_schema(grant).matches(raw)
    }
}

/// Parameters shared by every variant: optional audience, scope and the
/// PKCE code request.
pub(crate) fn base_authorization_parameters(
    config: &FlowConfiguration,
    redirect_uri: &str,
    pkce: &PkcePair,
) -> AuthorizationParameters {
    let mut params = AuthorizationParameters::new();
    if let Some(audience) = &config.audience {
        params.insert("audience", audience.as_str());
    }
    if !config.scope.trim().is_empty() {
        params.insert("scope", config.scope.as_str());
    }
    params
        .insert("response_type", "code")
        .insert("client_id", config.client_id.as_str())
        .insert("code_challenge", pkce.challenge.as_str())
        .insert("code_challenge_method", pkce.method.as_str())
        .insert("redirect_uri", redirect_uri);
    params
}
