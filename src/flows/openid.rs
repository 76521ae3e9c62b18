//! OpenID Connect Variant
//!
//! Adds `nonce` to the authorization request and requires an ID token from
//! the code exchange.

use crate::core::ResponseSchema;
use crate::flows::variant::{base_authorization_parameters, FlowVariant};
use crate::types::{AuthorizationParameters, FlowConfiguration, GrantType, PkcePair};

#[derive(Clone, Copy, Debug, Default)]
pub struct OpenIdFlow;

impl FlowVariant for OpenIdFlow {
    fn name(&self) -> &'static str {
        "openid"
    }

    fn authorization_parameters(
        &self,
        config: &FlowConfiguration,
        redirect_uri: &str,
        pkce: &PkcePair,
        state: &str,
        nonce: &str,
    ) -> AuthorizationParameters {
        let mut params = base_authorization_parameters(config, redirect_uri, pkce);
        params.insert("nonce", nonce).insert("state", state);
        params
    }

    fn response_schema(&self, grant: GrantType) -> ResponseSchema {
        match grant {
            GrantType::AuthorizationCode => ResponseSchema::openid(),
            // Refresh responses commonly omit the ID token.
            GrantType::RefreshToken => ResponseSchema::oauth2(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::openid_config;
    use crate::core::{MockPkceGenerator, PkceGenerator};

    fn config() -> FlowConfiguration {
        openid_config()
            .authorization_url("https://auth.example.com/authorize?prompt=login")
            .token_url("https://auth.example.com/oauth/token")
            .audience("https://api.example.com")
            .build()
            .unwrap()
    }

    #[test]
    fn test_authorization_parameters_order() {
        let pkce = MockPkceGenerator::new().generate();
        let params = OpenIdFlow.authorization_parameters(
            &config(),
            "http://localhost:8123",
            &pkce,
            "s1",
            "n1",
        );

        assert_eq!(
            params.iter().collect::<Vec<_>>(),
            vec![
                ("audience", "https://api.example.com"),
                ("scope", "openid profile email offline_access"),
                ("response_type", "code"),
                ("client_id", "cli"),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("redirect_uri", "http://localhost:8123"),
                ("nonce", "n1"),
                ("state", "s1"),
            ]
        );
    }

    #[test]
    fn test_authorization_url_keeps_existing_query() {
        let pkce = MockPkceGenerator::new().generate();
        let config = config();
        let url = OpenIdFlow
            .authorization_parameters(&config, "http://localhost:8123", &pkce, "s1", "n1")
            .to_url(&config.authorization_url);

        assert!(url.as_str().starts_with("https://auth.example.com/authorize?prompt=login&audience="));
        assert!(url.as_str().contains("code_challenge_method=S256"));
        assert!(url.as_str().contains("redirect_uri=http%3A%2F%2Flocalhost%3A8123"));
        assert!(!url.as_str().contains(pkce.verifier()));
    }

    #[test]
    fn test_refresh_parameters_order() {
        let params = OpenIdFlow.refresh_token_parameters(&config(), "R1");
        assert_eq!(params.grant_type(), GrantType::RefreshToken);
        assert_eq!(
            params.encode(crate::types::ContentType::FormUrlEncoded),
            "refresh_token=R1&grant_type=refresh_token&client_id=cli"
        );
    }

    #[test]
    fn test_id_token_required_for_code_exchange_only() {
        let without_id = serde_json::json!({"access_token": "T1", "expires_in": 3600});
        let with_id = serde_json::json!({"access_token": "T1", "id_token": "I1", "expires_in": 3600});

        assert!(!OpenIdFlow.is_valid_exchange_response(&without_id, GrantType::AuthorizationCode));
        assert!(OpenIdFlow.is_valid_exchange_response(&with_id, GrantType::AuthorizationCode));
        assert!(OpenIdFlow.is_valid_exchange_response(&without_id, GrantType::RefreshToken));
    }
}
