//! OAuth2 Variant
//!
//! Plain OAuth2 Authorization Code + PKCE.

use crate::core::ResponseSchema;
use crate::flows::variant::{base_authorization_parameters, FlowVariant};
use crate::types::{AuthorizationParameters, FlowConfiguration, GrantType, PkcePair};

/// Baseline variant: no nonce, no ID token.
#[derive(Clone, Copy, Debug, Default)]
pub struct OAuth2Flow;

impl FlowVariant for OAuth2Flow {
    fn name(&self) -> &'static str {
        "oauth2"
    }

    fn authorization_parameters(
        &self,
        config: &FlowConfiguration,
        redirect_uri: &str,
        pkce: &PkcePair,
        state: &str,
        _nonce: &str,
    ) -> AuthorizationParameters {
        let mut params = base_authorization_parameters(config, redirect_uri, pkce);
        params.insert("state", state);
        params
    }

    fn response_schema(&self, _grant: GrantType) -> ResponseSchema {
        ResponseSchema::oauth2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::flow_config;
    use crate::core::{DefaultPkceGenerator, PkceGenerator};
    use crate::flows::FlowVariant;
    use crate::types::AuthorizationCode;

    fn config() -> FlowConfiguration {
        flow_config()
            .authorization_url("https://auth.example.com/authorize")
            .token_url("https://auth.example.com/token")
            .client_id("my-cli")
            .redirect_url("http://127.0.0.1:8123/callback")
            .scope("read write")
            .build()
            .unwrap()
    }

    #[test]
    fn test_authorization_parameters() {
        let pkce = DefaultPkceGenerator::new().generate();
        let params = OAuth2Flow.authorization_parameters(
            &config(),
            "http://127.0.0.1:8123/callback",
            &pkce,
            "s1",
            "n1",
        );

        let names: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(
            names,
            vec![
                "scope",
                "response_type",
                "client_id",
                "code_challenge",
                "code_challenge_method",
                "redirect_uri",
                "state"
            ]
        );
        assert_eq!(params.get("code_challenge"), Some(pkce.challenge.as_str()));
        assert_eq!(params.get("code_challenge_method"), Some("S256"));
        assert_eq!(params.get("nonce"), None);

        let url = params.to_url(&config().authorization_url);
        assert!(!url.as_str().contains(pkce.verifier()));
    }

    #[test]
    fn test_token_parameters() {
        let pkce = DefaultPkceGenerator::new().generate();
        let params = OAuth2Flow.token_parameters(
            &config(),
            "http://127.0.0.1:8123/callback",
            &AuthorizationCode::new("abc123"),
            &pkce,
        );

        assert_eq!(params.grant_type(), GrantType::AuthorizationCode);
        assert_eq!(
            params.names().collect::<Vec<_>>(),
            vec!["grant_type", "client_id", "code_verifier", "code", "redirect_uri"]
        );
        assert_eq!(params.get("code_verifier"), Some(pkce.verifier()));
        assert_eq!(params.get("code"), Some("abc123"));
    }

    #[test]
    fn test_response_validation() {
        let with_expiry = serde_json::json!({"access_token": "T1", "expires_in": 3600});
        assert!(OAuth2Flow.is_valid_exchange_response(&with_expiry, GrantType::AuthorizationCode));
        assert!(OAuth2Flow.is_valid_exchange_response(&with_expiry, GrantType::RefreshToken));

        let no_expiry = serde_json::json!({"access_token": "T1"});
        assert!(!OAuth2Flow.is_valid_exchange_response(&no_expiry, GrantType::AuthorizationCode));
    }
}
