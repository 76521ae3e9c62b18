//! Login Client
//!
//! High-level entry point combining a flow variant with the default
//! transport, browser and loopback listener.

use tokio_util::sync::CancellationToken;

use crate::core::{ReqwestHttpTransport, DEFAULT_MAX_RESPONSE_SIZE};
use crate::error::OAuth2Error;
use crate::flows::{
    cancel_on_ctrl_c, AuthorizationCodeFlow, FlowState, FlowVariant, OAuth2Flow, OpenIdFlow,
};
use crate::types::{FlowConfiguration, TokenResponse, TokenSet};

/// Login client for command-line tools.
pub struct LoginClient<V: FlowVariant> {
    flow: AuthorizationCodeFlow<V, ReqwestHttpTransport>,
}

impl<V: FlowVariant> LoginClient<V> {
    /// Create a client for `variant` with the default components.
    pub fn new(config: FlowConfiguration, variant: V) -> Result<Self, OAuth2Error> {
        let transport =
            ReqwestHttpTransport::with_options(config.request_timeout, DEFAULT_MAX_RESPONSE_SIZE)?;
        Ok(Self {
            flow: AuthorizationCodeFlow::new(config, variant, transport),
        })
    }

    /// Underlying flow, for injecting components or inspecting state.
    pub fn flow(&self) -> &AuthorizationCodeFlow<V, ReqwestHttpTransport> {
        &self.flow
    }

    pub fn flow_mut(&mut self) -> &mut AuthorizationCodeFlow<V, ReqwestHttpTransport> {
        &mut self.flow
    }

    pub fn state(&self) -> FlowState {
        self.flow.state()
    }

    /// Log in through the browser. Ctrl-C cancels the attempt.
    pub async fn login(&mut self) -> Result<TokenSet, OAuth2Error> {
        let cancel = cancel_on_ctrl_c();
        let result = self.flow.authenticate(cancel.clone()).await;
        // Stops the Ctrl-C watcher.
        cancel.cancel();
        result.map(|response| TokenSet::from_response(&response))
    }

    /// Log in with a caller-provided cancellation token and return the raw
    /// token response.
    pub async fn authenticate(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<TokenResponse, OAuth2Error> {
        self.flow.authenticate(cancel).await
    }

    /// Renew the access token.
    pub async fn refresh(&mut self, tokens: &TokenSet) -> Result<TokenSet, OAuth2Error> {
        self.flow.refresh(tokens).await
    }

    /// Return usable tokens: refreshed when close to expiry, a fresh browser
    /// login when the refresh token is missing or rejected.
    pub async fn ensure_fresh(&mut self, tokens: Option<&TokenSet>) -> Result<TokenSet, OAuth2Error> {
        let Some(tokens) = tokens else {
            return self.login().await;
        };

        match self.flow.refresh_if_expiring(tokens).await {
            Ok(tokens) => Ok(tokens),
            Err(e) if e.needs_reauth() => {
                tracing::info!(error = %e, "Stored session cannot be renewed, logging in again");
                self.login().await
            }
            Err(e) => Err(e),
        }
    }
}

/// Create an OpenID Connect login client.
pub fn openid_client(config: FlowConfiguration) -> Result<LoginClient<OpenIdFlow>, OAuth2Error> {
    LoginClient::new(config, OpenIdFlow)
}

/// Create a plain OAuth2 login client.
pub fn oauth2_client(config: FlowConfiguration) -> Result<LoginClient<OAuth2Flow>, OAuth2Error> {
    LoginClient::new(config, OAuth2Flow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::openid_config;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(token_url: &str) -> FlowConfiguration {
        openid_config()
            .authorization_url("https://auth.example.com/authorize")
            .token_url(token_url)
            .build()
            .unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = openid_client(config("https://auth.example.com/oauth/token")).unwrap();
        assert_eq!(client.state(), FlowState::Idle);
        assert_eq!(client.flow().variant().name(), "openid");

        let client = oauth2_client(config("https://auth.example.com/oauth/token")).unwrap();
        assert_eq!(client.flow().variant().name(), "oauth2");
    }

    #[tokio::test]
    async fn test_ensure_fresh_refreshes_expiring_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "T2",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = openid_client(config(&format!("{}/oauth/token", server.uri()))).unwrap();

        let mut tokens = TokenSet::from_response(
            &serde_json::from_value(serde_json::json!({
                "access_token": "T1",
                "refresh_token": "R1",
                "expires_in": 3600
            }))
            .unwrap(),
        );
        tokens.expires_at = Some(chrono::Utc::now());

        let fresh = client.ensure_fresh(Some(&tokens)).await.unwrap();
        assert_eq!(fresh.access_token, "T2");
        assert_eq!(fresh.refresh_token.as_deref(), Some("R1"));
        assert_eq!(client.state(), FlowState::Authenticated);
    }
}
