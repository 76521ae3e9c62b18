//! Authorization Code Flow
//!
//! Browser-delegated Authorization Code + PKCE login and token refresh
//! (RFC 6749 Section 4.1 and Section 6, RFC 7636).
//!
//! One [`AuthorizationCodeFlow`] drives one login at a time: it generates the
//! PKCE pair and state, claims the loopback redirect endpoint, opens the
//! browser, waits for the redirect and exchanges the code. Variant-specific
//! behavior comes from the injected [`FlowVariant`].

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

#[cfg(feature = "jwt")]
use crate::core::states_match;
use crate::core::{
    BoundRedirect, BrowserLauncher, DefaultPkceGenerator, HttpTransport,
    LoopbackRedirectListener, PkceGenerator, RandomStateGenerator, RedirectListener,
    StateGenerator, SystemBrowserLauncher, TokenExchangeClient,
};
use crate::error::{AuthorizationError, FlowError, OAuth2Result, ProtocolError, TokenError};
use crate::flows::FlowVariant;
use crate::telemetry::{SpanAttributes, SpanNames};
use crate::types::{
    CallbackParams, FlowConfiguration, GrantType, TokenParameters, TokenResponse, TokenSet,
};

/// Lifecycle of a flow instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingAuthorization,
    AwaitingRedirect,
    ExchangingCode,
    Authenticated,
    RefreshingToken,
    Failed,
}

impl FlowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingAuthorization => "awaiting_authorization",
            Self::AwaitingRedirect => "awaiting_redirect",
            Self::ExchangingCode => "exchanging_code",
            Self::Authenticated => "authenticated",
            Self::RefreshingToken => "refreshing_token",
            Self::Failed => "failed",
        }
    }

    /// Check a transition against the flow's transition table.
    pub fn can_transition_to(&self, next: FlowState) -> bool {
        use FlowState::*;
        matches!(
            (self, next),
            (Idle | Authenticated | Failed, AwaitingAuthorization)
                | (AwaitingAuthorization, AwaitingRedirect | Failed)
                | (AwaitingRedirect, ExchangingCode | Failed)
                | (ExchangingCode, Authenticated | Failed)
                | (Authenticated, RefreshingToken)
                | (RefreshingToken, Authenticated | Failed)
                // Resuming from tokens persisted by an earlier process.
                | (Idle | Failed, Authenticated)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Failed)
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization Code + PKCE login engine.
pub struct AuthorizationCodeFlow<V: FlowVariant, T: HttpTransport> {
    config: FlowConfiguration,
    variant: V,
    exchange: TokenExchangeClient<T>,
    pkce: Arc<dyn PkceGenerator>,
    states: Arc<dyn StateGenerator>,
    listener: Arc<dyn RedirectListener>,
    browser: Arc<dyn BrowserLauncher>,
    state: FlowState,
}

impl<V: FlowVariant, T: HttpTransport> AuthorizationCodeFlow<V, T> {
    /// Create a flow with the system browser and a loopback listener.
    pub fn new(config: FlowConfiguration, variant: V, transport: T) -> Self {
        let exchange = TokenExchangeClient::new(
            transport,
            config.token_url.clone(),
            config.access_token_request_content_type,
            config.request_timeout,
        );
        let listener = LoopbackRedirectListener::new()
            .with_success_redirect(config.success_redirect_url.clone());

        Self {
            config,
            variant,
            exchange,
            pkce: Arc::new(DefaultPkceGenerator::new()),
            states: Arc::new(RandomStateGenerator),
            listener: Arc::new(listener),
            browser: Arc::new(SystemBrowserLauncher),
            state: FlowState::Idle,
        }
    }

    pub fn with_pkce_generator(mut self, pkce: Arc<dyn PkceGenerator>) -> Self {
        self.pkce = pkce;
        self
    }

    pub fn with_state_generator(mut self, states: Arc<dyn StateGenerator>) -> Self {
        self.states = states;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn RedirectListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    /// Current state.
    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn config(&self) -> &FlowConfiguration {
        &self.config
    }

    pub fn variant(&self) -> &V {
        &self.variant
    }

    pub fn transport(&self) -> &T {
        self.exchange.transport()
    }

    /// Run a full browser login.
    ///
    /// Resolves once the provider redirected back and the code exchange
    /// succeeded. `cancel` aborts the wait for the redirect and the exchange.
    /// The redirect endpoint is released before this returns, whatever the
    /// outcome.
    pub async fn authenticate(&mut self, cancel: CancellationToken) -> OAuth2Result<TokenResponse> {
        let span = tracing::info_span!(
            SpanNames::AUTHORIZE,
            oauth2.flow = self.variant.name(),
            oauth2.client_id = %self.config.client_id,
            oauth2.error_code = tracing::field::Empty,
        );

        let result = self.run_authorization(cancel).instrument(span.clone()).await;

        match &result {
            Ok(_) => {
                tracing::info!(parent: &span, "Login completed");
            }
            Err(e) => {
                span.record(SpanAttributes::ERROR_CODE, e.error_code());
                tracing::warn!(parent: &span, error = %e, "Login failed");
                self.fail();
            }
        }

        result
    }

    async fn run_authorization(&mut self, cancel: CancellationToken) -> OAuth2Result<TokenResponse> {
        self.transition(FlowState::AwaitingAuthorization)?;

        let pkce = self.pkce.generate();
        let state = self.states.state();
        let nonce = self.states.nonce();

        // Bound before the browser opens so an immediate redirect is not lost.
        let mut bound = self.listener.bind(&self.config.redirect_url).await?;
        let redirect_uri = bound.redirect_uri();

        let authorization = self.variant.authorization_parameters(
            &self.config,
            &redirect_uri,
            &pkce,
            &state,
            &nonce,
        );
        let url = authorization.to_url(&self.config.authorization_url);

        tracing::info!(url = %url, "Opening browser for login");
        if let Err(e) = self.browser.open(url.as_str()) {
            tracing::warn!(error = %e, url = %url, "Could not open a browser, open the URL manually");
        }

        self.transition(FlowState::AwaitingRedirect)?;

        let outcome =
            wait_for_redirect(bound.as_mut(), &state, self.config.redirect_timeout, &cancel).await;
        bound.close().await;
        drop(bound);
        let callback = outcome?;

        let code = callback.into_code(&state)?;
        tracing::debug!("Authorization code received");

        self.transition(FlowState::ExchangingCode)?;

        let params = self
            .variant
            .token_parameters(&self.config, &redirect_uri, &code, &pkce);

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(AuthorizationError::Cancelled.into());
            }
            result = self.exchange_with_span(&params) => result?,
        };

        let response = self.validate(raw, GrantType::AuthorizationCode)?;
        verify_nonce(&response, authorization.get("nonce"))?;

        self.transition(FlowState::Authenticated)?;
        Ok(response)
    }

    /// Renew the access token with the refresh token in `tokens`.
    ///
    /// Fields the provider does not return (usually the refresh token and ID
    /// token) are carried over from `tokens`. Never opens a browser.
    pub async fn refresh(&mut self, tokens: &TokenSet) -> OAuth2Result<TokenSet> {
        let refresh_token = tokens
            .refresh_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(TokenError::NoRefreshToken)?;

        if matches!(self.state, FlowState::Idle | FlowState::Failed) {
            self.transition(FlowState::Authenticated)?;
        }
        self.transition(FlowState::RefreshingToken)?;

        let params = self
            .variant
            .refresh_token_parameters(&self.config, refresh_token);

        let result = self
            .exchange_with_span(&params)
            .await
            .and_then(|raw| self.validate(raw, GrantType::RefreshToken));

        match result {
            Ok(response) => {
                self.transition(FlowState::Authenticated)?;
                tracing::info!(flow = self.variant.name(), "Access token refreshed");
                Ok(tokens.with_refresh(&response))
            }
            Err(e) => {
                tracing::warn!(flow = self.variant.name(), error = %e, "Token refresh failed");
                self.fail();
                Err(e)
            }
        }
    }

    /// Refresh only when the access token expires within the configured
    /// threshold. Otherwise `tokens` is returned as is.
    pub async fn refresh_if_expiring(&mut self, tokens: &TokenSet) -> OAuth2Result<TokenSet> {
        if !tokens.is_expiring_soon(self.config.refresh_threshold) {
            tracing::debug!("Access token still fresh, skipping refresh");
            return Ok(tokens.clone());
        }
        self.refresh(tokens).await
    }

    async fn exchange_with_span(&self, params: &TokenParameters) -> OAuth2Result<Value> {
        let grant_type = params.grant_type().as_str();
        let span = match params.grant_type() {
            GrantType::AuthorizationCode => tracing::info_span!(
                SpanNames::TOKEN_EXCHANGE,
                oauth2.flow = self.variant.name(),
                oauth2.grant_type = grant_type,
            ),
            GrantType::RefreshToken => tracing::info_span!(
                SpanNames::TOKEN_REFRESH,
                oauth2.flow = self.variant.name(),
                oauth2.grant_type = grant_type,
            ),
        };

        tracing::debug!(parent: &span, request = ?params, "Sending token request");
        self.exchange.exchange(params).instrument(span).await
    }

    fn validate(&self, raw: Value, grant: GrantType) -> OAuth2Result<TokenResponse> {
        if !self.variant.is_valid_exchange_response(&raw, grant) {
            let violations = self.variant.response_schema(grant).violations(&raw);
            tracing::warn!(
                flow = self.variant.name(),
                grant_type = grant.as_str(),
                fields = ?violations,
                "Token response has unexpected shape"
            );
            return Err(ProtocolError::InvalidTokenResponse {
                message: format!("unexpected fields: {}", violations.join(", ")),
            }
            .into());
        }

        serde_json::from_value(raw).map_err(|e| {
            ProtocolError::InvalidJson {
                message: e.to_string(),
            }
            .into()
        })
    }

    fn transition(&mut self, next: FlowState) -> OAuth2Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(FlowError::InvalidTransition {
                from: self.state.as_str(),
                to: next.as_str(),
            }
            .into());
        }
        tracing::debug!(from = %self.state, to = %next, "Flow state transition");
        self.state = next;
        Ok(())
    }

    fn fail(&mut self) {
        if self.state.can_transition_to(FlowState::Failed) {
            tracing::debug!(from = %self.state, to = %FlowState::Failed, "Flow state transition");
            self.state = FlowState::Failed;
        }
    }
}

/// Wait for the redirect, bounded by `timeout` and `cancel`.
async fn wait_for_redirect(
    bound: &mut dyn BoundRedirect,
    state: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> OAuth2Result<CallbackParams> {
    let wait = bound
        .accept(state)
        .instrument(tracing::info_span!(SpanNames::REDIRECT_WAIT));

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AuthorizationError::Cancelled.into()),
        result = tokio::time::timeout(timeout, wait) => match result {
            Ok(callback) => callback,
            Err(_) => Err(AuthorizationError::RedirectTimeout { timeout }.into()),
        },
    }
}

/// Check the ID token's `nonce` claim against the one sent to the provider.
///
/// An ID token that is not a JWT is treated as opaque and passes.
#[cfg(feature = "jwt")]
fn verify_nonce(response: &TokenResponse, expected: Option<&str>) -> OAuth2Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let claims = match response.id_token_claims() {
        Ok(Some(claims)) => claims,
        Ok(None) => return Ok(()),
        Err(e) => {
            tracing::debug!(error = %e, "ID token is not a JWT, skipping nonce check");
            return Ok(());
        }
    };

    match claims.nonce.as_deref() {
        Some(nonce) if states_match(expected, nonce) => Ok(()),
        _ => Err(ProtocolError::InvalidTokenResponse {
            message: "id_token nonce does not match the authorization request".to_string(),
        }
        .into()),
    }
}

#[cfg(not(feature = "jwt"))]
fn verify_nonce(_response: &TokenResponse, _expected: Option<&str>) -> OAuth2Result<()> {
    Ok(())
}

/// A token cancelled when the user presses Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = child.cancelled() => {}
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    tracing::info!("Interrupted, cancelling login");
                    child.cancel();
                }
            }
        }
    });
    token
}
