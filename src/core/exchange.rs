//! Token Exchange Client
//!
//! Single POST to the token endpoint with outcome classification.

use std::time::Duration;
use url::Url;

use crate::core::transport::{HttpMethod, HttpRequest, HttpTransport};
use crate::error::{create_error_from_response, OAuth2Result, ProtocolError};
use crate::types::{ContentType, TokenParameters};

/// Posts token parameters and returns the raw JSON object on success.
///
/// Transport failures surface as network errors, non-2xx answers as provider
/// errors, and a 2xx body that is not a JSON object as an invalid token
/// response. Nothing is retried here.
pub struct TokenExchangeClient<T: HttpTransport> {
    transport: T,
    token_url: Url,
    content_type: ContentType,
    timeout: Duration,
}

impl<T: HttpTransport> TokenExchangeClient<T> {
    pub fn new(transport: T, token_url: Url, content_type: ContentType, timeout: Duration) -> Self {
        Self {
            transport,
            token_url,
            content_type,
            timeout,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Exchange a code or refresh token at the token endpoint.
    pub async fn exchange(&self, params: &TokenParameters) -> OAuth2Result<serde_json::Value> {
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: self.token_url.to_string(),
            headers: [
                (
                    "content-type".to_string(),
                    self.content_type.as_str().to_string(),
                ),
                ("accept".to_string(), "application/json".to_string()),
            ]
            .into_iter()
            .collect(),
            body: Some(params.encode(self.content_type)),
            timeout: Some(self.timeout),
        };

        let response = self.transport.send(request).await?;

        if !response.is_success() {
            tracing::warn!(
                status = response.status,
                grant_type = params.grant_type().as_str(),
                "Token endpoint rejected request"
            );
            return Err(create_error_from_response(response.status, &response.body));
        }

        let value: serde_json::Value =
            serde_json::from_str(&response.body).map_err(|e| ProtocolError::InvalidTokenResponse {
                message: format!("response is not JSON: {}", e),
            })?;

        if !value.is_object() {
            return Err(ProtocolError::InvalidTokenResponse {
                message: "response is not a JSON object".to_string(),
            }
            .into());
        }

        Ok(value)
    }
}
