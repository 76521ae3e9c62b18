//! Token Types
//!
//! Token endpoint request parameters, the validated response and the
//! caller-side token set used to drive refresh.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{ContentType, GrantType};

/// Ordered body fields of a token endpoint request.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenParameters {
    grant_type: GrantType,
    fields: Vec<(&'static str, String)>,
}

impl TokenParameters {
    /// Start a parameter set. `grant_type` is not added implicitly; variants
    /// decide where it goes in the body.
    pub fn new(grant_type: GrantType) -> Self {
        Self {
            grant_type,
            fields: Vec::new(),
        }
    }

    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    pub fn grant_type(&self) -> GrantType {
        self.grant_type
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(k, _)| *k)
    }

    /// Encode the body for the given content type.
    pub fn encode(&self, content_type: ContentType) -> String {
        match content_type {
            ContentType::FormUrlEncoded => url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.fields.iter().map(|(k, v)| (*k, v.as_str())))
                .finish(),
            ContentType::Json => {
                let map: serde_json::Map<String, serde_json::Value> = self
                    .fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                    .collect();
                serde_json::Value::Object(map).to_string()
            }
        }
    }
}

impl std::fmt::Debug for TokenParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.fields {
            match *name {
                "code" | "code_verifier" | "refresh_token" => map.entry(name, &"[REDACTED]"),
                _ => map.entry(name, value),
            };
        }
        map.finish()
    }
}

/// Token response from the authorization server, after shape validation.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expires in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// ID token (OIDC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token set with absolute expiry, owned and persisted by the caller.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// When the current access token was issued.
    pub obtained_at: DateTime<Utc>,
}

impl TokenSet {
    /// Create from token response.
    pub fn from_response(response: &TokenResponse) -> Self {
        let now = Utc::now();
        Self {
            access_token: response.access_token.clone(),
            token_type: response
                .token_type
                .clone()
                .unwrap_or_else(default_token_type),
            refresh_token: response.refresh_token.clone(),
            id_token: response.id_token.clone(),
            scope: response.scope.clone(),
            expires_at: expires_at(now, response.expires_in),
            obtained_at: now,
        }
    }

    /// Apply a refresh response. Fields the provider did not return keep
    /// their previous values.
    pub fn with_refresh(&self, response: &TokenResponse) -> Self {
        let now = Utc::now();
        Self {
            access_token: response.access_token.clone(),
            token_type: response
                .token_type
                .clone()
                .unwrap_or_else(|| self.token_type.clone()),
            refresh_token: response
                .refresh_token
                .clone()
                .or_else(|| self.refresh_token.clone()),
            id_token: response.id_token.clone().or_else(|| self.id_token.clone()),
            scope: response.scope.clone().or_else(|| self.scope.clone()),
            expires_at: expires_at(now, response.expires_in),
            obtained_at: now,
        }
    }

    /// Check if token is expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp <= Utc::now()).unwrap_or(false)
    }

    /// Check if token expires within `threshold`.
    pub fn is_expiring_soon(&self, threshold: std::time::Duration) -> bool {
        let threshold = Duration::from_std(threshold).unwrap_or_else(|_| Duration::zero());
        self.expires_at
            .map(|exp| exp <= Utc::now() + threshold)
            .unwrap_or(false)
    }

    /// Check if has refresh token.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Get remaining lifetime in seconds.
    pub fn remaining_lifetime(&self) -> Option<i64> {
        self.expires_at
            .map(|exp| (exp - Utc::now()).num_seconds().max(0))
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl From<&TokenResponse> for TokenSet {
    fn from(response: &TokenResponse) -> Self {
        Self::from_response(response)
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("has_refresh_token", &self.has_refresh_token())
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn expires_at(now: DateTime<Utc>, expires_in: Option<u64>) -> Option<DateTime<Utc>> {
    expires_in
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
}

/// Identity claims carried by an OpenID Connect ID token.
#[cfg(feature = "jwt")]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

#[cfg(feature = "jwt")]
impl TokenResponse {
    /// Decode the ID token claims.
    ///
    /// The signature is NOT verified; the token came straight from the token
    /// endpoint over TLS. Use the claims for display, not for authorization.
    pub fn id_token_claims(&self) -> Result<Option<IdTokenClaims>, crate::error::OAuth2Error> {
        let Some(id_token) = &self.id_token else {
            return Ok(None);
        };

        let mut validation = jsonwebtoken::Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<IdTokenClaims>(
            id_token,
            &jsonwebtoken::DecodingKey::from_secret(&[]),
            &validation,
        )
        .map_err(|e| crate::error::TokenError::InvalidToken {
            message: e.to_string(),
        })?;

        Ok(Some(data.claims))
    }
}
