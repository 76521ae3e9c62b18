//! Configuration Builder
//!
//! Fluent builder for flow configuration.
//!
//! Defaults:
//!
//! | Setting | OAuth2 | OpenID |
//! |---|---|---|
//! | `authorization_url`, `token_url` | required | required |
//! | `audience` | none | none |
//! | `client_id` | required | `cli` |
//! | `redirect_url` | `http://localhost:8123` | `http://localhost:8123` |
//! | `scope` | none | `openid profile email offline_access` |
//! | content type | form-urlencoded | form-urlencoded |
//! | `redirect_timeout` | 300 s | 300 s |
//! | `request_timeout` | 30 s | 30 s |
//! | `refresh_threshold` | 300 s | 300 s |
//!
//! No provider is built in, so neither preset has default endpoints or a
//! default `audience`. `build()` fails without both endpoints, and the
//! `audience` parameter is sent only when set.

use std::time::Duration;
use url::Url;

use crate::core::loopback_address;
use crate::error::{ConfigurationError, OAuth2Error};
use crate::types::{
    ContentType, FlowConfiguration, FlowOptions, DEFAULT_CLIENT_ID, DEFAULT_REDIRECT_TIMEOUT_SECS,
    DEFAULT_REDIRECT_URL, DEFAULT_REFRESH_THRESHOLD_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    OPENID_DEFAULT_SCOPE,
};

/// Flow configuration builder.
#[derive(Clone, Debug)]
pub struct FlowConfigBuilder {
    authorization_url: Option<String>,
    token_url: Option<String>,
    client_id: Option<String>,
    redirect_url: String,
    content_type: ContentType,
    scope: String,
    audience: Option<String>,
    redirect_timeout: Duration,
    request_timeout: Duration,
    refresh_threshold: Duration,
    success_redirect_url: Option<String>,
}

impl FlowConfigBuilder {
    /// Builder with plain OAuth2 defaults.
    pub fn oauth2() -> Self {
        Self {
            authorization_url: None,
            token_url: None,
            client_id: None,
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            content_type: ContentType::default(),
            scope: String::new(),
            audience: None,
            redirect_timeout: Duration::from_secs(DEFAULT_REDIRECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            refresh_threshold: Duration::from_secs(DEFAULT_REFRESH_THRESHOLD_SECS),
            success_redirect_url: None,
        }
    }

    /// Builder with OpenID Connect defaults.
    ///
    /// Endpoints stay unset and `audience` stays empty; set them for the
    /// provider being used.
    pub fn openid() -> Self {
        Self {
            client_id: Some(DEFAULT_CLIENT_ID.to_string()),
            scope: OPENID_DEFAULT_SCOPE.to_string(),
            ..Self::oauth2()
        }
    }

    /// Set authorization endpoint.
    pub fn authorization_url(mut self, url: impl Into<String>) -> Self {
        self.authorization_url = Some(url.into());
        self
    }

    /// Set token endpoint.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set loopback redirect URL. Port `0` picks a free port per attempt.
    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = url.into();
        self
    }

    /// Set token request body encoding.
    pub fn access_token_request_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Set scope (space separated).
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set scopes from a list.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.scope = scopes
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self
    }

    /// Set API audience.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Set how long to wait for the browser redirect.
    pub fn redirect_timeout(mut self, timeout: Duration) -> Self {
        self.redirect_timeout = timeout;
        self
    }

    /// Set token request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set proactive refresh window.
    pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Send the browser here after a successful login.
    pub fn success_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.success_redirect_url = Some(url.into());
        self
    }

    /// Apply options loaded from a file or the environment. Unset options
    /// keep the builder's current values.
    pub fn from_options(mut self, options: FlowOptions) -> Self {
        if let Some(url) = options.authorization_url {
            self.authorization_url = Some(url);
        }
        if let Some(url) = options.token_url {
            self.token_url = Some(url);
        }
        if let Some(client_id) = options.client_id {
            self.client_id = Some(client_id);
        }
        if let Some(url) = options.redirect_url {
            self.redirect_url = url;
        }
        if let Some(content_type) = options.access_token_request_content_type {
            self.content_type = content_type;
        }
        if let Some(scope) = options.scope {
            self.scope = scope;
        }
        if let Some(audience) = options.audience {
            self.audience = Some(audience);
        }
        if let Some(secs) = options.redirect_timeout_secs {
            self.redirect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = options.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = options.refresh_threshold_secs {
            self.refresh_threshold = Duration::from_secs(secs);
        }
        if let Some(url) = options.success_redirect_url {
            self.success_redirect_url = Some(url);
        }
        self
    }

    /// Build the flow configuration.
    pub fn build(self) -> Result<FlowConfiguration, OAuth2Error> {
        let authorization_url = parse_endpoint("authorization_url", self.authorization_url)?;
        let token_url = parse_endpoint("token_url", self.token_url)?;

        let client_id = self
            .client_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConfigurationError::MissingRequired {
                field: "client_id".to_string(),
            })?;

        let redirect_url =
            Url::parse(&self.redirect_url).map_err(|_| ConfigurationError::InvalidEndpoint {
                field: "redirect_url".to_string(),
                url: self.redirect_url.clone(),
            })?;
        loopback_address(&redirect_url)?;

        let success_redirect_url = self
            .success_redirect_url
            .map(|url| {
                Url::parse(&url).map_err(|_| ConfigurationError::InvalidEndpoint {
                    field: "success_redirect_url".to_string(),
                    url,
                })
            })
            .transpose()?;

        if self.redirect_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(ConfigurationError::InvalidConfig {
                message: "timeouts must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(FlowConfiguration {
            authorization_url,
            token_url,
            client_id,
            redirect_url,
            access_token_request_content_type: self.content_type,
            scope: self.scope,
            audience: self.audience.filter(|a| !a.is_empty()),
            redirect_timeout: self.redirect_timeout,
            request_timeout: self.request_timeout,
            refresh_threshold: self.refresh_threshold,
            success_redirect_url,
        })
    }
}

impl Default for FlowConfigBuilder {
    fn default() -> Self {
        Self::oauth2()
    }
}

fn parse_endpoint(field: &str, value: Option<String>) -> Result<Url, OAuth2Error> {
    let value = value.ok_or_else(|| ConfigurationError::MissingRequired {
        field: field.to_string(),
    })?;

    let invalid = || ConfigurationError::InvalidEndpoint {
        field: field.to_string(),
        url: value.clone(),
    };

    let url = Url::parse(&value).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid().into());
    }
    Ok(url)
}

/// Create a flow configuration builder with OAuth2 defaults.
pub fn flow_config() -> FlowConfigBuilder {
    FlowConfigBuilder::oauth2()
}

/// Create a flow configuration builder with OpenID Connect defaults.
pub fn openid_config() -> FlowConfigBuilder {
    FlowConfigBuilder::openid()
}
