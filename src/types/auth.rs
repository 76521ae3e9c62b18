//! Authorization Types
//!
//! PKCE material and the ordered authorization request parameters.

use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// PKCE challenge method. Only S256 is supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PkceMethod {
    /// SHA-256 hash.
    #[default]
    S256,
}

impl PkceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
        }
    }
}

/// PKCE verifier and its derived challenge. Generated per attempt.
#[derive(Clone)]
pub struct PkcePair {
    verifier: SecretString,
    /// Code challenge (sent in authorization URL).
    pub challenge: String,
    /// Challenge method used.
    pub method: PkceMethod,
}

impl PkcePair {
    pub fn new(verifier: String, challenge: String, method: PkceMethod) -> Self {
        Self {
            verifier: SecretString::new(verifier),
            challenge,
            method,
        }
    }

    /// The verifier. Only the token exchange request may carry it.
    pub fn verifier(&self) -> &str {
        self.verifier.expose_secret()
    }
}

impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"[REDACTED]")
            .field("challenge", &self.challenge)
            .field("method", &self.method)
            .finish()
    }
}

/// Ordered query parameters of the authorization request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorizationParameters {
    params: Vec<(String, String)>,
}

impl AuthorizationParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter, replacing an earlier one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == name) {
            Some(existing) => existing.1 = value,
            None => self.params.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Append the parameters to `endpoint`, keeping any query it already has.
    pub fn to_url(&self, endpoint: &Url) -> Url {
        let mut url = endpoint.clone();
        url.query_pairs_mut().extend_pairs(self.iter());
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_method_as_str() {
        assert_eq!(PkceMethod::S256.as_str(), "S256");
    }

    #[test]
    fn test_pkce_pair_debug_redacts_verifier() {
        let pair = PkcePair::new(
            "super-secret-verifier".to_string(),
            "challenge".to_string(),
            PkceMethod::S256,
        );
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("super-secret-verifier"));
        assert!(debug.contains("challenge"));
        assert_eq!(pair.verifier(), "super-secret-verifier");
    }

    #[test]
    fn test_parameters_preserve_order_and_replace() {
        let mut params = AuthorizationParameters::new();
        params
            .insert("scope", "openid")
            .insert("response_type", "code")
            .insert("scope", "openid email");

        let names: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["scope", "response_type"]);
        assert_eq!(params.get("scope"), Some("openid email"));
    }

    #[test]
    fn test_to_url_keeps_existing_query() {
        let endpoint = Url::parse("https://id.example.com/authorize?connection=github").unwrap();
        let mut params = AuthorizationParameters::new();
        params.insert("redirect_uri", "http://localhost:8123/cb");

        let url = params.to_url(&endpoint);
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("connection".to_string(), "github".to_string()));
        assert_eq!(
            pairs[1],
            (
                "redirect_uri".to_string(),
                "http://localhost:8123/cb".to_string()
            )
        );
    }
}
