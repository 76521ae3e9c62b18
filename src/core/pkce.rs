//! PKCE Generator
//!
//! RFC 7636 Proof Key for Code Exchange.

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{ConfigurationError, OAuth2Error};
use crate::types::{PkceMethod, PkcePair};

/// Default verifier length (384 bits of entropy).
pub const DEFAULT_VERIFIER_LENGTH: usize = 64;

/// PKCE generator interface (for dependency injection).
pub trait PkceGenerator: Send + Sync {
    /// Generate a fresh verifier/challenge pair.
    fn generate(&self) -> PkcePair;

    /// Compute challenge from verifier.
    fn compute_challenge(&self, verifier: &str, method: PkceMethod) -> String {
        compute_challenge(verifier, method)
    }
}

/// S256: BASE64URL(SHA256(verifier)), unpadded.
pub fn compute_challenge(verifier: &str, method: PkceMethod) -> String {
    match method {
        PkceMethod::S256 => {
            let hash = Sha256::digest(verifier.as_bytes());
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
        }
    }
}

/// Default PKCE generator backed by the operating system CSPRNG.
#[derive(Debug)]
pub struct DefaultPkceGenerator {
    verifier_length: usize,
}

impl DefaultPkceGenerator {
    /// Create new PKCE generator with default verifier length.
    pub fn new() -> Self {
        Self {
            verifier_length: DEFAULT_VERIFIER_LENGTH,
        }
    }

    /// Create PKCE generator with custom verifier length (43..=128).
    pub fn with_length(length: usize) -> Result<Self, OAuth2Error> {
        if !(43..=128).contains(&length) {
            return Err(ConfigurationError::InvalidVerifierLength { length }.into());
        }
        Ok(Self {
            verifier_length: length,
        })
    }

    /// Generate a verifier of the configured length.
    pub fn generate_verifier(&self) -> String {
        // 4 base64 characters per 3 bytes; over-generate then trim.
        let bytes_needed = (self.verifier_length * 3 + 3) / 4;
        let mut random_bytes = vec![0u8; bytes_needed];
        OsRng.fill_bytes(&mut random_bytes);

        let mut encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&random_bytes);
        encoded.truncate(self.verifier_length);
        encoded
    }
}

impl Default for DefaultPkceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PkceGenerator for DefaultPkceGenerator {
    fn generate(&self) -> PkcePair {
        let verifier = self.generate_verifier();
        let challenge = compute_challenge(&verifier, PkceMethod::S256);
        PkcePair::new(verifier, challenge, PkceMethod::S256)
    }
}

/// Mock PKCE generator for testing.
#[derive(Default)]
pub struct MockPkceGenerator {
    next_verifier: std::sync::Mutex<Option<String>>,
    generate_count: std::sync::atomic::AtomicUsize,
}

impl MockPkceGenerator {
    /// Create new mock PKCE generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the next verifier to generate.
    pub fn set_next_verifier(&self, verifier: impl Into<String>) -> &Self {
        if let Ok(mut next) = self.next_verifier.lock() {
            *next = Some(verifier.into());
        }
        self
    }

    /// Number of pairs generated so far.
    pub fn generate_count(&self) -> usize {
        self.generate_count
            .load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl PkceGenerator for MockPkceGenerator {
    fn generate(&self) -> PkcePair {
        let count = self
            .generate_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let verifier = self
            .next_verifier
            .lock()
            .ok()
            .and_then(|mut next| next.take())
            .unwrap_or_else(|| format!("mock-verifier-{:0>43}", count));

        let challenge = compute_challenge(&verifier, PkceMethod::S256);
        PkcePair::new(verifier, challenge, PkceMethod::S256)
    }
}

/// Validate PKCE verifier format.
pub fn is_valid_verifier(verifier: &str) -> bool {
    // RFC 7636: verifier must be 43-128 characters
    if !(43..=128).contains(&verifier.len()) {
        return false;
    }

    // Unreserved characters: [A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"
    verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pkce_generation() {
        let generator = DefaultPkceGenerator::new();
        let pair = generator.generate();

        assert_eq!(pair.verifier().len(), DEFAULT_VERIFIER_LENGTH);
        assert!(is_valid_verifier(pair.verifier()));
        assert_eq!(pair.method, PkceMethod::S256);
        assert_ne!(pair.verifier(), pair.challenge);
    }

    #[test]
    fn test_pkce_s256_challenge() {
        // RFC 7636 Appendix B
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = compute_challenge(verifier, PkceMethod::S256);
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let generator = DefaultPkceGenerator::new();
        for _ in 0..50 {
            let pair = generator.generate();
            assert_eq!(
                generator.compute_challenge(pair.verifier(), PkceMethod::S256),
                pair.challenge
            );
            assert_ne!(pair.verifier(), pair.challenge);
        }
    }

    #[test]
    fn test_verifier_bounds_and_alphabet() {
        for length in [43, 44, 64, 100, 127, 128] {
            let generator = DefaultPkceGenerator::with_length(length).unwrap();
            for _ in 0..20 {
                let verifier = generator.generate_verifier();
                assert_eq!(verifier.len(), length);
                assert!(verifier
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
                assert!(!verifier.contains('='));
            }
        }
    }

    #[test]
    fn test_verifiers_are_unique() {
        let generator = DefaultPkceGenerator::new();
        let verifiers: HashSet<String> = (0..1000).map(|_| generator.generate_verifier()).collect();
        assert_eq!(verifiers.len(), 1000);
    }

    #[test]
    fn test_verifier_validation() {
        assert!(is_valid_verifier(
            "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"
        ));
        assert!(!is_valid_verifier("short"));
        assert!(!is_valid_verifier(
            "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOE!@#"
        ));
    }

    #[test]
    fn test_invalid_verifier_length() {
        assert!(DefaultPkceGenerator::with_length(42).is_err());
        assert!(DefaultPkceGenerator::with_length(129).is_err());
    }

    #[test]
    fn test_mock_pkce_generator() {
        let generator = MockPkceGenerator::new();
        generator.set_next_verifier("test-verifier-1234567890123456789012345678901");

        let pair = generator.generate();
        assert_eq!(
            pair.verifier(),
            "test-verifier-1234567890123456789012345678901"
        );
        assert!(generator.generate().verifier().starts_with("mock-verifier-"));
        assert_eq!(generator.generate_count(), 2);
    }
}
