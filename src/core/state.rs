//! State Management
//!
//! Per-attempt `state` and `nonce` values and validation of the echoed state.

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

/// Source of per-attempt opaque values (for dependency injection).
pub trait StateGenerator: Send + Sync {
    /// Value echoed back on the redirect.
    fn state(&self) -> String;

    /// Value bound into the ID token.
    fn nonce(&self) -> String {
        self.state()
    }
}

/// Random state generator (256 bits, base64url).
#[derive(Debug, Default)]
pub struct RandomStateGenerator;

impl StateGenerator for RandomStateGenerator {
    fn state(&self) -> String {
        generate_random_value()
    }
}

/// Fixed state generator for testing.
#[derive(Debug, Clone)]
pub struct FixedStateGenerator {
    state: String,
}

impl FixedStateGenerator {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
        }
    }
}

impl StateGenerator for FixedStateGenerator {
    fn state(&self) -> String {
        self.state.clone()
    }

    fn nonce(&self) -> String {
        format!("{}-nonce", self.state)
    }
}

/// 32 random bytes from the OS CSPRNG, base64url without padding.
pub fn generate_random_value() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare the echoed state with the expected one in constant time.
pub fn states_match(expected: &str, received: &str) -> bool {
    let expected = expected.as_bytes();
    let received = received.as_bytes();
    if expected.is_empty() || expected.len() != received.len() {
        return false;
    }
    expected
        .iter()
        .zip(received)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_state_generation() {
        let generator = RandomStateGenerator;
        let state = generator.state();
        assert_eq!(state.len(), 43);
        assert_ne!(state, generator.state());

        let values: HashSet<String> = (0..200).map(|_| generator.nonce()).collect();
        assert_eq!(values.len(), 200);
    }

    #[test]
    fn test_states_match() {
        assert!(states_match("abc", "abc"));
        assert!(!states_match("abc", "abd"));
        assert!(!states_match("abc", "abcd"));
        assert!(!states_match("", ""));
    }

    #[test]
    fn test_fixed_state_generator() {
        let generator = FixedStateGenerator::new("test-state-123");
        assert_eq!(generator.state(), "test-state-123");
        assert_eq!(generator.nonce(), "test-state-123-nonce");
    }
}
