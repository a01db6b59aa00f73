//! PKCE (RFC 7636) helpers for the OAuth authorization-code flow.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a code verifier: 32 random bytes, base64url without padding
/// (43 characters, within the RFC's 43-128 range).
#[must_use]
pub fn generate_code_verifier() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Derive the challenge: BASE64URL(SHA256(ASCII(verifier))).
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Random state token for CSRF protection of the authorization redirect.
#[must_use]
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Verifier/challenge/state triple for one authorization attempt.
///
/// The verifier stays local until the token exchange; the challenge and
/// state go into the authorization URL.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
}

impl PkceChallenge {
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state();
        Self { code_verifier, code_challenge, state }
    }

    /// Always "S256"; the plain method is deliberately unsupported.
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_length_within_rfc_bounds() {
        let challenge = PkceChallenge::generate();
        assert!(challenge.code_verifier.len() >= 43);
        assert!(challenge.code_verifier.len() <= 128);
        assert!(!challenge.code_challenge.is_empty());
        assert!(!challenge.state.is_empty());
    }

    #[test]
    fn generations_are_unique() {
        let a = PkceChallenge::generate();
        let b = PkceChallenge::generate();
        assert_ne!(a.code_verifier, b.code_verifier);
        assert_ne!(a.code_challenge, b.code_challenge);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn challenge_is_deterministic_in_verifier() {
        let challenge = PkceChallenge::generate();
        assert_eq!(challenge.code_challenge, generate_code_challenge(&challenge.code_verifier));
    }

    #[test]
    fn output_is_base64url_without_padding() {
        let challenge = PkceChallenge::generate();
        for value in [&challenge.code_verifier, &challenge.code_challenge, &challenge.state] {
            assert!(!value.contains('='));
            assert!(!value.contains('+'));
            assert!(!value.contains('/'));
        }
    }

    #[test]
    fn challenge_method_is_s256() {
        assert_eq!(PkceChallenge::generate().challenge_method(), "S256");
    }
}
