use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

pub const CODE_VERIFIER_LEN: usize = 64;
pub const STATE_RANDOM_LEN: usize = 32;

pub fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_code_verifier() -> String {
    random_alphanumeric(CODE_VERIFIER_LEN)
}

/// S256 challenge: base64url(SHA-256(verifier)) without padding
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// State token, prefixed with the owning user id when there is one
pub fn generate_state(user_id: Option<&str>) -> String {
    let random = random_alphanumeric(STATE_RANDOM_LEN);
    match user_id {
        Some(id) if !id.is_empty() => format!("{}_{}", id, random),
        _ => random,
    }
}
