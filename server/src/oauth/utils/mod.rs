use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{distributions::Alphanumeric, Rng as _};

/// Length of the random `oauth_nonce` value
const NONCE_LEN: usize = 32;

/// Percent-encode a value as RFC 5849 requires
/// Everything except the RFC 3986 unreserved set `A-Z a-z 0-9 - . _ ~` is escaped
pub fn percent_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

/// Standard base64 with padding, which is what X expects for signatures and images
pub fn base64_encode(input: &[u8]) -> String {
    STANDARD.encode(input)
}

pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}
