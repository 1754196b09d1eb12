//! Carries the OAuth request token pair across the redirect to X and back.
//!
//! The server keeps nothing between the two legs of the handshake. Instead the
//! request credential is sealed with ChaCha20-Poly1305 under a key derived from
//! `TRANSPORT_SECRET`, base64url encoded, and handed to the browser in a short
//! lived `HttpOnly` cookie. The browser can see only ciphertext, and any edit to
//! the envelope fails authentication on the way back in.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, CHACHA20_POLY1305, NONCE_LEN};
use ring::rand::{SecureRandom as _, SystemRandom};
use serde::{Deserialize, Serialize};
use tower_cookies::{cookie::SameSite, Cookie, Cookies};

use crate::errors::TransportDecodeError;

/// Name of the cookie holding the sealed request token.
pub const REQUEST_TOKEN_COOKIE: &str = "herta_request_token";

/// How far in the future an envelope timestamp may be before we call it forged.
const MAX_CLOCK_SKEW_SECS: i64 = 30;

/// Short lived request token pair issued by X for one handshake.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCredential {
    pub token: String,
    pub token_secret: String,
}

impl fmt::Debug for RequestCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCredential")
            .field("token", &self.token)
            .field("token_secret", &"[redacted]")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct SealedPayload {
    #[serde(rename = "t")]
    token: String,
    #[serde(rename = "s")]
    token_secret: String,
    #[serde(rename = "iat")]
    issued_at: i64,
}

/// Encodes and decodes request credentials into opaque envelopes.
#[derive(Clone)]
pub struct TokenTransport {
    key: Arc<LessSafeKey>,
    rng: SystemRandom,
    ttl: Duration,
    secure_cookie: bool,
}

impl TokenTransport {
    pub fn new(secret: &[u8], ttl: Duration, secure_cookie: bool) -> color_eyre::Result<Self> {
        use color_eyre::eyre::eyre;

        if secret.is_empty() {
            return Err(eyre!("transport secret must not be empty"));
        }

        let key_material = ring::digest::digest(&ring::digest::SHA256, secret);
        let unbound = UnboundKey::new(&CHACHA20_POLY1305, key_material.as_ref())
            .map_err(|_| eyre!("Failed to build transport key"))?;

        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
            ttl,
            secure_cookie,
        })
    }

    pub fn encode(&self, credential: &RequestCredential) -> color_eyre::Result<String> {
        self.encode_at(credential, Utc::now())
    }

    pub fn encode_at(
        &self,
        credential: &RequestCredential,
        issued_at: DateTime<Utc>,
    ) -> color_eyre::Result<String> {
        use color_eyre::eyre::eyre;

        let payload = SealedPayload {
            token: credential.token.clone(),
            token_secret: credential.token_secret.clone(),
            issued_at: issued_at.timestamp(),
        };
        let mut in_out = serde_json::to_vec(&payload)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| eyre!("Failed to generate envelope nonce"))?;

        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(REQUEST_TOKEN_COOKIE.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| eyre!("Failed to seal request token envelope"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);

        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    pub fn decode(&self, envelope: &str) -> Result<RequestCredential, TransportDecodeError> {
        self.decode_at(envelope, Utc::now())
    }

    pub fn decode_at(
        &self,
        envelope: &str,
        now: DateTime<Utc>,
    ) -> Result<RequestCredential, TransportDecodeError> {
        let envelope = envelope.trim();
        if envelope.is_empty() {
            return Err(TransportDecodeError::Missing);
        }

        let sealed = URL_SAFE_NO_PAD
            .decode(envelope)
            .map_err(|_| TransportDecodeError::Malformed("not base64url"))?;

        let tag_len = CHACHA20_POLY1305.tag_len();
        if sealed.len() <= NONCE_LEN + tag_len {
            return Err(TransportDecodeError::Malformed("too short"));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| TransportDecodeError::Malformed("bad nonce"))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(REQUEST_TOKEN_COOKIE.as_bytes()), &mut in_out)
            .map_err(|_| TransportDecodeError::Tampered)?;

        let payload: SealedPayload = serde_json::from_slice(plaintext)
            .map_err(|_| TransportDecodeError::Malformed("bad payload"))?;

        let age = now.timestamp() - payload.issued_at;
        if age > self.ttl.num_seconds() || age < -MAX_CLOCK_SKEW_SECS {
            return Err(TransportDecodeError::Expired);
        }

        Ok(RequestCredential {
            token: payload.token,
            token_secret: payload.token_secret,
        })
    }

    /// Build the carrier cookie for an envelope.
    pub fn cookie(&self, envelope: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(REQUEST_TOKEN_COOKIE, envelope);
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure_cookie);
        cookie.set_max_age(time::Duration::seconds(self.ttl.num_seconds()));
        cookie
    }

    pub fn attach(&self, cookies: &Cookies, envelope: String) {
        cookies.add(self.cookie(envelope));
    }

    /// Read the envelope from the carrier, if the browser sent one.
    pub fn envelope_from(cookies: &Cookies) -> Option<String> {
        cookies
            .get(REQUEST_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
    }

    /// Drop the carrier once the handshake reached a terminal state.
    pub fn clear(cookies: &Cookies) {
        let mut cookie = Cookie::new(REQUEST_TOKEN_COOKIE, "");
        cookie.set_path("/");
        cookies.remove(cookie);
    }
}
