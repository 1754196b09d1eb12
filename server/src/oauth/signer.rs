use std::fmt;

use ring::hmac;

use super::utils::{base64_encode, generate_nonce, percent_encode};

/// The application's consumer key pair from the X developer portal
#[derive(Clone)]
pub struct ConsumerCredentials {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for ConsumerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCredentials")
            .field("key", &self.key)
            .field("secret", &"[redacted]")
            .finish()
    }
}

/// Signs requests on behalf of the consumer, optionally with a token pair
///
/// During the handshake the token is the request token; afterwards it is the
/// access token of the user we are acting for.
pub struct RequestSigner<'a> {
    consumer: &'a ConsumerCredentials,
    token: Option<(&'a str, &'a str)>,
}

impl<'a> RequestSigner<'a> {
    pub fn new(consumer: &'a ConsumerCredentials) -> Self {
        Self {
            consumer,
            token: None,
        }
    }

    pub fn with_token(mut self, token: &'a str, token_secret: &'a str) -> Self {
        self.token = Some((token, token_secret));
        self
    }

    /// Build the `Authorization` header value for a request
    ///
    /// `protocol_params` carries extra `oauth_*` values such as `oauth_callback`
    /// or `oauth_verifier`. `request_params` are the query and form body values,
    /// which take part in the signature but not in the header.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        protocol_params: &[(&str, &str)],
        request_params: &[(&str, &str)],
    ) -> String {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(
            method,
            url,
            protocol_params,
            request_params,
            &generate_nonce(),
            &timestamp,
        )
    }

    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        protocol_params: &[(&str, &str)],
        request_params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let mut oauth_params: Vec<(&str, &str)> = vec![
            ("oauth_consumer_key", self.consumer.key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_version", "1.0"),
        ];
        if let Some((token, _)) = self.token {
            oauth_params.push(("oauth_token", token));
        }
        oauth_params.extend_from_slice(protocol_params);

        let mut all_params = oauth_params.clone();
        all_params.extend_from_slice(request_params);

        let base = signature_base_string(method, url, &all_params);
        let token_secret = self.token.map(|(_, secret)| secret).unwrap_or_default();
        let signature = sign(&base, &self.consumer.secret, token_secret);

        oauth_params.push(("oauth_signature", signature.as_str()));

        let mut encoded: Vec<(String, String)> = oauth_params
            .iter()
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        encoded.sort();

        let fields = encoded
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect::<Vec<_>>()
            .join(", ");

        format!("OAuth {fields}")
    }
}

/// RFC 5849 section 3.4.1 signature base string
/// `url` must not carry a query string; pass those values in `params`
pub fn signature_base_string(method: &str, url: &str, params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

/// HMAC-SHA1 over the base string, keyed by both secrets
pub fn sign(base_string: &str, consumer_secret: &str, token_secret: &str) -> String {
    let signing_key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, signing_key.as_bytes());
    base64_encode(hmac::sign(&key, base_string.as_bytes()).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Worked example from the X developer documentation, "Creating a signature"
    const CONSUMER_KEY: &str = "xvz1evFS4wEEPTGEFPHBog";
    const CONSUMER_SECRET: &str = "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw";
    const TOKEN: &str = "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb";
    const TOKEN_SECRET: &str = "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE";
    const NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const TIMESTAMP: &str = "1318622958";
    const URL: &str = "https://api.twitter.com/1.1/statuses/update.json";
    const STATUS: &str = "Hello Ladies + Gentlemen, a signed OAuth request!";

    fn documented_params() -> Vec<(&'static str, &'static str)> {
        vec![
            ("status", STATUS),
            ("include_entities", "true"),
            ("oauth_consumer_key", CONSUMER_KEY),
            ("oauth_nonce", NONCE),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", TIMESTAMP),
            ("oauth_token", TOKEN),
            ("oauth_version", "1.0"),
        ]
    }

    #[test]
    fn builds_the_documented_base_string() {
        let base = signature_base_string("post", URL, &documented_params());

        assert_eq!(
            base,
            "POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&include_entities%3Dtrue%26oauth_consumer_key%3Dxvz1evFS4wEEPTGEFPHBog%26oauth_nonce%3DkYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg%26oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1318622958%26oauth_token%3D370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb%26oauth_version%3D1.0%26status%3DHello%2520Ladies%2520%252B%2520Gentlemen%252C%2520a%2520signed%2520OAuth%2520request%2521"
        );
    }

    #[test]
    fn produces_the_documented_signature() {
        let base = signature_base_string("POST", URL, &documented_params());

        assert_eq!(
            sign(&base, CONSUMER_SECRET, TOKEN_SECRET),
            "hCtSmYh+iHYCEqBWrE7C7hYmtUk="
        );
    }

    #[test]
    fn header_carries_oauth_fields_but_not_request_params() {
        let consumer = ConsumerCredentials {
            key: CONSUMER_KEY.to_string(),
            secret: CONSUMER_SECRET.to_string(),
        };
        let header = RequestSigner::new(&consumer)
            .with_token(TOKEN, TOKEN_SECRET)
            .authorization_header_with(
                "POST",
                URL,
                &[],
                &[("status", STATUS), ("include_entities", "true")],
                NONCE,
                TIMESTAMP,
            );

        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_token=\"370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb\""));
        assert!(!header.contains("status"));
    }

    #[test]
    fn request_token_header_has_callback_and_no_token() {
        let consumer = ConsumerCredentials {
            key: CONSUMER_KEY.to_string(),
            secret: CONSUMER_SECRET.to_string(),
        };
        let header = RequestSigner::new(&consumer).authorization_header(
            "POST",
            "https://api.twitter.com/oauth/request_token",
            &[("oauth_callback", "https://example.com/callback")],
            &[],
        );

        assert!(header.contains("oauth_callback=\"https%3A%2F%2Fexample.com%2Fcallback\""));
        assert!(!header.contains("oauth_token="));
    }
}
