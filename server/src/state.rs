use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{eyre, WrapErr as _};
use tracing::{info, warn};

use crate::oauth::ConsumerCredentials;
use crate::provider::{HttpImageSource, IdentityProvider, ImageSource, ProfileMutations, TwitterClient};
use crate::puppets::PuppetStore;
use crate::transport::TokenTransport;

pub const DEFAULT_API_URL: &str = "https://api.twitter.com";
pub const DEFAULT_AVATAR_IMAGE_URL: &str =
    "https://pbs.twimg.com/media/Gm_D0QZXcAAZti4?format=jpg&name=large";
pub const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u32 = 10;
const DEFAULT_REQUEST_TOKEN_TTL_SECS: u32 = 600;

/// Everything we read from the environment at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub consumer: ConsumerCredentials,
    pub callback_url: String,
    pub transport_secret: TransportSecret,
    pub port: u16,
    pub api_url: String,
    pub avatar_image_url: String,
    pub provider_timeout: Duration,
    pub request_token_ttl: chrono::Duration,
    pub puppet_store_url: Option<String>,
}

/// Key material for the request token envelope
#[derive(Clone)]
pub struct TransportSecret(Vec<u8>);

impl std::fmt::Debug for TransportSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TransportSecret([redacted])")
    }
}

impl TransportSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// A per-process secret. Envelopes sealed by one instance cannot be opened by
    /// another, so callbacks landing on a fresh cold start will be rejected.
    pub fn generate() -> color_eyre::Result<Self> {
        use ring::rand::{SecureRandom as _, SystemRandom};

        let mut bytes = vec![0u8; 32];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| eyre!("Failed to generate transport secret"))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A duration setting in whole seconds, at least 1
fn positive_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u32,
) -> color_eyre::Result<u32> {
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };

    let secs: u32 = raw
        .parse()
        .wrap_err_with(|| format!("{name} must be a whole number of seconds, got {raw}"))?;
    if secs == 0 {
        return Err(eyre!("{name} must be at least 1 second"));
    }

    Ok(secs)
}

impl Config {
    pub fn from_env() -> color_eyre::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    /// Build the config from any variable source, which keeps tests off the process env
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> color_eyre::Result<Self> {
        let consumer = ConsumerCredentials {
            key: lookup("TWITTER_API_KEY")
                .ok_or_else(|| eyre!("TWITTER_API_KEY environment variable not set"))?,
            secret: lookup("TWITTER_API_SECRET")
                .ok_or_else(|| eyre!("TWITTER_API_SECRET environment variable not set"))?,
        };

        let port = match lookup("PORT") {
            Some(port) => port
                .parse()
                .wrap_err_with(|| format!("PORT must be a port number, got {port}"))?,
            None => DEFAULT_PORT,
        };

        let callback_url = match lookup("CALLBACK_URL") {
            Some(url) => url,
            None => {
                let (domain, default_proto) = match lookup("DOMAIN") {
                    Some(domain) => (domain, "https"),
                    None => (format!("localhost:{port}"), "http"),
                };
                let protocol = lookup("PROTO").unwrap_or_else(|| default_proto.to_string());
                format!("{protocol}://{domain}/callback")
            }
        };
        reqwest::Url::parse(&callback_url)
            .wrap_err_with(|| format!("Invalid callback URL: {callback_url}"))?;

        let transport_secret = match lookup("TRANSPORT_SECRET") {
            Some(secret) => TransportSecret::new(secret.into_bytes()),
            None => {
                warn!("TRANSPORT_SECRET not set, generating a per-process secret");
                TransportSecret::generate()?
            }
        };

        let provider_timeout = Duration::from_secs(u64::from(positive_secs(
            &lookup,
            "PROVIDER_TIMEOUT_SECS",
            DEFAULT_PROVIDER_TIMEOUT_SECS,
        )?));

        let request_token_ttl = chrono::Duration::seconds(i64::from(positive_secs(
            &lookup,
            "REQUEST_TOKEN_TTL_SECS",
            DEFAULT_REQUEST_TOKEN_TTL_SECS,
        )?));

        Ok(Self {
            consumer,
            callback_url,
            transport_secret,
            port,
            api_url: lookup("TWITTER_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            avatar_image_url: lookup("AVATAR_IMAGE_URL")
                .unwrap_or_else(|| DEFAULT_AVATAR_IMAGE_URL.to_string()),
            provider_timeout,
            request_token_ttl,
            puppet_store_url: lookup("PUPPET_STORE_URL"),
        })
    }

    pub fn secure_cookies(&self) -> bool {
        self.callback_url.starts_with("https://")
    }
}

#[derive(Clone)]
pub struct AppState {
    pub callback_url: String,
    pub transport: TokenTransport,
    pub provider: Arc<dyn IdentityProvider>,
    pub mutations: Arc<dyn ProfileMutations>,
    pub image_source: Arc<dyn ImageSource>,
    pub puppets: Arc<dyn PuppetStore>,
}

impl AppState {
    pub async fn from_config(config: &Config) -> color_eyre::Result<Self> {
        info!("TWITTER_API_URL: {}", config.api_url);
        info!("CALLBACK_URL: {}", config.callback_url);

        let http = reqwest::ClientBuilder::new()
            .timeout(config.provider_timeout)
            .use_rustls_tls()
            .build()
            .wrap_err("Failed to build HTTP client")?;

        let twitter = Arc::new(TwitterClient::new(
            http.clone(),
            config.consumer.clone(),
            &config.api_url,
        ));
        let image_source = Arc::new(HttpImageSource::new(http, config.avatar_image_url.clone())?);
        let puppets = crate::puppets::store_from_url(config.puppet_store_url.as_deref()).await?;
        let transport = TokenTransport::new(
            config.transport_secret.as_bytes(),
            config.request_token_ttl,
            config.secure_cookies(),
        )?;

        Ok(Self {
            callback_url: config.callback_url.clone(),
            transport,
            provider: twitter.clone(),
            mutations: twitter,
            image_source,
            puppets,
        })
    }
}
