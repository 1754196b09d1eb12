//! External collaborators of the handshake
//! The identity provider (X), the profile mutation API and the avatar image host
//! sit behind traits so the handshake can be driven against fakes in tests.

use std::fmt;

use crate::errors::ProviderError;
use crate::transport::RequestCredential;

mod image;
mod twitter;

pub use image::*;
pub use twitter::*;

/// Result of asking the provider for a fresh request token
#[derive(Debug, Clone)]
pub struct AuthLink {
    pub authorization_url: String,
    pub credential: RequestCredential,
}

/// Long lived token pair for acting on the user's behalf
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub token: String,
    pub token_secret: String,
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredential")
            .field("token", &self.token)
            .field("token_secret", &"[redacted]")
            .finish()
    }
}

/// The account that completed the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub provider_user_id: String,
    pub username: Option<String>,
}

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn generate_auth_link(&self, callback_url: &str) -> Result<AuthLink, ProviderError>;

    /// Where to send the browser to authorize an already issued request token
    fn authorization_url(&self, request_token: &str) -> String;

    async fn exchange_verifier(
        &self,
        credential: &RequestCredential,
        verifier: &str,
    ) -> Result<AccessCredential, ProviderError>;

    async fn current_identity(
        &self,
        access: &AccessCredential,
    ) -> Result<AuthenticatedIdentity, ProviderError>;
}

#[async_trait::async_trait]
pub trait ProfileMutations: Send + Sync {
    async fn set_display_name(
        &self,
        access: &AccessCredential,
        name: &str,
    ) -> Result<(), ProviderError>;

    async fn set_avatar(&self, access: &AccessCredential, image: &[u8])
        -> Result<(), ProviderError>;
}

#[async_trait::async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, ProviderError>;
}
