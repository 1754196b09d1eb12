//! In-process fakes for the X API, shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::ProviderError;
use crate::provider::{
    AccessCredential, AuthLink, AuthenticatedIdentity, IdentityProvider, ImageSource,
    ProfileMutations,
};
use crate::puppets::InMemoryPuppetStore;
use crate::state::AppState;
use crate::transport::{RequestCredential, TokenTransport};

#[derive(Default)]
pub struct Calls {
    pub request_tokens: AtomicUsize,
    pub exchanges: AtomicUsize,
    pub identities: AtomicUsize,
    pub display_names: Mutex<Vec<String>>,
    pub avatars: AtomicUsize,
}

impl Calls {
    pub fn provider_calls(&self) -> usize {
        self.request_tokens.load(Ordering::SeqCst)
            + self.exchanges.load(Ordering::SeqCst)
            + self.identities.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct FakeProvider {
    pub fail_request_token: bool,
    pub fail_exchange: bool,
    pub fail_avatar: bool,
    pub calls: Arc<Calls>,
}

fn rejected(endpoint: &str) -> ProviderError {
    ProviderError::Status {
        endpoint: endpoint.to_string(),
        status: reqwest::StatusCode::UNAUTHORIZED,
        body: "rejected".to_string(),
    }
}

#[async_trait::async_trait]
impl IdentityProvider for FakeProvider {
    async fn generate_auth_link(&self, _callback_url: &str) -> Result<AuthLink, ProviderError> {
        self.calls.request_tokens.fetch_add(1, Ordering::SeqCst);
        if self.fail_request_token {
            return Err(rejected("request_token"));
        }

        Ok(AuthLink {
            authorization_url: self.authorization_url("req-token"),
            credential: RequestCredential {
                token: "req-token".to_string(),
                token_secret: "request-secret".to_string(),
            },
        })
    }

    fn authorization_url(&self, request_token: &str) -> String {
        format!("https://x.test/oauth/authorize?oauth_token={request_token}")
    }

    async fn exchange_verifier(
        &self,
        _credential: &RequestCredential,
        _verifier: &str,
    ) -> Result<AccessCredential, ProviderError> {
        self.calls.exchanges.fetch_add(1, Ordering::SeqCst);
        if self.fail_exchange {
            return Err(rejected("access_token"));
        }

        Ok(AccessCredential {
            token: "access-token".to_string(),
            token_secret: "access-secret".to_string(),
        })
    }

    async fn current_identity(
        &self,
        _access: &AccessCredential,
    ) -> Result<AuthenticatedIdentity, ProviderError> {
        self.calls.identities.fetch_add(1, Ordering::SeqCst);

        Ok(AuthenticatedIdentity {
            provider_user_id: "1001".to_string(),
            username: Some("herta_fan".to_string()),
        })
    }
}

#[async_trait::async_trait]
impl ProfileMutations for FakeProvider {
    async fn set_display_name(
        &self,
        _access: &AccessCredential,
        name: &str,
    ) -> Result<(), ProviderError> {
        self.calls.display_names.lock().push(name.to_string());
        Ok(())
    }

    async fn set_avatar(
        &self,
        _access: &AccessCredential,
        _image: &[u8],
    ) -> Result<(), ProviderError> {
        if self.fail_avatar {
            return Err(rejected("update_profile_image"));
        }
        self.calls.avatars.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct StaticImage;

#[async_trait::async_trait]
impl ImageSource for StaticImage {
    async fn fetch(&self) -> Result<Vec<u8>, ProviderError> {
        Ok(vec![0xFF, 0xD8, 0xFF, 0xE0])
    }
}

pub fn test_transport() -> TokenTransport {
    TokenTransport::new(b"unit-test-secret", chrono::Duration::minutes(10), false)
        .expect("valid transport")
}

pub fn test_state(provider: FakeProvider) -> AppState {
    let provider = Arc::new(provider);

    AppState {
        callback_url: "http://localhost:3000/callback".to_string(),
        transport: test_transport(),
        provider: provider.clone(),
        mutations: provider,
        image_source: Arc::new(StaticImage),
        puppets: Arc::new(InMemoryPuppetStore::new()),
    }
}
