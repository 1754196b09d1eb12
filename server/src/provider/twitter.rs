use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::ProviderError;
use crate::oauth::{utils::base64_encode, utils::percent_encode, ConsumerCredentials, RequestSigner};
use crate::transport::RequestCredential;

use super::{AccessCredential, AuthLink, AuthenticatedIdentity, IdentityProvider, ProfileMutations};

const REQUEST_TOKEN_PATH: &str = "/oauth/request_token";
const AUTHORIZE_PATH: &str = "/oauth/authorize";
const ACCESS_TOKEN_PATH: &str = "/oauth/access_token";
const USERS_ME_PATH: &str = "/2/users/me";
const UPDATE_PROFILE_PATH: &str = "/1.1/account/update_profile.json";
const UPDATE_PROFILE_IMAGE_PATH: &str = "/1.1/account/update_profile_image.json";

/// OAuth 1.0a client for the X API
#[derive(Clone)]
pub struct TwitterClient {
    http: reqwest::Client,
    consumer: ConsumerCredentials,
    api_url: String,
}

#[derive(Deserialize)]
struct RequestTokenResponse {
    oauth_token: String,
    oauth_token_secret: String,
    oauth_callback_confirmed: Option<String>,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    oauth_token: String,
    oauth_token_secret: String,
}

#[derive(Deserialize)]
struct UsersMeResponse {
    data: UsersMeData,
}

#[derive(Deserialize)]
struct UsersMeData {
    id: String,
    username: Option<String>,
}

impl TwitterClient {
    pub fn new(http: reqwest::Client, consumer: ConsumerCredentials, api_url: &str) -> Self {
        Self {
            http,
            consumer,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn post_signed(
        &self,
        url: &str,
        signer: RequestSigner<'_>,
        protocol_params: &[(&str, &str)],
        form: &[(&str, &str)],
    ) -> Result<String, ProviderError> {
        let header = signer.authorization_header("POST", url, protocol_params, form);
        let body = serde_urlencoded::to_string(form)
            .map_err(|e| ProviderError::invalid(url, format!("could not encode form: {e}")))?;

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, header)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| ProviderError::network(url, e))?;

        read_body(url, response).await
    }

    async fn get_signed(&self, url: &str, signer: RequestSigner<'_>) -> Result<String, ProviderError> {
        let header = signer.authorization_header("GET", url, &[], &[]);

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, header)
            .send()
            .await
            .map_err(|e| ProviderError::network(url, e))?;

        read_body(url, response).await
    }
}

async fn read_body(endpoint: &str, response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited {
            endpoint: endpoint.to_string(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::network(endpoint, e))?;

    if !status.is_success() {
        return Err(ProviderError::Status {
            endpoint: endpoint.to_string(),
            status,
            body,
        });
    }

    Ok(body)
}

#[async_trait::async_trait]
impl IdentityProvider for TwitterClient {
    #[tracing::instrument(skip(self))]
    async fn generate_auth_link(&self, callback_url: &str) -> Result<AuthLink, ProviderError> {
        let url = self.endpoint(REQUEST_TOKEN_PATH);
        let body = self
            .post_signed(
                &url,
                RequestSigner::new(&self.consumer),
                &[("oauth_callback", callback_url)],
                &[],
            )
            .await?;

        let parsed: RequestTokenResponse = serde_urlencoded::from_str(&body)
            .map_err(|e| ProviderError::invalid(&url, format!("could not parse request token: {e}")))?;

        if parsed.oauth_callback_confirmed.as_deref() != Some("true") {
            return Err(ProviderError::invalid(&url, "callback was not confirmed"));
        }

        info!(token = %parsed.oauth_token, "Obtained request token");

        Ok(AuthLink {
            authorization_url: self.authorization_url(&parsed.oauth_token),
            credential: RequestCredential {
                token: parsed.oauth_token,
                token_secret: parsed.oauth_token_secret,
            },
        })
    }

    fn authorization_url(&self, request_token: &str) -> String {
        format!(
            "{}?oauth_token={}",
            self.endpoint(AUTHORIZE_PATH),
            percent_encode(request_token)
        )
    }

    #[tracing::instrument(skip_all, fields(token = %credential.token))]
    async fn exchange_verifier(
        &self,
        credential: &RequestCredential,
        verifier: &str,
    ) -> Result<AccessCredential, ProviderError> {
        let url = self.endpoint(ACCESS_TOKEN_PATH);
        let signer = RequestSigner::new(&self.consumer)
            .with_token(&credential.token, &credential.token_secret);
        let body = self
            .post_signed(&url, signer, &[("oauth_verifier", verifier)], &[])
            .await?;

        let parsed: AccessTokenResponse = serde_urlencoded::from_str(&body)
            .map_err(|e| ProviderError::invalid(&url, format!("could not parse access token: {e}")))?;

        Ok(AccessCredential {
            token: parsed.oauth_token,
            token_secret: parsed.oauth_token_secret,
        })
    }

    #[tracing::instrument(skip_all)]
    async fn current_identity(
        &self,
        access: &AccessCredential,
    ) -> Result<AuthenticatedIdentity, ProviderError> {
        let url = self.endpoint(USERS_ME_PATH);
        let signer =
            RequestSigner::new(&self.consumer).with_token(&access.token, &access.token_secret);
        let body = self.get_signed(&url, signer).await?;

        let parsed: UsersMeResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid(&url, format!("could not parse user: {e}")))?;

        debug!(user_id = %parsed.data.id, "Resolved current user");

        Ok(AuthenticatedIdentity {
            provider_user_id: parsed.data.id,
            username: parsed.data.username,
        })
    }
}

#[async_trait::async_trait]
impl ProfileMutations for TwitterClient {
    #[tracing::instrument(skip(self, access))]
    async fn set_display_name(
        &self,
        access: &AccessCredential,
        name: &str,
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(UPDATE_PROFILE_PATH);
        let signer =
            RequestSigner::new(&self.consumer).with_token(&access.token, &access.token_secret);
        self.post_signed(&url, signer, &[], &[("name", name)]).await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, fields(bytes = image.len()))]
    async fn set_avatar(
        &self,
        access: &AccessCredential,
        image: &[u8],
    ) -> Result<(), ProviderError> {
        let url = self.endpoint(UPDATE_PROFILE_IMAGE_PATH);
        let encoded = base64_encode(image);
        let signer =
            RequestSigner::new(&self.consumer).with_token(&access.token, &access.token_secret);
        self.post_signed(&url, signer, &[], &[("image", encoded.as_str())])
            .await?;

        Ok(())
    }
}
