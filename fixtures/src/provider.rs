//! A fake X API speaking just enough OAuth 1.0a for the puppet handshake.
//!
//! The authorize page approves immediately and redirects to the callback that was
//! registered with the request token. Signatures on the token endpoints are only
//! checked when the fake is built with [`FakeX::verifying`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parking_lot::Mutex;
use ring::hmac;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Stand-in for the Herta avatar, a JPEG SOI marker and not much else
pub const AVATAR_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

pub const DEFAULT_USER_ID: &str = "1001";

#[derive(Default)]
struct Inner {
    issued: u64,
    /// request token -> pending authorization
    request_tokens: HashMap<String, PendingAuthorization>,
    /// access token -> user id
    access_tokens: HashMap<String, String>,
    access_token_calls: usize,
    display_names: Vec<(String, String)>,
    avatar_uploads: Vec<(String, Vec<u8>)>,
    fail_avatar: bool,
    fail_request_token: bool,
    rate_limit_request_token: bool,
    consumer_secret: Option<String>,
}

struct PendingAuthorization {
    callback: String,
    token_secret: String,
    user_id: String,
    verifier: Option<String>,
}

/// Shared handle on the fake, cheap to clone, used by tests for assertions
#[derive(Clone, Default)]
pub struct FakeX {
    inner: Arc<Mutex<Inner>>,
}

impl FakeX {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fake that rejects token requests not signed with `consumer_secret`
    pub fn verifying(consumer_secret: &str) -> Self {
        let fake = Self::default();
        fake.inner.lock().consumer_secret = Some(consumer_secret.to_string());
        fake
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/oauth/request_token", post(request_token))
            .route("/oauth/authorize", get(authorize))
            .route("/oauth/access_token", post(access_token))
            .route("/2/users/me", get(users_me))
            .route("/1.1/account/update_profile.json", post(update_profile))
            .route(
                "/1.1/account/update_profile_image.json",
                post(update_profile_image),
            )
            .route("/media/herta.jpg", get(avatar))
            .with_state(self.clone())
    }

    pub fn fail_avatar_uploads(&self, fail: bool) {
        self.inner.lock().fail_avatar = fail;
    }

    pub fn fail_request_tokens(&self, fail: bool) {
        self.inner.lock().fail_request_token = fail;
    }

    /// Answer request token calls with 429 Too Many Requests
    pub fn rate_limit_request_tokens(&self, limited: bool) {
        self.inner.lock().rate_limit_request_token = limited;
    }

    pub fn access_token_calls(&self) -> usize {
        self.inner.lock().access_token_calls
    }

    /// `(user_id, name)` for every display name update, in order
    pub fn display_names(&self) -> Vec<(String, String)> {
        self.inner.lock().display_names.clone()
    }

    /// `(user_id, image bytes)` for every accepted avatar upload
    pub fn avatar_uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.inner.lock().avatar_uploads.clone()
    }
}

/// Pull the `oauth_*` parameters out of an `Authorization: OAuth ...` header
pub fn oauth_params(headers: &HeaderMap) -> HashMap<String, String> {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("OAuth "))
    else {
        return HashMap::new();
    };

    // Values are RFC 3986 encoded, which form decoding reads back correctly
    let joined = value
        .split(',')
        .filter_map(|pair| {
            let (key, quoted) = pair.trim().split_once('=')?;
            Some(format!("{}={}", key, quoted.trim_matches('"')))
        })
        .collect::<Vec<_>>()
        .join("&");

    serde_urlencoded::from_str(&joined).unwrap_or_default()
}

fn pct(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// HMAC-SHA1 signature over the protocol parameters, `oauth_signature` excluded
pub fn expected_signature(
    method: &str,
    url: &str,
    params: &HashMap<String, String>,
    consumer_secret: &str,
    token_secret: &str,
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .filter(|(k, _)| k.as_str() != "oauth_signature")
        .map(|(k, v)| (pct(k), pct(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let base = format!("{method}&{}&{}", pct(url), pct(&normalized));

    let signing_key = format!("{}&{}", pct(consumer_secret), pct(token_secret));
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, signing_key.as_bytes());
    STANDARD.encode(hmac::sign(&key, base.as_bytes()).as_ref())
}

fn signature_matches(
    inner: &Inner,
    headers: &HeaderMap,
    path: &str,
    params: &HashMap<String, String>,
    token_secret: &str,
) -> bool {
    let Some(consumer_secret) = inner.consumer_secret.as_deref() else {
        return true;
    };
    let Some(sent) = params.get("oauth_signature") else {
        return false;
    };

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let url = format!("http://{host}{path}");

    *sent == expected_signature("POST", &url, params, consumer_secret, token_secret)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "errors": [{ "code": 89, "message": message }] })),
    )
        .into_response()
}

async fn request_token(State(fake): State<FakeX>, headers: HeaderMap) -> Response {
    let params = oauth_params(&headers);
    let Some(callback) = params.get("oauth_callback").cloned() else {
        return (StatusCode::BAD_REQUEST, "oauth_callback required").into_response();
    };

    let mut inner = fake.inner.lock();
    if inner.rate_limit_request_token {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "errors": [{ "code": 88, "message": "Rate limit exceeded" }] })),
        )
            .into_response();
    }
    if inner.fail_request_token {
        return (StatusCode::SERVICE_UNAVAILABLE, "over capacity").into_response();
    }
    if !signature_matches(&inner, &headers, "/oauth/request_token", &params, "") {
        return unauthorized("could not authenticate you");
    }

    inner.issued += 1;
    let token = format!("req-{}", inner.issued);
    let secret = format!("req-secret-{}", inner.issued);
    inner.request_tokens.insert(
        token.clone(),
        PendingAuthorization {
            callback,
            token_secret: secret.clone(),
            user_id: DEFAULT_USER_ID.to_string(),
            verifier: None,
        },
    );
    info!(%token, "Issued request token");

    format!("oauth_token={token}&oauth_token_secret={secret}&oauth_callback_confirmed=true")
        .into_response()
}

#[derive(Deserialize)]
struct AuthorizeParams {
    oauth_token: String,
    /// Which account "signs in", so tests can drive several identities
    user: Option<String>,
    /// Simulate the user pressing cancel
    #[serde(default)]
    deny: bool,
}

async fn authorize(State(fake): State<FakeX>, Query(params): Query<AuthorizeParams>) -> Response {
    let mut inner = fake.inner.lock();
    let Some(pending) = inner.request_tokens.get_mut(&params.oauth_token) else {
        return (StatusCode::BAD_REQUEST, "unknown request token").into_response();
    };

    let separator = if pending.callback.contains('?') { '&' } else { '?' };

    if params.deny {
        let location = format!("{}{}denied={}", pending.callback, separator, params.oauth_token);
        return Redirect::to(&location).into_response();
    }

    if let Some(user) = params.user {
        pending.user_id = user;
    }
    let verifier = format!("ver-{}", params.oauth_token);
    pending.verifier = Some(verifier.clone());

    let location = format!(
        "{}{}oauth_token={}&oauth_verifier={}",
        pending.callback, separator, params.oauth_token, verifier
    );
    Redirect::to(&location).into_response()
}

async fn access_token(State(fake): State<FakeX>, headers: HeaderMap) -> Response {
    let params = oauth_params(&headers);
    let mut inner = fake.inner.lock();
    inner.access_token_calls += 1;

    let (Some(token), Some(verifier)) = (params.get("oauth_token"), params.get("oauth_verifier"))
    else {
        return unauthorized("missing token or verifier");
    };

    let Some(token_secret) = inner
        .request_tokens
        .get(token)
        .map(|pending| pending.token_secret.clone())
    else {
        return unauthorized("invalid request token");
    };
    if !signature_matches(&inner, &headers, "/oauth/access_token", &params, &token_secret) {
        return unauthorized("could not authenticate you");
    }

    // Request tokens are single use
    let Some(pending) = inner.request_tokens.remove(token) else {
        return unauthorized("invalid request token");
    };
    if pending.verifier.as_deref() != Some(verifier.as_str()) {
        return unauthorized("invalid verifier");
    }

    let access = format!("acc-{}-{}", pending.user_id, token);
    inner
        .access_tokens
        .insert(access.clone(), pending.user_id.clone());

    format!(
        "oauth_token={access}&oauth_token_secret=acc-secret&user_id={}&screen_name=puppet_{}",
        pending.user_id, pending.user_id
    )
    .into_response()
}

fn authenticated_user(fake: &FakeX, headers: &HeaderMap) -> Option<String> {
    let token = oauth_params(headers).remove("oauth_token")?;
    fake.inner.lock().access_tokens.get(&token).cloned()
}

async fn users_me(State(fake): State<FakeX>, headers: HeaderMap) -> Response {
    let Some(user_id) = authenticated_user(&fake, &headers) else {
        return unauthorized("invalid or expired token");
    };

    Json(json!({
        "data": {
            "id": user_id,
            "name": "Someone",
            "username": format!("puppet_{user_id}"),
        }
    }))
    .into_response()
}

#[derive(Deserialize)]
struct UpdateProfileForm {
    name: String,
}

async fn update_profile(
    State(fake): State<FakeX>,
    headers: HeaderMap,
    Form(form): Form<UpdateProfileForm>,
) -> Response {
    let Some(user_id) = authenticated_user(&fake, &headers) else {
        return unauthorized("invalid or expired token");
    };

    fake.inner
        .lock()
        .display_names
        .push((user_id.clone(), form.name.clone()));

    Json(json!({ "id_str": user_id, "name": form.name })).into_response()
}

#[derive(Deserialize)]
struct UpdateProfileImageForm {
    image: String,
}

async fn update_profile_image(
    State(fake): State<FakeX>,
    headers: HeaderMap,
    Form(form): Form<UpdateProfileImageForm>,
) -> Response {
    let Some(user_id) = authenticated_user(&fake, &headers) else {
        return unauthorized("invalid or expired token");
    };

    let mut inner = fake.inner.lock();
    if inner.fail_avatar {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "errors": [{ "code": 324, "message": "image rejected" }] })),
        )
            .into_response();
    }

    let Ok(image) = STANDARD.decode(form.image.as_bytes()) else {
        return (StatusCode::BAD_REQUEST, "image must be base64").into_response();
    };
    inner.avatar_uploads.push((user_id.clone(), image));

    Json(json!({ "id_str": user_id })).into_response()
}

async fn avatar() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/jpeg")], AVATAR_BYTES)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{HeaderValue, Request};
    use tower::ServiceExt;

    use super::*;

    fn oauth_header(pairs: &[(&str, &str)]) -> HeaderValue {
        let fields = pairs
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect::<Vec<_>>()
            .join(", ");
        HeaderValue::from_str(&format!("OAuth {fields}")).unwrap()
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn parses_percent_encoded_header_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            oauth_header(&[
                ("oauth_callback", "http%3A%2F%2Flocalhost%3A3000%2Fcallback"),
                ("oauth_nonce", "abc"),
            ]),
        );

        let params = oauth_params(&headers);

        assert_eq!(params["oauth_callback"], "http://localhost:3000/callback");
        assert_eq!(params["oauth_nonce"], "abc");
    }

    #[tokio::test]
    async fn full_dance_issues_access_for_the_chosen_user() {
        let fake = FakeX::new();

        let response = fake
            .router()
            .oneshot(
                Request::post("/oauth/request_token")
                    .header(
                        header::AUTHORIZATION,
                        oauth_header(&[("oauth_callback", "http%3A%2F%2Fapp%2Fcallback")]),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            body(response).await,
            "oauth_token=req-1&oauth_token_secret=req-secret-1&oauth_callback_confirmed=true"
        );

        let response = fake
            .router()
            .oneshot(
                Request::get("/oauth/authorize?oauth_token=req-1&user=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::LOCATION],
            "http://app/callback?oauth_token=req-1&oauth_verifier=ver-req-1"
        );

        let response = fake
            .router()
            .oneshot(
                Request::post("/oauth/access_token")
                    .header(
                        header::AUTHORIZATION,
                        oauth_header(&[("oauth_token", "req-1"), ("oauth_verifier", "ver-req-1")]),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body(response).await.starts_with("oauth_token=acc-42-req-1&"));
        assert_eq!(fake.access_token_calls(), 1);
    }

    #[tokio::test]
    async fn wrong_verifier_is_rejected() {
        let fake = FakeX::new();
        fake.inner.lock().request_tokens.insert(
            "req-1".to_string(),
            PendingAuthorization {
                callback: "http://app/callback".to_string(),
                token_secret: "req-secret".to_string(),
                user_id: DEFAULT_USER_ID.to_string(),
                verifier: Some("ver-req-1".to_string()),
            },
        );

        let response = fake
            .router()
            .oneshot(
                Request::post("/oauth/access_token")
                    .header(
                        header::AUTHORIZATION,
                        oauth_header(&[("oauth_token", "req-1"), ("oauth_verifier", "guess")]),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn denied_authorization_redirects_with_denied() {
        let fake = FakeX::new();
        fake.inner.lock().request_tokens.insert(
            "req-9".to_string(),
            PendingAuthorization {
                callback: "http://app/callback".to_string(),
                token_secret: "req-secret".to_string(),
                user_id: DEFAULT_USER_ID.to_string(),
                verifier: None,
            },
        );

        let response = fake
            .router()
            .oneshot(
                Request::get("/oauth/authorize?oauth_token=req-9&deny=true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::LOCATION],
            "http://app/callback?denied=req-9"
        );
    }

    fn signed_request_token(signature: &str) -> Request<Body> {
        let signature = pct(signature);

        Request::post("/oauth/request_token")
            .header(header::HOST, "x.test")
            .header(
                header::AUTHORIZATION,
                oauth_header(&[
                    ("oauth_callback", "http%3A%2F%2Fapp%2Fcallback"),
                    ("oauth_consumer_key", "consumer-key"),
                    ("oauth_nonce", "n0nce"),
                    ("oauth_signature", signature.as_str()),
                    ("oauth_signature_method", "HMAC-SHA1"),
                    ("oauth_timestamp", "1700000000"),
                    ("oauth_version", "1.0"),
                ]),
            )
            .body(Body::empty())
            .unwrap()
    }

    fn request_token_params() -> HashMap<String, String> {
        [
            ("oauth_callback", "http://app/callback"),
            ("oauth_consumer_key", "consumer-key"),
            ("oauth_nonce", "n0nce"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1700000000"),
            ("oauth_version", "1.0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[tokio::test]
    async fn verifying_fake_checks_request_token_signatures() {
        let fake = FakeX::verifying("consumer-secret");

        let forged = expected_signature(
            "POST",
            "http://x.test/oauth/request_token",
            &request_token_params(),
            "wrong-secret",
            "",
        );
        let response = fake.router().oneshot(signed_request_token(&forged)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let genuine = expected_signature(
            "POST",
            "http://x.test/oauth/request_token",
            &request_token_params(),
            "consumer-secret",
            "",
        );
        let response = fake.router().oneshot(signed_request_token(&genuine)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn verifying_fake_requires_the_request_token_secret_on_exchange() {
        let fake = FakeX::verifying("consumer-secret");
        fake.inner.lock().request_tokens.insert(
            "req-1".to_string(),
            PendingAuthorization {
                callback: "http://app/callback".to_string(),
                token_secret: "req-secret-1".to_string(),
                user_id: DEFAULT_USER_ID.to_string(),
                verifier: Some("ver-req-1".to_string()),
            },
        );

        let params: HashMap<String, String> = [
            ("oauth_consumer_key", "consumer-key"),
            ("oauth_nonce", "n0nce"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1700000000"),
            ("oauth_token", "req-1"),
            ("oauth_verifier", "ver-req-1"),
            ("oauth_version", "1.0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let exchange = |token_secret: &str| {
            let signature = expected_signature(
                "POST",
                "http://x.test/oauth/access_token",
                &params,
                "consumer-secret",
                token_secret,
            );
            let mut pairs: Vec<(&str, String)> =
                params.iter().map(|(k, v)| (k.as_str(), pct(v))).collect();
            pairs.push(("oauth_signature", pct(&signature)));
            let fields = pairs
                .iter()
                .map(|(k, v)| format!("{k}=\"{v}\""))
                .collect::<Vec<_>>()
                .join(", ");

            Request::post("/oauth/access_token")
                .header(header::HOST, "x.test")
                .header(header::AUTHORIZATION, format!("OAuth {fields}"))
                .body(Body::empty())
                .unwrap()
        };

        let response = fake.router().oneshot(exchange("")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // A bad signature must not burn the request token
        let response = fake.router().oneshot(exchange("req-secret-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rate_limited_request_token_is_a_429() {
        let fake = FakeX::new();
        fake.rate_limit_request_tokens(true);

        let response = fake
            .router()
            .oneshot(
                Request::post("/oauth/request_token")
                    .header(
                        header::AUTHORIZATION,
                        oauth_header(&[("oauth_callback", "http%3A%2F%2Fapp%2Fcallback")]),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn profile_calls_need_an_access_token() {
        let fake = FakeX::new();

        let response = fake
            .router()
            .oneshot(
                Request::post("/1.1/account/update_profile.json")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("name=Herta+Puppet+%230001"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(fake.display_names().is_empty());
    }
}
