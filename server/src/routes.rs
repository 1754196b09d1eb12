use axum::routing::get;
use tower_cookies::CookieManagerLayer;

use crate::{
    components::{layout::Page, pages},
    state::AppState,
};

pub mod oauth;

/// Build the application router with all routes
pub fn routes(app_state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/", get(root_page))
        .route("/healthz", get(healthz))
        // X OAuth 1.0a handshake
        .route("/login", get(oauth::login))
        .route("/redirect", get(oauth::redirect))
        .route("/callback", get(oauth::callback))
        .layer(CookieManagerLayer::new())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root_page() -> Page {
    pages::landing_page()
}

async fn healthz() -> &'static str {
    "ok"
}
