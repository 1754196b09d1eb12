use axum::{extract::State, http::StatusCode, response::Redirect};
use tower_cookies::Cookies;
use tracing::info;

use crate::{errors::ServerResult, handshake::Handshake, state::AppState};

/// Start the X OAuth flow
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
) -> ServerResult<Redirect, (StatusCode, String)> {
    let mut handshake = Handshake::start();
    let redirect = handshake.begin(&state).await?;

    state.transport.attach(&cookies, redirect.envelope);
    info!("Sending user to X for authorization");

    Ok(Redirect::to(&redirect.authorization_url))
}
