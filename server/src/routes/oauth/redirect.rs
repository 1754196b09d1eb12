use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
};
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    errors::{HandshakeError, ServerResult, TransportDecodeError},
    state::AppState,
};

#[derive(Deserialize)]
pub struct RedirectParams {
    pub envelope: Option<String>,
}

/// Hop for clients that were handed an envelope out of band: store it in the
/// carrier cookie and continue to X.
pub async fn redirect(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<RedirectParams>,
) -> ServerResult<Redirect, (StatusCode, String)> {
    let envelope = params
        .envelope
        .filter(|e| !e.is_empty())
        .ok_or(HandshakeError::from(TransportDecodeError::Missing))?;

    let credential = state
        .transport
        .decode(&envelope)
        .map_err(HandshakeError::from)?;

    state.transport.attach(&cookies, envelope);

    Ok(Redirect::to(
        &state.provider.authorization_url(&credential.token),
    ))
}
