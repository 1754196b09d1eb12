use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::Cookies;
use tracing::info;

use crate::{
    components::pages::confirmation_page,
    errors::ServerResult,
    handshake::{CallbackDecision, CallbackParams, Handshake},
    state::AppState,
    transport::TokenTransport,
};

/// Handle the redirect back from X
pub async fn callback(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<CallbackParams>,
) -> ServerResult<Response, (StatusCode, String)> {
    let envelope = TokenTransport::envelope_from(&cookies);
    let mut handshake = Handshake::resume();

    let decision = handshake.inspect_callback(
        &params,
        envelope.as_deref(),
        &state.transport,
        state.provider.as_ref(),
    );

    let (credential, verifier) = match decision {
        Ok(CallbackDecision::Resume { authorization_url }) => {
            return Ok(Redirect::to(&authorization_url).into_response());
        }
        Ok(CallbackDecision::Verify {
            credential,
            verifier,
        }) => (credential, verifier),
        Err(err) => {
            TokenTransport::clear(&cookies);
            return Err(err.into());
        }
    };

    // The request token is spent whatever happens next
    TokenTransport::clear(&cookies);

    let completion = handshake.complete(&state, &credential, &verifier).await?;
    info!(
        ordinal = %completion.assignment.ordinal,
        "Handshake complete"
    );

    Ok(confirmation_page(&completion.assignment).into_response())
}
