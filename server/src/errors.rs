use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Why a transported request credential could not be recovered.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransportDecodeError {
    #[error("no request token envelope was presented")]
    Missing,
    #[error("request token envelope is malformed: {0}")]
    Malformed(&'static str),
    #[error("request token envelope failed authentication")]
    Tampered,
    #[error("request token envelope has expired")]
    Expired,
}

/// Preconditions of the callback leg that the client failed to meet.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HandshakeValidationError {
    #[error("callback is missing oauth_token")]
    MissingToken,
    #[error("callback oauth_token does not match the transported request token")]
    TokenMismatch,
    #[error("the user denied the authorization request")]
    AuthorizationDenied,
}

/// Failures talking to X or to the avatar image host.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("network error calling {endpoint}: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("rate limited by {endpoint}")]
    RateLimited { endpoint: String },
    #[error("{endpoint} responded with {status}: {body}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

impl ProviderError {
    pub(crate) fn network(endpoint: &str, source: reqwest::Error) -> Self {
        ProviderError::Network {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    pub(crate) fn invalid(endpoint: &str, reason: impl Into<String>) -> Self {
        ProviderError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}

/// The display name was changed but the avatar was not.
#[derive(Debug, thiserror::Error)]
#[error("display name set to {display_name:?} but the avatar update failed")]
pub struct PartialMutationError {
    pub display_name: String,
    #[source]
    pub source: ProviderError,
}

/// Which provider interaction a [`ProviderError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStep {
    RequestToken,
    ExchangeVerifier,
    FetchIdentity,
    FetchAvatarImage,
    SetDisplayName,
}

impl ProviderStep {
    fn user_message(self) -> &'static str {
        match self {
            ProviderStep::RequestToken => "Could not start sign-in with X. Please try again later.",
            ProviderStep::ExchangeVerifier => {
                "X rejected the sign-in verifier. Please start again from /login."
            }
            ProviderStep::FetchIdentity => "Signed in, but X would not tell us who you are.",
            ProviderStep::FetchAvatarImage => {
                "Could not fetch the puppet avatar. Your profile was not changed."
            }
            ProviderStep::SetDisplayName => {
                "X refused the display name change. Your profile was not changed."
            }
        }
    }
}

/// The reason a handshake ended in the aborted state.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error(transparent)]
    Transport(#[from] TransportDecodeError),
    #[error(transparent)]
    Validation(#[from] HandshakeValidationError),
    #[error("provider call failed during {step:?}")]
    Provider {
        step: ProviderStep,
        #[source]
        source: ProviderError,
    },
    #[error("could not seal the request token envelope: {0:#}")]
    Envelope(color_eyre::Report),
    #[error("puppet number assignment failed: {0:#}")]
    Store(color_eyre::Report),
    #[error(transparent)]
    PartialMutation(#[from] PartialMutationError),
    #[error("illegal handshake transition from {from} to {to}")]
    IllegalTransition {
        from: crate::handshake::HandshakeState,
        to: crate::handshake::HandshakeState,
    },
}

impl HandshakeError {
    pub fn provider(step: ProviderStep, source: ProviderError) -> Self {
        HandshakeError::Provider { step, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HandshakeError::Transport(_) | HandshakeError::Validation(_) => StatusCode::BAD_REQUEST,
            HandshakeError::Provider { .. }
            | HandshakeError::Envelope(_)
            | HandshakeError::Store(_)
            | HandshakeError::PartialMutation(_)
            | HandshakeError::IllegalTransition { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain text shown to the user. Never includes provider internals.
    pub fn user_message(&self) -> String {
        match self {
            HandshakeError::Transport(TransportDecodeError::Missing) => {
                "Your sign-in cookie is missing. Please start again from /login.".to_string()
            }
            HandshakeError::Transport(TransportDecodeError::Expired) => {
                "Your sign-in attempt expired. Please start again from /login.".to_string()
            }
            HandshakeError::Transport(_) => {
                "Your sign-in cookie is invalid. Please start again from /login.".to_string()
            }
            HandshakeError::Validation(HandshakeValidationError::MissingToken) => {
                "The callback from X is missing its oauth_token.".to_string()
            }
            HandshakeError::Validation(HandshakeValidationError::TokenMismatch) => {
                "The callback token does not match your sign-in attempt.".to_string()
            }
            HandshakeError::Validation(HandshakeValidationError::AuthorizationDenied) => {
                "You declined the authorization on X, so nothing was changed.".to_string()
            }
            HandshakeError::Provider { step, .. } => step.user_message().to_string(),
            HandshakeError::Envelope(_) => ProviderStep::RequestToken.user_message().to_string(),
            HandshakeError::Store(_) | HandshakeError::IllegalTransition { .. } => {
                "Something went wrong assigning your puppet number.".to_string()
            }
            HandshakeError::PartialMutation(partial) => format!(
                "Your display name is now {}, but X rejected the new avatar.",
                partial.display_name
            ),
        }
    }
}

#[derive(Debug)]
pub struct ServerError<R: IntoResponse>(pub(crate) color_eyre::Report, pub(crate) R);

pub type ServerResult<S, F = Response> = Result<S, ServerError<F>>;

impl<R: IntoResponse> IntoResponse for ServerError<R> {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = ?self.0, "Request Error");

        self.1.into_response()
    }
}

impl From<HandshakeError> for ServerError<(StatusCode, String)> {
    fn from(err: HandshakeError) -> Self {
        let response = (err.status(), err.user_message());
        ServerError(err.into(), response)
    }
}
