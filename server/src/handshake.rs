//! The three legged OAuth 1.0a handshake with X, modelled as a small state machine.
//!
//! ```text
//! Start ──begin──▶ AwaitingProviderAuthorization ──inspect_callback──▶ Verifying ──complete──▶ Complete
//!   └──────────────────────┴──────────────────────────────────────────────┴──▶ Aborted
//! ```
//!
//! A request only ever sees one leg, so the `/callback` handler resumes the machine in
//! `AwaitingProviderAuthorization` with whatever the browser carried back.

use std::fmt;

use serde::{Deserialize, Deserializer};
use tracing::{error, info, warn};

use crate::errors::{HandshakeError, HandshakeValidationError, ProviderStep, TransportDecodeError};
use crate::mutation::{apply_puppet_profile, MutationResult};
use crate::provider::{AuthenticatedIdentity, IdentityProvider};
use crate::puppets::PuppetAssignment;
use crate::state::AppState;
use crate::transport::{RequestCredential, TokenTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    AwaitingProviderAuthorization,
    Verifying,
    Complete,
    Aborted,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::Start => "START",
            HandshakeState::AwaitingProviderAuthorization => "AWAITING_PROVIDER_AUTHORIZATION",
            HandshakeState::Verifying => "VERIFYING",
            HandshakeState::Complete => "COMPLETE",
            HandshakeState::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

impl HandshakeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, HandshakeState::Complete | HandshakeState::Aborted)
    }

    pub fn can_transition_to(self, next: HandshakeState) -> bool {
        use HandshakeState::*;

        match (self, next) {
            (Start, AwaitingProviderAuthorization)
            | (AwaitingProviderAuthorization, Verifying)
            | (Verifying, Complete) => true,
            (from, Aborted) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Query parameters X appends when it sends the browser back to us
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub oauth_token: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub oauth_verifier: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub denied: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}

/// Output of the first leg: where to send the browser and what it must carry
#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    pub authorization_url: String,
    pub envelope: String,
}

/// What the callback asks us to do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackDecision {
    /// The user came back without authorizing (back button, reload). Send them to X again.
    Resume { authorization_url: String },
    /// Everything lines up, exchange the verifier.
    Verify {
        credential: RequestCredential,
        verifier: String,
    },
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub identity: AuthenticatedIdentity,
    pub assignment: PuppetAssignment,
    pub result: MutationResult,
}

#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
}

impl Handshake {
    pub fn start() -> Self {
        Self {
            state: HandshakeState::Start,
        }
    }

    /// Pick up a handshake whose first leg ran in an earlier request
    pub fn resume() -> Self {
        Self {
            state: HandshakeState::AwaitingProviderAuthorization,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn advance(&mut self, next: HandshakeState) -> Result<(), HandshakeError> {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "Refusing illegal handshake transition");
            return Err(HandshakeError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }

        info!(from = %self.state, to = %next, "Handshake transition");
        self.state = next;
        Ok(())
    }

    /// Move to `Aborted` and hand the reason back for the caller to propagate
    pub fn abort(&mut self, reason: HandshakeError) -> HandshakeError {
        if self.state.is_terminal() {
            return reason;
        }

        error!(from = %self.state, error = ?reason, "Handshake aborted");
        self.state = HandshakeState::Aborted;
        reason
    }

    fn expect_state(&self, expected: HandshakeState, next: HandshakeState) -> Result<(), HandshakeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HandshakeError::IllegalTransition {
                from: self.state,
                to: next,
            })
        }
    }

    /// First leg: get a request token from X and seal it for the trip
    #[tracing::instrument(skip_all)]
    pub async fn begin(&mut self, state: &AppState) -> Result<AuthorizationRedirect, HandshakeError> {
        self.expect_state(HandshakeState::Start, HandshakeState::AwaitingProviderAuthorization)?;

        let link = match state.provider.generate_auth_link(&state.callback_url).await {
            Ok(link) => link,
            Err(e) => return Err(self.abort(HandshakeError::provider(ProviderStep::RequestToken, e))),
        };

        let envelope = match state.transport.encode(&link.credential) {
            Ok(envelope) => envelope,
            Err(e) => return Err(self.abort(HandshakeError::Envelope(e))),
        };

        self.advance(HandshakeState::AwaitingProviderAuthorization)?;

        Ok(AuthorizationRedirect {
            authorization_url: link.authorization_url,
            envelope,
        })
    }

    /// Second leg: check the callback against the carried credential without calling X
    pub fn inspect_callback(
        &mut self,
        params: &CallbackParams,
        envelope: Option<&str>,
        transport: &TokenTransport,
        provider: &dyn IdentityProvider,
    ) -> Result<CallbackDecision, HandshakeError> {
        self.expect_state(HandshakeState::AwaitingProviderAuthorization, HandshakeState::Verifying)?;

        match Self::validate_callback(params, envelope, transport, provider) {
            Ok(decision @ CallbackDecision::Resume { .. }) => {
                info!("Callback without verifier, sending the user back to X");
                Ok(decision)
            }
            Ok(decision) => {
                self.advance(HandshakeState::Verifying)?;
                Ok(decision)
            }
            Err(reason) => Err(self.abort(reason)),
        }
    }

    fn validate_callback(
        params: &CallbackParams,
        envelope: Option<&str>,
        transport: &TokenTransport,
        provider: &dyn IdentityProvider,
    ) -> Result<CallbackDecision, HandshakeError> {
        if params.denied.is_some() {
            return Err(HandshakeValidationError::AuthorizationDenied.into());
        }

        let envelope = envelope.ok_or(TransportDecodeError::Missing)?;
        let credential = transport.decode(envelope)?;

        let Some(verifier) = params.oauth_verifier.as_deref() else {
            if params
                .oauth_token
                .as_deref()
                .is_some_and(|token| token != credential.token)
            {
                return Err(HandshakeValidationError::TokenMismatch.into());
            }

            return Ok(CallbackDecision::Resume {
                authorization_url: provider.authorization_url(&credential.token),
            });
        };

        let token = params
            .oauth_token
            .as_deref()
            .ok_or(HandshakeValidationError::MissingToken)?;

        if token != credential.token {
            return Err(HandshakeValidationError::TokenMismatch.into());
        }

        Ok(CallbackDecision::Verify {
            credential,
            verifier: verifier.to_string(),
        })
    }

    /// Third leg: trade the verifier for access, number the account and rename it
    #[tracing::instrument(skip_all, fields(token = %credential.token))]
    pub async fn complete(
        &mut self,
        state: &AppState,
        credential: &RequestCredential,
        verifier: &str,
    ) -> Result<Completion, HandshakeError> {
        self.expect_state(HandshakeState::Verifying, HandshakeState::Complete)?;

        match Self::run_completion(state, credential, verifier).await {
            Ok(completion) => {
                self.advance(HandshakeState::Complete)?;
                Ok(completion)
            }
            Err(reason) => Err(self.abort(reason)),
        }
    }

    async fn run_completion(
        state: &AppState,
        credential: &RequestCredential,
        verifier: &str,
    ) -> Result<Completion, HandshakeError> {
        let access = state
            .provider
            .exchange_verifier(credential, verifier)
            .await
            .map_err(|e| HandshakeError::provider(ProviderStep::ExchangeVerifier, e))?;

        let identity = state
            .provider
            .current_identity(&access)
            .await
            .map_err(|e| HandshakeError::provider(ProviderStep::FetchIdentity, e))?;
        info!(user_id = %identity.provider_user_id, username = ?identity.username, "Identified X account");

        let assignment = state
            .puppets
            .resolve(&identity.provider_user_id)
            .await
            .map_err(HandshakeError::Store)?;

        let result = apply_puppet_profile(
            state.mutations.as_ref(),
            state.image_source.as_ref(),
            &access,
            &assignment,
        )
        .await?;

        Ok(Completion {
            identity,
            assignment,
            result,
        })
    }
}
