//! # Project Terminology
//!
//! Terms used throughout the Herta Puppet Club codebase. Most of them come from
//! OAuth 1.0a as X implements it.
//!
//! ## OAuth 1.0a Terms
//!
//! * **Consumer credentials**: The app's own key and secret (`TWITTER_API_KEY`,
//!   `TWITTER_API_SECRET`). Every request to X is signed with the consumer secret.
//!
//! * **Request token**: The short lived token pair X issues at the start of a handshake
//!   (`oauth_token` + `oauth_token_secret`). Modelled as
//!   [`RequestCredential`](crate::transport::RequestCredential). The public half comes
//!   back on the callback; the secret half never leaves the server in clear text.
//!
//! * **Verifier**: The `oauth_verifier` X appends to the callback once the user approves.
//!   It proves the user authorized this specific request token.
//!
//! * **Access credential**: The long lived token pair obtained by exchanging the request
//!   token plus verifier. Used for `/2/users/me` and the profile updates, then dropped.
//!   See [`AccessCredential`](crate::provider::AccessCredential).
//!
//! ## Handshake Terms
//!
//! * **Envelope**: The sealed, expiring form of a request token that travels in the
//!   `herta_request_token` cookie between `/login` and `/callback`. Produced and opened by
//!   [`TokenTransport`](crate::transport::TokenTransport).
//!
//! * **Handshake state**: Where a single sign-in attempt stands, see
//!   [`HandshakeState`](crate::handshake::HandshakeState). Aborted and Complete are
//!   terminal.
//!
//! * **Back-button path**: A callback that carries a valid envelope but no verifier. The
//!   user is sent back to the X authorization page and nothing is numbered.
//!
//! ## Puppet Terms
//!
//! * **Ordinal / puppet number**: The sequential number an X account receives the first
//!   time it completes the handshake. Printed zero padded to four digits, so the first
//!   puppet is `#0001`. See [`Ordinal`](crate::puppets::Ordinal).
//!
//! * **Puppet profile**: The display name `Herta Puppet #NNNN` plus the shared Herta
//!   avatar applied to the account.
//!
//! * **Partial mutation**: The display name was changed but the avatar update failed.
//!   Reported to the user as its own error rather than as a success.
