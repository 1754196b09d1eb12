pub mod components;
pub mod docs {
    pub mod terminology;
}
pub mod errors;
pub mod handshake;
pub mod mutation;
pub mod oauth;
pub mod provider;
pub mod puppets;
pub mod routes;
pub mod setup;
pub mod state;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use routes::routes;
pub use state::{AppState, Config};
