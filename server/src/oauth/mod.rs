//! OAuth 1.0a request signing for the X API
//! This covers the HMAC-SHA1 signature method only, which is all X supports

pub mod signer;
pub mod utils;

pub use signer::*;
